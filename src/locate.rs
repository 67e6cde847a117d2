//! Chunked point-within-polygon containment join.
//!
//! Candidate boundaries come from an R-tree over polygon bounding boxes;
//! the exact test is `geo`'s containment predicate. Invalid or
//! self-intersecting polygons may silently fail containment for affected
//! points; no repair is attempted, matching the source data's contract.

use crate::chunk::{partition, resolve_chunksize};
use crate::geokey::{LATITUDE, LONGITUDE};
use crate::progress::{Progress, ProgressSink};
use crate::stats::LocateStats;
use crate::table::{self, Row, Table};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use tracing::debug;

/// Inputs above this size trigger a one-time long-run notice.
pub const LARGE_INPUT_THRESHOLD: usize = 500_000;

/// Suffix applied to boundary-side attributes whose name collides with a
/// point-side column.
pub const BOUNDARY_SUFFIX: &str = "_boundary";

const PROGRESS_EVERY_CHUNKS: usize = 10;

/// An administrative boundary polygon plus its attribute row.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub attrs: Row,
    pub geometry: MultiPolygon<f64>,
}

struct BoundaryEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable boundary set with an R-tree over bounding boxes.
pub struct BoundaryIndex {
    boundaries: Vec<Boundary>,
    tree: RTree<BoundaryEnvelope>,
}

impl BoundaryIndex {
    pub fn build(boundaries: Vec<Boundary>) -> Self {
        let envelopes = boundaries
            .iter()
            .enumerate()
            .filter_map(|(index, b)| {
                b.geometry.bounding_rect().map(|rect| BoundaryEnvelope {
                    index,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        debug!(boundaries = boundaries.len(), "boundary index built");
        BoundaryIndex {
            boundaries,
            tree: RTree::bulk_load(envelopes),
        }
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// All boundaries whose polygon contains the point (x=longitude,
    /// y=latitude), in index order.
    pub fn containing(&self, longitude: f64, latitude: f64) -> Vec<&Boundary> {
        let point = Point::new(longitude, latitude);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([longitude, latitude]))
            .filter(|e| self.boundaries[e.index].geometry.contains(&point))
            .map(|e| e.index)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.boundaries[i]).collect()
    }

    /// Union of attribute names across boundaries, in first-seen order.
    fn attr_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for boundary in &self.boundaries {
            for name in boundary.attrs.keys() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }
}

/// Inner containment join of `points` against `index`, processed in
/// chunks. Points outside every boundary are dropped; the loss is surfaced
/// through the sink and the returned stats, never as an error.
pub fn locate_points(
    points: &Table,
    index: &BoundaryIndex,
    chunksize: Option<usize>,
    sink: &mut dyn ProgressSink,
) -> (Table, LocateStats) {
    let total = points.len();
    let chunksize = resolve_chunksize(chunksize, total);
    sink.report(Progress::StageStarted {
        stage: "locate",
        rows: total,
    });
    if total > LARGE_INPUT_THRESHOLD {
        sink.report(Progress::LargeInput {
            stage: "locate",
            rows: total,
        });
    }

    // Boundary-side output names, suffixed where they collide with a
    // point-side column.
    let attr_mapping: Vec<(String, String)> = index
        .attr_columns()
        .into_iter()
        .map(|source| {
            let dest = if points.has_column(&source) {
                format!("{source}{BOUNDARY_SUFFIX}")
            } else {
                source.clone()
            };
            (source, dest)
        })
        .collect();

    let mut columns: Vec<String> = points.columns().to_vec();
    columns.extend(attr_mapping.iter().map(|(_, dest)| dest.clone()));
    let mut located = Table::new(columns);

    let mut processed = 0usize;
    let mut chunks_done = 0usize;
    for chunk in partition(points.rows(), Some(chunksize)) {
        for row in chunk {
            let (Some(lat), Some(long)) = (
                table::f64_value(row, LATITUDE),
                table::f64_value(row, LONGITUDE),
            ) else {
                continue;
            };
            for boundary in index.containing(long, lat) {
                let mut joined = row.clone();
                for (source, dest) in &attr_mapping {
                    let value = boundary.attrs.get(source).cloned().unwrap_or_default();
                    joined.insert(dest.clone(), value);
                }
                located.push(joined);
            }
        }
        processed += chunk.len();
        chunks_done += 1;
        if chunks_done % PROGRESS_EVERY_CHUNKS == 0 {
            sink.report(Progress::ChunkCompleted {
                stage: "locate",
                processed,
                total,
                percent: (processed * 100 / total.max(1)) as u32,
            });
        }
    }

    let stats = LocateStats::new(total, located.len(), chunks_done, chunksize);
    sink.report(Progress::Unmatched {
        stage: "locate",
        dropped: stats.unmatched,
        total,
        percent: stats.unmatched_pct(),
    });
    (located, stats)
}
