//! Synthetic point grid over a lat/long bounding box.

use crate::geokey::{Accuracy, LATITUDE, LONGITUDE};
use crate::progress::{Progress, ProgressSink};
use crate::table::{Row, Table};
use serde_json::Value;
use tracing::debug;

/// Row-count ceiling for a single cartesian-product batch. Keeps peak
/// transient allocation flat on very large grids.
const PRODUCT_BATCH_ROWS: usize = 150_000;

/// Builds the cartesian product of a latitude and a longitude axis, each
/// sampled at the accuracy's degree step over the given (min, max) pairs
/// (bounds may be passed in either order; the upper bound is exclusive).
///
/// Row order is latitude-major: all longitudes for the first latitude, then
/// the next latitude, and so on.
pub fn generate_grid(
    lat_range: (f64, f64),
    long_range: (f64, f64),
    accuracy: Accuracy,
    sink: &mut dyn ProgressSink,
) -> Table {
    let step = accuracy.degree_step();
    let lats = arange(lat_range.0.min(lat_range.1), lat_range.0.max(lat_range.1), step);
    let longs = arange(
        long_range.0.min(long_range.1),
        long_range.0.max(long_range.1),
        step,
    );

    let total = lats.len() * longs.len();
    sink.report(Progress::StageStarted {
        stage: "grid",
        rows: total,
    });

    let mut table = Table::new([LATITUDE, LONGITUDE]);
    bounded_cartesian_product(&lats, &longs, PRODUCT_BATCH_ROWS, &mut table, sink);
    debug!(
        rows = table.len(),
        lats = lats.len(),
        longs = longs.len(),
        step,
        "grid generated"
    );
    table
}

/// Arithmetic range [min, max) at the given step.
fn arange(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut values = Vec::new();
    let mut i = 0u64;
    loop {
        let v = min + i as f64 * step;
        if v >= max {
            break;
        }
        values.push(v);
        i += 1;
    }
    values
}

/// Cartesian product appended to `out` in latitude-major order, generated
/// in batches of at most `batch_rows` rows.
fn bounded_cartesian_product(
    lats: &[f64],
    longs: &[f64],
    batch_rows: usize,
    out: &mut Table,
    sink: &mut dyn ProgressSink,
) {
    if lats.is_empty() || longs.is_empty() {
        return;
    }
    let total = lats.len() * longs.len();
    // Whole latitude rows per batch, at least one so we always make progress.
    let lats_per_batch = (batch_rows / longs.len()).max(1);
    for batch in lats.chunks(lats_per_batch) {
        for &lat in batch {
            for &long in longs {
                let mut row = Row::new();
                row.insert(LATITUDE.to_string(), Value::from(lat));
                row.insert(LONGITUDE.to_string(), Value::from(long));
                out.push(row);
            }
        }
        sink.report(Progress::ChunkCompleted {
            stage: "grid",
            processed: out.len(),
            total,
            percent: (out.len() * 100 / total) as u32,
        });
    }
}
