//! Pipeline orchestration: key encoding, grid generation and the
//! containment join composed over the three input datasets, plus the
//! flattened output datasets derived from the join results.

use crate::geokey::{self, Accuracy};
use crate::grid::generate_grid;
use crate::loader;
use crate::locate::{BoundaryIndex, locate_points};
use crate::output::{append_stats, save_records, save_selected};
use crate::progress::ProgressSink;
use crate::stats::LocateStats;
use crate::table::Table;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

/// Default bounding region: South Africa.
pub const DEFAULT_LAT_RANGE: (f64, f64) = (-35.0, -22.0);
pub const DEFAULT_LONG_RANGE: (f64, f64) = (16.0, 33.0);

/// Located grid output columns (destination name, source name).
const GRID_DATASET_COLUMNS: &[(&str, &str)] = &[
    ("geokey", "geokey"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("ward_id", "WardID"),
    ("ward_number", "WardNumber"),
    ("ward_length", "Shape_Length"),
    ("ward_area", "Shape_Area"),
    ("local_municipality", "LocalMunicipalityName"),
    ("district_municipality_code", "DistrictMunicipalityCode"),
    ("district_municipality", "DistrictMunicipalityName"),
    ("province_name", "ProvinceName"),
    ("province_code", "ProvinceCode"),
];

const GAZETTEER_DATASET_COLUMNS: &[(&str, &str)] = &[
    ("geoname_id", "geonameid"),
    ("ward_id", "WardID"),
    ("geokey", "geokey"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("name", "name"),
    ("feature_class", "feature_class"),
    ("feature_code", "feature_code"),
    ("population", "population"),
    ("desc_short", "desc_short"),
    ("desc_long", "desc_long"),
];

const POSTAL_CODE_DATASET_COLUMNS: &[(&str, &str)] = &[
    ("geokey", "geokey"),
    ("ward_id", "WardID"),
    ("postal_code", "postal_code"),
    ("place_name", "place_name"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub gazetteer: PathBuf,
    pub feature_codes: PathBuf,
    pub postal_codes: PathBuf,
    pub boundaries: PathBuf,
    /// Directory for the full located datasets and the run stats CSV.
    pub output_dir: PathBuf,
    /// Directory for the flattened per-unit datasets.
    pub datasets_dir: PathBuf,
    pub accuracy: Accuracy,
    pub chunksize: Option<usize>,
    pub lat_range: (f64, f64),
    pub long_range: (f64, f64),
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub grid: LocateStats,
    pub gazetteer: LocateStats,
    pub postal_codes: LocateStats,
}

/// Key encoding followed by the chunked containment join.
pub fn process_table(
    mut table: Table,
    index: &BoundaryIndex,
    accuracy: Accuracy,
    chunksize: Option<usize>,
    sink: &mut dyn ProgressSink,
) -> Result<(Table, LocateStats)> {
    geokey::generate_key(&mut table, accuracy)?;
    Ok(locate_points(&table, index, chunksize, sink))
}

/// Partitions the located gazetteer into administrative-level subsets:
/// provinces (ADM1), districts (ADM2), towns (ADM3) and the catch-all
/// populated-place subset (feature class P).
pub fn extract_names_datasets(located: &Table) -> (Table, Table, Table, Table) {
    let provinces = located.filter_eq("feature_code", "ADM1");
    let districts = located.filter_eq("feature_code", "ADM2");
    let towns = located.filter_eq("feature_code", "ADM3");
    let suburbs = located.filter_eq("feature_class", "P");
    (provinces, districts, towns, suburbs)
}

/// Fills missing values in `column` from `fallback`, row by row.
fn backfill_column(table: &mut Table, column: &str, fallback: &str) {
    for row in table.rows_mut() {
        let missing = row.get(column).is_none_or(Value::is_null);
        if missing {
            if let Some(value) = row.get(fallback).cloned() {
                row.insert(column.to_string(), value);
            }
        }
    }
}

/// Runs the full pipeline: loads all inputs, processes the synthetic grid,
/// the gazetteer and the postal codes against the ward boundaries, and
/// writes every output dataset.
pub fn run(config: &PipelineConfig, sink: &mut dyn ProgressSink) -> Result<RunSummary> {
    let boundaries = loader::load_boundaries(&config.boundaries)?;
    let index = BoundaryIndex::build(boundaries);
    let gazetteer = loader::load_gazetteer(&config.gazetteer, &config.feature_codes)?;
    let postal_codes = loader::load_postal_codes(&config.postal_codes)?;

    let stats_path = config.output_dir.join("run_stats.csv");

    // Synthetic grid
    info!("processing the generated grid dataset");
    let grid = generate_grid(config.lat_range, config.long_range, config.accuracy, sink);
    let (located_grid, grid_stats) =
        process_table(grid, &index, config.accuracy, config.chunksize, sink)?;
    let grid_stats = grid_stats.with_dataset("grid");
    let grid_dataset = save_selected(
        &located_grid,
        GRID_DATASET_COLUMNS,
        &config.output_dir,
        "located_grid.json.gz",
    )?;
    drop(located_grid);

    // Wards: the grid's boundary attributes without point columns
    let ward_columns: Vec<&str> = grid_dataset
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| !matches!(*c, "geokey" | "latitude" | "longitude"))
        .collect();
    let mut wards = grid_dataset.select(&ward_columns)?;
    wards.dedup();
    let mut grid_lookup = grid_dataset.select(&["geokey", "ward_id", "latitude", "longitude"])?;
    grid_lookup.dedup();
    drop(grid_dataset);

    // Gazetteer
    info!("processing the gazetteer dataset");
    let (mut located_gazetteer, gazetteer_stats) =
        process_table(gazetteer, &index, config.accuracy, config.chunksize, sink)?;
    let gazetteer_stats = gazetteer_stats.with_dataset("gazetteer");
    backfill_column(&mut located_gazetteer, "desc_long", "desc_short");
    let mut gazetteer_dataset = located_gazetteer.select_rename(GAZETTEER_DATASET_COLUMNS)?;
    drop(located_gazetteer);
    gazetteer_dataset.drop_nulls();
    save_records(
        &gazetteer_dataset,
        &config.output_dir,
        "located_geonames.json.gz",
    )?;
    let (provinces, districts, towns, suburbs) = extract_names_datasets(&gazetteer_dataset);
    drop(gazetteer_dataset);

    // Postal codes
    info!("processing the postal codes dataset");
    let (located_postal, postal_stats) = process_table(
        postal_codes,
        &index,
        config.accuracy,
        config.chunksize,
        sink,
    )?;
    let postal_stats = postal_stats.with_dataset("postal_codes");
    let postal_dataset = save_selected(
        &located_postal,
        POSTAL_CODE_DATASET_COLUMNS,
        &config.output_dir,
        "located_postal_codes.json.gz",
    )?;
    drop(located_postal);

    info!("saving flattened datasets");
    save_records(&postal_dataset, &config.datasets_dir, "postal_codes.json.gz")?;
    save_records(&provinces, &config.datasets_dir, "provinces.json.gz")?;
    save_records(&districts, &config.datasets_dir, "districts.json.gz")?;
    save_records(&towns, &config.datasets_dir, "towns.json.gz")?;
    save_records(&suburbs, &config.datasets_dir, "suburbs.json.gz")?;
    save_records(&wards, &config.datasets_dir, "wards.json.gz")?;
    save_records(&grid_lookup, &config.datasets_dir, "grid.json.gz")?;

    for stats in [&grid_stats, &gazetteer_stats, &postal_stats] {
        append_stats(&stats_path, stats)?;
    }

    info!(
        grid_located = grid_stats.located,
        gazetteer_located = gazetteer_stats.located,
        postal_codes_located = postal_stats.located,
        "pipeline run complete"
    );
    Ok(RunSummary {
        grid: grid_stats,
        gazetteer: gazetteer_stats,
        postal_codes: postal_stats,
    })
}
