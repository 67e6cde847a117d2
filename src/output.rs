//! Output persistence: gzip-compressed records-oriented JSON datasets and
//! the per-run stats CSV.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::stats::LocateStats;
use crate::table::{Row, Table};
use csv::WriterBuilder;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes the table as a gzip-compressed JSON array of records (one JSON
/// object per row, column order preserved). The directory is created if
/// absent; a pre-existing directory is fine.
pub fn save_records(table: &Table, directory: &Path, filename: &str) -> Result<PathBuf> {
    if directory.is_dir() {
        debug!(directory = %directory.display(), "output directory already exists");
    } else {
        std::fs::create_dir_all(directory)
            .with_context(|| format!("failed to create directory: {}", directory.display()))?;
        info!(directory = %directory.display(), "output directory created");
    }

    let path = directory.join(filename);
    info!(path = %path.display(), rows = table.len(), "writing records file");
    let file = File::create(&path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, table.rows())?;
    encoder.finish()?.flush()?;
    Ok(path)
}

/// Select-and-rename per `mapping` (destination name, source name), then
/// save. Returns the selected table for further derivation.
pub fn save_selected(
    table: &Table,
    mapping: &[(&str, &str)],
    directory: &Path,
    filename: &str,
) -> Result<Table> {
    let selected = table.select_rename(mapping)?;
    save_records(&selected, directory, filename)?;
    Ok(selected)
}

/// Reads a records file written by [`save_records`] back into rows.
pub fn read_records(path: &Path) -> Result<Vec<Row>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open records file: {}", path.display()))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    Ok(serde_json::from_reader(decoder)?)
}

/// Appends a [`LocateStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_stats(path: &Path, stats: &LocateStats) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "appending stats record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}
