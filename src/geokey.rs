//! Geokey derivation: a coarse spatial bucket key from rounded coordinates.

use crate::table::{self, Table};
use anyhow::{Result, anyhow};
use serde_json::Value;
use tracing::debug;

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const GEOKEY: &str = "geokey";

const VALID_METERS: [u32; 6] = [1, 10, 100, 1_000, 10_000, 100_000];

/// Key-space granularity in meters, restricted to powers of ten.
///
/// Both the grid generator and the key encoder take an [`Accuracy`], so the
/// power-of-ten constraint is validated once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accuracy {
    meters: u32,
}

impl Accuracy {
    pub fn from_meters(meters: u32) -> Result<Self> {
        if !VALID_METERS.contains(&meters) {
            return Err(anyhow!(
                "accuracy_m must be one of 1, 10, 100, 1000, 10000 or 100000 meters, got {meters}"
            ));
        }
        Ok(Accuracy { meters })
    }

    pub fn meters(self) -> u32 {
        self.meters
    }

    /// Decimal digits the coordinates are rounded to: 5 - log10(meters).
    pub fn round_digits(self) -> i32 {
        5 - self.meters.ilog10() as i32
    }

    /// Grid spacing in degrees: meters / 100000.
    pub fn degree_step(self) -> f64 {
        f64::from(self.meters) / 100_000.0
    }
}

impl Default for Accuracy {
    fn default() -> Self {
        Accuracy { meters: 1_000 }
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Derives the key for a single coordinate pair.
///
/// Two points inside the same accuracy cell produce an identical key.
pub fn geokey_for(latitude: f64, longitude: f64, accuracy: Accuracy) -> String {
    let digits = accuracy.round_digits();
    let lat = round_to(latitude, digits);
    let long = round_to(longitude, digits);
    format!(
        "{};{}",
        (lat * 100_000.0).round() as i64,
        (long * 100_000.0).round() as i64
    )
}

/// Rounds the latitude/longitude columns in place to the accuracy's digit
/// count and writes the `geokey` column, overwriting any existing one.
///
/// Rows whose coordinates cannot be read as finite numbers get a null key.
pub fn generate_key(table: &mut Table, accuracy: Accuracy) -> Result<()> {
    for column in [LATITUDE, LONGITUDE] {
        if !table.has_column(column) {
            return Err(anyhow!("cannot generate geokey: missing '{column}' column"));
        }
    }
    debug!(
        accuracy_m = accuracy.meters(),
        rows = table.len(),
        "generating geokey"
    );
    let digits = accuracy.round_digits();
    for row in table.rows_mut() {
        let coords = (
            table::f64_value(row, LATITUDE),
            table::f64_value(row, LONGITUDE),
        );
        let key = match coords {
            (Some(lat), Some(long)) => {
                row.insert(LATITUDE.to_string(), Value::from(round_to(lat, digits)));
                row.insert(LONGITUDE.to_string(), Value::from(round_to(long, digits)));
                Value::String(geokey_for(lat, long, accuracy))
            }
            _ => Value::Null,
        };
        row.insert(GEOKEY.to_string(), key);
    }
    table.ensure_column(GEOKEY);
    Ok(())
}
