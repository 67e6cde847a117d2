//! Input readers: tab-separated point datasets and polygon boundary files.

use crate::locate::Boundary;
use crate::table::{Row, Table};
use anyhow::{Context, Result, anyhow};
use geo::MultiPolygon;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Gazetteer column layout (geonames export, headerless TSV).
const GAZETTEER_COLUMNS: [&str; 19] = [
    "geonameid",
    "name",
    "asciiname",
    "alternatenames",
    "latitude",
    "longitude",
    "feature_class",
    "feature_code",
    "country_code",
    "cc2",
    "admin1_code",
    "admin2_code",
    "admin3_code",
    "admin4_code",
    "population",
    "elevation",
    "dem",
    "timezone",
    "modification_date",
];

const FEATURE_COLUMNS: [&str; 3] = ["f_code", "desc_short", "desc_long"];

const POSTAL_CODE_COLUMNS: [&str; 12] = [
    "country_code",
    "postal_code",
    "place_name",
    "admin_name1",
    "admin_code1",
    "admin_name2",
    "admin_code2",
    "admin_name3",
    "admin_code3",
    "latitude",
    "longitude",
    "accuracy",
];

/// Reads a headerless TSV into a table with the given column names.
/// Geonames exports contain unescaped quotes, so quoting is disabled.
fn read_tsv(path: &Path, columns: &[&str]) -> Result<Table> {
    let file =
        File::open(path).with_context(|| format!("failed to open TSV file: {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut table = Table::new(columns.iter().copied());
    for record in reader.records() {
        let record = record.with_context(|| format!("malformed TSV row in {}", path.display()))?;
        let mut row = Row::new();
        for (i, column) in columns.iter().enumerate() {
            let value = match record.get(i) {
                Some("") | None => Value::Null,
                Some(field) => Value::String(field.to_string()),
            };
            row.insert((*column).to_string(), value);
        }
        table.push(row);
    }
    Ok(table)
}

fn cast_f64(row: &mut Row, column: &str) {
    if let Some(Value::String(s)) = row.get(column) {
        let parsed = s.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        row.insert(
            column.to_string(),
            parsed.map(Value::from).unwrap_or(Value::Null),
        );
    }
}

fn cast_i64(row: &mut Row, column: &str) {
    if let Some(Value::String(s)) = row.get(column) {
        let parsed = s.trim().parse::<i64>().ok();
        row.insert(
            column.to_string(),
            parsed.map(Value::from).unwrap_or(Value::Null),
        );
    }
}

/// Loads the gazetteer TSV, synthesizes `f_code` from feature class and
/// code, and left-merges the feature-code descriptions.
pub fn load_gazetteer(path: &Path, features_path: &Path) -> Result<Table> {
    info!(path = %path.display(), "reading gazetteer dataset");
    let features = read_tsv(features_path, &FEATURE_COLUMNS)?;
    let mut descriptions: HashMap<String, (Value, Value)> = HashMap::new();
    for row in features.rows() {
        if let Some(code) = row.get("f_code").and_then(Value::as_str) {
            descriptions.insert(
                code.to_string(),
                (
                    row.get("desc_short").cloned().unwrap_or_default(),
                    row.get("desc_long").cloned().unwrap_or_default(),
                ),
            );
        }
    }

    let mut table = read_tsv(path, &GAZETTEER_COLUMNS)?;
    for row in table.rows_mut() {
        cast_f64(row, "latitude");
        cast_f64(row, "longitude");
        cast_i64(row, "geonameid");
        cast_i64(row, "population");

        let class = row.get("feature_class").and_then(Value::as_str).unwrap_or("");
        let code = row.get("feature_code").and_then(Value::as_str).unwrap_or("");
        let f_code = format!("{class}.{code}");
        let (short, long) = descriptions
            .get(&f_code)
            .cloned()
            .unwrap_or((Value::Null, Value::Null));
        row.insert("f_code".to_string(), Value::String(f_code));
        row.insert("desc_short".to_string(), short);
        row.insert("desc_long".to_string(), long);
    }
    for column in ["f_code", "desc_short", "desc_long"] {
        table.ensure_column(column);
    }
    info!(rows = table.len(), "gazetteer read");
    Ok(table)
}

/// Loads the postal code TSV with coordinates parsed as floats.
pub fn load_postal_codes(path: &Path) -> Result<Table> {
    info!(path = %path.display(), "reading postal codes");
    let mut table = read_tsv(path, &POSTAL_CODE_COLUMNS)?;
    for row in table.rows_mut() {
        cast_f64(row, "latitude");
        cast_f64(row, "longitude");
    }
    info!(rows = table.len(), "postal codes read");
    Ok(table)
}

/// Loads ward boundary polygons from a Shapefile or GeoJSON file, keyed by
/// the file extension.
pub fn load_boundaries(path: &Path) -> Result<Vec<Boundary>> {
    info!(path = %path.display(), "reading boundaries");
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| anyhow!("boundary file has no extension: {}", path.display()))?;

    let boundaries = match extension.as_str() {
        "shp" => load_shapefile_boundaries(path)?,
        "json" | "geojson" => load_geojson_boundaries(path)?,
        other => return Err(anyhow!("unsupported boundary format: {other}")),
    };
    info!(boundaries = boundaries.len(), "boundaries read");
    Ok(boundaries)
}

fn load_shapefile_boundaries(path: &Path) -> Result<Vec<Boundary>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("failed to open shapefile: {}", path.display()))?;

    let mut boundaries = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(p) => p
                .try_into()
                .map_err(|e| anyhow!("failed to convert polygon: {e:?}"))?,
            shapefile::Shape::PolygonM(p) => p
                .try_into()
                .map_err(|e| anyhow!("failed to convert polygonM: {e:?}"))?,
            shapefile::Shape::PolygonZ(p) => p
                .try_into()
                .map_err(|e| anyhow!("failed to convert polygonZ: {e:?}"))?,
            _ => continue, // non-polygon shapes carry no ward
        };

        // dbase fields come out of a hash map; sort for a stable column order
        let mut fields: Vec<(String, shapefile::dbase::FieldValue)> = record.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let mut attrs = Row::new();
        for (name, value) in fields {
            attrs.insert(name, dbase_value(value));
        }
        boundaries.push(Boundary { attrs, geometry });
    }
    Ok(boundaries)
}

fn dbase_value(value: shapefile::dbase::FieldValue) -> Value {
    use shapefile::dbase::FieldValue;
    match value {
        FieldValue::Character(s) => s.map(Value::String).unwrap_or(Value::Null),
        FieldValue::Numeric(n) => n.map(Value::from).unwrap_or(Value::Null),
        FieldValue::Float(f) => f.map(|v| Value::from(f64::from(v))).unwrap_or(Value::Null),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Double(d) => Value::from(d),
        FieldValue::Currency(c) => Value::from(c),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Date(d) => d.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null),
        other => Value::String(format!("{other:?}")),
    }
}

fn load_geojson_boundaries(path: &Path) -> Result<Vec<Boundary>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open GeoJSON file: {}", path.display()))?;
    let geojson = geojson::GeoJson::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse GeoJSON: {}", path.display()))?;

    let collection = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("boundary GeoJSON must be a FeatureCollection")),
    };

    let mut boundaries = Vec::new();
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let converted: geo::Geometry<f64> = geometry
            .value
            .try_into()
            .map_err(|e| anyhow!("failed to convert GeoJSON geometry: {e:?}"))?;
        let geometry = match converted {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            _ => continue, // points/lines carry no ward
        };

        let mut attrs = Row::new();
        if let Some(properties) = feature.properties {
            for (name, value) in properties {
                attrs.insert(name, value);
            }
        }
        boundaries.push(Boundary { attrs, geometry });
    }
    Ok(boundaries)
}
