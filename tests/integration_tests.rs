use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use geo::{MultiPolygon, polygon};
use serde_json::json;
use ward_locator::geokey::Accuracy;
use ward_locator::grid::generate_grid;
use ward_locator::locate::{Boundary, BoundaryIndex, locate_points};
use ward_locator::output::read_records;
use ward_locator::pipeline::{self, PipelineConfig};
use ward_locator::progress::{CaptureSink, NullSink, Progress};
use ward_locator::table::Row;

const WARD_PROPERTIES: &str = r#"{
    "WardID": "79800001",
    "WardNumber": 1,
    "Shape_Length": 0.5,
    "Shape_Area": 0.01,
    "LocalMunicipalityName": "City of Johannesburg",
    "DistrictMunicipalityCode": "JHB",
    "DistrictMunicipalityName": "City of Johannesburg",
    "ProvinceName": "Gauteng",
    "ProvinceCode": "GT"
}"#;

/// Square ward covering the whole default bounding region.
fn covering_index() -> BoundaryIndex {
    let mut attrs = Row::new();
    attrs.insert("WardID".to_string(), json!("79800001"));
    BoundaryIndex::build(vec![Boundary {
        attrs,
        geometry: MultiPolygon::new(vec![polygon![
            (x: 15.0, y: -36.0),
            (x: 34.0, y: -36.0),
            (x: 34.0, y: -21.0),
            (x: 15.0, y: -21.0),
            (x: 15.0, y: -36.0),
        ]]),
    }])
}

#[test]
fn test_grid_join_against_covering_polygon_matches_everything() {
    // 0.1-degree spacing keeps the grid small enough for a test run
    let accuracy = Accuracy::from_meters(10_000).unwrap();
    let grid = generate_grid((-35.0, -22.0), (16.0, 33.0), accuracy, &mut NullSink);

    // axis lengths ~130 and ~170, subject to floating-point boundaries
    let expected = (13.0 / 0.1) as usize * (17.0 / 0.1) as usize;
    assert!(grid.len() >= expected);
    assert!(grid.len() <= (130 + 1) * (170 + 1));

    let index = covering_index();
    let (located, stats) = locate_points(&grid, &index, None, &mut NullSink);
    assert_eq!(stats.input_points, grid.len());
    assert_eq!(stats.located, grid.len());
    assert_eq!(stats.unmatched, 0);
    assert_eq!(located.len(), grid.len());
}

#[test]
fn test_outside_point_is_dropped_and_reported() {
    let index = covering_index();
    let mut points = ward_locator::table::Table::new(["latitude", "longitude"]);
    let mut inside = Row::new();
    inside.insert("latitude".to_string(), json!(-26.2));
    inside.insert("longitude".to_string(), json!(28.0));
    points.push(inside);
    let mut outside = Row::new();
    outside.insert("latitude".to_string(), json!(48.85)); // nowhere near the wards
    outside.insert("longitude".to_string(), json!(2.35));
    points.push(outside);

    let mut sink = CaptureSink::default();
    let (located, stats) = locate_points(&points, &index, None, &mut sink);
    assert_eq!(located.len(), 1);
    assert_eq!(stats.unmatched, 1);

    let reported: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            Progress::Unmatched { dropped, total, .. } => Some((*dropped, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(reported, vec![(1, 2)]);
}

struct Fixture {
    root: PathBuf,
}

impl Fixture {
    fn create(name: &str) -> Self {
        let root = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("data")).unwrap();

        let fixture = Fixture { root };
        fixture.write(
            "data/geonames_features.tsv",
            "A.ADM1\tadmin division\tfirst-order administrative division\n\
             P.PPL\tpopulated place\tcity, town, village\n",
        );
        fixture.write(
            "data/geonames.tsv",
            "1\tGauteng\tGauteng\t\t-26.1\t28.0\tA\tADM1\tZA\t\t\t\t\t\t100\t\t1500\tAfrica/Johannesburg\t2019-01-01\n\
             2\tSoweto\tSoweto\t\t-26.2\t27.8\tP\tPPL\tZA\t\t\t\t\t\t50\t\t1600\tAfrica/Johannesburg\t2019-01-01\n\
             3\tFaraway\tFaraway\t\t48.85\t2.35\tP\tPPL\tFR\t\t\t\t\t\t10\t\t30\tEurope/Paris\t2019-01-01\n",
        );
        fixture.write(
            "data/postal_codes.tsv",
            "ZA\t2000\tJohannesburg\tGauteng\tGT\t\t\t\t\t-26.2\t28.04\t4\n",
        );
        fixture.write(
            "data/wards.geojson",
            &format!(
                r#"{{"type":"FeatureCollection","features":[
                    {{"type":"Feature","properties":{WARD_PROPERTIES},
                      "geometry":{{"type":"Polygon",
                        "coordinates":[[[15,-36],[34,-36],[34,-21],[15,-21],[15,-36]]]}}}}
                ]}}"#
            ),
        );
        fixture
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        let mut file = fs::File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            gazetteer: self.root.join("data/geonames.tsv"),
            feature_codes: self.root.join("data/geonames_features.tsv"),
            postal_codes: self.root.join("data/postal_codes.tsv"),
            boundaries: self.root.join("data/wards.geojson"),
            output_dir: self.root.join("processed_data"),
            datasets_dir: self.root.join("datasets"),
            accuracy: Accuracy::from_meters(10_000).unwrap(),
            chunksize: None,
            lat_range: (-35.0, -22.0),
            long_range: (16.0, 33.0),
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn test_full_pipeline_run() {
    let fixture = Fixture::create("ward_locator_it_full_run");
    let config = fixture.config();

    let summary = pipeline::run(&config, &mut NullSink).unwrap();

    // every grid point falls inside the covering ward
    assert_eq!(summary.grid.unmatched, 0);
    assert!(summary.grid.located > 0);
    // the Paris gazetteer entry is dropped by the inner join
    assert_eq!(summary.gazetteer.input_points, 3);
    assert_eq!(summary.gazetteer.located, 2);
    assert_eq!(summary.gazetteer.unmatched, 1);
    assert_eq!(summary.postal_codes.located, 1);

    for filename in [
        "located_grid.json.gz",
        "located_geonames.json.gz",
        "located_postal_codes.json.gz",
    ] {
        assert!(config.output_dir.join(filename).exists(), "{filename}");
    }
    for filename in [
        "postal_codes.json.gz",
        "provinces.json.gz",
        "districts.json.gz",
        "towns.json.gz",
        "suburbs.json.gz",
        "wards.json.gz",
        "grid.json.gz",
    ] {
        assert!(config.datasets_dir.join(filename).exists(), "{filename}");
    }

    // gazetteer output is renamed per the dataset mapping
    let gazetteer = read_records(&config.output_dir.join("located_geonames.json.gz")).unwrap();
    assert_eq!(gazetteer.len(), 2);
    assert!(gazetteer[0].contains_key("geoname_id"));
    assert!(gazetteer[0].contains_key("ward_id"));
    assert!(!gazetteer[0].contains_key("geonameid"));
    assert_eq!(gazetteer[0].get("ward_id"), Some(&json!("79800001")));

    // derived subsets: one province, one populated place inside the wards
    let provinces = read_records(&config.datasets_dir.join("provinces.json.gz")).unwrap();
    assert_eq!(provinces.len(), 1);
    assert_eq!(provinces[0].get("name"), Some(&json!("Gauteng")));
    let suburbs = read_records(&config.datasets_dir.join("suburbs.json.gz")).unwrap();
    assert_eq!(suburbs.len(), 1);

    // wards dataset deduplicates down to the single ward
    let wards = read_records(&config.datasets_dir.join("wards.json.gz")).unwrap();
    assert_eq!(wards.len(), 1);
    assert_eq!(wards[0].get("province_name"), Some(&json!("Gauteng")));
    assert!(!wards[0].contains_key("geokey"));

    // run stats: header + one row per dataset
    let stats = fs::read_to_string(config.output_dir.join("run_stats.csv")).unwrap();
    assert_eq!(stats.lines().count(), 4);
}

#[test]
fn test_save_with_column_mapping() {
    let fixture = Fixture::create("ward_locator_it_mapping");
    let mut table = ward_locator::table::Table::new(["source_col1", "source_col2", "extra"]);
    let mut row = Row::new();
    row.insert("source_col1".to_string(), json!(42));
    row.insert("source_col2".to_string(), json!("v"));
    row.insert("extra".to_string(), json!(true));
    table.push(row);

    let saved = ward_locator::output::save_selected(
        &table,
        &[("a", "source_col1"), ("b", "source_col2")],
        &fixture.root,
        "mapped.json.gz",
    )
    .unwrap();
    assert_eq!(saved.columns(), &["a", "b"]);

    let rows = read_records(&fixture.root.join("mapped.json.gz")).unwrap();
    let keys: Vec<&String> = rows[0].keys().collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(rows[0].get("a"), Some(&json!(42)));
    assert_eq!(rows[0].get("b"), Some(&json!("v")));
}
