//! Tests for drainage-line shapefile reading, against real .shp/.dbf
//! fixtures written with the `shapefile` crate.

use rapid_prep::drainage::{read_numeric_field, DrainageLine, LengthUnits};
use rapid_prep::errors::RapidPrepError;
use rapid_prep::muskingum::write_x_file_from_field;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polyline, Writer};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// One (rivid, length, slope, x) attribute row; None writes a dbase null.
type Row = (f64, Option<f64>, Option<f64>, Option<f64>);

/// Build a small drainage-line shapefile with LINKNO/LENGTH/SLOPE/MUSK_X
/// attribute columns, one two-point polyline per row.
fn create_drainage_shapefile(path: &Path, rows: &[Row]) {
    let table = TableWriterBuilder::new()
        .add_numeric_field(FieldName::try_from("LINKNO").expect("valid field name"), 10, 0)
        .add_numeric_field(FieldName::try_from("LENGTH").expect("valid field name"), 18, 8)
        .add_numeric_field(FieldName::try_from("SLOPE").expect("valid field name"), 18, 8)
        .add_numeric_field(FieldName::try_from("MUSK_X").expect("valid field name"), 18, 8);
    let mut writer = Writer::from_path(path, table).expect("Failed to create shapefile writer");

    for (i, &(rivid, length, slope, x)) in rows.iter().enumerate() {
        let shape = Polyline::new(vec![
            Point::new(i as f64, 0.0),
            Point::new(i as f64 + 1.0, 1.0),
        ]);
        let mut record = Record::default();
        record.insert("LINKNO".to_string(), FieldValue::Numeric(Some(rivid)));
        record.insert("LENGTH".to_string(), FieldValue::Numeric(length));
        record.insert("SLOPE".to_string(), FieldValue::Numeric(slope));
        record.insert("MUSK_X".to_string(), FieldValue::Numeric(x));
        writer
            .write_shape_and_record(&shape, &record)
            .expect("Failed to write feature");
    }
}

#[test]
fn test_from_shapefile_reads_attributes_in_feature_order() {
    let dir = tempdir().expect("Failed to create temp dir");
    let shp_path = dir.path().join("drainage.shp");

    create_drainage_shapefile(
        &shp_path,
        &[
            (30.0, Some(2.5), Some(0.004), Some(0.3)),
            (10.0, Some(1.0), Some(0.002), Some(0.25)),
            (20.0, Some(4.0), Some(0.008), Some(0.35)),
        ],
    );

    let drainage = DrainageLine::from_shapefile(
        &shp_path,
        "LINKNO",
        "LENGTH",
        "SLOPE",
        LengthUnits::Kilometers,
    )
    .expect("Failed to read shapefile");

    assert_eq!(drainage.len(), 3);
    // Feature order, not ID order
    assert_eq!(drainage.index_of(30), Some(0));
    assert_eq!(drainage.index_of(10), Some(1));
    assert_eq!(drainage.index_of(20), Some(2));
    assert!((drainage.length_m(0) - 2500.0).abs() < 1e-6);
    assert!((drainage.length_m(2) - 4000.0).abs() < 1e-6);
    assert!((drainage.slope(1) - 0.002).abs() < 1e-9);
    assert!((drainage.slope_of(20) - 0.008).abs() < 1e-9);
    assert_eq!(drainage.index_of(99), None);
    assert_eq!(drainage.slope_of(99), 0.0);
}

#[test]
fn test_null_length_and_slope_read_as_zero() {
    let dir = tempdir().expect("Failed to create temp dir");
    let shp_path = dir.path().join("drainage.shp");

    create_drainage_shapefile(
        &shp_path,
        &[
            (10.0, Some(1.5), Some(0.003), None),
            (20.0, None, None, None),
        ],
    );

    let drainage = DrainageLine::from_shapefile(
        &shp_path,
        "LINKNO",
        "LENGTH",
        "SLOPE",
        LengthUnits::Kilometers,
    )
    .expect("Failed to read shapefile");

    let idx = drainage.index_of(20).expect("reach 20 missing");
    assert_eq!(drainage.length_m(idx), 0.0);
    assert_eq!(drainage.slope(idx), 0.0);
    // Populated neighbour is unaffected
    assert!((drainage.length_m(0) - 1500.0).abs() < 1e-6);
}

#[test]
fn test_meter_lengths_convert_to_kilometers() {
    let dir = tempdir().expect("Failed to create temp dir");
    let shp_path = dir.path().join("drainage.shp");

    create_drainage_shapefile(&shp_path, &[(10.0, Some(2500.0), Some(0.002), None)]);

    let drainage =
        DrainageLine::from_shapefile(&shp_path, "LINKNO", "LENGTH", "SLOPE", LengthUnits::Meters)
            .expect("Failed to read shapefile");
    assert!((drainage.length_m(0) - 2500.0).abs() < 1e-6);

    let as_km = DrainageLine::from_shapefile(
        &shp_path,
        "LINKNO",
        "LENGTH",
        "SLOPE",
        LengthUnits::Kilometers,
    )
    .expect("Failed to read shapefile");
    assert!((as_km.length_m(0) - 2_500_000.0).abs() < 1e-3);
}

#[test]
fn test_x_file_from_field_preserves_feature_order() {
    let dir = tempdir().expect("Failed to create temp dir");
    let shp_path = dir.path().join("drainage.shp");
    let x_path = dir.path().join("x.csv");

    create_drainage_shapefile(
        &shp_path,
        &[
            (30.0, Some(1.0), Some(0.001), Some(0.3)),
            (10.0, Some(1.0), Some(0.001), Some(0.1)),
            (20.0, Some(1.0), Some(0.001), Some(0.2)),
        ],
    );

    let values = read_numeric_field(&shp_path, "MUSK_X").expect("Failed to read field");
    assert_eq!(values, vec![0.3, 0.1, 0.2]);

    let count = write_x_file_from_field(&shp_path, "MUSK_X", &x_path).expect("write failed");
    assert_eq!(count, 3);
    let text = fs::read_to_string(&x_path).expect("read failed");
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows, vec!["0.3", "0.1", "0.2"]);
}

#[test]
fn test_null_x_value_is_an_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let shp_path = dir.path().join("drainage.shp");

    create_drainage_shapefile(
        &shp_path,
        &[
            (10.0, Some(1.0), Some(0.001), Some(0.3)),
            (20.0, Some(1.0), Some(0.001), None),
        ],
    );

    let result = read_numeric_field(&shp_path, "MUSK_X");
    assert!(matches!(
        result,
        Err(RapidPrepError::InvalidParameter { ref name, .. }) if name == "MUSK_X"
    ));
}

#[test]
fn test_missing_field_is_an_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let shp_path = dir.path().join("drainage.shp");

    create_drainage_shapefile(&shp_path, &[(10.0, Some(1.0), Some(0.001), None)]);

    let result = DrainageLine::from_shapefile(
        &shp_path,
        "COMID",
        "LENGTH",
        "SLOPE",
        LengthUnits::Kilometers,
    );
    assert!(matches!(
        result,
        Err(RapidPrepError::FieldNotFound { ref field }) if field == "COMID"
    ));
}
