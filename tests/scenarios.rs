use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use easy_ogr::errors::{EasyOgrError, Result};
use easy_ogr::geometry::flatten;
use easy_ogr::{
    Dataset, FeatureGenerator, FeatureLayer, FieldDefinition, FieldType, FieldValue,
    GeometryInput, OpenOptions, Overlay, Query, Record, ResultPolicy, SelectionMode, Status,
    ViewOptions,
};
use gdal_sys::OGRwkbGeometryType;

/// Returns the fully qualified path to `filename` in `${CARGO_MANIFEST_DIR}/fixtures`.
fn fixture(filename: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(filename)
}

fn open_layer(name: &str) -> FeatureLayer {
    FeatureLayer::open(fixture(name), &OpenOptions::new(), &ViewOptions::default()).unwrap()
}

fn open_generator(name: &str) -> FeatureGenerator {
    FeatureGenerator::open(fixture(name), &OpenOptions::new(), &ViewOptions::default()).unwrap()
}

fn read_all(path: &Path) -> (Dataset, Vec<Record>) {
    let dataset =
        Dataset::open_with_view(path, &OpenOptions::new(), &ViewOptions::default()).unwrap();
    let records = dataset.iter().unwrap().collect::<Result<Vec<_>>>().unwrap();
    (dataset, records)
}

#[test]
fn scenario_filter_then_export() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("high_scores.geojson");

    let mut generator = open_generator("points.geojson");
    generator.attribute_filter("score >= 5").unwrap();
    assert_eq!(generator.export(output.as_path()).unwrap(), 2);

    let (dataset, records) = read_all(&output);
    assert_eq!(dataset.fields(), vec!["name", "score"]);
    let rows: Vec<_> = records
        .iter()
        .map(|record| (record[0].clone(), record[1].clone()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (FieldValue::from("b"), FieldValue::from(5)),
            (FieldValue::from("c"), FieldValue::from(9)),
        ]
    );
}

#[test]
fn scenario_double_buffer_differs_from_single() {
    let square = Record::new(
        GeometryInput::wkt("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"),
        Vec::new(),
    )
    .unwrap();
    let once = square.buffer(10.0).unwrap();
    let twice = once.buffer(10.0).unwrap();
    assert!(once.area() > square.area());
    assert!(twice.area() > once.area());
    assert_ne!(twice.area(), once.area());
}

#[test]
fn scenario_polygons_intersected_with_lines_yield_lines() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("crossings.geojson");

    let layer = open_layer("polygons.geojson");
    layer.intersection(fixture("lines.geojson"), output.as_path()).unwrap();

    let (_, records) = read_all(&output);
    assert!(!records.is_empty());
    for record in &records {
        let name = record.geometry_name();
        assert!(name == "LINESTRING" || name == "MULTILINESTRING", "{name}");
    }
}

fn direct_scan(clause: &str) -> BTreeSet<u64> {
    let dataset = Dataset::open_with_view(
        fixture("points.geojson"),
        &OpenOptions::new(),
        &ViewOptions::default(),
    )
    .unwrap();
    let query = Query::compile(&dataset.fields(), clause).unwrap();
    let layer = dataset.active_layer().unwrap();
    layer
        .fids()
        .into_iter()
        .filter(|fid| {
            let record = layer.feature(*fid).unwrap().to_record().unwrap();
            query.test(record.attributes()).unwrap()
        })
        .collect()
}

#[test]
fn property_new_selection_equals_direct_scan() {
    for clause in ["score >= 5", "name = 'a' or score > 8", "score < 0"] {
        let mut layer = open_layer("points.geojson");
        layer.attribute_filter("score > 1", SelectionMode::New).unwrap();
        layer.attribute_filter(clause, SelectionMode::New).unwrap();
        assert_eq!(layer.selection().cloned().unwrap(), direct_scan(clause), "{clause}");
    }
}

#[test]
fn property_intersection_is_idempotent() {
    let mut layer = open_layer("points.geojson");
    layer.attribute_filter("score > 0", SelectionMode::New).unwrap();
    layer.attribute_filter("score < 9", SelectionMode::Intersection).unwrap();
    let once = layer.selection().cloned();
    layer.attribute_filter("score < 9", SelectionMode::Intersection).unwrap();
    assert_eq!(layer.selection().cloned(), once);
}

#[test]
fn property_union_then_complementary_intersection_restores_selection() {
    let mut layer = open_layer("points.geojson");
    layer.attribute_filter("score < 5", SelectionMode::New).unwrap();
    let before = layer.selection().cloned();

    layer.attribute_filter("name = 'c'", SelectionMode::Union).unwrap();
    assert_eq!(layer.feature_count(), 2);
    layer
        .attribute_filter("not (name = 'c')", SelectionMode::Intersection)
        .unwrap();
    assert_eq!(layer.selection().cloned(), before);
}

#[test]
fn property_add_then_drop_restores_shape() {
    let mut generator = open_generator("points.geojson");
    let schema = generator.schema().clone();
    generator
        .add_field(FieldDefinition::new("extra", FieldType::Real), 1.5)
        .unwrap();
    generator.drop_fields(&["extra"]).unwrap();
    assert_eq!(generator.schema(), &schema);

    let plain = open_generator("points.geojson")
        .collect::<Result<Vec<_>>>()
        .unwrap();
    let chained = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(plain.len(), chained.len());
    for (a, b) in plain.iter().zip(&chained) {
        assert_eq!(a.attributes(), b.attributes());
    }
}

#[test]
fn property_close_twice_then_use_fails() {
    let mut dataset = Dataset::open_with_view(
        fixture("points.geojson"),
        &OpenOptions::new(),
        &ViewOptions::default(),
    )
    .unwrap();
    assert_eq!(dataset.status(), Status::Open);
    dataset.close();
    dataset.close();
    assert_eq!(dataset.status(), Status::Closed);
    assert!(matches!(dataset.get(0), Err(EasyOgrError::Closed)));

    let mut generator = open_generator("points.geojson");
    generator.close();
    generator.close();
    assert!(matches!(generator.buffer(1.0), Err(EasyOgrError::Closed)));

    let mut layer = open_layer("points.geojson");
    layer.close();
    layer.close();
    assert!(matches!(
        layer.attribute_filter("score > 1", SelectionMode::New),
        Err(EasyOgrError::Closed)
    ));
}

#[test]
fn property_unchecked_overlay_is_the_raw_result() {
    let left = Record::new(
        GeometryInput::wkt("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"),
        vec![FieldValue::from("left")],
    )
    .unwrap();
    let right = Record::new(
        GeometryInput::wkt("POLYGON ((10 0, 20 0, 20 10, 10 10, 10 0))"),
        vec![FieldValue::from("right")],
    )
    .unwrap();

    // Squares sharing an edge intersect in a line, which the type check rejects.
    let checked = left
        .overlay(Overlay::Intersection, &right, ResultPolicy::default())
        .unwrap();
    assert!(checked.is_none());

    let raw = left
        .overlay(Overlay::Intersection, &right, ResultPolicy::empty())
        .unwrap()
        .unwrap();
    let native = left.geometry().intersection(right.geometry()).unwrap();
    assert_eq!(raw.geometry(), &native);
    assert_ne!(flatten(raw.geometry_type()), OGRwkbGeometryType::wkbPolygon);
    assert_eq!(raw.attributes(), left.attributes());
}
