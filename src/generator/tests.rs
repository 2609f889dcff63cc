use gdal_sys::OGRwkbGeometryType;

use super::*;
use crate::geometry::{is_areal, Geometry};
use crate::schema::FieldType;
use crate::test_utils::{fixture, SuppressGDALErrorLog, TempFixture};

fn points() -> FeatureGenerator {
    FeatureGenerator::open(
        fixture("points.geojson"),
        &OpenOptions::new(),
        &ViewOptions::default(),
    )
    .unwrap()
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| record[0].to_string())
        .collect()
}

#[test]
fn test_unchained_generator_yields_every_record() {
    let generator = points();
    assert_eq!(generator.fields(), vec!["name", "score"]);
    assert_eq!(generator.geometry_type(), OGRwkbGeometryType::wkbPoint);
    assert_eq!(generator.stages(), 0);

    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(names(&records), vec!["a", "b", "c"]);
}

#[test]
fn test_attribute_filter() {
    let mut generator = points();
    generator.attribute_filter("score >= 5").unwrap();
    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(names(&records), vec!["b", "c"]);
    assert_eq!(records[1][1], FieldValue::Integer(9));
}

#[test]
fn test_exhaustion_closes_the_generator() {
    let mut generator = points();
    assert_eq!(generator.by_ref().count(), 3);
    assert!(generator.is_closed());
    assert!(generator.next().is_none());
    assert!(matches!(
        generator.attribute_filter("score > 1"),
        Err(EasyOgrError::Closed)
    ));
    generator.close();
    assert!(generator.is_closed());
}

#[test]
fn test_add_then_drop_restores_schema() {
    let mut generator = points();
    let original = generator.schema().clone();
    generator
        .add_field(FieldDefinition::new("flag", FieldType::Integer), 1)
        .unwrap()
        .drop_fields(&["flag"])
        .unwrap();
    assert_eq!(generator.schema(), &original);
    for record in generator {
        assert_eq!(record.unwrap().len(), 2);
    }
}

#[test]
fn test_field_added_after_filter_is_not_visible_to_it() {
    let mut generator = points();
    generator.attribute_filter("score < 9").unwrap();
    generator
        .add_field(FieldDefinition::new("label", FieldType::String), "low")
        .unwrap();
    assert!(matches!(
        points().attribute_filter("label = 'low'"),
        Err(EasyOgrError::Query(_))
    ));

    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|record| record[2] == FieldValue::from("low")));
}

#[test]
fn test_calculate_field() {
    let mut generator = points();
    generator
        .add_field(FieldDefinition::new("grade", FieldType::String), FieldValue::Null)
        .unwrap()
        .calculate_field("grade", FieldValue::from("pass"), Some("score >= 5"))
        .unwrap()
        .calculate_field_expression("score", "score * 10 + 1", None)
        .unwrap();
    let records = generator.collect::<Result<Vec<_>>>().unwrap();

    let grades: Vec<_> = records.iter().map(|record| record[2].clone()).collect();
    assert_eq!(
        grades,
        vec![FieldValue::Null, FieldValue::from("pass"), FieldValue::from("pass")]
    );
    let scores: Vec<_> = records.iter().map(|record| record[1].clone()).collect();
    assert_eq!(
        scores,
        vec![FieldValue::from(11), FieldValue::from(51), FieldValue::from(91)]
    );
}

#[test]
fn test_unknown_fields_fail_when_chaining() {
    let mut generator = points();
    assert!(matches!(
        generator.attribute_filter("height > 2"),
        Err(EasyOgrError::Query(_))
    ));
    assert!(matches!(
        generator.drop_fields(&["name", "height"]),
        Err(EasyOgrError::Schema(_))
    ));
    assert!(matches!(
        generator.calculate_field("height", FieldValue::from(1), None),
        Err(EasyOgrError::Schema(_))
    ));
    assert!(matches!(
        generator.add_field(FieldDefinition::new("NAME", FieldType::String), "x"),
        Err(EasyOgrError::Schema(_))
    ));
    assert_eq!(generator.fields(), vec!["name", "score"]);
    assert_eq!(generator.stages(), 0);
}

#[test]
fn test_spatial_filters() {
    let area = Geometry::bbox(-1.0, -1.0, 10.0, 10.0).unwrap();

    let mut generator = points();
    generator.within(&area).unwrap();
    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(names(&records), vec!["a", "b"]);

    let mut generator = points();
    generator.disjoint(&area).unwrap();
    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(names(&records), vec!["c"]);

    let mut generator = points();
    generator.within(GeometryInput::wkt("LINESTRING (0 0, 20 20)")).unwrap();
    assert_eq!(generator.count(), 0);
}

#[test]
fn test_buffer_and_overlay() {
    let mut generator = points();
    generator
        .buffer(1.0)
        .unwrap()
        .intersection(GeometryInput::wkt("POLYGON ((-5 -5, 6 -5, 6 6, -5 6, -5 -5))"))
        .unwrap();
    assert_eq!(generator.geometry_type(), OGRwkbGeometryType::wkbUnknown);

    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(names(&records), vec!["a", "b"]);
    assert!(records
        .iter()
        .all(|record| is_areal(record.geometry_type())));
}

#[test]
fn test_project_and_transform_update_metadata() {
    let web_mercator = SpatialRef::from_epsg(3857).unwrap();

    let mut generator = points();
    generator.transform(&web_mercator).unwrap();
    assert_eq!(generator.spatial_ref().and_then(SpatialRef::epsg), Some(3857));
    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    let (x, _, _) = records[1].geometry().get_point(0);
    assert!(x > 500_000.0);
    assert_eq!(records[1].srid(), Some(3857));

    let mut generator = points();
    generator.project(&web_mercator).unwrap();
    assert_eq!(
        generator.spatial_reference(SrsFormat::Epsg).unwrap().as_deref(),
        Some("3857")
    );
    let records = generator.collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(records[1].geometry().get_point(0).0, 5.0);
}

#[test]
fn test_export() {
    let output = TempFixture::empty("selected.geojson");
    let mut generator = points();
    generator.attribute_filter("score >= 5").unwrap();
    let written = generator.export(output.path()).unwrap();
    assert_eq!(written, 2);
    assert!(generator.is_closed());
    assert!(matches!(
        generator.export(output.path()),
        Err(EasyOgrError::Closed)
    ));

    let dataset =
        Dataset::open_with_view(output.path(), &OpenOptions::new(), &ViewOptions::default())
            .unwrap();
    assert_eq!(dataset.fields(), vec!["name", "score"]);
    assert_eq!(dataset.feature_count(), 2);
    let records = dataset.iter().unwrap().collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(names(&records), vec!["b", "c"]);
}

#[test]
fn test_open_errors() {
    let _nolog = SuppressGDALErrorLog::new();
    let missing = FeatureGenerator::open(
        fixture("missing.geojson"),
        &OpenOptions::new(),
        &ViewOptions::default(),
    );
    assert!(matches!(missing, Err(EasyOgrError::DataSource(_))));
}
