use gdal_sys::OGRwkbGeometryType;
use rstest::rstest;

use super::*;
use crate::errors::EasyOgrError;
use crate::test_utils::SuppressGDALErrorLog;

const SQUARE: &str = "POLYGON ((0 0,10 0,10 10,0 10,0 0))";
const SMALL_SQUARE: &str = "POLYGON ((0 0,5 0,5 5,0 5,0 0))";
const BOWTIE: &str = "POLYGON ((0 0,10 10,10 0,0 10,0 0))";

fn wkt(text: &str) -> Geometry {
    Geometry::from_wkt(text).unwrap()
}

#[test]
fn test_type_names() {
    let square = wkt(SQUARE);
    assert_eq!(square.geometry_name(), "POLYGON");
    assert_eq!(type_name(square.geometry_type()), "POLYGON");
    assert_eq!(type_name(OGRwkbGeometryType::wkbMultiLineString), "MULTILINESTRING");
    assert_eq!(type_name(OGRwkbGeometryType::wkbPoint25D), "POINT");
    assert!(is_areal(square.geometry_type()));
    assert!(!is_multi(square.geometry_type()));
    assert_eq!(
        paired_type(OGRwkbGeometryType::wkbLineString),
        Some(OGRwkbGeometryType::wkbMultiLineString)
    );
    assert_eq!(paired_type(OGRwkbGeometryType::wkbGeometryCollection), None);
}

#[rstest]
#[case::wkt(GeometryFormat::Wkt)]
#[case::wkb(GeometryFormat::Wkb)]
#[case::geojson(GeometryFormat::GeoJson)]
#[case::gml(GeometryFormat::Gml)]
fn test_export_parse(#[case] format: GeometryFormat) {
    let square = wkt(SQUARE);
    let exported = square.export(format).unwrap();
    let parsed = Geometry::parse(format, &exported).unwrap();
    assert_eq!(parsed, square);
}

#[test]
fn test_kml_is_export_only() {
    let square = wkt(SQUARE);
    let kml = square.to_kml().unwrap();
    assert!(kml.starts_with("<Polygon>"));
    let err = Geometry::parse(GeometryFormat::Kml, kml.as_bytes()).unwrap_err();
    assert!(matches!(err, EasyOgrError::Geometry(_)));
}

#[rstest]
#[case("wkt", GeometryFormat::Wkt)]
#[case("WKB", GeometryFormat::Wkb)]
#[case("json", GeometryFormat::GeoJson)]
#[case("geojson", GeometryFormat::GeoJson)]
#[case("gml", GeometryFormat::Gml)]
#[case("kml", GeometryFormat::Kml)]
fn test_format_names(#[case] name: &str, #[case] expected: GeometryFormat) {
    assert_eq!(name.parse::<GeometryFormat>().unwrap(), expected);
}

#[test]
fn test_unparsable_input() {
    let _nolog = SuppressGDALErrorLog::new();
    assert!(Geometry::from_wkt("POLYGON ((0 0, 1").is_err());
    assert!(Geometry::from_geojson("{\"type\": \"Nope\"}").is_err());
    assert!("svg".parse::<GeometryFormat>().is_err());
}

#[test]
fn test_extent_polygon() {
    let polygon = Geometry::bbox(0.0, 0.0, 10.0, 10.0).unwrap();
    assert_eq!(polygon, wkt(SQUARE));
    let extent = polygon.envelope();
    assert_eq!(extent, Extent::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(extent.width(), 10.0);
    assert_eq!(Extent::from((1.0, 2.0, 3.0, 4.0)).height(), 2.0);
}

#[test]
#[allow(clippy::float_cmp)]
fn test_overlays() {
    let square = wkt(SQUARE);
    let small = wkt(SMALL_SQUARE);
    assert_eq!(square.intersection(&small).unwrap().area(), 25.0);
    assert_eq!(square.union(&small).unwrap().area(), 100.0);
    assert_eq!(square.difference(&small).unwrap().area(), 75.0);
    assert_eq!(small.sym_difference(&square).unwrap().area(), 75.0);
}

#[test]
fn test_predicates() {
    let square = wkt(SQUARE);
    let small = wkt(SMALL_SQUARE);
    let far = wkt("POINT (50 50)");
    assert!(square.contains(&small));
    assert!(small.within(&square));
    assert!(square.intersects(&small));
    assert!(square.disjoint(&far));
    assert!(!square.overlaps(&small));
    assert!(square.equals(&square.clone()));

    let line = wkt("LINESTRING (-5 5,15 5)");
    assert!(line.crosses(&square));
    let edge = wkt("POINT (10 5)");
    assert!(edge.touches(&square));
}

#[test]
fn test_within_non_areal_operand_is_false() {
    let point = wkt("POINT (1 1)");
    let line = wkt("LINESTRING (0 0,2 2)");
    assert!(line.contains(&point));
    assert!(!point.within(&line));
    assert!(!SpatialPredicate::Within.evaluate(&point, &line));
    assert!(SpatialPredicate::Within.evaluate(&point, &wkt(SQUARE)));
}

#[rstest]
#[case("INTERSECTS", SpatialPredicate::Intersects)]
#[case("within", SpatialPredicate::Within)]
#[case(" Touches ", SpatialPredicate::Touches)]
fn test_predicate_names(#[case] name: &str, #[case] expected: SpatialPredicate) {
    assert_eq!(name.parse::<SpatialPredicate>().unwrap(), expected);
}

#[test]
fn test_measures() {
    let square = wkt(SQUARE);
    let centroid = square.centroid().unwrap();
    assert_eq!(centroid.get_point(0), (5.0, 5.0, 0.0));
    assert_eq!(wkt("LINESTRING (0 0,2 2)").area(), 0.0);
    assert_eq!(square.distance(&wkt("POINT (13 14)")), 5.0);
    assert!(square.buffer(1.0).unwrap().area() > 100.0);
}

#[test]
fn test_repair_and_resolve() {
    let bowtie = wkt(BOWTIE);
    assert!(!bowtie.is_valid());
    let resolved = GeometryInput::wkt(BOWTIE).resolve().unwrap();
    assert!(resolved.is_valid());

    let native = GeometryInput::from(&bowtie).resolve().unwrap();
    assert!(native.is_valid());
}

#[test]
#[allow(clippy::float_cmp)]
fn test_collection_input_unions() {
    let input = GeometryInput::from(vec![wkt(SQUARE), wkt("POLYGON ((5 0,15 0,15 10,5 10,5 0))")]);
    let merged = input.resolve().unwrap();
    assert_eq!(merged.area(), 150.0);

    let mixed = GeometryInput::from(vec![wkt("POINT (1 1)"), wkt("POINT (2 2)")]);
    assert_eq!(mixed.resolve().unwrap().geometry_name(), "MULTIPOINT");

    let empty: Vec<Geometry> = Vec::new();
    let err = GeometryInput::from(empty).resolve().unwrap_err();
    assert!(matches!(err, EasyOgrError::Geometry(_)));
}

#[test]
fn test_collection_reports_bad_member() {
    let _nolog = SuppressGDALErrorLog::new();
    let input = GeometryInput::Collection(vec![
        GeometryInput::wkt(SQUARE),
        GeometryInput::wkt("NOT A GEOMETRY"),
    ]);
    assert!(input.resolve().is_err());
}

#[test]
fn test_sub_geometries() {
    let mut multi = Geometry::empty(OGRwkbGeometryType::wkbMultiPoint).unwrap();
    multi.add_geometry(&wkt("POINT (1 2)")).unwrap();
    multi.add_geometry(&wkt("POINT (3 4)")).unwrap();
    assert_eq!(multi.geometry_count(), 2);
    assert_eq!(multi.sub_geometry(1).unwrap().get_point(0), (3.0, 4.0, 0.0));
    assert!(multi.sub_geometry(5).is_err());

    let line = wkt("LINESTRING (0 0,1 1,2 0)");
    assert_eq!(line.point_count(), 3);
    assert_eq!(line.get_point_vec()[2], (2.0, 0.0, 0.0));
}

#[test]
fn test_null_geometry_becomes_empty_collection() {
    let geometry = unsafe { Geometry::clone_from_c(std::ptr::null_mut()) }.unwrap();
    assert!(geometry.is_empty());
    assert_eq!(geometry.geometry_name(), "GEOMETRYCOLLECTION");
}

#[test]
fn test_geo_types_conversion() {
    let square = wkt(SQUARE);
    let geo: geo_types::Geometry<f64> = (&square).try_into().unwrap();
    match &geo {
        geo_types::Geometry::Polygon(polygon) => assert_eq!(polygon.exterior().0.len(), 5),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(geo.to_ogr().unwrap(), square);

    let point = geo_types::Point::new(1.0, 2.0);
    assert_eq!(point.to_ogr().unwrap().to_wkt().unwrap(), "POINT (1 2)");
}
