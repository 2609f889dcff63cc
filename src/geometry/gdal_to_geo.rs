use std::convert::TryFrom;

use gdal_sys::OGRwkbGeometryType;

use super::Geometry;
use crate::errors::{EasyOgrError, Result};

fn unexpected(expected: &str, found: &Geometry) -> EasyOgrError {
    EasyOgrError::Geometry(format!(
        "expected a {expected}, found {}",
        found.geometry_name()
    ))
}

fn coords(geo: &Geometry) -> Vec<geo_types::Coord<f64>> {
    geo.get_point_vec()
        .into_iter()
        .map(|(x, y, _)| geo_types::Coord { x, y })
        .collect()
}

fn members<T>(
    geo: &Geometry,
    pick: impl Fn(geo_types::Geometry<f64>) -> Option<T>,
    expected: &str,
) -> Result<Vec<T>> {
    (0..geo.geometry_count())
        .map(|n| {
            let sub = geo.sub_geometry(n)?;
            let converted = geo_types::Geometry::try_from(&sub)?;
            pick(converted).ok_or_else(|| unexpected(expected, &sub))
        })
        .collect()
}

impl TryFrom<&Geometry> for geo_types::Geometry<f64> {
    type Error = EasyOgrError;

    fn try_from(geo: &Geometry) -> Result<geo_types::Geometry<f64>> {
        match geo.flat_type() {
            OGRwkbGeometryType::wkbPoint => {
                let (x, y, _) = geo.get_point(0);
                Ok(geo_types::Geometry::Point(geo_types::Point::new(x, y)))
            }
            OGRwkbGeometryType::wkbMultiPoint => {
                let points = members(
                    geo,
                    |g| match g {
                        geo_types::Geometry::Point(p) => Some(p),
                        _ => None,
                    },
                    "point",
                )?;
                Ok(geo_types::Geometry::MultiPoint(geo_types::MultiPoint(
                    points,
                )))
            }
            OGRwkbGeometryType::wkbLineString | OGRwkbGeometryType::wkbLinearRing => Ok(
                geo_types::Geometry::LineString(geo_types::LineString(coords(geo))),
            ),
            OGRwkbGeometryType::wkbMultiLineString => {
                let strings = members(
                    geo,
                    |g| match g {
                        geo_types::Geometry::LineString(s) => Some(s),
                        _ => None,
                    },
                    "line string",
                )?;
                Ok(geo_types::Geometry::MultiLineString(
                    geo_types::MultiLineString(strings),
                ))
            }
            OGRwkbGeometryType::wkbPolygon => {
                let mut rings = (0..geo.geometry_count())
                    .map(|n| geo.sub_geometry(n).map(|ring| geo_types::LineString(coords(&ring))));
                let exterior = match rings.next() {
                    Some(ring) => ring?,
                    None => geo_types::LineString(Vec::new()),
                };
                let interiors = rings.collect::<Result<Vec<_>>>()?;
                Ok(geo_types::Geometry::Polygon(geo_types::Polygon::new(
                    exterior, interiors,
                )))
            }
            OGRwkbGeometryType::wkbMultiPolygon => {
                let polygons = members(
                    geo,
                    |g| match g {
                        geo_types::Geometry::Polygon(p) => Some(p),
                        _ => None,
                    },
                    "polygon",
                )?;
                Ok(geo_types::Geometry::MultiPolygon(geo_types::MultiPolygon(
                    polygons,
                )))
            }
            OGRwkbGeometryType::wkbGeometryCollection => {
                let items = members(geo, Some, "geometry")?;
                Ok(geo_types::Geometry::GeometryCollection(
                    geo_types::GeometryCollection(items),
                ))
            }
            _ => Err(EasyOgrError::Geometry(format!(
                "{} geometries have no geo-types counterpart",
                geo.geometry_name()
            ))),
        }
    }
}

impl TryFrom<Geometry> for geo_types::Geometry<f64> {
    type Error = EasyOgrError;

    fn try_from(geo: Geometry) -> Result<geo_types::Geometry<f64>> {
        geo_types::Geometry::try_from(&geo)
    }
}
