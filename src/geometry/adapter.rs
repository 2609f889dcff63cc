use std::borrow::Cow;

use gdal_sys::OGRwkbGeometryType;
use log::warn;

use super::{flatten, is_areal, Geometry, GeometryFormat};
use crate::errors::*;
use crate::record::Record;

/// Anything that can stand in for a geometry operand.
///
/// [`GeometryInput::resolve`] turns every variant into one owned [`Geometry`].
#[derive(Debug)]
pub enum GeometryInput<'a> {
    Native(&'a Geometry),
    Owned(Geometry),
    Record(&'a Record),
    Serialized {
        format: GeometryFormat,
        data: Cow<'a, [u8]>,
    },
    Collection(Vec<GeometryInput<'a>>),
}

impl<'a> GeometryInput<'a> {
    pub fn wkt(wkt: &'a str) -> GeometryInput<'a> {
        GeometryInput::Serialized {
            format: GeometryFormat::Wkt,
            data: Cow::Borrowed(wkt.as_bytes()),
        }
    }

    pub fn wkb(wkb: &'a [u8]) -> GeometryInput<'a> {
        GeometryInput::Serialized {
            format: GeometryFormat::Wkb,
            data: Cow::Borrowed(wkb),
        }
    }

    pub fn geojson(json: &'a str) -> GeometryInput<'a> {
        GeometryInput::Serialized {
            format: GeometryFormat::GeoJson,
            data: Cow::Borrowed(json.as_bytes()),
        }
    }

    pub fn gml(gml: &'a str) -> GeometryInput<'a> {
        GeometryInput::Serialized {
            format: GeometryFormat::Gml,
            data: Cow::Borrowed(gml.as_bytes()),
        }
    }

    /// Produces one geometry.
    ///
    /// Records hand out a copy of their geometry untouched. Everything else is
    /// repaired with a zero-distance buffer when invalid, keeping the original if
    /// the repair does not produce a valid geometry either.
    pub fn resolve(&self) -> Result<Geometry> {
        let geometry = match self {
            GeometryInput::Record(record) => return Ok(record.geometry().clone()),
            GeometryInput::Native(geometry) => (*geometry).clone(),
            GeometryInput::Owned(geometry) => geometry.clone(),
            GeometryInput::Serialized { format, data } => Geometry::parse(*format, data)?,
            GeometryInput::Collection(inputs) => {
                let members = inputs
                    .iter()
                    .map(GeometryInput::resolve)
                    .collect::<Result<Vec<_>>>()?;
                cascaded_union(members)?
            }
        };
        Ok(ensure_valid(geometry))
    }
}

fn ensure_valid(geometry: Geometry) -> Geometry {
    if geometry.is_valid() {
        return geometry;
    }
    match geometry.repair() {
        Ok(repaired) if repaired.is_valid() => repaired,
        _ => {
            warn!(
                "{} geometry is still invalid after a zero-distance buffer",
                geometry.geometry_name()
            );
            geometry
        }
    }
}

/// Unions `geometries` into one geometry.
///
/// Areal inputs are gathered in a multipolygon and merged with OGR's cascaded
/// union; mixed or lower-dimension inputs are folded pairwise.
pub fn cascaded_union(geometries: Vec<Geometry>) -> Result<Geometry> {
    let mut iter = geometries.into_iter();
    let Some(first) = iter.next() else {
        return Err(EasyOgrError::Geometry(
            "cannot union an empty collection of geometries".to_string(),
        ));
    };
    let rest: Vec<Geometry> = iter.collect();
    if rest.is_empty() {
        return Ok(first);
    }

    let all_areal = is_areal(first.geometry_type())
        && rest.iter().all(|geometry| is_areal(geometry.geometry_type()));
    if all_areal {
        let mut multi = Geometry::empty(OGRwkbGeometryType::wkbMultiPolygon)?;
        for geometry in std::iter::once(first).chain(rest) {
            match flatten(geometry.geometry_type()) {
                OGRwkbGeometryType::wkbMultiPolygon => {
                    for n in 0..geometry.geometry_count() {
                        multi.add_geometry_directly(geometry.sub_geometry(n)?)?;
                    }
                }
                OGRwkbGeometryType::wkbLinearRing => {
                    let mut polygon = Geometry::empty(OGRwkbGeometryType::wkbPolygon)?;
                    polygon.add_geometry_directly(geometry)?;
                    multi.add_geometry_directly(polygon)?;
                }
                _ => multi.add_geometry_directly(geometry)?,
            }
        }
        return multi.union_cascaded();
    }

    rest.iter()
        .try_fold(first, |merged, geometry| merged.union(geometry))
}

impl From<Geometry> for GeometryInput<'_> {
    fn from(geometry: Geometry) -> Self {
        GeometryInput::Owned(geometry)
    }
}

impl<'a> From<&'a Geometry> for GeometryInput<'a> {
    fn from(geometry: &'a Geometry) -> Self {
        GeometryInput::Native(geometry)
    }
}

impl<'a> From<&'a Record> for GeometryInput<'a> {
    fn from(record: &'a Record) -> Self {
        GeometryInput::Record(record)
    }
}

impl<'a, T: Into<GeometryInput<'a>>> From<Vec<T>> for GeometryInput<'a> {
    fn from(inputs: Vec<T>) -> Self {
        GeometryInput::Collection(inputs.into_iter().map(Into::into).collect())
    }
}
