use gdal_sys::OGRwkbGeometryType;

use super::Geometry;
use crate::errors::Result;

/// Conversion of `geo-types` values into OGR geometries.
pub trait ToOgr {
    fn to_ogr(&self) -> Result<Geometry>;
}

fn geometry_with_points(
    wkb_type: OGRwkbGeometryType::Type,
    points: &geo_types::LineString<f64>,
) -> Result<Geometry> {
    let mut geom = Geometry::empty(wkb_type)?;
    for (i, coordinate) in points.0.iter().enumerate() {
        geom.set_point_2d(i, (coordinate.x, coordinate.y));
    }
    Ok(geom)
}

fn collection<'a, T: ToOgr + 'a>(
    wkb_type: OGRwkbGeometryType::Type,
    items: impl IntoIterator<Item = &'a T>,
) -> Result<Geometry> {
    let mut geom = Geometry::empty(wkb_type)?;
    for item in items {
        geom.add_geometry_directly(item.to_ogr()?)?;
    }
    Ok(geom)
}

impl ToOgr for geo_types::Point<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        let mut geom = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
        geom.set_point_2d(0, (self.x(), self.y()));
        Ok(geom)
    }
}

impl ToOgr for geo_types::MultiPoint<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        collection(OGRwkbGeometryType::wkbMultiPoint, &self.0)
    }
}

impl ToOgr for geo_types::LineString<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        geometry_with_points(OGRwkbGeometryType::wkbLineString, self)
    }
}

impl ToOgr for geo_types::MultiLineString<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        collection(OGRwkbGeometryType::wkbMultiLineString, &self.0)
    }
}

impl ToOgr for geo_types::Polygon<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        let mut geom = Geometry::empty(OGRwkbGeometryType::wkbPolygon)?;
        geom.add_geometry_directly(geometry_with_points(
            OGRwkbGeometryType::wkbLinearRing,
            self.exterior(),
        )?)?;
        for ring in self.interiors() {
            geom.add_geometry_directly(geometry_with_points(
                OGRwkbGeometryType::wkbLinearRing,
                ring,
            )?)?;
        }
        Ok(geom)
    }
}

impl ToOgr for geo_types::MultiPolygon<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        collection(OGRwkbGeometryType::wkbMultiPolygon, &self.0)
    }
}

impl ToOgr for geo_types::GeometryCollection<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        collection(OGRwkbGeometryType::wkbGeometryCollection, &self.0)
    }
}

impl ToOgr for geo_types::Rect<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        self.to_polygon().to_ogr()
    }
}

impl ToOgr for geo_types::Geometry<f64> {
    fn to_ogr(&self) -> Result<Geometry> {
        match self {
            geo_types::Geometry::Point(c) => c.to_ogr(),
            geo_types::Geometry::MultiPoint(c) => c.to_ogr(),
            geo_types::Geometry::LineString(c) => c.to_ogr(),
            geo_types::Geometry::MultiLineString(c) => c.to_ogr(),
            geo_types::Geometry::Polygon(c) => c.to_ogr(),
            geo_types::Geometry::MultiPolygon(c) => c.to_ogr(),
            geo_types::Geometry::GeometryCollection(c) => c.to_ogr(),
            geo_types::Geometry::Rect(c) => c.to_ogr(),
            geo_types::Geometry::Line(c) => {
                geo_types::LineString(vec![c.start, c.end]).to_ogr()
            }
            geo_types::Geometry::Triangle(c) => c.to_polygon().to_ogr(),
        }
    }
}
