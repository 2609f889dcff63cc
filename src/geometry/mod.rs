//! Owned OGR geometries and the helpers the record and layer sessions build on.

use std::ffi::c_int;
use std::fmt::{self, Debug, Formatter};
use std::ptr::null_mut;

use gdal_sys::{OGREnvelope, OGRGeometryH, OGRwkbGeometryType};

use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_null_pointer_err, _string};

mod adapter;
mod formats;
mod gdal_to_geo;
mod geo_to_gdal;
mod ops;

pub use adapter::{cascaded_union, GeometryInput};
pub use formats::GeometryFormat;
pub use geo_to_gdal::ToOgr;
pub use ops::SpatialPredicate;

/// An OGR geometry owned by Rust. Destroyed on drop.
pub struct Geometry {
    c_geometry: OGRGeometryH,
}

impl Geometry {
    /// Takes ownership of `c_geometry`.
    ///
    /// # Safety
    /// `c_geometry` must be a valid geometry that nothing else destroys.
    pub unsafe fn with_c_geometry(c_geometry: OGRGeometryH) -> Geometry {
        Geometry { c_geometry }
    }

    /// Like [`Geometry::with_c_geometry`], mapping a null result of `method_name` to an error.
    ///
    /// # Safety
    /// See [`Geometry::with_c_geometry`].
    pub(crate) unsafe fn from_result(
        c_geometry: OGRGeometryH,
        method_name: &'static str,
    ) -> Result<Geometry> {
        if c_geometry.is_null() {
            return Err(_last_null_pointer_err(method_name));
        }
        Ok(Geometry { c_geometry })
    }

    /// Copies a geometry owned by someone else, such as a feature.
    ///
    /// # Safety
    /// `c_geometry` must be a valid geometry or null.
    pub unsafe fn clone_from_c(c_geometry: OGRGeometryH) -> Result<Geometry> {
        if c_geometry.is_null() {
            return Geometry::empty(OGRwkbGeometryType::wkbGeometryCollection);
        }
        Geometry::from_result(gdal_sys::OGR_G_Clone(c_geometry), "OGR_G_Clone")
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_geometry(&self) -> OGRGeometryH {
        self.c_geometry
    }

    /// Releases ownership of the C pointer.
    pub(crate) fn into_c_geometry(self) -> OGRGeometryH {
        let this = std::mem::ManuallyDrop::new(self);
        this.c_geometry
    }

    pub fn empty(geometry_type: OGRwkbGeometryType::Type) -> Result<Geometry> {
        let c_geometry = unsafe { gdal_sys::OGR_G_CreateGeometry(geometry_type) };
        unsafe { Geometry::from_result(c_geometry, "OGR_G_CreateGeometry") }
    }

    /// A rectangle polygon; see [`Extent::to_polygon`].
    pub fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Geometry> {
        Extent::new(min_x, min_y, max_x, max_y).to_polygon()
    }

    pub fn geometry_type(&self) -> OGRwkbGeometryType::Type {
        unsafe { gdal_sys::OGR_G_GetGeometryType(self.c_geometry) }
    }

    /// The geometry type without Z/M flags.
    pub fn flat_type(&self) -> OGRwkbGeometryType::Type {
        flatten(self.geometry_type())
    }

    /// WKT name of the geometry type, e.g. `LINESTRING`.
    pub fn geometry_name(&self) -> String {
        _string(unsafe { gdal_sys::OGR_G_GetGeometryName(self.c_geometry) })
    }

    pub fn is_empty(&self) -> bool {
        unsafe { gdal_sys::OGR_G_IsEmpty(self.c_geometry) != 0 }
    }

    pub fn is_valid(&self) -> bool {
        unsafe { gdal_sys::OGR_G_IsValid(self.c_geometry) != 0 }
    }

    pub fn geometry_count(&self) -> usize {
        let rv = unsafe { gdal_sys::OGR_G_GetGeometryCount(self.c_geometry) };
        rv.max(0) as usize
    }

    /// Copy of the `n`th member of a collection, or ring of a polygon.
    pub fn sub_geometry(&self, n: usize) -> Result<Geometry> {
        let c_geometry = unsafe { gdal_sys::OGR_G_GetGeometryRef(self.c_geometry, n as c_int) };
        if c_geometry.is_null() {
            return Err(_last_null_pointer_err("OGR_G_GetGeometryRef"));
        }
        unsafe { Geometry::clone_from_c(c_geometry) }
    }

    /// Appends a copy of `sub` to this collection or polygon.
    pub fn add_geometry(&mut self, sub: &Geometry) -> Result<()> {
        let rv = unsafe { gdal_sys::OGR_G_AddGeometry(self.c_geometry, sub.c_geometry) };
        ogr_result(rv, "OGR_G_AddGeometry")
    }

    pub(crate) fn add_geometry_directly(&mut self, sub: Geometry) -> Result<()> {
        let rv = unsafe {
            gdal_sys::OGR_G_AddGeometryDirectly(self.c_geometry, sub.into_c_geometry())
        };
        ogr_result(rv, "OGR_G_AddGeometryDirectly")
    }

    pub fn point_count(&self) -> usize {
        let rv = unsafe { gdal_sys::OGR_G_GetPointCount(self.c_geometry) };
        rv.max(0) as usize
    }

    /// Returns a `(x, y, z)` tuple.
    pub fn get_point(&self, index: usize) -> (f64, f64, f64) {
        let mut x: f64 = 0.;
        let mut y: f64 = 0.;
        let mut z: f64 = 0.;
        unsafe {
            gdal_sys::OGR_G_GetPoint(self.c_geometry, index as c_int, &mut x, &mut y, &mut z)
        };
        (x, y, z)
    }

    pub fn get_point_vec(&self) -> Vec<(f64, f64, f64)> {
        (0..self.point_count()).map(|i| self.get_point(i)).collect()
    }

    pub fn set_point_2d(&mut self, index: usize, (x, y): (f64, f64)) {
        unsafe { gdal_sys::OGR_G_SetPoint_2D(self.c_geometry, index as c_int, x, y) };
    }

    pub fn envelope(&self) -> Extent {
        let mut envelope = OGREnvelope {
            MinX: 0.0,
            MaxX: 0.0,
            MinY: 0.0,
            MaxY: 0.0,
        };
        unsafe { gdal_sys::OGR_G_GetEnvelope(self.c_geometry, &mut envelope) };
        Extent::from(envelope)
    }

    /// The spatial reference attached to this geometry, if any.
    pub fn spatial_ref(&self) -> Option<SpatialRef> {
        let c_srs = unsafe { gdal_sys::OGR_G_GetSpatialReference(self.c_geometry) };
        if c_srs.is_null() {
            return None;
        }
        unsafe { SpatialRef::from_c_obj(c_srs) }.ok()
    }

    /// Attaches `spatial_ref` without touching coordinates.
    pub fn set_spatial_ref(&mut self, spatial_ref: Option<&SpatialRef>) {
        let c_srs = match spatial_ref {
            Some(srs) => unsafe { srs.c_spatial_ref() },
            None => null_mut(),
        };
        unsafe { gdal_sys::OGR_G_AssignSpatialReference(self.c_geometry, c_srs) };
    }
}

impl Drop for Geometry {
    fn drop(&mut self) {
        if !self.c_geometry.is_null() {
            unsafe { gdal_sys::OGR_G_DestroyGeometry(self.c_geometry) };
        }
    }
}

impl Clone for Geometry {
    fn clone(&self) -> Geometry {
        // OGR_G_Clone only returns null when out of memory.
        let c_geometry = unsafe { gdal_sys::OGR_G_Clone(self.c_geometry) };
        Geometry { c_geometry }
    }
}

impl Debug for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_wkt() {
            Ok(wkt) => f.write_str(wkt.as_str()),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl PartialEq for Geometry {
    /// Geometric equality as decided by OGR, not structural equality.
    fn eq(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Equals(self.c_geometry, other.c_geometry) != 0 }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Extent {
        Extent {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Closed polygon ring through the four corners, counter-clockwise from `(min_x, min_y)`.
    pub fn to_polygon(&self) -> Result<Geometry> {
        let mut ring = Geometry::empty(OGRwkbGeometryType::wkbLinearRing)?;
        let corners = [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
            (self.min_x, self.min_y),
        ];
        for (i, corner) in corners.into_iter().enumerate() {
            ring.set_point_2d(i, corner);
        }
        let mut polygon = Geometry::empty(OGRwkbGeometryType::wkbPolygon)?;
        polygon.add_geometry_directly(ring)?;
        Ok(polygon)
    }
}

impl From<OGREnvelope> for Extent {
    fn from(envelope: OGREnvelope) -> Extent {
        Extent {
            min_x: envelope.MinX,
            min_y: envelope.MinY,
            max_x: envelope.MaxX,
            max_y: envelope.MaxY,
        }
    }
}

impl From<(f64, f64, f64, f64)> for Extent {
    fn from((min_x, min_y, max_x, max_y): (f64, f64, f64, f64)) -> Extent {
        Extent::new(min_x, min_y, max_x, max_y)
    }
}

pub fn flatten(geometry_type: OGRwkbGeometryType::Type) -> OGRwkbGeometryType::Type {
    unsafe { gdal_sys::OGR_GT_Flatten(geometry_type) }
}

/// Polygons, multipolygons and linear rings.
pub fn is_areal(geometry_type: OGRwkbGeometryType::Type) -> bool {
    matches!(
        flatten(geometry_type),
        OGRwkbGeometryType::wkbPolygon
            | OGRwkbGeometryType::wkbMultiPolygon
            | OGRwkbGeometryType::wkbLinearRing
    )
}

pub fn is_multi(geometry_type: OGRwkbGeometryType::Type) -> bool {
    matches!(
        flatten(geometry_type),
        OGRwkbGeometryType::wkbMultiPoint
            | OGRwkbGeometryType::wkbMultiLineString
            | OGRwkbGeometryType::wkbMultiPolygon
            | OGRwkbGeometryType::wkbGeometryCollection
    )
}

/// The single/multi counterpart of a simple geometry type.
pub fn paired_type(geometry_type: OGRwkbGeometryType::Type) -> Option<OGRwkbGeometryType::Type> {
    match flatten(geometry_type) {
        OGRwkbGeometryType::wkbPoint => Some(OGRwkbGeometryType::wkbMultiPoint),
        OGRwkbGeometryType::wkbMultiPoint => Some(OGRwkbGeometryType::wkbPoint),
        OGRwkbGeometryType::wkbLineString => Some(OGRwkbGeometryType::wkbMultiLineString),
        OGRwkbGeometryType::wkbMultiLineString => Some(OGRwkbGeometryType::wkbLineString),
        OGRwkbGeometryType::wkbPolygon => Some(OGRwkbGeometryType::wkbMultiPolygon),
        OGRwkbGeometryType::wkbMultiPolygon => Some(OGRwkbGeometryType::wkbPolygon),
        _ => None,
    }
}

/// WKT-style upper case name of a geometry type, e.g. `MULTIPOLYGON`.
pub fn type_name(geometry_type: OGRwkbGeometryType::Type) -> String {
    let name = match flatten(geometry_type) {
        OGRwkbGeometryType::wkbUnknown => "GEOMETRY",
        OGRwkbGeometryType::wkbPoint => "POINT",
        OGRwkbGeometryType::wkbLineString => "LINESTRING",
        OGRwkbGeometryType::wkbPolygon => "POLYGON",
        OGRwkbGeometryType::wkbMultiPoint => "MULTIPOINT",
        OGRwkbGeometryType::wkbMultiLineString => "MULTILINESTRING",
        OGRwkbGeometryType::wkbMultiPolygon => "MULTIPOLYGON",
        OGRwkbGeometryType::wkbGeometryCollection => "GEOMETRYCOLLECTION",
        OGRwkbGeometryType::wkbLinearRing => "LINEARRING",
        OGRwkbGeometryType::wkbNone => "NONE",
        other => {
            let rv = unsafe { gdal_sys::OGRGeometryTypeToName(other) };
            return _string(rv).to_uppercase().replace(' ', "");
        }
    };
    name.to_string()
}

#[cfg(test)]
mod tests;
