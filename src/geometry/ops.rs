use std::fmt;
use std::str::FromStr;

use gdal_sys::OGRwkbGeometryType;

use super::{is_areal, Geometry};
use crate::errors::*;
use crate::spatial_ref::{CoordTransform, SpatialRef};
use crate::utils::_last_error_msg;

/// Segments per quarter circle used by [`Geometry::buffer`].
pub const BUFFER_QUAD_SEGMENTS: i32 = 30;

/// The binary spatial predicates records and layers can be filtered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialPredicate {
    Contains,
    Crosses,
    Disjoint,
    Equals,
    Intersects,
    Overlaps,
    Touches,
    Within,
}

impl SpatialPredicate {
    pub const ALL: [SpatialPredicate; 8] = [
        SpatialPredicate::Contains,
        SpatialPredicate::Crosses,
        SpatialPredicate::Disjoint,
        SpatialPredicate::Equals,
        SpatialPredicate::Intersects,
        SpatialPredicate::Overlaps,
        SpatialPredicate::Touches,
        SpatialPredicate::Within,
    ];

    /// Evaluates `subject <predicate> operand`.
    ///
    /// `Within` is false for any operand that does not cover an area.
    pub fn evaluate(self, subject: &Geometry, operand: &Geometry) -> bool {
        let (a, b) = unsafe { (subject.c_geometry(), operand.c_geometry()) };
        let rv = unsafe {
            match self {
                SpatialPredicate::Contains => gdal_sys::OGR_G_Contains(a, b),
                SpatialPredicate::Crosses => gdal_sys::OGR_G_Crosses(a, b),
                SpatialPredicate::Disjoint => gdal_sys::OGR_G_Disjoint(a, b),
                SpatialPredicate::Equals => gdal_sys::OGR_G_Equals(a, b),
                SpatialPredicate::Intersects => gdal_sys::OGR_G_Intersects(a, b),
                SpatialPredicate::Overlaps => gdal_sys::OGR_G_Overlaps(a, b),
                SpatialPredicate::Touches => gdal_sys::OGR_G_Touches(a, b),
                SpatialPredicate::Within => {
                    if !is_areal(operand.geometry_type()) {
                        return false;
                    }
                    gdal_sys::OGR_G_Within(a, b)
                }
            }
        };
        rv != 0
    }
}

impl FromStr for SpatialPredicate {
    type Err = EasyOgrError;

    fn from_str(s: &str) -> Result<SpatialPredicate> {
        SpatialPredicate::ALL
            .into_iter()
            .find(|predicate| predicate.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EasyOgrError::Geometry(format!("unknown spatial predicate '{s}'")))
    }
}

impl fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpatialPredicate::Contains => "contains",
            SpatialPredicate::Crosses => "crosses",
            SpatialPredicate::Disjoint => "disjoint",
            SpatialPredicate::Equals => "equals",
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Overlaps => "overlaps",
            SpatialPredicate::Touches => "touches",
            SpatialPredicate::Within => "within",
        };
        f.write_str(name)
    }
}

impl Geometry {
    pub fn contains(&self, other: &Geometry) -> bool {
        SpatialPredicate::Contains.evaluate(self, other)
    }

    pub fn crosses(&self, other: &Geometry) -> bool {
        SpatialPredicate::Crosses.evaluate(self, other)
    }

    pub fn disjoint(&self, other: &Geometry) -> bool {
        SpatialPredicate::Disjoint.evaluate(self, other)
    }

    pub fn equals(&self, other: &Geometry) -> bool {
        SpatialPredicate::Equals.evaluate(self, other)
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        SpatialPredicate::Intersects.evaluate(self, other)
    }

    pub fn overlaps(&self, other: &Geometry) -> bool {
        SpatialPredicate::Overlaps.evaluate(self, other)
    }

    pub fn touches(&self, other: &Geometry) -> bool {
        SpatialPredicate::Touches.evaluate(self, other)
    }

    pub fn within(&self, other: &Geometry) -> bool {
        SpatialPredicate::Within.evaluate(self, other)
    }

    fn overlay_result(
        c_geometry: gdal_sys::OGRGeometryH,
        operation: &'static str,
    ) -> Result<Geometry> {
        if c_geometry.is_null() {
            return Err(EasyOgrError::Geometry(format!(
                "{operation} failed: {}",
                _last_error_msg()
            )));
        }
        Ok(unsafe { Geometry::with_c_geometry(c_geometry) })
    }

    pub fn intersection(&self, other: &Geometry) -> Result<Geometry> {
        let rv = unsafe { gdal_sys::OGR_G_Intersection(self.c_geometry(), other.c_geometry()) };
        Geometry::overlay_result(rv, "OGR_G_Intersection")
    }

    pub fn union(&self, other: &Geometry) -> Result<Geometry> {
        let rv = unsafe { gdal_sys::OGR_G_Union(self.c_geometry(), other.c_geometry()) };
        Geometry::overlay_result(rv, "OGR_G_Union")
    }

    pub fn difference(&self, other: &Geometry) -> Result<Geometry> {
        let rv = unsafe { gdal_sys::OGR_G_Difference(self.c_geometry(), other.c_geometry()) };
        Geometry::overlay_result(rv, "OGR_G_Difference")
    }

    pub fn sym_difference(&self, other: &Geometry) -> Result<Geometry> {
        let rv = unsafe { gdal_sys::OGR_G_SymDifference(self.c_geometry(), other.c_geometry()) };
        Geometry::overlay_result(rv, "OGR_G_SymDifference")
    }

    /// Union of the members of this collection.
    pub fn union_cascaded(&self) -> Result<Geometry> {
        let rv = unsafe { gdal_sys::OGR_G_UnionCascaded(self.c_geometry()) };
        Geometry::overlay_result(rv, "OGR_G_UnionCascaded")
    }

    pub fn buffer(&self, distance: f64) -> Result<Geometry> {
        let rv = unsafe {
            gdal_sys::OGR_G_Buffer(self.c_geometry(), distance, BUFFER_QUAD_SEGMENTS)
        };
        Geometry::overlay_result(rv, "OGR_G_Buffer")
    }

    pub fn distance(&self, other: &Geometry) -> f64 {
        unsafe { gdal_sys::OGR_G_Distance(self.c_geometry(), other.c_geometry()) }
    }

    /// Area of areal geometries, zero for everything else.
    pub fn area(&self) -> f64 {
        if !is_areal(self.geometry_type()) {
            return 0.0;
        }
        unsafe { gdal_sys::OGR_G_Area(self.c_geometry()) }
    }

    pub fn centroid(&self) -> Result<Geometry> {
        let point = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
        let rv = unsafe { gdal_sys::OGR_G_Centroid(self.c_geometry(), point.c_geometry()) };
        ogr_result(rv as gdal_sys::OGRErr::Type, "OGR_G_Centroid")?;
        Ok(point)
    }

    /// Reprojects the coordinates in place and attaches the target reference.
    pub fn transform_inplace(&mut self, transform: &CoordTransform) -> Result<()> {
        let rv = unsafe { gdal_sys::OGR_G_Transform(self.c_geometry(), transform.to_c_hct()) };
        ogr_result(rv, "OGR_G_Transform")
    }

    pub fn transform(&self, transform: &CoordTransform) -> Result<Geometry> {
        let mut rv = self.clone();
        rv.transform_inplace(transform)?;
        Ok(rv)
    }

    /// Reprojects into `spatial_ref`. Fails if the geometry has no reference of its own.
    pub fn transform_to(&self, spatial_ref: &SpatialRef) -> Result<Geometry> {
        let source = self.spatial_ref().ok_or_else(|| {
            EasyOgrError::SpatialRef("geometry has no spatial reference to transform from".into())
        })?;
        let transform = CoordTransform::new(&source, spatial_ref)?;
        self.transform(&transform)
    }

    /// Zero-distance buffer, the classic fix for self-intersecting polygons.
    pub fn repair(&self) -> Result<Geometry> {
        self.buffer(0.0)
    }
}
