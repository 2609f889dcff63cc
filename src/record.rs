//! Records: one geometry plus an ordered attribute list.

use std::fmt;
use std::ops::{Index, IndexMut};

use bitflags::bitflags;
use gdal_sys::OGRwkbGeometryType;

use crate::errors::*;
use crate::geometry::{
    flatten, paired_type, Extent, Geometry, GeometryFormat, GeometryInput, SpatialPredicate,
};
use crate::spatial_ref::{CoordTransform, SpatialRef, SrsFormat};
use crate::value::FieldValue;

bitflags! {
    /// Checks applied to the output of an [`Overlay`] before it becomes a record.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ResultPolicy: u8 {
        /// Empty results are "no result".
        const CHECK_EMPTY = 0x01;
        /// Results whose type matches neither input, nor the single/multi
        /// counterpart of either input, are "no result".
        const CHECK_TYPE = 0x02;
    }
}

impl Default for ResultPolicy {
    fn default() -> ResultPolicy {
        ResultPolicy::all()
    }
}

impl ResultPolicy {
    /// Whether `result` of `receiver <op> operand` is kept.
    pub fn accepts(
        self,
        receiver: OGRwkbGeometryType::Type,
        operand: OGRwkbGeometryType::Type,
        result: &Geometry,
    ) -> bool {
        if self.contains(ResultPolicy::CHECK_EMPTY) && result.is_empty() {
            return false;
        }
        if !self.contains(ResultPolicy::CHECK_TYPE) {
            return true;
        }
        let (receiver, operand, result) = (flatten(receiver), flatten(operand), result.flat_type());
        if result == receiver || result == operand {
            return true;
        }
        match paired_type(receiver) {
            Some(paired) => result == paired || paired_type(operand) == Some(result),
            None => false,
        }
    }
}

/// Binary geometry operations whose output goes through a [`ResultPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overlay {
    Difference,
    Intersection,
    Union,
}

impl Overlay {
    pub fn apply(self, receiver: &Geometry, operand: &Geometry) -> Result<Geometry> {
        match self {
            Overlay::Difference => receiver.difference(operand),
            Overlay::Intersection => receiver.intersection(operand),
            Overlay::Union => receiver.union(operand),
        }
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overlay::Difference => f.write_str("difference"),
            Overlay::Intersection => f.write_str("intersection"),
            Overlay::Union => f.write_str("union"),
        }
    }
}

/// Runs `operation` on the receiver's geometry and `operand`, then applies `policy`.
///
/// A surviving result carries a copy of the receiver's attributes; the operand
/// contributes geometry only.
pub fn checked_overlay<F>(
    receiver: &Record,
    operand: &Geometry,
    policy: ResultPolicy,
    operation: F,
) -> Result<Option<Record>>
where
    F: FnOnce(&Geometry, &Geometry) -> Result<Geometry>,
{
    let result = operation(&receiver.geometry, operand)?;
    if !policy.accepts(
        receiver.geometry.geometry_type(),
        operand.geometry_type(),
        &result,
    ) {
        return Ok(None);
    }
    Ok(Some(Record::from_parts(result, receiver.attributes.clone())))
}

/// A geometry paired with attribute values. Attribute `i` belongs to field `i`
/// of whatever schema produced the record.
#[derive(Clone, Debug)]
pub struct Record {
    geometry: Geometry,
    attributes: Vec<FieldValue>,
}

impl Record {
    /// Adapts `geometry` (see [`GeometryInput::resolve`]) and pairs it with `attributes`.
    pub fn new<'g>(
        geometry: impl Into<GeometryInput<'g>>,
        attributes: Vec<FieldValue>,
    ) -> Result<Record> {
        let geometry = geometry.into().resolve()?;
        Ok(Record::from_parts(geometry, attributes))
    }

    /// Pairs an already adapted geometry with `attributes`.
    pub fn from_parts(geometry: Geometry, attributes: Vec<FieldValue>) -> Record {
        Record {
            geometry,
            attributes,
        }
    }

    pub fn into_parts(self) -> (Geometry, Vec<FieldValue>) {
        (self.geometry, self.attributes)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    pub fn attributes(&self) -> &[FieldValue] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Vec<FieldValue> {
        &mut self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.attributes.get(index)
    }

    pub fn set(&mut self, index: usize, value: impl Into<FieldValue>) -> Result<()> {
        let len = self.attributes.len();
        let slot = self.attributes.get_mut(index).ok_or_else(|| {
            EasyOgrError::Schema(format!(
                "attribute {index} is out of range for a record with {len} attributes"
            ))
        })?;
        *slot = value.into();
        Ok(())
    }

    /// Whether any attribute equals `value`.
    pub fn contains_value(&self, value: &FieldValue) -> bool {
        self.attributes.contains(value)
    }

    /// Removes the attributes at `indices`, which must be sorted.
    pub fn remove_attributes(&mut self, indices: &[usize]) {
        for index in indices.iter().rev() {
            if *index < self.attributes.len() {
                self.attributes.remove(*index);
            }
        }
    }

    pub fn copy(&self) -> Record {
        self.clone()
    }

    pub fn geometry_type(&self) -> OGRwkbGeometryType::Type {
        self.geometry.geometry_type()
    }

    /// WKT name of the geometry type, e.g. `POLYGON`.
    pub fn geometry_name(&self) -> String {
        self.geometry.geometry_name()
    }

    pub fn predicate<'g>(
        &self,
        predicate: SpatialPredicate,
        operand: impl Into<GeometryInput<'g>>,
    ) -> Result<bool> {
        let operand = operand.into().resolve()?;
        Ok(predicate.evaluate(&self.geometry, &operand))
    }

    pub fn contains<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Contains, operand)
    }

    pub fn crosses<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Crosses, operand)
    }

    pub fn disjoint<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Disjoint, operand)
    }

    pub fn equals<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Equals, operand)
    }

    pub fn intersects<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Intersects, operand)
    }

    pub fn overlaps<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Overlaps, operand)
    }

    pub fn touches<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Touches, operand)
    }

    /// Always false when the operand is not a polygon, multipolygon or ring.
    pub fn within<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<bool> {
        self.predicate(SpatialPredicate::Within, operand)
    }

    /// Applies `operation` against the adapted operand.
    ///
    /// `Ok(None)` means the result was rejected by `policy`.
    pub fn overlay<'g>(
        &self,
        operation: Overlay,
        operand: impl Into<GeometryInput<'g>>,
        policy: ResultPolicy,
    ) -> Result<Option<Record>> {
        let operand = operand.into().resolve()?;
        checked_overlay(self, &operand, policy, |a, b| operation.apply(a, b))
    }

    pub fn difference<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<Option<Record>> {
        self.overlay(Overlay::Difference, operand, ResultPolicy::default())
    }

    pub fn intersection<'g>(
        &self,
        operand: impl Into<GeometryInput<'g>>,
    ) -> Result<Option<Record>> {
        self.overlay(Overlay::Intersection, operand, ResultPolicy::default())
    }

    pub fn union<'g>(&self, operand: impl Into<GeometryInput<'g>>) -> Result<Option<Record>> {
        self.overlay(Overlay::Union, operand, ResultPolicy::default())
    }

    /// A new record with a buffered geometry and the same attributes.
    pub fn buffer(&self, distance: f64) -> Result<Record> {
        Ok(Record::from_parts(
            self.geometry.buffer(distance)?,
            self.attributes.clone(),
        ))
    }

    /// Distance to the operand, `None` when it falls outside `[min, max]`.
    pub fn distance<'g>(
        &self,
        operand: impl Into<GeometryInput<'g>>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Option<f64>> {
        let operand = operand.into().resolve()?;
        let distance = self.geometry.distance(&operand);
        if min.is_some_and(|min| distance < min) || max.is_some_and(|max| distance > max) {
            return Ok(None);
        }
        Ok(Some(distance))
    }

    pub fn export_geometry(&self, format: GeometryFormat) -> Result<Vec<u8>> {
        self.geometry.export(format)
    }

    pub fn bbox(&self) -> Extent {
        self.geometry.envelope()
    }

    /// Centroid as WKT.
    pub fn centroid(&self) -> Result<String> {
        self.geometry.centroid()?.to_wkt()
    }

    /// Area for polygons and multipolygons, zero for everything else.
    pub fn area(&self) -> f64 {
        self.geometry.area()
    }

    pub fn spatial_ref(&self) -> Option<SpatialRef> {
        self.geometry.spatial_ref()
    }

    /// The spatial reference serialized as `format`, `None` if the record has none.
    pub fn spatial_reference(&self, format: SrsFormat) -> Result<Option<String>> {
        self.spatial_ref()
            .map(|srs| srs.export(format))
            .transpose()
    }

    /// Linear unit name of the spatial reference.
    pub fn units(&self) -> Option<String> {
        self.spatial_ref().map(|srs| srs.linear_units().0)
    }

    /// Pretty WKT of the spatial reference.
    pub fn wkt(&self) -> Option<String> {
        self.spatial_ref().and_then(|srs| srs.to_pretty_wkt().ok())
    }

    pub fn proj4(&self) -> Option<String> {
        self.spatial_ref().and_then(|srs| srs.to_proj4().ok())
    }

    /// EPSG code of the spatial reference.
    pub fn srid(&self) -> Option<u32> {
        self.spatial_ref().and_then(|srs| srs.epsg())
    }

    /// Assigns `spatial_ref` without touching coordinates.
    pub fn project(&mut self, spatial_ref: &SpatialRef) {
        self.geometry.set_spatial_ref(Some(spatial_ref));
    }

    pub fn projected(&self, spatial_ref: &SpatialRef) -> Record {
        let mut record = self.clone();
        record.project(spatial_ref);
        record
    }

    /// Reprojects into `spatial_ref`. A record without a spatial reference is
    /// projected instead, since there is nothing to transform from.
    pub fn transform(&mut self, spatial_ref: &SpatialRef) -> Result<()> {
        match self.spatial_ref() {
            Some(source) => {
                let transform = CoordTransform::new(&source, spatial_ref)?;
                self.transform_with(&transform)
            }
            None => {
                self.project(spatial_ref);
                Ok(())
            }
        }
    }

    pub fn transformed(&self, spatial_ref: &SpatialRef) -> Result<Record> {
        let mut record = self.clone();
        record.transform(spatial_ref)?;
        Ok(record)
    }

    pub fn transform_with(&mut self, transform: &CoordTransform) -> Result<()> {
        self.geometry.transform_inplace(transform)
    }

    pub fn to_geo(&self) -> Result<geo_types::Geometry<f64>> {
        geo_types::Geometry::try_from(&self.geometry)
    }
}

impl Index<usize> for Record {
    type Output = FieldValue;

    fn index(&self, index: usize) -> &FieldValue {
        &self.attributes[index]
    }
}

impl IndexMut<usize> for Record {
    fn index_mut(&mut self, index: usize) -> &mut FieldValue {
        &mut self.attributes[index]
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}
