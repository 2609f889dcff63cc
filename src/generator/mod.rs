//! Lazy record pipelines over one data source view.
//!
//! A [`FeatureGenerator`] opens a view like [`crate::Dataset`] does and then
//! collects stages. Nothing is read until the generator is iterated or exported,
//! and each record is pulled through every stage in the order the stages were
//! added:
//!
//! ```rust,no_run
//! use easy_ogr::{FeatureGenerator, FieldDefinition, FieldType, OpenOptions, ViewOptions};
//!
//! # fn main() -> easy_ogr::errors::Result<()> {
//! let mut generator =
//!     FeatureGenerator::open("points.geojson", &OpenOptions::new(), &ViewOptions::default())?;
//! generator
//!     .attribute_filter("score >= 5")?
//!     .add_field(FieldDefinition::new("label", FieldType::String), "high")?
//!     .buffer(2.0)?;
//! let written = generator.export("buffered.geojson")?;
//! println!("{written} records written");
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use gdal_sys::OGRwkbGeometryType;
use log::debug;

use crate::dataset::{write_layer, Dataset, OutputTarget, ViewOptions};
use crate::errors::{EasyOgrError, Result};
use crate::geometry::{GeometryInput, SpatialPredicate};
use crate::options::OpenOptions;
use crate::query::{Expression, Query};
use crate::record::{Overlay, Record, ResultPolicy};
use crate::schema::{FieldDefinition, Schema};
use crate::spatial_ref::{CoordTransform, SpatialRef, SrsFormat};
use crate::value::FieldValue;

mod pipeline;

pub use pipeline::Assignment;
use pipeline::{Pipeline, Stage};

/// A forward-only, single-pass stream of records with chained transformations.
///
/// The generator closes itself once the last record has been pulled. Schema,
/// geometry type and spatial reference describe the records the pipeline will
/// produce, so they change as soon as a stage that affects them is added.
#[derive(Debug)]
pub struct FeatureGenerator {
    dataset: Dataset,
    pipeline: Pipeline,
    schema: Schema,
    geometry_type: OGRwkbGeometryType::Type,
    spatial_ref: Option<SpatialRef>,
    rows: std::vec::IntoIter<u64>,
}

impl FeatureGenerator {
    pub fn open<P: AsRef<Path>>(
        path: P,
        open_options: &OpenOptions,
        view_options: &ViewOptions<'_>,
    ) -> Result<FeatureGenerator> {
        let dataset = Dataset::open_with_view(path, open_options, view_options)?;
        let view = dataset.view()?;
        let schema = view.schema.clone();
        let geometry_type = view.geometry_type;
        let spatial_ref = view.spatial_ref.clone();
        let rows = view.row_ids().into_iter();
        Ok(FeatureGenerator {
            dataset,
            pipeline: Pipeline::default(),
            schema,
            geometry_type,
            spatial_ref,
            rows,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        self.dataset.view().map(|_| ())
    }

    fn push(&mut self, stage: Stage) -> Result<&mut Self> {
        self.ensure_open()?;
        self.pipeline.push(stage);
        Ok(self)
    }

    /// Keeps the records for which `clause` holds.
    ///
    /// The clause sees the fields as they are at this point of the chain.
    pub fn attribute_filter(&mut self, clause: &str) -> Result<&mut Self> {
        self.ensure_open()?;
        let query = Query::compile(&self.schema.names(), clause)?;
        self.push(Stage::AttributeFilter(query))
    }

    /// Keeps the records whose geometry satisfies `predicate` against `operand`.
    pub fn spatial_filter<'g>(
        &mut self,
        predicate: SpatialPredicate,
        operand: impl Into<GeometryInput<'g>>,
    ) -> Result<&mut Self> {
        self.ensure_open()?;
        let operand = operand.into().resolve()?;
        self.push(Stage::SpatialFilter { predicate, operand })
    }

    pub fn contains<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Contains, operand)
    }

    pub fn crosses<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Crosses, operand)
    }

    pub fn disjoint<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Disjoint, operand)
    }

    pub fn equals<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Equals, operand)
    }

    pub fn intersects<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Intersects, operand)
    }

    pub fn overlaps<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Overlaps, operand)
    }

    pub fn touches<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Touches, operand)
    }

    /// Keeps records within `operand`. Nothing is within a non-areal operand.
    pub fn within<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.spatial_filter(SpatialPredicate::Within, operand)
    }

    /// Appends `field` to every record, set to `default`.
    pub fn add_field(
        &mut self,
        field: FieldDefinition,
        default: impl Into<FieldValue>,
    ) -> Result<&mut Self> {
        self.ensure_open()?;
        self.schema.push(field)?;
        self.push(Stage::AddField(default.into()))
    }

    /// Removes the named fields. Unknown names fail without changing anything.
    pub fn drop_fields(&mut self, names: &[&str]) -> Result<&mut Self> {
        self.ensure_open()?;
        let indices = self.schema.indices_of(names)?;
        self.schema.remove(&indices);
        self.push(Stage::DropFields(indices))
    }

    pub fn buffer(&mut self, distance: f64) -> Result<&mut Self> {
        self.ensure_open()?;
        self.geometry_type = OGRwkbGeometryType::wkbUnknown;
        self.push(Stage::Buffer(distance))
    }

    /// Replaces each geometry with `operation` against `operand`. Records whose
    /// result `policy` rejects are dropped.
    pub fn overlay<'g>(
        &mut self,
        operation: Overlay,
        operand: impl Into<GeometryInput<'g>>,
        policy: ResultPolicy,
    ) -> Result<&mut Self> {
        self.ensure_open()?;
        let operand = operand.into().resolve()?;
        self.geometry_type = OGRwkbGeometryType::wkbUnknown;
        self.push(Stage::Overlay {
            operation,
            operand,
            policy,
        })
    }

    pub fn difference<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.overlay(Overlay::Difference, operand, ResultPolicy::default())
    }

    pub fn intersection<'g>(
        &mut self,
        operand: impl Into<GeometryInput<'g>>,
    ) -> Result<&mut Self> {
        self.overlay(Overlay::Intersection, operand, ResultPolicy::default())
    }

    pub fn union<'g>(&mut self, operand: impl Into<GeometryInput<'g>>) -> Result<&mut Self> {
        self.overlay(Overlay::Union, operand, ResultPolicy::default())
    }

    /// Assigns `spatial_ref` to every record without touching coordinates.
    pub fn project(&mut self, spatial_ref: &SpatialRef) -> Result<&mut Self> {
        self.ensure_open()?;
        self.spatial_ref = Some(spatial_ref.clone());
        self.push(Stage::Project(spatial_ref.clone()))
    }

    /// Reprojects every record into `spatial_ref`.
    ///
    /// Without a known source reference there is nothing to reproject from, and
    /// the target is assigned as with [`FeatureGenerator::project`].
    pub fn transform(&mut self, spatial_ref: &SpatialRef) -> Result<&mut Self> {
        self.ensure_open()?;
        let Some(source) = &self.spatial_ref else {
            return self.project(spatial_ref);
        };
        let transform = CoordTransform::new(source, spatial_ref)?;
        self.spatial_ref = Some(spatial_ref.clone());
        self.push(Stage::Transform(transform))
    }

    /// Sets `field` to `value` on the records matching `clause`, or on all records.
    pub fn calculate_field(
        &mut self,
        field: &str,
        value: impl Into<Assignment>,
        clause: Option<&str>,
    ) -> Result<&mut Self> {
        self.ensure_open()?;
        let index = self.schema.require(field)?;
        let clause = clause
            .map(|clause| Query::compile(&self.schema.names(), clause))
            .transpose()?;
        self.push(Stage::Calculate {
            index,
            value: value.into(),
            clause,
        })
    }

    /// Like [`FeatureGenerator::calculate_field`], computing the value from
    /// `expression` over each record's attributes.
    pub fn calculate_field_expression(
        &mut self,
        field: &str,
        expression: &str,
        clause: Option<&str>,
    ) -> Result<&mut Self> {
        self.ensure_open()?;
        let expression = Expression::compile(&self.schema.names(), expression)?;
        self.calculate_field(field, expression, clause)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fields(&self) -> Vec<String> {
        self.schema.names()
    }

    pub fn geometry_type(&self) -> OGRwkbGeometryType::Type {
        self.geometry_type
    }

    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.spatial_ref.as_ref()
    }

    pub fn spatial_reference(&self, format: SrsFormat) -> Result<Option<String>> {
        self.spatial_ref
            .as_ref()
            .map(|srs| srs.export(format))
            .transpose()
    }

    /// Number of stages added so far.
    pub fn stages(&self) -> usize {
        self.pipeline.len()
    }

    /// The dataset the records are read from.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Drains the remaining records into a new layer of `target` and closes the
    /// generator. Returns the number of records written.
    pub fn export(&mut self, target: impl Into<OutputTarget>) -> Result<u64> {
        self.ensure_open()?;
        let target = target.into();
        let schema = self.schema.clone();
        let spatial_ref = self.spatial_ref.clone();
        let written = write_layer(
            &target,
            &schema,
            self.geometry_type,
            spatial_ref.as_ref(),
            self.by_ref(),
        );
        self.close();
        written
    }

    /// Releases the view and the data source. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.rows = Vec::new().into_iter();
        if !self.dataset.is_closed() {
            debug!(
                "closing generator on {} with {} stages",
                self.dataset.path().display(),
                self.pipeline.len()
            );
        }
        self.dataset.close();
    }

    pub fn is_closed(&self) -> bool {
        self.dataset.is_closed()
    }
}

impl Iterator for FeatureGenerator {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(fid) = self.rows.next() else {
                self.close();
                return None;
            };
            let record = match self.dataset.view() {
                Ok(view) => view.read(fid),
                Err(EasyOgrError::Closed) => return None,
                Err(err) => Err(err),
            };
            match record.and_then(|record| self.pipeline.run(record)) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests;
