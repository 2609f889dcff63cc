//! Selection sessions and layer-level geoprocessing.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::ptr::null_mut;

use gdal_sys::OGRwkbGeometryType;
use log::{debug, warn};

use crate::dataset::{create_output_layer, write_layer, Dataset, OutputTarget, ViewOptions};
use crate::errors::*;
use crate::geometry::{GeometryInput, SpatialPredicate};
use crate::layer::Layer;
use crate::operand::{Operand, OperandSource};
use crate::options::OpenOptions;
use crate::query::Query;
use crate::schema::Schema;
use crate::selection::{apply_selection, SelectionFilter, SelectionMode};
use crate::spatial_ref::{CoordTransform, SpatialRef};

/// Set operations OGR runs over two whole layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerOperation {
    /// Areas covered by exactly one of the layers.
    SymmetricDifference,
    /// The input minus the areas covered by the operand.
    Erase,
    /// The input, split where the operand overlaps it.
    Identity,
    Intersection,
    Union,
    /// The input with the operand's features replacing what they cover.
    Update,
}

impl LayerOperation {
    /// Runs the operation, appending the result to `output`.
    pub fn run(self, input: &Layer<'_>, operand: &Layer<'_>, output: &Layer<'_>) -> Result<()> {
        let (a, b, out) = unsafe { (input.c_layer(), operand.c_layer(), output.c_layer()) };
        let (rv, method_name) = unsafe {
            match self {
                LayerOperation::SymmetricDifference => (
                    gdal_sys::OGR_L_SymDifference(a, b, out, null_mut(), None, null_mut()),
                    "OGR_L_SymDifference",
                ),
                LayerOperation::Erase => (
                    gdal_sys::OGR_L_Erase(a, b, out, null_mut(), None, null_mut()),
                    "OGR_L_Erase",
                ),
                LayerOperation::Identity => (
                    gdal_sys::OGR_L_Identity(a, b, out, null_mut(), None, null_mut()),
                    "OGR_L_Identity",
                ),
                LayerOperation::Intersection => (
                    gdal_sys::OGR_L_Intersection(a, b, out, null_mut(), None, null_mut()),
                    "OGR_L_Intersection",
                ),
                LayerOperation::Union => (
                    gdal_sys::OGR_L_Union(a, b, out, null_mut(), None, null_mut()),
                    "OGR_L_Union",
                ),
                LayerOperation::Update => (
                    gdal_sys::OGR_L_Update(a, b, out, null_mut(), None, null_mut()),
                    "OGR_L_Update",
                ),
            }
        };
        ogr_result(rv, method_name)
    }
}

impl fmt::Display for LayerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerOperation::SymmetricDifference => "symmetric difference",
            LayerOperation::Erase => "erase",
            LayerOperation::Identity => "identity",
            LayerOperation::Intersection => "intersection",
            LayerOperation::Union => "union",
            LayerOperation::Update => "update",
        };
        f.write_str(name)
    }
}

/// A [`Dataset`] view with a feature selection.
///
/// Selections narrow what [`FeatureLayer::iter`](Dataset::iter), exports and
/// geoprocessing operations see. The view itself stays as it was opened.
///
/// ```rust,no_run
/// use easy_ogr::{FeatureLayer, OpenOptions, SelectionMode, ViewOptions};
///
/// # fn main() -> easy_ogr::errors::Result<()> {
/// let mut parcels =
///     FeatureLayer::open("parcels.shp", &OpenOptions::new(), &ViewOptions::default())?;
/// parcels.attribute_filter("area > 500", SelectionMode::New)?;
/// parcels.attribute_filter("zone = 'R1'", SelectionMode::Intersection)?;
/// parcels.intersection("flood.shp", "at_risk.shp")?;
/// parcels.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FeatureLayer {
    dataset: Dataset,
}

impl FeatureLayer {
    pub fn open<P: AsRef<Path>>(
        path: P,
        open_options: &OpenOptions,
        view_options: &ViewOptions<'_>,
    ) -> Result<FeatureLayer> {
        Ok(FeatureLayer {
            dataset: Dataset::open_with_view(path, open_options, view_options)?,
        })
    }

    /// The selected row identifiers, `None` when nothing has been selected.
    pub fn selection(&self) -> Option<&BTreeSet<u64>> {
        self.dataset
            .view()
            .ok()
            .and_then(|view| view.selection.as_ref())
    }

    fn update_selection(
        &mut self,
        selected: BTreeSet<u64>,
        mode: SelectionMode,
        test: &dyn fmt::Display,
    ) -> Result<usize> {
        let view = self.dataset.view_mut()?;
        view.selection = Some(selected);
        let count = view.feature_count();
        debug!("{mode} selection on {} by {test}: {count} rows", view.name);
        Ok(count)
    }

    /// Selects rows by attribute, combined with the current selection through
    /// `mode`. Returns the number of selected rows.
    pub fn attribute_filter(&mut self, clause: &str, mode: SelectionMode) -> Result<usize> {
        let view = self.dataset.view()?;
        let query = Query::compile(&view.schema.names(), clause)?;
        let selected = apply_selection(view.selection.as_ref(), mode, &view.fids, |fid| {
            query.test(view.read(fid)?.attributes())
        })?;
        self.update_selection(selected, mode, &query)
    }

    /// Selects rows whose geometry satisfies `predicate` against `operand`.
    pub fn spatial_filter<'g>(
        &mut self,
        operand: impl Into<GeometryInput<'g>>,
        predicate: SpatialPredicate,
        mode: SelectionMode,
    ) -> Result<usize> {
        let view = self.dataset.view()?;
        let operand = operand.into().resolve()?;
        let selected = apply_selection(view.selection.as_ref(), mode, &view.fids, |fid| {
            Ok(predicate.evaluate(view.read(fid)?.geometry(), &operand))
        })?;
        self.update_selection(selected, mode, &predicate)
    }

    /// Forgets the selection; every row of the view is available again.
    pub fn clear_selection(&mut self) -> Result<()> {
        let view = self.dataset.view_mut()?;
        if view.selection.take().is_some() {
            debug!("cleared selection on {}", view.name);
        }
        Ok(())
    }

    /// Writes the selected rows to `target`.
    pub fn export(&self, target: impl Into<OutputTarget>) -> Result<u64> {
        let view = self.dataset.view()?;
        write_layer(
            &target.into(),
            &view.schema,
            view.geometry_type,
            view.spatial_ref.as_ref(),
            self.dataset.iter()?,
        )
    }

    /// Writes a buffered copy of the selected rows to `target`.
    pub fn buffer(&self, distance: f64, target: impl Into<OutputTarget>) -> Result<u64> {
        let view = self.dataset.view()?;
        let records = self
            .dataset
            .iter()?
            .map(|record| record.and_then(|record| record.buffer(distance)));
        write_layer(
            &target.into(),
            &view.schema,
            OGRwkbGeometryType::wkbUnknown,
            view.spatial_ref.as_ref(),
            records,
        )
    }

    /// Writes the selected rows to `target` with `spatial_ref` assigned, leaving
    /// coordinates untouched.
    pub fn project(&self, spatial_ref: &SpatialRef, target: impl Into<OutputTarget>) -> Result<u64> {
        let view = self.dataset.view()?;
        let records = self.dataset.iter()?.map(|record| {
            record.map(|mut record| {
                record.project(spatial_ref);
                record
            })
        });
        write_layer(
            &target.into(),
            &view.schema,
            view.geometry_type,
            Some(spatial_ref),
            records,
        )
    }

    /// Writes the selected rows to `target`, reprojected into `spatial_ref`.
    ///
    /// A view without a spatial reference is projected instead.
    pub fn transform(
        &self,
        spatial_ref: &SpatialRef,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        let view = self.dataset.view()?;
        let Some(source) = &view.spatial_ref else {
            return self.project(spatial_ref, target);
        };
        let transform = CoordTransform::new(source, spatial_ref)?;
        let records = self.dataset.iter()?.map(|record| {
            record.and_then(|mut record| {
                record.transform_with(&transform)?;
                Ok(record)
            })
        });
        write_layer(
            &target.into(),
            &view.schema,
            view.geometry_type,
            Some(spatial_ref),
            records,
        )
    }

    /// Runs `operation` between the selected rows and `operand`, writing to `target`.
    ///
    /// The output layer is created without fields and with an unknown geometry
    /// type; OGR adds the fields of both inputs and keeps lower-dimension results.
    /// Returns the number of features in the output layer.
    ///
    /// The operand cannot be this session itself, since OGR would walk the same
    /// layer handle as both input and method. Open the source a second time instead.
    pub fn layer_operation<'o>(
        &self,
        operation: LayerOperation,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        let view = self.dataset.view()?;
        let mut target = target.into();
        if target.spatial_ref.take().is_some() {
            warn!("{operation} output keeps the spatial reference of {}", view.name);
        }
        let operand = operand.into();
        if let Operand::Session(dataset) = &operand {
            if std::ptr::eq(*dataset, &self.dataset) {
                return Err(EasyOgrError::DataSource(format!(
                    "{operation} cannot use {} as its own operand",
                    view.name
                )));
            }
        }
        let operand = OperandSource::open(operand)?;
        let operand_layer = operand.layer()?;

        let output = target.open()?;
        let output_layer = create_output_layer(
            &output,
            &target,
            &Schema::default(),
            OGRwkbGeometryType::wkbUnknown,
            view.spatial_ref.as_ref(),
        )?;

        let input_layer = view.layer();
        let input = SelectionFilter::new(&input_layer, view.selection.as_ref())?;
        let method = SelectionFilter::new(&operand_layer, operand.selection())?;
        operation.run(&input, &method, &output_layer)?;

        let written = output_layer.feature_count();
        debug!(
            "{operation} of {} and {} wrote {written} features to {}",
            view.name,
            operand_layer.name(),
            target.path.display()
        );
        Ok(written)
    }

    /// The symmetric difference: areas covered by exactly one of the layers.
    pub fn difference<'o>(
        &self,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        self.layer_operation(LayerOperation::SymmetricDifference, operand, target)
    }

    pub fn erase<'o>(
        &self,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        self.layer_operation(LayerOperation::Erase, operand, target)
    }

    pub fn identity<'o>(
        &self,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        self.layer_operation(LayerOperation::Identity, operand, target)
    }

    pub fn intersection<'o>(
        &self,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        self.layer_operation(LayerOperation::Intersection, operand, target)
    }

    pub fn union<'o>(
        &self,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        self.layer_operation(LayerOperation::Union, operand, target)
    }

    pub fn update<'o>(
        &self,
        operand: impl Into<Operand<'o>>,
        target: impl Into<OutputTarget>,
    ) -> Result<u64> {
        self.layer_operation(LayerOperation::Update, operand, target)
    }

    /// Releases the view and the data source. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.dataset.close();
    }
}

impl Deref for FeatureLayer {
    type Target = Dataset;

    fn deref(&self) -> &Dataset {
        &self.dataset
    }
}

impl<'a> From<&'a FeatureLayer> for Operand<'a> {
    fn from(layer: &'a FeatureLayer) -> Self {
        Operand::Session(&layer.dataset)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::geometry::{flatten, Geometry};
    use crate::test_utils::{fixture, TempFixture};
    use crate::value::FieldValue;

    fn open(name: &str) -> FeatureLayer {
        FeatureLayer::open(fixture(name), &OpenOptions::new(), &ViewOptions::default()).unwrap()
    }

    fn names(layer: &FeatureLayer) -> Vec<String> {
        layer
            .iter()
            .unwrap()
            .map(|record| record.unwrap()[0].to_string())
            .collect()
    }

    fn reopen(path: &Path) -> Dataset {
        Dataset::open_with_view(path, &OpenOptions::new(), &ViewOptions::default()).unwrap()
    }

    #[test]
    fn test_attribute_selection_modes() {
        let mut layer = open("points.geojson");
        assert!(layer.selection().is_none());
        assert_eq!(layer.feature_count(), 3);

        assert_eq!(layer.attribute_filter("score >= 5", SelectionMode::New).unwrap(), 2);
        assert_eq!(names(&layer), vec!["b", "c"]);

        assert_eq!(layer.attribute_filter("name = 'a'", SelectionMode::Union).unwrap(), 3);
        assert_eq!(
            layer.attribute_filter("score < 9", SelectionMode::Intersection).unwrap(),
            2
        );
        assert_eq!(names(&layer), vec!["a", "b"]);
        assert_eq!(
            layer.attribute_filter("name = 'b'", SelectionMode::Difference).unwrap(),
            1
        );
        assert_eq!(names(&layer), vec!["a"]);

        layer.clear_selection().unwrap();
        assert!(layer.selection().is_none());
        assert_eq!(layer.feature_count(), 3);
    }

    #[test]
    fn test_empty_selection() {
        let mut layer = open("points.geojson");
        assert_eq!(layer.attribute_filter("score > 100", SelectionMode::New).unwrap(), 0);
        assert_eq!(layer.feature_count(), 0);
        assert_eq!(layer.iter().unwrap().count(), 0);

        let output = TempFixture::empty("none.geojson");
        assert_eq!(layer.export(output.path()).unwrap(), 0);
    }

    #[rstest]
    #[case(SpatialPredicate::Intersects, 2)]
    #[case(SpatialPredicate::Within, 2)]
    #[case(SpatialPredicate::Disjoint, 1)]
    #[case(SpatialPredicate::Contains, 0)]
    fn test_spatial_selection(#[case] predicate: SpatialPredicate, #[case] expected: usize) {
        let mut layer = open("points.geojson");
        let area = Geometry::bbox(-1.0, -1.0, 10.0, 10.0).unwrap();
        let count = layer
            .spatial_filter(&area, predicate, SelectionMode::New)
            .unwrap();
        assert_eq!(count, expected);
    }

    #[test]
    fn test_selection_errors() {
        let mut layer = open("points.geojson");
        layer.attribute_filter("score > 1", SelectionMode::New).unwrap();
        assert!(matches!(
            layer.attribute_filter("height > 1", SelectionMode::Union),
            Err(EasyOgrError::Query(_))
        ));
        assert_eq!(layer.feature_count(), 2);
    }

    #[test]
    fn test_export_selection() {
        let output = TempFixture::empty("selected.geojson");
        let mut layer = open("points.geojson");
        layer.attribute_filter("score >= 5", SelectionMode::New).unwrap();
        assert_eq!(layer.export(output.path()).unwrap(), 2);

        let written = reopen(output.path());
        assert_eq!(written.fields(), vec!["name", "score"]);
        let records = written.iter().unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records[0][0], FieldValue::from("b"));
        assert_eq!(records[1][0], FieldValue::from("c"));
    }

    #[test]
    fn test_buffer_writes_polygons() {
        let output = TempFixture::empty("buffered.geojson");
        let layer = open("points.geojson");
        assert_eq!(layer.buffer(1.0, output.path()).unwrap(), 3);

        let written = reopen(output.path());
        for record in written.iter().unwrap() {
            assert_eq!(
                flatten(record.unwrap().geometry_type()),
                OGRwkbGeometryType::wkbPolygon
            );
        }
    }

    #[test]
    fn test_transform_and_project() {
        let web_mercator = SpatialRef::from_epsg(3857).unwrap();
        let layer = open("points.geojson");

        let transformed = TempFixture::empty("transformed.geojson");
        layer.transform(&web_mercator, transformed.path()).unwrap();
        let written = reopen(transformed.path());
        assert_eq!(written.srid(), Some(3857));
        let (x, _, _) = written.get(1).unwrap().geometry().get_point(0);
        assert!(x > 500_000.0);

        let projected = TempFixture::empty("projected.geojson");
        layer.project(&web_mercator, projected.path()).unwrap();
        let written = reopen(projected.path());
        assert_eq!(written.srid(), Some(3857));
        let (x, _, _) = written.get(1).unwrap().geometry().get_point(0);
        assert_eq!(x, 5.0);
    }

    #[test]
    fn test_intersection_keeps_lower_dimension_results() {
        let output = TempFixture::empty("crossings.geojson");
        let layer = open("polygons.geojson");
        assert_eq!(
            layer.intersection(fixture("lines.geojson"), output.path()).unwrap(),
            2
        );

        let written = reopen(output.path());
        assert!(written.fields().contains(&"zone".to_string()));
        assert!(written.fields().contains(&"road".to_string()));
        for record in written.iter().unwrap() {
            let name = record.unwrap().geometry_name();
            assert!(name == "LINESTRING" || name == "MULTILINESTRING", "{name}");
        }
    }

    #[test]
    fn test_operations_respect_the_selection() {
        let output = TempFixture::empty("erased.geojson");
        let mut layer = open("polygons.geojson");
        layer.attribute_filter("zone = 'B'", SelectionMode::New).unwrap();
        let operand = GeometryInput::wkt("POLYGON ((25 -5, 35 -5, 35 15, 25 15, 25 -5))");
        assert_eq!(layer.erase(operand, output.path()).unwrap(), 1);

        let written = reopen(output.path());
        let record = written.get(0).unwrap();
        assert_eq!(record[0], FieldValue::from("B"));
        assert!((record.area() - 50.0).abs() < 1e-6);

        // The temporary filter is gone once the operation returns.
        assert_eq!(layer.active_layer().unwrap().feature_count(), 2);
    }

    #[test]
    fn test_difference_is_symmetric() {
        let output = TempFixture::empty("difference.geojson");
        let layer = open("polygons.geojson");
        let operand = GeometryInput::wkt("POLYGON ((5 0, 25 0, 25 10, 5 10, 5 0))");
        layer.difference(operand, output.path()).unwrap();

        let written = reopen(output.path());
        let total: f64 = written
            .iter()
            .unwrap()
            .map(|record| record.unwrap().area())
            .sum();
        // 50 + 50 from the input layer plus 100 of the operand between them.
        assert!((total - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_session_operand() {
        let output = TempFixture::empty("union.geojson");
        let layer = open("polygons.geojson");
        let mut operand = open("polygons.geojson");
        operand.attribute_filter("code = 1", SelectionMode::New).unwrap();
        assert!(layer.union(&operand, output.path()).unwrap() > 0);
    }

    #[test]
    fn test_session_cannot_be_its_own_operand() {
        let output = TempFixture::empty("self.geojson");
        let layer = open("polygons.geojson");
        assert!(matches!(
            layer.union(&layer, output.path()),
            Err(EasyOgrError::DataSource(_))
        ));
        assert_eq!(layer.feature_count(), 2);

        let again = open("polygons.geojson");
        assert!(layer.union(&again, output.path()).unwrap() > 0);
    }

    #[test]
    fn test_close() {
        let mut layer = open("points.geojson");
        layer.close();
        layer.close();
        assert!(layer.is_closed());
        assert!(matches!(
            layer.attribute_filter("score > 1", SelectionMode::New),
            Err(EasyOgrError::Closed)
        ));
        assert!(matches!(layer.clear_selection(), Err(EasyOgrError::Closed)));
        let output = TempFixture::empty("closed.geojson");
        assert!(matches!(layer.export(output.path()), Err(EasyOgrError::Closed)));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(LayerOperation::SymmetricDifference.to_string(), "symmetric difference");
        assert_eq!(LayerOperation::Update.to_string(), "update");
    }
}
