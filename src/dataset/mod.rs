//! A data source with at most one active layer view.
//!
//! A [`Dataset`] starts without a view. [`Dataset::open_layer`] runs an OGR SQL
//! `SELECT` against the source, restricted to the requested fields, attribute clause
//! and spatial filter, and makes the result the active view. Opening another view
//! releases the previous one first. All metadata (fields, geometry type, extent,
//! feature count, spatial reference) describes the active view and is empty when
//! there is none.
//!
//! ```no_run
//! use easy_ogr::{Dataset, OpenOptions, ViewOptions};
//!
//! let mut dataset = Dataset::open("fixtures/points.geojson", &OpenOptions::default())?;
//! dataset.open_layer(&ViewOptions {
//!     clause: Some("score >= 5"),
//!     ..Default::default()
//! })?;
//! for record in dataset.iter()? {
//!     println!("{}", record?);
//! }
//! dataset.close();
//! # Ok::<(), easy_ogr::errors::EasyOgrError>(())
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use gdal_sys::OGRwkbGeometryType;
use log::debug;

use crate::datasource::DataSource;
use crate::errors::{EasyOgrError, Result};
use crate::geometry::{type_name, Extent, Geometry, GeometryInput};
use crate::layer::Layer;
use crate::options::OpenOptions;
use crate::record::Record;
use crate::schema::{FieldDefinition, Schema};
use crate::spatial_ref::{SpatialRef, SrsFormat};

mod view;
mod writer;

pub(crate) use view::View;
pub(crate) use writer::{create_output_layer, write_layer};
pub use writer::OutputTarget;

/// Layer name implied by a data source path: its file stem.
pub fn layer_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Open,
    Closed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Open => f.write_str("Open"),
            Status::Closed => f.write_str("Closed"),
        }
    }
}

/// A layer picked by position or by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for LayerRef<'_> {
    fn from(index: usize) -> Self {
        LayerRef::Index(index)
    }
}

impl<'a> From<&'a str> for LayerRef<'a> {
    fn from(name: &'a str) -> Self {
        LayerRef::Name(name)
    }
}

/// Spatial restriction of a view: a bounding box or any geometry input.
#[derive(Debug)]
pub enum Intersects<'a> {
    Extent(Extent),
    Geometry(GeometryInput<'a>),
}

impl Intersects<'_> {
    pub fn resolve(&self) -> Result<Geometry> {
        match self {
            Intersects::Extent(extent) => extent.to_polygon(),
            Intersects::Geometry(input) => input.resolve(),
        }
    }
}

impl From<Extent> for Intersects<'_> {
    fn from(extent: Extent) -> Self {
        Intersects::Extent(extent)
    }
}

impl From<(f64, f64, f64, f64)> for Intersects<'_> {
    fn from(bbox: (f64, f64, f64, f64)) -> Self {
        Intersects::Extent(bbox.into())
    }
}

impl<'a> From<GeometryInput<'a>> for Intersects<'a> {
    fn from(input: GeometryInput<'a>) -> Self {
        Intersects::Geometry(input)
    }
}

impl<'a> From<&'a Geometry> for Intersects<'a> {
    fn from(geometry: &'a Geometry) -> Self {
        Intersects::Geometry(geometry.into())
    }
}

impl<'a> From<&'a Record> for Intersects<'a> {
    fn from(record: &'a Record) -> Self {
        Intersects::Geometry(record.into())
    }
}

/// What to open as the active view.
///
/// `layer: None` picks the layer named after the file stem, or the only layer of a
/// single-layer source. `fields: None` (or `["*"]`) keeps every field. `clause` is
/// an OGR SQL `WHERE` expression evaluated by GDAL.
#[derive(Debug, Default)]
pub struct ViewOptions<'a> {
    pub layer: Option<LayerRef<'a>>,
    pub fields: Option<&'a [&'a str]>,
    pub clause: Option<&'a str>,
    pub intersects: Option<Intersects<'a>>,
}

/// An open data source and its active view.
#[derive(Debug)]
pub struct Dataset {
    // Declared before `source`: the view is a result set of the source and is
    // released first.
    view: Option<View>,
    source: Option<DataSource>,
    path: PathBuf,
    driver: String,
    layers: Vec<String>,
}

impl Dataset {
    /// Opens the data source at `path` without an active view.
    pub fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Dataset> {
        let path = path.as_ref();
        let source = DataSource::open(path, options)?;
        let driver = source.driver().short_name();
        let layers = source.layer_names();
        debug!(
            "opened dataset {} with {driver}, layers {layers:?}",
            path.display()
        );
        Ok(Dataset {
            view: None,
            source: Some(source),
            path: path.to_path_buf(),
            driver,
            layers,
        })
    }

    /// Opens `path` and makes the view described by `options` active.
    pub fn open_with_view<P: AsRef<Path>>(
        path: P,
        open_options: &OpenOptions,
        view_options: &ViewOptions<'_>,
    ) -> Result<Dataset> {
        let mut dataset = Dataset::open(path, open_options)?;
        dataset.open_layer(view_options)?;
        Ok(dataset)
    }

    fn source(&self) -> Result<&DataSource> {
        self.source.as_ref().ok_or(EasyOgrError::Closed)
    }

    /// The underlying data source. Fails once the dataset is closed.
    pub fn data_source(&self) -> Result<&DataSource> {
        self.source()
    }

    fn resolve_layer(&self, layer: Option<LayerRef<'_>>) -> Result<String> {
        match layer {
            Some(LayerRef::Index(index)) => self.layers.get(index).cloned().ok_or_else(|| {
                EasyOgrError::DataSource(format!(
                    "layer index {index} is out of range for {} ({} layers)",
                    self.path.display(),
                    self.layers.len()
                ))
            }),
            Some(LayerRef::Name(name)) => {
                let index = self.source()?.layer_index(name).ok_or_else(|| {
                    EasyOgrError::DataSource(format!(
                        "no layer named '{name}' in {}, expected one of {:?}",
                        self.path.display(),
                        self.layers
                    ))
                })?;
                Ok(self.layers[index].clone())
            }
            None => {
                if let Some(stem) = layer_name_from_path(&self.path) {
                    if let Some(index) = self.source()?.layer_index(&stem) {
                        return Ok(self.layers[index].clone());
                    }
                }
                match self.layers.as_slice() {
                    [only] => Ok(only.clone()),
                    _ => Err(EasyOgrError::DataSource(format!(
                        "{} has {} layers, name the one to open",
                        self.path.display(),
                        self.layers.len()
                    ))),
                }
            }
        }
    }

    /// Makes a new view active, releasing the current one first.
    pub fn open_layer(&mut self, options: &ViewOptions<'_>) -> Result<()> {
        self.source()?;
        self.close_layer();
        let name = self.resolve_layer(options.layer)?;
        let sql = view::view_sql(&name, options.fields, options.clause);
        let intersects = options
            .intersects
            .as_ref()
            .map(Intersects::resolve)
            .transpose()?;
        let source = self.source()?;
        // The view is stored next to `source` and always dropped before it.
        let view = unsafe { View::open(source, &name, &sql, intersects.as_ref())? };
        self.view = Some(view);
        Ok(())
    }

    /// Releases the active view, if any.
    pub fn close_layer(&mut self) {
        if let Some(view) = self.view.take() {
            debug!("closed view on {}", view.name);
        }
    }

    /// Releases the view and the data source. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.close_layer();
        if self.source.take().is_some() {
            debug!("closed dataset {}", self.path.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// `Open` while a view is active.
    pub fn status(&self) -> Status {
        if self.view.is_some() {
            Status::Open
        } else {
            Status::Closed
        }
    }

    pub(crate) fn view(&self) -> Result<&View> {
        self.source()?;
        self.view.as_ref().ok_or(EasyOgrError::NoActiveLayer)
    }

    pub(crate) fn view_mut(&mut self) -> Result<&mut View> {
        self.source()?;
        self.view.as_mut().ok_or(EasyOgrError::NoActiveLayer)
    }

    /// The native layer behind the active view.
    pub fn active_layer(&self) -> Result<Layer<'_>> {
        Ok(self.view()?.layer())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short name of the driver that opened the source.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Layer names of the source, by index.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Name of the active layer.
    pub fn name(&self) -> Option<&str> {
        self.view.as_ref().map(|view| view.name.as_str())
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.view.as_ref().map(|view| &view.schema)
    }

    pub fn fields(&self) -> Vec<String> {
        self.schema().map(Schema::names).unwrap_or_default()
    }

    pub fn field_definitions(&self) -> &[FieldDefinition] {
        self.schema().map(Schema::fields).unwrap_or_default()
    }

    pub fn geometry_type(&self) -> Option<OGRwkbGeometryType::Type> {
        self.view.as_ref().map(|view| view.geometry_type)
    }

    /// OGR name of the geometry type, e.g. `POINT`.
    pub fn geometry_name(&self) -> Option<String> {
        self.geometry_type().map(type_name)
    }

    /// Rows in the active view, or in its selection when one is set.
    pub fn feature_count(&self) -> usize {
        self.view.as_ref().map_or(0, View::feature_count)
    }

    pub fn bbox(&self) -> Option<Extent> {
        self.view.as_ref().and_then(|view| view.extent)
    }

    /// Whether the active view is backed by a real FID column.
    pub fn has_fid_column(&self) -> bool {
        self.view.as_ref().is_some_and(|view| view.has_fid_column)
    }

    pub fn spatial_ref(&self) -> Option<&SpatialRef> {
        self.view.as_ref().and_then(|view| view.spatial_ref.as_ref())
    }

    /// The spatial reference of the active view serialized as `format`.
    pub fn spatial_reference(&self, format: SrsFormat) -> Result<Option<String>> {
        self.spatial_ref()
            .map(|srs| srs.export(format))
            .transpose()
    }

    pub fn units(&self) -> Option<String> {
        self.spatial_ref().map(|srs| srs.linear_units().0)
    }

    pub fn wkt(&self) -> Option<String> {
        self.spatial_ref().and_then(|srs| srs.to_pretty_wkt().ok())
    }

    pub fn proj4(&self) -> Option<String> {
        self.spatial_ref().and_then(|srs| srs.to_proj4().ok())
    }

    pub fn srid(&self) -> Option<u32> {
        self.spatial_ref().and_then(SpatialRef::epsg)
    }

    /// The record at `position` of the active view.
    pub fn get(&self, position: usize) -> Result<Record> {
        let view = self.view()?;
        let fid = view
            .fids
            .get(position)
            .copied()
            .ok_or(EasyOgrError::RowOutOfRange {
                position,
                count: view.fids.len(),
            })?;
        view.read(fid)
    }

    /// Reads the records of the active view, restricted to the selection if one is set.
    pub fn iter(&self) -> Result<Records<'_>> {
        let view = self.view()?;
        Ok(Records {
            view,
            ids: view.row_ids().into_iter(),
        })
    }
}

/// Records of a [`Dataset`], see [`Dataset::iter`].
#[derive(Debug)]
pub struct Records<'a> {
    view: &'a View,
    ids: std::vec::IntoIter<u64>,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|fid| self.view.read(fid))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixture, SuppressGDALErrorLog};
    use crate::value::FieldValue;

    fn points() -> Dataset {
        Dataset::open(fixture("points.geojson"), &OpenOptions::default()).unwrap()
    }

    fn names(dataset: &Dataset) -> Vec<String> {
        dataset
            .iter()
            .unwrap()
            .map(|record| record.unwrap()[0].to_string())
            .collect()
    }

    #[test]
    fn test_metadata_without_view() {
        let dataset = points();
        assert_eq!(dataset.status(), Status::Closed);
        assert_eq!(dataset.driver(), "GeoJSON");
        assert_eq!(dataset.layers(), ["points"]);
        assert!(dataset.name().is_none());
        assert!(dataset.fields().is_empty());
        assert_eq!(dataset.feature_count(), 0);
        assert!(dataset.bbox().is_none());
        assert!(dataset.spatial_ref().is_none());
        assert!(matches!(dataset.get(0), Err(EasyOgrError::NoActiveLayer)));
    }

    #[test]
    fn test_open_inferred_layer() {
        let mut dataset = points();
        dataset.open_layer(&ViewOptions::default()).unwrap();
        assert_eq!(dataset.status(), Status::Open);
        assert_eq!(dataset.name(), Some("points"));
        assert_eq!(dataset.fields(), vec!["name", "score"]);
        assert_eq!(dataset.field_definitions().len(), 2);
        assert_eq!(dataset.geometry_name().as_deref(), Some("POINT"));
        assert_eq!(dataset.feature_count(), 3);
        assert_eq!(dataset.bbox(), Some(Extent::new(0.0, 0.0, 20.0, 20.0)));
        assert!(dataset.spatial_ref().is_some());
        assert!(dataset.wkt().is_some());
        assert_eq!(names(&dataset), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fields_and_clause() {
        let mut dataset = points();
        dataset
            .open_layer(&ViewOptions {
                layer: Some("points".into()),
                fields: Some(&["name"]),
                clause: Some("score >= 5"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(dataset.fields(), vec!["name"]);
        assert_eq!(dataset.feature_count(), 2);
        let first = dataset.get(0).unwrap();
        assert_eq!(first.attributes(), &[FieldValue::from("b")]);
        assert!(matches!(
            dataset.get(2),
            Err(EasyOgrError::RowOutOfRange { position: 2, count: 2 })
        ));
    }

    #[test]
    fn test_spatial_filters() {
        let mut dataset = points();
        dataset
            .open_layer(&ViewOptions {
                intersects: Some((4.0, 4.0, 30.0, 30.0).into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(names(&dataset), vec!["b", "c"]);

        let area = Geometry::from_wkt("POLYGON ((-1 -1,6 -1,6 6,-1 6,-1 -1))").unwrap();
        dataset
            .open_layer(&ViewOptions {
                layer: Some(0.into()),
                intersects: Some((&area).into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(names(&dataset), vec!["a", "b"]);
    }

    #[test]
    fn test_reopen_replaces_view() {
        let mut dataset = points();
        dataset
            .open_layer(&ViewOptions {
                clause: Some("score > 100"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(dataset.feature_count(), 0);
        assert_eq!(dataset.iter().unwrap().count(), 0);
        dataset.open_layer(&ViewOptions::default()).unwrap();
        assert_eq!(dataset.feature_count(), 3);
    }

    #[test]
    fn test_bad_layers_and_clauses() {
        let _nolog = SuppressGDALErrorLog::new();
        let mut dataset = points();
        let err = dataset
            .open_layer(&ViewOptions {
                layer: Some("roads".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EasyOgrError::DataSource(_)));
        let err = dataset
            .open_layer(&ViewOptions {
                layer: Some(3.into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EasyOgrError::DataSource(_)));
        let err = dataset
            .open_layer(&ViewOptions {
                clause: Some("nope = 1"),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EasyOgrError::Query(_)));
        assert_eq!(dataset.status(), Status::Closed);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut dataset = points();
        dataset.open_layer(&ViewOptions::default()).unwrap();
        dataset.close();
        dataset.close();
        assert!(dataset.is_closed());
        assert_eq!(dataset.status(), Status::Closed);
        assert_eq!(dataset.feature_count(), 0);
        assert!(matches!(dataset.get(0), Err(EasyOgrError::Closed)));
        assert!(matches!(dataset.iter(), Err(EasyOgrError::Closed)));
        assert!(matches!(
            dataset.open_layer(&ViewOptions::default()),
            Err(EasyOgrError::Closed)
        ));
    }

    #[test]
    fn test_layer_name_from_path() {
        assert_eq!(
            layer_name_from_path(Path::new("/data/roads.shp")).as_deref(),
            Some("roads")
        );
        assert_eq!(layer_name_from_path(Path::new("/")), None);
    }
}
