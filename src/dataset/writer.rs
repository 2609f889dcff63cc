use std::path::{Path, PathBuf};

use gdal_sys::OGRwkbGeometryType;
use log::debug;

use crate::datasource::DataSource;
use crate::errors::{EasyOgrError, Result};
use crate::layer::Layer;
use crate::options::OpenOptions;
use crate::record::Record;
use crate::schema::Schema;
use crate::spatial_ref::SpatialRef;

/// Where an export or layer operation writes its result.
///
/// The data source is created when missing. Without an explicit layer name the
/// layer is named after the file stem, and an existing layer of that name is
/// replaced.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub layer: Option<String>,
    pub driver: Option<String>,
    /// Records are reprojected into this reference before they are written.
    pub spatial_ref: Option<SpatialRef>,
}

impl OutputTarget {
    pub fn new<P: AsRef<Path>>(path: P) -> OutputTarget {
        OutputTarget {
            path: path.as_ref().to_path_buf(),
            layer: None,
            driver: None,
            spatial_ref: None,
        }
    }

    pub fn layer(mut self, name: &str) -> OutputTarget {
        self.layer = Some(name.to_string());
        self
    }

    pub fn driver(mut self, driver: &str) -> OutputTarget {
        self.driver = Some(driver.to_string());
        self
    }

    pub fn spatial_ref(mut self, spatial_ref: SpatialRef) -> OutputTarget {
        self.spatial_ref = Some(spatial_ref);
        self
    }

    pub fn layer_name(&self) -> Result<String> {
        match &self.layer {
            Some(name) => Ok(name.clone()),
            None => super::layer_name_from_path(&self.path).ok_or_else(|| {
                EasyOgrError::DataSource(format!(
                    "cannot derive a layer name from {}",
                    self.path.display()
                ))
            }),
        }
    }

    pub(crate) fn open(&self) -> Result<DataSource> {
        let mut options = OpenOptions::create();
        options.driver = self.driver.clone();
        DataSource::open(&self.path, &options)
    }
}

impl From<&Path> for OutputTarget {
    fn from(path: &Path) -> Self {
        OutputTarget::new(path)
    }
}

impl From<PathBuf> for OutputTarget {
    fn from(path: PathBuf) -> Self {
        OutputTarget::new(path)
    }
}

impl From<&str> for OutputTarget {
    fn from(path: &str) -> Self {
        OutputTarget::new(path)
    }
}

/// Creates the output layer of `target` with the given fields.
pub(crate) fn create_output_layer<'d>(
    source: &'d DataSource,
    target: &OutputTarget,
    schema: &Schema,
    geometry_type: OGRwkbGeometryType::Type,
    spatial_ref: Option<&SpatialRef>,
) -> Result<Layer<'d>> {
    let name = target.layer_name()?;
    let spatial_ref = target.spatial_ref.as_ref().or(spatial_ref);
    let layer = source.create_layer(&name, geometry_type, spatial_ref)?;
    for field in schema.fields() {
        layer.create_field(field)?;
    }
    Ok(layer)
}

/// Drains `records` into a new layer of `target`. Returns the number of records written.
pub(crate) fn write_layer<I>(
    target: &OutputTarget,
    schema: &Schema,
    geometry_type: OGRwkbGeometryType::Type,
    spatial_ref: Option<&SpatialRef>,
    records: I,
) -> Result<u64>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let source = target.open()?;
    let layer = create_output_layer(&source, target, schema, geometry_type, spatial_ref)?;
    let mut written = 0;
    for record in records {
        let mut record = record?;
        if let Some(output_ref) = &target.spatial_ref {
            record.transform(output_ref)?;
        }
        layer.write_record(&record)?;
        written += 1;
    }
    debug!(
        "wrote {written} records to {} in {}",
        layer.name(),
        target.path.display()
    );
    Ok(written)
}
