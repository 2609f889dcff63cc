//! Second inputs of layer-vs-layer operations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::datasource::DataSource;
use crate::dataset::{Dataset, LayerRef, ViewOptions};
use crate::errors::Result;
use crate::geometry::{Geometry, GeometryInput};
use crate::layer::Layer;
use crate::options::OpenOptions;
use crate::record::Record;

static SCRATCH_LAYERS: AtomicUsize = AtomicUsize::new(0);

/// A process-wide unique name for an in-memory layer: `Temp1`, `Temp2`, ...
pub fn scratch_layer_name() -> String {
    let n = SCRATCH_LAYERS.fetch_add(1, Ordering::Relaxed) + 1;
    format!("Temp{n}")
}

/// The layer a two-layer operation runs against.
#[derive(Debug)]
pub enum Operand<'a> {
    /// A layer of a data source that is opened for the duration of the operation.
    Path {
        path: PathBuf,
        layer: Option<LayerRef<'a>>,
    },
    /// The active view of an open session, restricted to its selection.
    Session(&'a Dataset),
    /// Geometry written to a scratch in-memory layer.
    Geometry(GeometryInput<'a>),
}

impl<'a> Operand<'a> {
    pub fn path<P: AsRef<Path>>(path: P) -> Operand<'a> {
        Operand::Path {
            path: path.as_ref().to_path_buf(),
            layer: None,
        }
    }

    pub fn layer<P: AsRef<Path>>(path: P, layer: impl Into<LayerRef<'a>>) -> Operand<'a> {
        Operand::Path {
            path: path.as_ref().to_path_buf(),
            layer: Some(layer.into()),
        }
    }
}

impl From<&Path> for Operand<'_> {
    fn from(path: &Path) -> Self {
        Operand::path(path)
    }
}

impl From<PathBuf> for Operand<'_> {
    fn from(path: PathBuf) -> Self {
        Operand::Path { path, layer: None }
    }
}

impl<'a> From<&'a Dataset> for Operand<'a> {
    fn from(dataset: &'a Dataset) -> Self {
        Operand::Session(dataset)
    }
}

impl<'a> From<GeometryInput<'a>> for Operand<'a> {
    fn from(input: GeometryInput<'a>) -> Self {
        Operand::Geometry(input)
    }
}

impl<'a> From<&'a Geometry> for Operand<'a> {
    fn from(geometry: &'a Geometry) -> Self {
        Operand::Geometry(GeometryInput::Native(geometry))
    }
}

impl<'a> From<&'a Record> for Operand<'a> {
    fn from(record: &'a Record) -> Self {
        Operand::Geometry(GeometryInput::Record(record))
    }
}

/// An [`Operand`] made ready for use, owning whatever it had to open.
#[derive(Debug)]
pub(crate) enum OperandSource<'a> {
    Session(&'a Dataset),
    Opened(Dataset),
    Scratch(DataSource),
}

impl<'a> OperandSource<'a> {
    pub(crate) fn open(operand: Operand<'a>) -> Result<OperandSource<'a>> {
        match operand {
            Operand::Session(dataset) => {
                dataset.view()?;
                Ok(OperandSource::Session(dataset))
            }
            Operand::Path { path, layer } => {
                let options = ViewOptions {
                    layer,
                    ..Default::default()
                };
                let dataset = Dataset::open_with_view(&path, &OpenOptions::new(), &options)?;
                Ok(OperandSource::Opened(dataset))
            }
            Operand::Geometry(input) => {
                let geometry = input.resolve()?;
                let name = scratch_layer_name();
                let source = DataSource::in_memory(&name)?;
                {
                    let layer = source.create_layer(
                        &name,
                        geometry.geometry_type(),
                        geometry.spatial_ref().as_ref(),
                    )?;
                    layer.write_record(&Record::from_parts(geometry, Vec::new()))?;
                }
                debug!("materialised operand geometry as scratch layer {name}");
                Ok(OperandSource::Scratch(source))
            }
        }
    }

    pub(crate) fn layer(&self) -> Result<Layer<'_>> {
        match self {
            OperandSource::Session(dataset) => dataset.active_layer(),
            OperandSource::Opened(dataset) => dataset.active_layer(),
            OperandSource::Scratch(source) => source.layer(0),
        }
    }

    /// Rows of the operand taking part in the operation, `None` for all of them.
    pub(crate) fn selection(&self) -> Option<&BTreeSet<u64>> {
        match self {
            OperandSource::Session(dataset) => dataset
                .view()
                .ok()
                .and_then(|view| view.selection.as_ref()),
            OperandSource::Opened(_) | OperandSource::Scratch(_) => None,
        }
    }
}
