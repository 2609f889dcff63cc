//! Record-oriented vector data access on top of [GDAL/OGR](http://gdal.org/).
//!
//! `easy_ogr` reads OGR layers as [`Record`]s (a geometry plus a list of attribute
//! values) and offers three ways of working with them:
//!
//! - [`Dataset`]: an open data source with one active view, readable by position
//!   or by iteration.
//! - [`FeatureGenerator`]: a lazy, single-pass pipeline of filters, field edits and
//!   geometry operations that is drained by iterating or exporting.
//! - [`FeatureLayer`]: a view with a row selection, exported or combined with
//!   another layer by OGR's layer-level set operations.
//!
//! ## Use
//!
//! ```rust,no_run
//! use easy_ogr::{Dataset, OpenOptions, ViewOptions};
//!
//! # fn main() -> easy_ogr::errors::Result<()> {
//! let dataset = Dataset::open_with_view(
//!     "fixtures/points.geojson",
//!     &OpenOptions::new(),
//!     &ViewOptions::default(),
//! )?;
//! for record in dataset.iter()? {
//!     let record = record?;
//!     println!("{} {}", record[0], record.geometry().to_wkt()?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) facade. GDAL's own
//! error messages can be routed there as well with [`config::route_errors_to_log`].

#![crate_name = "easy_ogr"]
#![crate_type = "lib"]

pub mod config;
pub mod errors;
pub mod ops;
pub mod utils;

mod dataset;
mod datasource;
mod driver;
mod feature_layer;
mod generator;
pub mod geometry;
mod layer;
mod operand;
mod options;
pub mod query;
mod record;
mod schema;
mod selection;
pub mod spatial_ref;
mod value;

pub use dataset::{
    layer_name_from_path, Dataset, Intersects, LayerRef, OutputTarget, Records, Status,
    ViewOptions,
};
pub use datasource::{DataSource, ResultSet};
pub use driver::Driver;
pub use feature_layer::{FeatureLayer, LayerOperation};
pub use generator::{Assignment, FeatureGenerator};
pub use geometry::{Extent, Geometry, GeometryFormat, GeometryInput, SpatialPredicate};
pub use layer::{FeatureIterator, Layer, NativeFeature};
pub use operand::{scratch_layer_name, Operand};
pub use options::{OpenFlags, OpenMode, OpenOptions};
pub use query::{Expression, Query};
pub use record::{checked_overlay, Overlay, Record, ResultPolicy};
pub use schema::{FieldDefinition, FieldType, Schema};
pub use selection::{apply_selection, SelectionFilter, SelectionMode};
pub use spatial_ref::{CoordTransform, SpatialRef, SrsFormat};
pub use value::FieldValue;

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
fn assert_almost_eq(a: f64, b: f64) {
    let tolerance = 1e-6 * a.abs().max(b.abs()).max(1.0);
    assert!((a - b).abs() < tolerance, "{a} != {b}");
}
