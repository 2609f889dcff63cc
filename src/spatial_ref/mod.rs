mod srs;
mod transform;

pub use srs::{SpatialRef, SrsDefinition, SrsFormat};
pub use transform::CoordTransform;
