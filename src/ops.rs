//! One-shot layer operations.
//!
//! Each function opens the view of `input` described by `view`, runs one
//! [`FeatureLayer`] operation into `target` and closes the source again. They
//! return the number of features written.

use std::path::Path;

use crate::dataset::{OutputTarget, ViewOptions};
use crate::errors::Result;
use crate::feature_layer::{FeatureLayer, LayerOperation};
use crate::operand::Operand;
use crate::options::OpenOptions;

fn with_layer<P, F>(input: P, view: &ViewOptions<'_>, operation: F) -> Result<u64>
where
    P: AsRef<Path>,
    F: FnOnce(&FeatureLayer) -> Result<u64>,
{
    let mut layer = FeatureLayer::open(input, &OpenOptions::new(), view)?;
    let written = operation(&layer);
    layer.close();
    written
}

fn layer_operation<'o, P: AsRef<Path>>(
    operation: LayerOperation,
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    with_layer(input, view, |layer| {
        layer.layer_operation(operation, operand, target)
    })
}

/// Buffers every feature of the view by `distance`.
pub fn buffer<P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    distance: f64,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    with_layer(input, view, |layer| layer.buffer(distance, target))
}

/// Copies the view, for instance a field subset or the rows matching a clause.
pub fn copy_layer<P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    with_layer(input, view, |layer| layer.export(target))
}

/// Symmetric difference, see [`FeatureLayer::difference`].
pub fn difference<'o, P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    layer_operation(LayerOperation::SymmetricDifference, input, view, operand, target)
}

pub fn erase<'o, P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    layer_operation(LayerOperation::Erase, input, view, operand, target)
}

pub fn identity<'o, P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    layer_operation(LayerOperation::Identity, input, view, operand, target)
}

pub fn intersection<'o, P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    layer_operation(LayerOperation::Intersection, input, view, operand, target)
}

pub fn union<'o, P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    layer_operation(LayerOperation::Union, input, view, operand, target)
}

pub fn update<'o, P: AsRef<Path>>(
    input: P,
    view: &ViewOptions<'_>,
    operand: impl Into<Operand<'o>>,
    target: impl Into<OutputTarget>,
) -> Result<u64> {
    layer_operation(LayerOperation::Update, input, view, operand, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::errors::EasyOgrError;
    use crate::geometry::GeometryInput;
    use crate::test_utils::{fixture, SuppressGDALErrorLog, TempFixture};

    fn count(path: &Path) -> usize {
        Dataset::open_with_view(path, &OpenOptions::new(), &ViewOptions::default())
            .unwrap()
            .feature_count()
    }

    #[test]
    fn test_copy_layer_with_view_options() {
        let output = TempFixture::empty("copy.geojson");
        let view = ViewOptions {
            fields: Some(&["name"]),
            clause: Some("score > 1"),
            ..Default::default()
        };
        assert_eq!(copy_layer(fixture("points.geojson"), &view, output.path()).unwrap(), 2);

        let copy =
            Dataset::open_with_view(output.path(), &OpenOptions::new(), &ViewOptions::default())
                .unwrap();
        assert_eq!(copy.fields(), vec!["name"]);
        assert_eq!(copy.feature_count(), 2);
    }

    #[test]
    fn test_buffer() {
        let output = TempFixture::empty("buffer.geojson");
        let written = buffer(
            fixture("lines.geojson"),
            &ViewOptions::default(),
            2.0,
            OutputTarget::new(output.path()).layer("roads"),
        )
        .unwrap();
        assert_eq!(written, 1);
        assert_eq!(count(output.path()), 1);
    }

    #[test]
    fn test_two_layer_operations() {
        let square = GeometryInput::wkt("POLYGON ((5 -5, 25 -5, 25 15, 5 15, 5 -5))");
        let input = fixture("polygons.geojson");
        let view = ViewOptions::default();

        let output = TempFixture::empty("intersection.geojson");
        assert_eq!(intersection(&input, &view, square, output.path()).unwrap(), 2);

        let square = GeometryInput::wkt("POLYGON ((5 -5, 25 -5, 25 15, 5 15, 5 -5))");
        let output = TempFixture::empty("erase.geojson");
        assert_eq!(erase(&input, &view, square, output.path()).unwrap(), 2);

        let output = TempFixture::empty("identity.geojson");
        assert!(identity(&input, &view, fixture("lines.geojson"), output.path()).unwrap() >= 2);

        let square = GeometryInput::wkt("POLYGON ((5 -5, 25 -5, 25 15, 5 15, 5 -5))");
        let output = TempFixture::empty("update.geojson");
        assert_eq!(update(&input, &view, square, output.path()).unwrap(), 3);

        let square = GeometryInput::wkt("POLYGON ((5 -5, 25 -5, 25 15, 5 15, 5 -5))");
        let output = TempFixture::empty("union.geojson");
        assert!(union(&input, &view, square, output.path()).unwrap() >= 3);

        let square = GeometryInput::wkt("POLYGON ((5 -5, 25 -5, 25 15, 5 15, 5 -5))");
        let output = TempFixture::empty("difference.geojson");
        assert!(difference(&input, &view, square, output.path()).unwrap() >= 3);
    }

    #[test]
    fn test_missing_input() {
        let _nolog = SuppressGDALErrorLog::new();
        let output = TempFixture::empty("never.geojson");
        let result = copy_layer(fixture("missing.geojson"), &ViewOptions::default(), output.path());
        assert!(matches!(result, Err(EasyOgrError::DataSource(_))));
        assert!(!output.path().exists());
    }
}
