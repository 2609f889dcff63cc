use std::ffi::NulError;

use gdal_sys::OGRErr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EasyOgrError>;

#[derive(Clone, Debug, Error)]
pub enum EasyOgrError {
    #[error("FfiNulError")]
    FfiNulError(#[from] NulError),
    #[error("IO error: '{0}'")]
    Io(String),
    #[error("Data source error: {0}")]
    DataSource(String),
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Spatial reference error: {0}")]
    SpatialRef(String),
    #[error("The session has been closed")]
    Closed,
    #[error("The session has no active layer")]
    NoActiveLayer,
    #[error("Row {position} is out of range for a layer of {count} rows")]
    RowOutOfRange { position: usize, count: usize },
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[error("OGR method '{method_name}' returned error: '{err:?}'")]
    OgrError {
        err: OGRErr::Type,
        method_name: &'static str,
    },
}

impl From<std::io::Error> for EasyOgrError {
    fn from(err: std::io::Error) -> Self {
        EasyOgrError::Io(err.to_string())
    }
}

/// Turns a non-zero `OGRErr` into an [`EasyOgrError::OgrError`].
pub(crate) fn ogr_result(err: OGRErr::Type, method_name: &'static str) -> Result<()> {
    if err != OGRErr::OGRERR_NONE {
        return Err(EasyOgrError::OgrError { err, method_name });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ogr_result() {
        assert!(ogr_result(OGRErr::OGRERR_NONE, "OGR_L_CreateFeature").is_ok());
        let err = ogr_result(OGRErr::OGRERR_FAILURE, "OGR_L_CreateFeature").unwrap_err();
        assert!(matches!(
            err,
            EasyOgrError::OgrError {
                method_name: "OGR_L_CreateFeature",
                ..
            }
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: EasyOgrError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, EasyOgrError::Io(msg) if msg.contains("gone")));
    }
}
