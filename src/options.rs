use std::ffi::c_uint;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::errors::{EasyOgrError, Result};

// These are skipped by bindgen and manually kept in sync with gdal.h.
bitflags! {
    /// Extended open flags passed as `nOpenFlags` to [`GDALOpenEx`].
    ///
    /// [`GDALOpenEx`]: https://gdal.org/api/raster_c_api.html#_CPPv410GDALOpenExPKcjPKcPKcPKc
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenFlags: c_uint {
        /// Open in read-only mode (default).
        const READONLY = 0x00;
        /// Open in update mode.
        const UPDATE = 0x01;
        /// Allow vector drivers to be used.
        const VECTOR = 0x04;
        /// Emit error message in case of failed open.
        const VERBOSE_ERROR = 0x40;
    }
}

impl Default for OpenFlags {
    fn default() -> OpenFlags {
        OpenFlags::VECTOR
    }
}

/// Access mode of a data source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpenMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    pub fn flags(self) -> OpenFlags {
        match self {
            OpenMode::ReadOnly => OpenFlags::VECTOR | OpenFlags::VERBOSE_ERROR,
            OpenMode::ReadWrite => OpenFlags::VECTOR | OpenFlags::UPDATE | OpenFlags::VERBOSE_ERROR,
        }
    }
}

impl FromStr for OpenMode {
    type Err = EasyOgrError;

    /// Accepts `r`/`0` for read-only and `rw`/`1`/`w` for read-write.
    fn from_str(s: &str) -> Result<OpenMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "0" => Ok(OpenMode::ReadOnly),
            "rw" | "w" | "1" => Ok(OpenMode::ReadWrite),
            other => Err(EasyOgrError::DataSource(format!(
                "invalid open mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::ReadOnly => f.write_str("r"),
            OpenMode::ReadWrite => f.write_str("rw"),
        }
    }
}

/// How a data source is opened by [`crate::DataSource::open`] and the sessions built on it.
///
/// When no driver is named, the driver is looked up from the file extension
/// (see [`crate::Driver::for_path`]), and finally left to GDAL's own probing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub driver: Option<String>,
    pub mode: OpenMode,
    pub create: bool,
}

impl OpenOptions {
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    /// Read-write access, creating the data source when it does not exist yet.
    pub fn create() -> OpenOptions {
        OpenOptions {
            driver: None,
            mode: OpenMode::ReadWrite,
            create: true,
        }
    }

    pub fn driver(mut self, driver: &str) -> OpenOptions {
        self.driver = Some(driver.to_string());
        self
    }

    pub fn mode(mut self, mode: OpenMode) -> OpenOptions {
        self.mode = mode;
        self
    }

    pub fn create_if_absent(mut self, create: bool) -> OpenOptions {
        self.create = create;
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("r", OpenMode::ReadOnly)]
    #[case("0", OpenMode::ReadOnly)]
    #[case("rw", OpenMode::ReadWrite)]
    #[case("RW", OpenMode::ReadWrite)]
    #[case("1", OpenMode::ReadWrite)]
    fn parses_open_modes(#[case] text: &str, #[case] expected: OpenMode) {
        assert_eq!(text.parse::<OpenMode>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = "append".parse::<OpenMode>().unwrap_err();
        assert!(matches!(err, EasyOgrError::DataSource(_)));
    }

    #[test]
    fn mode_flags() {
        assert!(!OpenMode::ReadOnly.flags().contains(OpenFlags::UPDATE));
        assert!(OpenMode::ReadWrite.flags().contains(OpenFlags::UPDATE));
        assert!(OpenMode::ReadOnly.flags().contains(OpenFlags::VECTOR));
    }

    #[test]
    fn builder() {
        let options = OpenOptions::new().driver("GPKG").mode(OpenMode::ReadWrite);
        assert_eq!(options.driver.as_deref(), Some("GPKG"));
        assert!(!options.create);
        assert!(OpenOptions::create().create);
    }
}
