use std::ffi::CString;
use std::path::Path;
use std::ptr::null_mut;
use std::sync::{Once, OnceLock};

use gdal_sys::{GDALDataType, GDALDriverH};
use log::debug;

use crate::datasource::DataSource;
use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _path_to_c_string, _string};

static START: Once = Once::new();

pub fn _register_drivers() {
    START.call_once(|| unsafe {
        gdal_sys::GDALAllRegister();
    });
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ExtensionEntry {
    extension: String,
    driver: String,
    can_create: bool,
}

static EXTENSIONS: OnceLock<Vec<ExtensionEntry>> = OnceLock::new();

/// Every vector driver's declared extensions, in registration order.
fn extension_table() -> &'static [ExtensionEntry] {
    EXTENSIONS.get_or_init(|| {
        let mut table = Vec::new();
        for driver in Driver::all() {
            if !driver.is_vector() {
                continue;
            }
            let can_create = driver.can_create();
            let short_name = driver.short_name();
            for extension in driver.extensions() {
                table.push(ExtensionEntry {
                    extension,
                    driver: short_name.clone(),
                    can_create,
                });
            }
        }
        table
    })
}

/// Normalizes `.SHP`, `shp` and `Shp` to `shp`.
fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[allow(missing_copy_implementations)]
pub struct Driver {
    c_driver: GDALDriverH,
}

impl Driver {
    pub fn get(name: &str) -> Result<Driver> {
        _register_drivers();
        let c_name = CString::new(name)?;
        let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
        if c_driver.is_null() {
            return Err(EasyOgrError::DataSource(format!(
                "no driver named '{name}' is registered"
            )));
        };
        Ok(Driver { c_driver })
    }

    /// The first of `names` that is registered.
    ///
    /// Useful for drivers that were renamed between GDAL releases.
    pub fn get_any(names: &[&str]) -> Result<Driver> {
        for name in names {
            if let Ok(driver) = Driver::get(name) {
                return Ok(driver);
            }
        }
        Err(EasyOgrError::DataSource(format!(
            "none of the drivers {names:?} is registered"
        )))
    }

    pub fn count() -> usize {
        _register_drivers();
        let rv = unsafe { gdal_sys::GDALGetDriverCount() };
        rv.max(0) as usize
    }

    pub fn get_by_index(index: usize) -> Result<Driver> {
        _register_drivers();
        let c_driver = unsafe { gdal_sys::GDALGetDriver(index as std::ffi::c_int) };
        if c_driver.is_null() {
            return Err(_last_null_pointer_err("GDALGetDriver"));
        }
        Ok(Driver { c_driver })
    }

    /// All registered drivers, raster-only ones included.
    pub fn all() -> Vec<Driver> {
        (0..Driver::count())
            .filter_map(|index| Driver::get_by_index(index).ok())
            .collect()
    }

    /// Resolves a driver from the extension of `path`.
    ///
    /// The first vector driver declaring the extension wins. When `creating`,
    /// drivers able to create data sources are preferred.
    pub fn for_path<P: AsRef<Path>>(path: P, creating: bool) -> Option<Driver> {
        let extension = normalize_extension(path.as_ref().extension()?.to_str()?);
        let mut candidates = extension_table()
            .iter()
            .filter(|entry| entry.extension == extension);
        let entry = if creating {
            let all: Vec<&ExtensionEntry> = candidates.collect();
            all.iter()
                .find(|entry| entry.can_create)
                .or_else(|| all.first())
                .copied()
        } else {
            candidates.next()
        }?;
        Driver::get(&entry.driver).ok()
    }

    /// Wraps a C pointer.
    ///
    /// # Safety
    /// `c_driver` must be a valid driver handle.
    pub unsafe fn from_c_driver(c_driver: GDALDriverH) -> Driver {
        Driver { c_driver }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_driver(&self) -> GDALDriverH {
        self.c_driver
    }

    pub fn short_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverShortName(self.c_driver) };
        _string(rv)
    }

    pub fn long_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverLongName(self.c_driver) };
        _string(rv)
    }

    pub fn metadata_item(&self, key: &str) -> Option<String> {
        let c_key = CString::new(key).ok()?;
        let rv = unsafe {
            gdal_sys::GDALGetMetadataItem(self.c_driver, c_key.as_ptr(), std::ptr::null())
        };
        if rv.is_null() {
            return None;
        }
        Some(_string(rv))
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.metadata_item(capability)
            .map(|value| value.eq_ignore_ascii_case("YES"))
            .unwrap_or(false)
    }

    pub fn is_vector(&self) -> bool {
        self.has_capability("DCAP_VECTOR")
    }

    pub fn can_create(&self) -> bool {
        self.has_capability("DCAP_CREATE")
    }

    /// Lowercase file extensions declared by the driver, without the dot.
    pub fn extensions(&self) -> Vec<String> {
        self.metadata_item("DMD_EXTENSIONS")
            .unwrap_or_default()
            .split_whitespace()
            .map(normalize_extension)
            .collect()
    }

    /// Creates an empty vector data source at `path`.
    pub fn create_vector_only<P: AsRef<Path>>(&self, path: P) -> Result<DataSource> {
        let c_path = _path_to_c_string(path.as_ref())?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_path.as_ptr(),
                0,
                0,
                0,
                GDALDataType::GDT_Unknown,
                null_mut(),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        }
        debug!(
            "created {} data source {}",
            self.short_name(),
            path.as_ref().display()
        );
        Ok(unsafe { DataSource::from_c_dataset(c_dataset) })
    }
}
