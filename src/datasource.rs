use std::ffi::{c_char, c_int, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::ptr::{self, null_mut};

use gdal_sys::{CPLErr, GDALDatasetH, OGRGeometryH, OGRLayerH, OGRwkbGeometryType};
use log::debug;

use crate::driver::{Driver, _register_drivers};
use crate::errors::*;
use crate::geometry::Geometry;
use crate::layer::Layer;
use crate::options::OpenOptions;
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_error_msg, _last_null_pointer_err, _path_to_c_string, _string};

const OGRSQL: &[u8] = b"OGRSQL\0";

/// An open OGR data source: a file, a directory of files, or a database connection.
///
/// The handle is closed on drop, flushing pending writes.
#[derive(Debug)]
pub struct DataSource {
    c_dataset: GDALDatasetH,
}

impl DataSource {
    /// Opens the data source at `path`, creating it when `options.create` is set
    /// and nothing exists there yet.
    pub fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<DataSource> {
        _register_drivers();
        let path = path.as_ref();
        if path.exists() {
            return Self::open_ex(path, options);
        }
        if options.create {
            return Self::create(path, options);
        }
        // Connection strings and virtual file systems never exist on disk.
        Self::open_ex(path, options).map_err(|_| {
            EasyOgrError::DataSource(format!("{} does not exist", path.display()))
        })
    }

    /// Opens an existing source. Without an explicit driver the extension table
    /// picks one, and GDAL's own probing is the fallback when the extension is
    /// unknown or its driver cannot read the source.
    fn open_ex(path: &Path, options: &OpenOptions) -> Result<DataSource> {
        if options.driver.is_some() {
            return Self::open_with_driver(path, options, options.driver.as_deref());
        }
        let Some(driver) = Driver::for_path(path, false) else {
            return Self::open_with_driver(path, options, None);
        };
        let name = driver.short_name();
        Self::open_with_driver(path, options, Some(&name)).or_else(|err| {
            debug!(
                "{name} could not open {}, probing all drivers: {err}",
                path.display()
            );
            Self::open_with_driver(path, options, None)
        })
    }

    fn open_with_driver(
        path: &Path,
        options: &OpenOptions,
        driver: Option<&str>,
    ) -> Result<DataSource> {
        let c_filename = _path_to_c_string(path)?;
        let c_allowed = driver.map(CString::new).transpose()?;
        let c_allowed_ptrs: Vec<*const c_char> = match &c_allowed {
            Some(name) => vec![name.as_ptr(), ptr::null()],
            None => vec![ptr::null()],
        };
        let c_allowed_ptr = if c_allowed.is_some() {
            c_allowed_ptrs.as_ptr()
        } else {
            ptr::null()
        };
        let c_dataset = unsafe {
            gdal_sys::GDALOpenEx(
                c_filename.as_ptr(),
                options.mode.flags().bits(),
                c_allowed_ptr,
                ptr::null(),
                ptr::null(),
            )
        };
        if c_dataset.is_null() {
            let msg = _last_error_msg();
            return Err(EasyOgrError::DataSource(format!(
                "unable to open {} ({}): {msg}",
                path.display(),
                options.mode
            )));
        }
        debug!(
            "opened {} ({}) with {}",
            path.display(),
            options.mode,
            driver.unwrap_or("any driver")
        );
        Ok(DataSource { c_dataset })
    }

    fn create(path: &Path, options: &OpenOptions) -> Result<DataSource> {
        let driver = match &options.driver {
            Some(name) => Driver::get(name)?,
            None => Driver::for_path(path, true).ok_or_else(|| {
                EasyOgrError::DataSource(format!(
                    "no driver is registered for the extension of {}",
                    path.display()
                ))
            })?,
        };
        if !driver.can_create() {
            return Err(EasyOgrError::DataSource(format!(
                "driver {} cannot create data sources",
                driver.short_name()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        driver.create_vector_only(path)
    }

    /// Creates a data source that only lives in memory.
    pub fn in_memory(name: &str) -> Result<DataSource> {
        // GDAL 3.11 folded the "Memory" driver into "MEM".
        let driver = Driver::get_any(&["Memory", "MEM"])?;
        driver.create_vector_only(name)
    }

    /// Wraps a C pointer, taking ownership of it.
    ///
    /// # Safety
    /// This method operates on a raw C pointer
    pub unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> DataSource {
        DataSource { c_dataset }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_dataset(&self) -> GDALDatasetH {
        self.c_dataset
    }

    pub fn driver(&self) -> Driver {
        unsafe {
            let c_driver = gdal_sys::GDALGetDatasetDriver(self.c_dataset);
            Driver::from_c_driver(c_driver)
        }
    }

    pub fn description(&self) -> String {
        _string(unsafe { gdal_sys::GDALGetDescription(self.c_dataset) })
    }

    pub fn layer_count(&self) -> usize {
        let rv = unsafe { gdal_sys::GDALDatasetGetLayerCount(self.c_dataset) };
        rv.max(0) as usize
    }

    pub fn layer(&self, idx: usize) -> Result<Layer<'_>> {
        let c_layer = unsafe { gdal_sys::GDALDatasetGetLayer(self.c_dataset, idx as c_int) };
        if c_layer.is_null() {
            return Err(EasyOgrError::DataSource(format!(
                "layer index {idx} is out of range ({} layers)",
                self.layer_count()
            )));
        }
        Ok(unsafe { Layer::from_c_layer(c_layer) })
    }

    /// Layer position by name; exact match first, then ignoring case.
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        let names = self.layer_names();
        names
            .iter()
            .position(|candidate| candidate == name)
            .or_else(|| {
                names
                    .iter()
                    .position(|candidate| candidate.eq_ignore_ascii_case(name))
            })
    }

    pub fn layer_by_name(&self, name: &str) -> Result<Layer<'_>> {
        match self.layer_index(name) {
            Some(idx) => self.layer(idx),
            None => Err(EasyOgrError::DataSource(format!(
                "no layer named '{name}' in {}",
                self.description()
            ))),
        }
    }

    pub fn layer_names(&self) -> Vec<String> {
        (0..self.layer_count())
            .filter_map(|idx| self.layer(idx).ok())
            .map(|layer| layer.name())
            .collect()
    }

    /// Creates a layer, deleting any existing layer of the same name first.
    pub fn create_layer(
        &self,
        name: &str,
        geometry_type: OGRwkbGeometryType::Type,
        spatial_ref: Option<&SpatialRef>,
    ) -> Result<Layer<'_>> {
        self.delete_layer(name)?;
        let c_name = CString::new(name)?;
        let c_srs = match spatial_ref {
            Some(srs) => unsafe { srs.c_spatial_ref() },
            None => null_mut(),
        };
        let c_layer = unsafe {
            gdal_sys::GDALDatasetCreateLayer(
                self.c_dataset,
                c_name.as_ptr(),
                c_srs,
                geometry_type,
                null_mut(),
            )
        };
        if c_layer.is_null() {
            return Err(_last_null_pointer_err("GDALDatasetCreateLayer"));
        };
        Ok(unsafe { Layer::from_c_layer(c_layer) })
    }

    /// Deletes the layer called `name`. Returns `false` if there was none.
    pub fn delete_layer(&self, name: &str) -> Result<bool> {
        let Some(idx) = self.layer_index(name) else {
            return Ok(false);
        };
        let rv = unsafe { gdal_sys::GDALDatasetDeleteLayer(self.c_dataset, idx as c_int) };
        ogr_result(rv, "GDALDatasetDeleteLayer")?;
        debug!("deleted layer {name} from {}", self.description());
        Ok(true)
    }

    /// Runs an OGR SQL statement, clipped to `spatial_filter` when given.
    ///
    /// Returns `None` for statements without a result layer.
    pub fn execute_sql(
        &self,
        query: &str,
        spatial_filter: Option<&Geometry>,
    ) -> Result<Option<ResultSet<'_>>> {
        let c_query = CString::new(query)?;
        let filter_geom: OGRGeometryH = match spatial_filter {
            Some(geometry) => unsafe { geometry.c_geometry() },
            None => null_mut(),
        };

        unsafe { gdal_sys::CPLErrorReset() };
        let c_layer = unsafe {
            gdal_sys::GDALDatasetExecuteSQL(
                self.c_dataset,
                c_query.as_ptr(),
                filter_geom,
                OGRSQL.as_ptr() as *const c_char,
            )
        };
        let cpl_err = unsafe { gdal_sys::CPLGetLastErrorType() };
        if cpl_err != CPLErr::CE_None && cpl_err != CPLErr::CE_Warning && cpl_err != CPLErr::CE_Debug
        {
            if !c_layer.is_null() {
                unsafe { gdal_sys::GDALDatasetReleaseResultSet(self.c_dataset, c_layer) };
            }
            return Err(EasyOgrError::Query(format!(
                "'{query}' failed: {}",
                _last_error_msg()
            )));
        }
        if c_layer.is_null() {
            return Ok(None);
        }
        Ok(Some(unsafe { ResultSet::from_raw(self.c_dataset, c_layer) }))
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::GDALClose(self.c_dataset);
        }
    }
}

/// The layer produced by [`DataSource::execute_sql`]. Released on drop.
#[derive(Debug)]
pub struct ResultSet<'a> {
    c_dataset: GDALDatasetH,
    c_layer: OGRLayerH,
    phantom: PhantomData<&'a DataSource>,
}

impl<'a> ResultSet<'a> {
    /// # Safety
    /// `c_layer` must be a result set of `c_dataset`, and `c_dataset` must outlive `'a`.
    pub(crate) unsafe fn from_raw(c_dataset: GDALDatasetH, c_layer: OGRLayerH) -> ResultSet<'a> {
        ResultSet {
            c_dataset,
            c_layer,
            phantom: PhantomData,
        }
    }

    /// Drops the borrow of the data source.
    ///
    /// # Safety
    /// The caller must release the result set before the data source is closed.
    pub(crate) unsafe fn detach(self) -> ResultSet<'static> {
        let this = std::mem::ManuallyDrop::new(self);
        ResultSet::from_raw(this.c_dataset, this.c_layer)
    }

    pub fn layer(&self) -> Layer<'_> {
        unsafe { Layer::from_c_layer(self.c_layer) }
    }
}

impl Drop for ResultSet<'_> {
    fn drop(&mut self) {
        unsafe { gdal_sys::GDALDatasetReleaseResultSet(self.c_dataset, self.c_layer) };
    }
}
