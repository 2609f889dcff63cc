use std::ffi::c_int;
use std::ptr::null_mut;

use gdal_sys::OGRCoordinateTransformationH;

use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_error_msg, _last_null_pointer_err};

/// Defines a coordinate transformation from one [`SpatialRef`] to another.
#[derive(Debug)]
pub struct CoordTransform {
    inner: OGRCoordinateTransformationH,
    source: SpatialRef,
    target: SpatialRef,
}

impl Drop for CoordTransform {
    fn drop(&mut self) {
        unsafe { gdal_sys::OCTDestroyCoordinateTransformation(self.inner) };
    }
}

impl CoordTransform {
    /// Constructs a new transformation from `source` to `target`.
    ///
    /// See: [OCTNewCoordinateTransformation](https://gdal.org/api/ogr_srs_api.html#_CPPv430OCTNewCoordinateTransformation20OGRSpatialReferenceH20OGRSpatialReferenceH)
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
        let c_obj = unsafe {
            gdal_sys::OCTNewCoordinateTransformation(source.c_spatial_ref(), target.c_spatial_ref())
        };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OCTNewCoordinateTransformation"));
        }
        Ok(CoordTransform {
            inner: c_obj,
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn source(&self) -> &SpatialRef {
        &self.source
    }

    pub fn target(&self) -> &SpatialRef {
        &self.target
    }

    /// Transform coordinates in place. `z` may be empty.
    ///
    /// See: [OCTTransform](https://gdal.org/api/ogr_srs_api.html#_CPPv412OCTTransform28OGRCoordinateTransformationHiPdPdPd)
    pub fn transform_coords(&self, x: &mut [f64], y: &mut [f64], z: &mut [f64]) -> Result<()> {
        let nb_coords = x.len();
        if nb_coords != y.len() || (!z.is_empty() && nb_coords != z.len()) {
            return Err(EasyOgrError::SpatialRef(format!(
                "coordinate slices have different lengths: {} / {} / {}",
                nb_coords,
                y.len(),
                z.len()
            )));
        }
        let z_ptr = if z.is_empty() {
            null_mut()
        } else {
            z.as_mut_ptr()
        };
        let ret_val = unsafe {
            gdal_sys::OCTTransform(
                self.inner,
                nb_coords as c_int,
                x.as_mut_ptr(),
                y.as_mut_ptr(),
                z_ptr,
            ) == 1
        };
        if !ret_val {
            return Err(EasyOgrError::SpatialRef(format!(
                "invalid coordinate range while transforming from {:?} to {:?}: {}",
                self.source,
                self.target,
                _last_error_msg()
            )));
        }
        Ok(())
    }

    /// Returns a C pointer to the allocated [`gdal_sys::OGRCoordinateTransformationH`] memory.
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn to_c_hct(&self) -> OGRCoordinateTransformationH {
        self.inner
    }
}
