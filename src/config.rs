//! GDAL runtime configuration.
//!
//! OGR drivers read many of their settings from configuration options
//! (`OGR_GEOJSON_MAX_OBJ_SIZE`, `SHAPE_ENCODING`, `OGR_SQLITE_SYNCHRONOUS` ...).
//! Options set here override the ones taken from environment variables.
//!
//! ```no_run
//! use easy_ogr::config::*;
//!
//! set_config_option("SHAPE_ENCODING", "UTF-8").unwrap();
//! assert_eq!(get_config_option("SHAPE_ENCODING", "").unwrap(), "UTF-8");
//! clear_config_option("SHAPE_ENCODING").unwrap();
//! ```
//!
//! Refer to [GDAL `ConfigOptions`](https://gdal.org/user/configoptions.html) for
//! a full list of options.

use std::ffi::{c_char, CString};

use gdal_sys::{CPLErr, CPLErrorNum};
use log::{debug, error, warn};

use crate::errors::Result;
use crate::utils::_string;

/// Set a GDAL library configuration option.
pub fn set_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    let c_val = CString::new(value.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetConfigOption(c_key.as_ptr(), c_val.as_ptr());
    };
    Ok(())
}

/// Get the value of a GDAL library configuration option, or `default` when unset.
pub fn get_config_option(key: &str, default: &str) -> Result<String> {
    let c_key = CString::new(key.as_bytes())?;
    let c_default = CString::new(default.as_bytes())?;
    let rv = unsafe { gdal_sys::CPLGetConfigOption(c_key.as_ptr(), c_default.as_ptr()) };
    Ok(_string(rv))
}

/// Clear the value of a GDAL library configuration option.
pub fn clear_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetConfigOption(c_key.as_ptr(), ::std::ptr::null());
    };
    Ok(())
}

/// Set a configuration option with **thread local** scope.
pub fn set_thread_local_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    let c_val = CString::new(value.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), c_val.as_ptr());
    };
    Ok(())
}

/// Get a **thread local** configuration option, or `default` when unset.
pub fn get_thread_local_config_option(key: &str, default: &str) -> Result<String> {
    let c_key = CString::new(key.as_bytes())?;
    let c_default = CString::new(default.as_bytes())?;
    let rv =
        unsafe { gdal_sys::CPLGetThreadLocalConfigOption(c_key.as_ptr(), c_default.as_ptr()) };
    Ok(_string(rv))
}

/// Clear a **thread local** configuration option.
pub fn clear_thread_local_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), ::std::ptr::null());
    };
    Ok(())
}

/// Forward messages emitted by GDAL to the [`log`] facade instead of stderr.
///
/// Debug messages go to `debug!`, warnings to `warn!`, failures to `error!`.
/// Errors are still reported to callers through the usual return values.
pub fn route_errors_to_log() {
    unsafe extern "C" fn log_handler(
        error_type: CPLErr::Type,
        error_num: CPLErrorNum,
        error_msg_ptr: *const c_char,
    ) {
        let msg = _string(error_msg_ptr);
        match error_type {
            CPLErr::CE_None | CPLErr::CE_Debug => debug!(target: "gdal", "{msg}"),
            CPLErr::CE_Warning => warn!(target: "gdal", "[{error_num}] {msg}"),
            _ => error!(target: "gdal", "[{error_num}] {msg}"),
        }
    }

    unsafe {
        gdal_sys::CPLSetErrorHandler(Some(log_handler));
    };
}

/// Restore GDAL's default stderr error handler.
pub fn restore_default_error_handler() {
    unsafe {
        gdal_sys::CPLSetErrorHandler(None);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_options() {
        // Options are process-global, run the scenarios in sequence.
        test_set_get_option();
        test_set_option_with_embedded_nul();
        test_clear_option();
    }

    fn test_set_get_option() {
        assert!(set_config_option("EASY_OGR_TEST_OPTION", "ON").is_ok());
        assert_eq!(
            get_config_option("EASY_OGR_TEST_OPTION", "DEFAULT").unwrap(),
            "ON"
        );
        assert_eq!(
            get_config_option("EASY_OGR_NON_EXISTANT_OPTION", "DEFAULT").unwrap(),
            "DEFAULT"
        );
    }

    fn test_set_option_with_embedded_nul() {
        assert!(set_config_option("f\0oo", "valid").is_err());
        assert!(set_config_option("foo", "in\0valid").is_err());
    }

    fn test_clear_option() {
        assert!(set_config_option("EASY_OGR_CLEARED_OPTION", "ON").is_ok());
        assert!(clear_config_option("EASY_OGR_CLEARED_OPTION").is_ok());
        assert_eq!(
            get_config_option("EASY_OGR_CLEARED_OPTION", "DEFAULT").unwrap(),
            "DEFAULT"
        );
    }

    #[test]
    fn test_thread_local_options() {
        assert!(set_thread_local_config_option("EASY_OGR_TL_OPTION", "1").is_ok());
        assert_eq!(
            get_thread_local_config_option("EASY_OGR_TL_OPTION", "0").unwrap(),
            "1"
        );
        assert!(clear_thread_local_config_option("EASY_OGR_TL_OPTION").is_ok());
        assert_eq!(
            get_thread_local_config_option("EASY_OGR_TL_OPTION", "0").unwrap(),
            "0"
        );
    }
}
