use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;

use crate::errors::*;

pub fn _string(raw_ptr: *const c_char) -> String {
    if raw_ptr.is_null() {
        return String::new();
    }
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    c_str.to_string_lossy().into_owned()
}

/// Copies a string allocated by GDAL and releases the original with `VSIFree`.
pub fn _owned_string(raw_ptr: *mut c_char) -> String {
    let rv = _string(raw_ptr);
    unsafe { gdal_sys::VSIFree(raw_ptr as *mut c_void) };
    rv
}

pub fn _string_array(raw_ptr: *mut *mut c_char) -> Vec<String> {
    let mut ret_val: Vec<String> = vec![];
    if raw_ptr.is_null() {
        return ret_val;
    }
    let mut i = 0;
    unsafe {
        loop {
            let next = raw_ptr.add(i).read();
            if next.is_null() {
                break;
            }
            ret_val.push(_string(next));
            i += 1;
        }
    }
    ret_val
}

pub fn _last_null_pointer_err(method_name: &'static str) -> EasyOgrError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    EasyOgrError::NullPointer {
        method_name,
        msg: last_err_msg,
    }
}

/// The last message GDAL reported on this thread, clearing it.
pub fn _last_error_msg() -> String {
    let msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    msg
}

pub fn _path_to_c_string<P: AsRef<Path>>(path: P) -> Result<CString> {
    let path_ref: &Path = path.as_ref();
    let path_str = path_ref.to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}

/// Quotes an identifier for OGR SQL, doubling embedded quotes.
pub fn _quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(_quote_identifier("score"), "\"score\"");
        assert_eq!(_quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_string_from_null() {
        assert_eq!(_string(std::ptr::null()), "");
        assert!(_string_array(std::ptr::null_mut()).is_empty());
    }

    #[test]
    fn test_string_array() {
        let a = CString::new("GeoJSON").unwrap();
        let b = CString::new("GPKG").unwrap();
        let mut ptrs = vec![
            a.as_ptr() as *mut c_char,
            b.as_ptr() as *mut c_char,
            std::ptr::null_mut(),
        ];
        assert_eq!(_string_array(ptrs.as_mut_ptr()), vec!["GeoJSON", "GPKG"]);
    }
}
