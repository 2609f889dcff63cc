use std::ffi::{c_char, c_int, c_void, CString};
use std::fmt;
use std::ptr::{self, null_mut};
use std::str::FromStr;

use gdal_sys::{OGRGeometryH, OGRwkbByteOrder};

use super::Geometry;
use crate::errors::*;
use crate::utils::{_last_error_msg, _last_null_pointer_err, _owned_string};

/// Serializations a geometry can be read from or written to. KML is export only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryFormat {
    Wkt,
    Wkb,
    GeoJson,
    Gml,
    Kml,
}

impl FromStr for GeometryFormat {
    type Err = EasyOgrError;

    fn from_str(s: &str) -> Result<GeometryFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wkt" => Ok(GeometryFormat::Wkt),
            "wkb" => Ok(GeometryFormat::Wkb),
            "json" | "geojson" => Ok(GeometryFormat::GeoJson),
            "gml" => Ok(GeometryFormat::Gml),
            "kml" => Ok(GeometryFormat::Kml),
            other => Err(EasyOgrError::Geometry(format!(
                "unknown geometry format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for GeometryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryFormat::Wkt => "wkt",
            GeometryFormat::Wkb => "wkb",
            GeometryFormat::GeoJson => "json",
            GeometryFormat::Gml => "gml",
            GeometryFormat::Kml => "kml",
        };
        f.write_str(name)
    }
}

fn text(data: &[u8], format: GeometryFormat) -> Result<CString> {
    let text = std::str::from_utf8(data)
        .map_err(|e| EasyOgrError::Geometry(format!("{format} input is not UTF-8: {e}")))?;
    Ok(CString::new(text.trim())?)
}

impl Geometry {
    /// Parses `data` according to `format`.
    pub fn parse(format: GeometryFormat, data: &[u8]) -> Result<Geometry> {
        match format {
            GeometryFormat::Wkt => Geometry::from_wkt(std::str::from_utf8(data).map_err(|e| {
                EasyOgrError::Geometry(format!("WKT input is not UTF-8: {e}"))
            })?),
            GeometryFormat::Wkb => Geometry::from_wkb(data),
            GeometryFormat::GeoJson => {
                let c_json = text(data, format)?;
                let c_geom = unsafe { gdal_sys::OGR_G_CreateGeometryFromJson(c_json.as_ptr()) };
                Geometry::parsed(c_geom, format)
            }
            GeometryFormat::Gml => {
                let c_gml = text(data, format)?;
                let c_geom = unsafe { gdal_sys::OGR_G_CreateFromGML(c_gml.as_ptr()) };
                Geometry::parsed(c_geom, format)
            }
            GeometryFormat::Kml => Err(EasyOgrError::Geometry(
                "KML geometries can be exported but not read".to_string(),
            )),
        }
    }

    fn parsed(c_geom: OGRGeometryH, format: GeometryFormat) -> Result<Geometry> {
        if c_geom.is_null() {
            return Err(EasyOgrError::Geometry(format!(
                "invalid {format} geometry: {}",
                _last_error_msg()
            )));
        }
        Ok(unsafe { Geometry::with_c_geometry(c_geom) })
    }

    pub fn from_wkt(wkt: &str) -> Result<Geometry> {
        let c_wkt = CString::new(wkt.trim())?;
        // OGR_G_CreateFromWkt only advances the pointer, the text is not written to.
        let mut c_wkt_ptr = c_wkt.as_ptr() as *mut c_char;
        let mut c_geom = null_mut();
        let rv = unsafe { gdal_sys::OGR_G_CreateFromWkt(&mut c_wkt_ptr, null_mut(), &mut c_geom) };
        if rv != gdal_sys::OGRErr::OGRERR_NONE {
            return Err(EasyOgrError::Geometry(format!("invalid WKT '{wkt}'")));
        }
        Geometry::parsed(c_geom, GeometryFormat::Wkt)
    }

    pub fn from_wkb(wkb: &[u8]) -> Result<Geometry> {
        let mut c_geom = null_mut();
        let rv = unsafe {
            gdal_sys::OGR_G_CreateFromWkb(
                wkb.as_ptr() as *const c_void,
                null_mut(),
                &mut c_geom,
                wkb.len() as c_int,
            )
        };
        if rv != gdal_sys::OGRErr::OGRERR_NONE {
            return Err(EasyOgrError::Geometry(format!(
                "invalid WKB ({} bytes)",
                wkb.len()
            )));
        }
        Geometry::parsed(c_geom, GeometryFormat::Wkb)
    }

    pub fn from_geojson(json: &str) -> Result<Geometry> {
        Geometry::parse(GeometryFormat::GeoJson, json.as_bytes())
    }

    pub fn from_gml(gml: &str) -> Result<Geometry> {
        Geometry::parse(GeometryFormat::Gml, gml.as_bytes())
    }

    pub fn to_wkt(&self) -> Result<String> {
        let mut c_wkt = null_mut();
        let rv = unsafe { gdal_sys::OGR_G_ExportToWkt(self.c_geometry(), &mut c_wkt) };
        ogr_result(rv, "OGR_G_ExportToWkt")?;
        Ok(_owned_string(c_wkt))
    }

    /// Little endian well-known binary.
    pub fn to_wkb(&self) -> Result<Vec<u8>> {
        let size = unsafe { gdal_sys::OGR_G_WkbSize(self.c_geometry()) };
        let mut wkb = vec![0u8; size.max(0) as usize];
        let rv = unsafe {
            gdal_sys::OGR_G_ExportToWkb(
                self.c_geometry(),
                OGRwkbByteOrder::wkbNDR,
                wkb.as_mut_ptr(),
            )
        };
        ogr_result(rv, "OGR_G_ExportToWkb")?;
        Ok(wkb)
    }

    pub fn to_geojson(&self) -> Result<String> {
        let c_json = unsafe { gdal_sys::OGR_G_ExportToJson(self.c_geometry()) };
        if c_json.is_null() {
            return Err(_last_null_pointer_err("OGR_G_ExportToJson"));
        }
        Ok(_owned_string(c_json))
    }

    pub fn to_gml(&self) -> Result<String> {
        let c_gml = unsafe { gdal_sys::OGR_G_ExportToGML(self.c_geometry()) };
        if c_gml.is_null() {
            return Err(_last_null_pointer_err("OGR_G_ExportToGML"));
        }
        Ok(_owned_string(c_gml))
    }

    pub fn to_kml(&self) -> Result<String> {
        let c_kml = unsafe { gdal_sys::OGR_G_ExportToKML(self.c_geometry(), ptr::null()) };
        if c_kml.is_null() {
            return Err(_last_null_pointer_err("OGR_G_ExportToKML"));
        }
        Ok(_owned_string(c_kml))
    }

    /// Serializes to `format`; text formats come back as UTF-8 bytes.
    pub fn export(&self, format: GeometryFormat) -> Result<Vec<u8>> {
        match format {
            GeometryFormat::Wkt => self.to_wkt().map(String::into_bytes),
            GeometryFormat::Wkb => self.to_wkb(),
            GeometryFormat::GeoJson => self.to_geojson().map(String::into_bytes),
            GeometryFormat::Gml => self.to_gml().map(String::into_bytes),
            GeometryFormat::Kml => self.to_kml().map(String::into_bytes),
        }
    }
}
