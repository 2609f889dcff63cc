use std::ffi::{c_char, c_int, c_long, CString};
use std::fmt::{self, Debug, Formatter};
use std::ptr::{self, null_mut};
use std::str::FromStr;

use gdal_sys::{OGRErr, OGRSpatialReferenceH, OSRAxisMappingStrategy};

use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _owned_string, _string};

/// The ways a spatial reference can be described on input.
#[derive(Clone, Debug, PartialEq)]
pub enum SrsDefinition {
    Wkt(String),
    Proj4(String),
    Url(String),
    Esri(String),
    Epsg(u32),
    /// EPSG code honoring the authority's axis order for geographic systems.
    EpsgA(u32),
    Pci {
        projection: String,
        units: String,
        parameters: Vec<f64>,
    },
    Usgs {
        projection_system: i64,
        zone: i64,
        parameters: Vec<f64>,
        datum: i64,
    },
    Xml(String),
    Erm {
        projection: String,
        datum: String,
        units: String,
    },
}

/// The serializations a spatial reference can be exported to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SrsFormat {
    PrettyWkt,
    Wkt,
    Proj4,
    Xml,
    /// The EPSG authority code.
    Epsg,
}

impl FromStr for SrsFormat {
    type Err = EasyOgrError;

    fn from_str(s: &str) -> Result<SrsFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prettywkt" | "pretty_wkt" => Ok(SrsFormat::PrettyWkt),
            "wkt" => Ok(SrsFormat::Wkt),
            "proj4" => Ok(SrsFormat::Proj4),
            "xml" => Ok(SrsFormat::Xml),
            "epsg" => Ok(SrsFormat::Epsg),
            other => Err(EasyOgrError::SpatialRef(format!(
                "unknown spatial reference format '{other}'"
            ))),
        }
    }
}

/// An OGR spatial reference. Reference counted by GDAL, released on drop.
///
/// Every reference built here uses the traditional GIS axis order
/// (easting/longitude first), whatever the authority says.
pub struct SpatialRef(OGRSpatialReferenceH);

impl Drop for SpatialRef {
    fn drop(&mut self) {
        unsafe { gdal_sys::OSRRelease(self.0) };
        self.0 = ptr::null_mut();
    }
}

impl Clone for SpatialRef {
    fn clone(&self) -> SpatialRef {
        let n_obj = unsafe { gdal_sys::OSRClone(self.0) };
        let rv = SpatialRef(n_obj);
        rv.use_traditional_axis_order();
        rv
    }
}

impl PartialEq for SpatialRef {
    fn eq(&self, other: &SpatialRef) -> bool {
        unsafe { gdal_sys::OSRIsSame(self.0, other.0) == 1 }
    }
}

impl Debug for SpatialRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_proj4() {
            Ok(proj4) => write!(f, "SpatialRef({})", proj4.trim()),
            Err(_) => f.write_str("SpatialRef(?)"),
        }
    }
}

fn import_result(rv: OGRErr::Type, method_name: &'static str) -> Result<()> {
    if rv != OGRErr::OGRERR_NONE {
        return Err(EasyOgrError::SpatialRef(format!(
            "{method_name} failed with {rv:?}"
        )));
    }
    Ok(())
}

impl SpatialRef {
    pub fn new() -> Result<SpatialRef> {
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(ptr::null()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        let rv = SpatialRef(c_obj);
        rv.use_traditional_axis_order();
        Ok(rv)
    }

    /// Builds a spatial reference from any of the supported definitions.
    pub fn import(definition: &SrsDefinition) -> Result<SpatialRef> {
        match definition {
            SrsDefinition::Wkt(wkt) => SpatialRef::from_wkt(wkt),
            SrsDefinition::Proj4(proj4) => SpatialRef::from_proj4(proj4),
            SrsDefinition::Url(url) => SpatialRef::from_url(url),
            SrsDefinition::Esri(esri) => SpatialRef::from_esri(esri),
            SrsDefinition::Epsg(code) => SpatialRef::from_epsg(*code),
            SrsDefinition::EpsgA(code) => SpatialRef::from_epsga(*code),
            SrsDefinition::Pci {
                projection,
                units,
                parameters,
            } => SpatialRef::from_pci(projection, units, parameters),
            SrsDefinition::Usgs {
                projection_system,
                zone,
                parameters,
                datum,
            } => SpatialRef::from_usgs(*projection_system, *zone, parameters, *datum),
            SrsDefinition::Xml(xml) => SpatialRef::from_xml(xml),
            SrsDefinition::Erm {
                projection,
                datum,
                units,
            } => SpatialRef::from_erm(projection, datum, units),
        }
    }

    /// Anything `OSRSetFromUserInput` understands: `EPSG:4326`, WKT, PROJ strings ...
    pub fn from_definition(definition: &str) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_definition = CString::new(definition)?;
        let err = unsafe { gdal_sys::OSRSetFromUserInput(rv.0, c_definition.as_ptr()) };
        import_result(err, "OSRSetFromUserInput")?;
        Ok(rv)
    }

    pub fn from_wkt(wkt: &str) -> Result<SpatialRef> {
        let c_str = CString::new(wkt)?;
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(c_str.as_ptr()) };
        if c_obj.is_null() {
            return Err(EasyOgrError::SpatialRef(format!("invalid WKT '{wkt}'")));
        }
        let rv = SpatialRef(c_obj);
        rv.use_traditional_axis_order();
        Ok(rv)
    }

    pub fn from_epsg(epsg_code: u32) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let err = unsafe { gdal_sys::OSRImportFromEPSG(rv.0, epsg_code as c_int) };
        import_result(err, "OSRImportFromEPSG")?;
        Ok(rv)
    }

    pub fn from_epsga(epsg_code: u32) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let err = unsafe { gdal_sys::OSRImportFromEPSGA(rv.0, epsg_code as c_int) };
        import_result(err, "OSRImportFromEPSGA")?;
        Ok(rv)
    }

    pub fn from_proj4(proj4_string: &str) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_str = CString::new(proj4_string)?;
        let err = unsafe { gdal_sys::OSRImportFromProj4(rv.0, c_str.as_ptr()) };
        import_result(err, "OSRImportFromProj4")?;
        Ok(rv)
    }

    pub fn from_url(url: &str) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_str = CString::new(url)?;
        let err = unsafe { gdal_sys::OSRImportFromUrl(rv.0, c_str.as_ptr()) };
        import_result(err, "OSRImportFromUrl")?;
        Ok(rv)
    }

    pub fn from_esri(esri_wkt: &str) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_str = CString::new(esri_wkt)?;
        let mut ptrs = vec![c_str.as_ptr() as *mut c_char, ptr::null_mut()];
        let err = unsafe { gdal_sys::OSRImportFromESRI(rv.0, ptrs.as_mut_ptr()) };
        import_result(err, "OSRImportFromESRI")?;
        Ok(rv)
    }

    pub fn from_pci(projection: &str, units: &str, parameters: &[f64]) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_projection = CString::new(projection)?;
        let c_units = CString::new(units)?;
        // OSRImportFromPCI reads 17 parameters when given any.
        let mut params = parameters.to_vec();
        let params_ptr = if params.is_empty() {
            null_mut()
        } else {
            params.resize(17.max(params.len()), 0.0);
            params.as_mut_ptr()
        };
        let err = unsafe {
            gdal_sys::OSRImportFromPCI(rv.0, c_projection.as_ptr(), c_units.as_ptr(), params_ptr)
        };
        import_result(err, "OSRImportFromPCI")?;
        Ok(rv)
    }

    pub fn from_usgs(
        projection_system: i64,
        zone: i64,
        parameters: &[f64],
        datum: i64,
    ) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        // OSRImportFromUSGS reads 15 parameters.
        let mut params = parameters.to_vec();
        params.resize(15.max(params.len()), 0.0);
        let err = unsafe {
            gdal_sys::OSRImportFromUSGS(
                rv.0,
                projection_system as c_long,
                zone as c_long,
                params.as_mut_ptr(),
                datum as c_long,
            )
        };
        import_result(err, "OSRImportFromUSGS")?;
        Ok(rv)
    }

    pub fn from_xml(xml: &str) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_str = CString::new(xml)?;
        let err = unsafe { gdal_sys::OSRImportFromXML(rv.0, c_str.as_ptr()) };
        import_result(err, "OSRImportFromXML")?;
        Ok(rv)
    }

    pub fn from_erm(projection: &str, datum: &str, units: &str) -> Result<SpatialRef> {
        let rv = SpatialRef::new()?;
        let c_projection = CString::new(projection)?;
        let c_datum = CString::new(datum)?;
        let c_units = CString::new(units)?;
        let err = unsafe {
            gdal_sys::OSRImportFromERM(
                rv.0,
                c_projection.as_ptr(),
                c_datum.as_ptr(),
                c_units.as_ptr(),
            )
        };
        import_result(err, "OSRImportFromERM")?;
        Ok(rv)
    }

    /// Takes a new reference on a spatial reference owned by GDAL.
    ///
    /// # Safety
    /// `c_obj` must be a valid spatial reference.
    pub unsafe fn from_c_obj(c_obj: OGRSpatialReferenceH) -> Result<SpatialRef> {
        let mut_c_obj = gdal_sys::OSRClone(c_obj);
        if mut_c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRClone"));
        }
        let rv = SpatialRef(mut_c_obj);
        rv.use_traditional_axis_order();
        Ok(rv)
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_spatial_ref(&self) -> OGRSpatialReferenceH {
        self.0
    }

    fn use_traditional_axis_order(&self) {
        unsafe {
            gdal_sys::OSRSetAxisMappingStrategy(
                self.0,
                OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
            )
        };
    }

    pub fn to_wkt(&self) -> Result<String> {
        let mut c_wkt = null_mut();
        let rv = unsafe { gdal_sys::OSRExportToWkt(self.0, &mut c_wkt) };
        ogr_result(rv, "OSRExportToWkt")?;
        Ok(_owned_string(c_wkt))
    }

    pub fn to_pretty_wkt(&self) -> Result<String> {
        let mut c_wkt = null_mut();
        let rv = unsafe { gdal_sys::OSRExportToPrettyWkt(self.0, &mut c_wkt, false as c_int) };
        ogr_result(rv, "OSRExportToPrettyWkt")?;
        Ok(_owned_string(c_wkt))
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut c_raw_xml = null_mut();
        let rv = unsafe { gdal_sys::OSRExportToXML(self.0, &mut c_raw_xml, ptr::null()) };
        ogr_result(rv, "OSRExportToXML")?;
        Ok(_owned_string(c_raw_xml))
    }

    pub fn to_proj4(&self) -> Result<String> {
        let mut c_proj4str = null_mut();
        let rv = unsafe { gdal_sys::OSRExportToProj4(self.0, &mut c_proj4str) };
        ogr_result(rv, "OSRExportToProj4")?;
        Ok(_owned_string(c_proj4str))
    }

    /// The EPSG code from the root `AUTHORITY` node.
    pub fn epsg(&self) -> Option<u32> {
        let c_name = CString::new("AUTHORITY").ok()?;
        let authority = _string(unsafe { gdal_sys::OSRGetAttrValue(self.0, c_name.as_ptr(), 0) });
        if !authority.eq_ignore_ascii_case("EPSG") {
            return None;
        }
        let code = unsafe { gdal_sys::OSRGetAttrValue(self.0, c_name.as_ptr(), 1) };
        _string(code).parse().ok()
    }

    /// Serializes to `format`.
    pub fn export(&self, format: SrsFormat) -> Result<String> {
        match format {
            SrsFormat::PrettyWkt => self.to_pretty_wkt(),
            SrsFormat::Wkt => self.to_wkt(),
            SrsFormat::Proj4 => self.to_proj4(),
            SrsFormat::Xml => self.to_xml(),
            SrsFormat::Epsg => self.epsg().map(|code| code.to_string()).ok_or_else(|| {
                EasyOgrError::SpatialRef("spatial reference has no EPSG authority".into())
            }),
        }
    }

    /// Name of the linear unit, e.g. `metre`, and its size in metres.
    pub fn linear_units(&self) -> (String, f64) {
        let mut c_name = null_mut();
        let factor = unsafe { gdal_sys::OSRGetLinearUnits(self.0, &mut c_name) };
        (_string(c_name), factor)
    }

    pub fn angular_units(&self) -> (String, f64) {
        let mut c_name = null_mut();
        let factor = unsafe { gdal_sys::OSRGetAngularUnits(self.0, &mut c_name) };
        (_string(c_name), factor)
    }

    pub fn is_geographic(&self) -> bool {
        unsafe { gdal_sys::OSRIsGeographic(self.0) == 1 }
    }

    pub fn is_projected(&self) -> bool {
        unsafe { gdal_sys::OSRIsProjected(self.0) == 1 }
    }

    /// Units of the coordinates: angular for geographic systems, linear otherwise.
    pub fn units(&self) -> String {
        if self.is_geographic() {
            self.angular_units().0
        } else {
            self.linear_units().0
        }
    }
}
