//! Borrowed OGR layers and the features read from them.

use std::ffi::{c_int, CString};
use std::marker::PhantomData;
use std::ptr::null_mut;

use chrono::{Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};
use gdal_sys::{OGREnvelope, OGRFeatureH, OGRFieldType, OGRLayerH, OGRwkbGeometryType};

use crate::datasource::DataSource;
use crate::errors::*;
use crate::geometry::{Extent, Geometry};
use crate::record::Record;
use crate::schema::{FieldDefinition, FieldType, Schema};
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_error_msg, _last_null_pointer_err, _string};
use crate::value::FieldValue;

/// OGR encodes time zones as 0 (unknown), 1 (local), 100 (UTC) or
/// `100 + quarter hours east of UTC`.
const OGR_TZ_UTC: c_int = 100;

/// A layer owned by a [`DataSource`] or one of its result sets.
#[derive(Debug)]
pub struct Layer<'a> {
    c_layer: OGRLayerH,
    phantom: PhantomData<&'a DataSource>,
}

impl<'a> Layer<'a> {
    /// # Safety
    /// `c_layer` must stay valid for `'a`.
    pub unsafe fn from_c_layer(c_layer: OGRLayerH) -> Layer<'a> {
        Layer {
            c_layer,
            phantom: PhantomData,
        }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_layer(&self) -> OGRLayerH {
        self.c_layer
    }

    pub fn name(&self) -> String {
        _string(unsafe { gdal_sys::OGR_L_GetName(self.c_layer) })
    }

    pub fn schema(&self) -> Schema {
        let fields = unsafe {
            let c_defn = gdal_sys::OGR_L_GetLayerDefn(self.c_layer);
            let count = gdal_sys::OGR_FD_GetFieldCount(c_defn).max(0);
            (0..count)
                .map(|i| {
                    let c_field = gdal_sys::OGR_FD_GetFieldDefn(c_defn, i);
                    let name = _string(gdal_sys::OGR_Fld_GetNameRef(c_field));
                    FieldDefinition::new(
                        &name,
                        FieldType::from_ogr(gdal_sys::OGR_Fld_GetType(c_field)),
                    )
                    .with_width(gdal_sys::OGR_Fld_GetWidth(c_field))
                    .with_precision(gdal_sys::OGR_Fld_GetPrecision(c_field))
                })
                .collect()
        };
        Schema::new(fields)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.schema().names()
    }

    pub fn geometry_type(&self) -> OGRwkbGeometryType::Type {
        unsafe { gdal_sys::OGR_L_GetGeomType(self.c_layer) }
    }

    pub fn spatial_ref(&self) -> Option<SpatialRef> {
        let c_srs = unsafe { gdal_sys::OGR_L_GetSpatialRef(self.c_layer) };
        if c_srs.is_null() {
            return None;
        }
        unsafe { SpatialRef::from_c_obj(c_srs) }.ok()
    }

    /// Bounding box of every feature, `None` for layers without geometries.
    pub fn extent(&self) -> Option<Extent> {
        let mut envelope = OGREnvelope {
            MinX: 0.0,
            MaxX: 0.0,
            MinY: 0.0,
            MaxY: 0.0,
        };
        let rv = unsafe { gdal_sys::OGR_L_GetExtent(self.c_layer, &mut envelope, 1) };
        if rv != gdal_sys::OGRErr::OGRERR_NONE {
            return None;
        }
        Some(Extent::from(envelope))
    }

    /// Number of features passing the current filters.
    pub fn feature_count(&self) -> u64 {
        let rv = unsafe { gdal_sys::OGR_L_GetFeatureCount(self.c_layer, 1) };
        rv.max(0) as u64
    }

    /// Name of the column backing the feature ids, if the source has one.
    pub fn fid_column(&self) -> Option<String> {
        let name = _string(unsafe { gdal_sys::OGR_L_GetFIDColumn(self.c_layer) });
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    pub fn reset_reading(&self) {
        unsafe { gdal_sys::OGR_L_ResetReading(self.c_layer) };
    }

    pub fn next_feature(&self) -> Option<NativeFeature<'_>> {
        let c_feature = unsafe { gdal_sys::OGR_L_GetNextFeature(self.c_layer) };
        if c_feature.is_null() {
            return None;
        }
        Some(unsafe { NativeFeature::from_c_feature(c_feature) })
    }

    /// Reads the feature with id `fid`.
    pub fn feature(&self, fid: u64) -> Option<NativeFeature<'_>> {
        let c_feature = unsafe { gdal_sys::OGR_L_GetFeature(self.c_layer, fid as i64) };
        if c_feature.is_null() {
            return None;
        }
        Some(unsafe { NativeFeature::from_c_feature(c_feature) })
    }

    /// Iterates from the start of the layer.
    pub fn features(&self) -> FeatureIterator<'_> {
        self.reset_reading();
        FeatureIterator { layer: self }
    }

    /// Ids of every feature passing the current filters, in reading order.
    pub fn fids(&self) -> Vec<u64> {
        let fids = self
            .features()
            .filter_map(|feature| feature.fid())
            .collect();
        self.reset_reading();
        fids
    }

    /// Sets or clears (`None`) an OGR SQL attribute filter.
    pub fn set_attribute_filter(&self, clause: Option<&str>) -> Result<()> {
        let c_clause = clause.map(CString::new).transpose()?;
        let rv = unsafe {
            gdal_sys::OGR_L_SetAttributeFilter(
                self.c_layer,
                c_clause.as_ref().map_or(std::ptr::null(), |c| c.as_ptr()),
            )
        };
        if rv != gdal_sys::OGRErr::OGRERR_NONE {
            return Err(EasyOgrError::Query(format!(
                "invalid attribute filter {:?}: {}",
                clause.unwrap_or_default(),
                _last_error_msg()
            )));
        }
        Ok(())
    }

    pub fn set_spatial_filter(&self, geometry: Option<&Geometry>) {
        let c_geometry = match geometry {
            Some(geometry) => unsafe { geometry.c_geometry() },
            None => null_mut(),
        };
        unsafe { gdal_sys::OGR_L_SetSpatialFilter(self.c_layer, c_geometry) };
    }

    pub fn create_field(&self, field: &FieldDefinition) -> Result<()> {
        let c_name = CString::new(field.name.as_str())?;
        unsafe {
            let c_field = gdal_sys::OGR_Fld_Create(c_name.as_ptr(), field.field_type.to_ogr());
            if c_field.is_null() {
                return Err(_last_null_pointer_err("OGR_Fld_Create"));
            }
            gdal_sys::OGR_Fld_SetWidth(c_field, field.width);
            gdal_sys::OGR_Fld_SetPrecision(c_field, field.precision);
            let rv = gdal_sys::OGR_L_CreateField(self.c_layer, c_field, 1);
            gdal_sys::OGR_Fld_Destroy(c_field);
            ogr_result(rv, "OGR_L_CreateField")
        }
    }

    /// Appends `record`, matching attributes to fields by position.
    ///
    /// The record must carry exactly one attribute per field of the layer.
    pub fn write_record(&self, record: &Record) -> Result<()> {
        let mut feature = NativeFeature::new(self)?;
        let field_count = feature.field_count();
        if record.len() != field_count {
            return Err(EasyOgrError::Schema(format!(
                "record has {} attributes but layer {} has {field_count} fields",
                record.len(),
                self.name()
            )));
        }
        for (idx, value) in record.attributes().iter().enumerate() {
            feature.set_field(idx, value)?;
        }
        feature.set_geometry(record.geometry())?;
        let rv = unsafe { gdal_sys::OGR_L_CreateFeature(self.c_layer, feature.c_feature) };
        ogr_result(rv, "OGR_L_CreateFeature")
    }
}

/// Reads a layer sequentially, see [`Layer::features`].
pub struct FeatureIterator<'a> {
    layer: &'a Layer<'a>,
}

impl<'a> Iterator for FeatureIterator<'a> {
    type Item = NativeFeature<'a>;

    #[inline]
    fn next(&mut self) -> Option<NativeFeature<'a>> {
        let c_feature = unsafe { gdal_sys::OGR_L_GetNextFeature(self.layer.c_layer) };
        if c_feature.is_null() {
            return None;
        }
        Some(unsafe { NativeFeature::from_c_feature(c_feature) })
    }
}

/// An OGR feature, destroyed on drop. Decode it with [`NativeFeature::to_record`].
#[derive(Debug)]
pub struct NativeFeature<'a> {
    c_feature: OGRFeatureH,
    phantom: PhantomData<&'a Layer<'a>>,
}

impl<'a> NativeFeature<'a> {
    /// A blank feature following the field definitions of `layer`.
    pub fn new(layer: &'a Layer<'_>) -> Result<NativeFeature<'a>> {
        let c_feature = unsafe {
            let c_defn = gdal_sys::OGR_L_GetLayerDefn(layer.c_layer);
            gdal_sys::OGR_F_Create(c_defn)
        };
        if c_feature.is_null() {
            return Err(_last_null_pointer_err("OGR_F_Create"));
        }
        Ok(unsafe { NativeFeature::from_c_feature(c_feature) })
    }

    /// # Safety
    /// Takes ownership of `c_feature`.
    pub unsafe fn from_c_feature(c_feature: OGRFeatureH) -> NativeFeature<'a> {
        NativeFeature {
            c_feature,
            phantom: PhantomData,
        }
    }

    pub fn fid(&self) -> Option<u64> {
        let rv = unsafe { gdal_sys::OGR_F_GetFID(self.c_feature) };
        if rv < 0 {
            None
        } else {
            Some(rv as u64)
        }
    }

    pub fn field_count(&self) -> usize {
        let rv = unsafe { gdal_sys::OGR_F_GetFieldCount(self.c_feature) };
        rv.max(0) as usize
    }

    fn field_type(&self, idx: c_int) -> OGRFieldType::Type {
        unsafe {
            let c_field = gdal_sys::OGR_F_GetFieldDefnRef(self.c_feature, idx);
            gdal_sys::OGR_Fld_GetType(c_field)
        }
    }

    fn check_index(&self, idx: usize) -> Result<c_int> {
        let count = self.field_count();
        if idx >= count {
            return Err(EasyOgrError::Schema(format!(
                "field index {idx} is out of range for a feature with {count} fields"
            )));
        }
        Ok(idx as c_int)
    }

    pub fn field_value(&self, idx: usize) -> Result<FieldValue> {
        let c_idx = self.check_index(idx)?;
        let is_set = unsafe { gdal_sys::OGR_F_IsFieldSetAndNotNull(self.c_feature, c_idx) };
        if is_set == 0 {
            return Ok(FieldValue::Null);
        }
        let value = unsafe {
            match self.field_type(c_idx) {
                OGRFieldType::OFTInteger => {
                    FieldValue::Integer(gdal_sys::OGR_F_GetFieldAsInteger(self.c_feature, c_idx) as i64)
                }
                OGRFieldType::OFTInteger64 => {
                    FieldValue::Integer(gdal_sys::OGR_F_GetFieldAsInteger64(self.c_feature, c_idx))
                }
                OGRFieldType::OFTReal => {
                    FieldValue::Real(gdal_sys::OGR_F_GetFieldAsDouble(self.c_feature, c_idx))
                }
                OGRFieldType::OFTDate => self.date_value(c_idx, false)?,
                OGRFieldType::OFTDateTime => self.date_value(c_idx, true)?,
                _ => FieldValue::String(_string(gdal_sys::OGR_F_GetFieldAsString(
                    self.c_feature,
                    c_idx,
                ))),
            }
        };
        Ok(value)
    }

    fn date_value(&self, c_idx: c_int, with_time: bool) -> Result<FieldValue> {
        let (mut year, mut month, mut day, mut hour, mut minute, mut tz) = (0, 0, 0, 0, 0, 0);
        let mut second: f32 = 0.0;
        let rv = unsafe {
            gdal_sys::OGR_F_GetFieldAsDateTimeEx(
                self.c_feature,
                c_idx,
                &mut year,
                &mut month,
                &mut day,
                &mut hour,
                &mut minute,
                &mut second,
                &mut tz,
            )
        };
        let invalid = || EasyOgrError::Schema(format!("field {c_idx} holds an invalid date"));
        if rv == 0 {
            return Err(invalid());
        }
        let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(invalid)?;
        if !with_time {
            return Ok(FieldValue::Date(date));
        }
        let millis = (second.fract() * 1000.0).round() as u32;
        let naive = date
            .and_hms_milli_opt(hour as u32, minute as u32, second.trunc() as u32, millis.min(999))
            .ok_or_else(invalid)?;
        // Unknown and local time zones are read as UTC.
        let offset_seconds = if tz > 1 { (tz - OGR_TZ_UTC) * 15 * 60 } else { 0 };
        let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(invalid)?;
        let datetime = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(invalid)?;
        Ok(FieldValue::DateTime(datetime))
    }

    pub fn set_field(&mut self, idx: usize, value: &FieldValue) -> Result<()> {
        let c_idx = self.check_index(idx)?;
        unsafe {
            match value {
                FieldValue::Null => gdal_sys::OGR_F_SetFieldNull(self.c_feature, c_idx),
                FieldValue::Integer(v) => {
                    gdal_sys::OGR_F_SetFieldInteger64(self.c_feature, c_idx, *v)
                }
                FieldValue::Real(v) => gdal_sys::OGR_F_SetFieldDouble(self.c_feature, c_idx, *v),
                FieldValue::String(v) => {
                    let c_value = CString::new(v.as_str())?;
                    gdal_sys::OGR_F_SetFieldString(self.c_feature, c_idx, c_value.as_ptr())
                }
                FieldValue::Date(date) => gdal_sys::OGR_F_SetFieldDateTimeEx(
                    self.c_feature,
                    c_idx,
                    date.year(),
                    date.month() as c_int,
                    date.day() as c_int,
                    0,
                    0,
                    0.0,
                    0,
                ),
                FieldValue::DateTime(datetime) => {
                    let seconds =
                        datetime.second() as f32 + datetime.nanosecond() as f32 / 1_000_000_000.0;
                    let tz = OGR_TZ_UTC + datetime.offset().local_minus_utc() / (15 * 60);
                    gdal_sys::OGR_F_SetFieldDateTimeEx(
                        self.c_feature,
                        c_idx,
                        datetime.year(),
                        datetime.month() as c_int,
                        datetime.day() as c_int,
                        datetime.hour() as c_int,
                        datetime.minute() as c_int,
                        seconds,
                        tz,
                    )
                }
            }
        }
        Ok(())
    }

    /// A copy of the feature geometry; an empty collection when there is none.
    pub fn geometry(&self) -> Result<Geometry> {
        unsafe { Geometry::clone_from_c(gdal_sys::OGR_F_GetGeometryRef(self.c_feature)) }
    }

    pub fn set_geometry(&mut self, geometry: &Geometry) -> Result<()> {
        let rv = unsafe { gdal_sys::OGR_F_SetGeometry(self.c_feature, geometry.c_geometry()) };
        ogr_result(rv, "OGR_F_SetGeometry")
    }

    /// Detaches geometry and attributes from the native feature.
    pub fn to_record(&self) -> Result<Record> {
        let attributes = (0..self.field_count())
            .map(|idx| self.field_value(idx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Record::from_parts(self.geometry()?, attributes))
    }
}

impl Drop for NativeFeature<'_> {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_F_Destroy(self.c_feature) };
    }
}
