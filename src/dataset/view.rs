use std::collections::BTreeSet;

use gdal_sys::OGRwkbGeometryType;
use log::debug;

use crate::datasource::{DataSource, ResultSet};
use crate::errors::{EasyOgrError, Result};
use crate::geometry::{Extent, Geometry};
use crate::layer::Layer;
use crate::record::Record;
use crate::schema::Schema;
use crate::spatial_ref::SpatialRef;
use crate::utils::_quote_identifier;

/// Builds the statement that opens a view.
pub(crate) fn view_sql(layer: &str, fields: Option<&[&str]>, clause: Option<&str>) -> String {
    let projection = match fields {
        None => "*".to_string(),
        Some(fields) if fields.is_empty() || fields == ["*"] => "*".to_string(),
        Some(fields) => fields
            .iter()
            .map(|field| _quote_identifier(field))
            .collect::<Vec<_>>()
            .join(", "),
    };
    let mut sql = format!("SELECT {projection} FROM {}", _quote_identifier(layer));
    if let Some(clause) = clause.map(str::trim).filter(|clause| !clause.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

/// The active layer of a [`super::Dataset`]: one OGR SQL result set plus the
/// metadata captured when it was opened.
#[derive(Debug)]
pub(crate) struct View {
    result: ResultSet<'static>,
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) geometry_type: OGRwkbGeometryType::Type,
    pub(crate) spatial_ref: Option<SpatialRef>,
    pub(crate) extent: Option<Extent>,
    pub(crate) has_fid_column: bool,
    /// Row identifiers in reading order. Position `i` of the view is `fids[i]`.
    pub(crate) fids: Vec<u64>,
    pub(crate) selection: Option<BTreeSet<u64>>,
}

impl View {
    /// Runs `sql` against `source` and indexes the resulting rows.
    ///
    /// # Safety
    /// The returned view must be dropped before `source`.
    pub(crate) unsafe fn open(
        source: &DataSource,
        name: &str,
        sql: &str,
        intersects: Option<&Geometry>,
    ) -> Result<View> {
        let result = source.execute_sql(sql, intersects)?.ok_or_else(|| {
            EasyOgrError::Query(format!("'{sql}' did not produce a layer"))
        })?;
        let result = result.detach();
        let layer = result.layer();
        let schema = layer.schema();
        let geometry_type = layer.geometry_type();
        let spatial_ref = layer.spatial_ref();
        let extent = layer.extent();
        let has_fid_column = layer.fid_column().is_some();
        let fids = layer.fids();
        debug!("opened view on {name} with {} rows: {sql}", fids.len());
        Ok(View {
            result,
            name: name.to_string(),
            schema,
            geometry_type,
            spatial_ref,
            extent,
            has_fid_column,
            fids,
            selection: None,
        })
    }

    pub(crate) fn layer(&self) -> Layer<'_> {
        self.result.layer()
    }

    /// Rows visible through the selection, in identifier order.
    pub(crate) fn row_ids(&self) -> Vec<u64> {
        match &self.selection {
            Some(selection) => selection.iter().copied().collect(),
            None => self.fids.clone(),
        }
    }

    pub(crate) fn feature_count(&self) -> usize {
        self.selection.as_ref().map_or(self.fids.len(), BTreeSet::len)
    }

    pub(crate) fn read(&self, fid: u64) -> Result<Record> {
        let layer = self.layer();
        let feature = layer.feature(fid).ok_or_else(|| {
            EasyOgrError::DataSource(format!("feature {fid} vanished from {}", self.name))
        })?;
        feature.to_record()
    }
}
