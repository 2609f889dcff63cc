//! Feature-id selections and their combination modes.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use log::warn;

use crate::errors::{EasyOgrError, Result};
use crate::layer::Layer;

/// How a new test result combines with the current selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// Replace the selection with every row passing the test.
    #[default]
    New,
    /// Add passing rows that are not selected yet.
    Union,
    /// Keep only selected rows that pass.
    Intersection,
    /// Drop selected rows that pass.
    Difference,
}

impl FromStr for SelectionMode {
    type Err = EasyOgrError;

    fn from_str(s: &str) -> Result<SelectionMode> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(SelectionMode::New),
            "UNION" => Ok(SelectionMode::Union),
            "INTERSECTION" => Ok(SelectionMode::Intersection),
            "DIFFERENCE" => Ok(SelectionMode::Difference),
            other => Err(EasyOgrError::Query(format!(
                "unknown selection mode '{other}', expected NEW, UNION, INTERSECTION or DIFFERENCE"
            ))),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionMode::New => "NEW",
            SelectionMode::Union => "UNION",
            SelectionMode::Intersection => "INTERSECTION",
            SelectionMode::Difference => "DIFFERENCE",
        };
        f.write_str(name)
    }
}

/// Combines `current` with the rows passing `test`.
///
/// `current == None` means nothing has been selected yet and behaves like
/// [`SelectionMode::New`] whatever `mode` says. Only `New` and `Union` call `test` on
/// rows outside the current selection; the other modes only revisit selected ids.
pub fn apply_selection<F>(
    current: Option<&BTreeSet<u64>>,
    mode: SelectionMode,
    all_ids: &[u64],
    mut test: F,
) -> Result<BTreeSet<u64>>
where
    F: FnMut(u64) -> Result<bool>,
{
    let mut selected = BTreeSet::new();
    match (current, mode) {
        (None, _) | (_, SelectionMode::New) => {
            for &fid in all_ids {
                if test(fid)? {
                    selected.insert(fid);
                }
            }
        }
        (Some(current), SelectionMode::Union) => {
            selected.clone_from(current);
            for &fid in all_ids {
                if !current.contains(&fid) && test(fid)? {
                    selected.insert(fid);
                }
            }
        }
        (Some(current), SelectionMode::Intersection) => {
            for &fid in current {
                if test(fid)? {
                    selected.insert(fid);
                }
            }
        }
        (Some(current), SelectionMode::Difference) => {
            for &fid in current {
                if !test(fid)? {
                    selected.insert(fid);
                }
            }
        }
    }
    Ok(selected)
}

/// OGR SQL clause matching exactly `fids`.
pub(crate) fn fid_clause(fids: &BTreeSet<u64>) -> String {
    if fids.is_empty() {
        return "FID < 0".to_string();
    }
    let list: Vec<String> = fids.iter().map(u64::to_string).collect();
    format!("FID IN ({})", list.join(","))
}

/// Restricts a layer to a selection for as long as the guard lives.
///
/// A `None` selection leaves the layer untouched. The attribute filter is cleared on
/// drop, also when the guarded operation failed.
#[derive(Debug)]
pub struct SelectionFilter<'l, 'a> {
    layer: &'l Layer<'a>,
    active: bool,
}

impl<'l, 'a> SelectionFilter<'l, 'a> {
    pub fn new(layer: &'l Layer<'a>, selection: Option<&BTreeSet<u64>>) -> Result<Self> {
        let active = match selection {
            Some(fids) => {
                layer.set_attribute_filter(Some(&fid_clause(fids)))?;
                true
            }
            None => false,
        };
        Ok(SelectionFilter { layer, active })
    }
}

impl<'a> Deref for SelectionFilter<'_, 'a> {
    type Target = Layer<'a>;

    fn deref(&self) -> &Self::Target {
        self.layer
    }
}

impl Drop for SelectionFilter<'_, '_> {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = self.layer.set_attribute_filter(None) {
                warn!("failed to clear the selection filter on {}: {err}", self.layer.name());
            }
        }
    }
}
