use log::trace;

use crate::errors::Result;
use crate::geometry::{Geometry, SpatialPredicate};
use crate::query::{Expression, Query};
use crate::record::{checked_overlay, Overlay, Record, ResultPolicy};
use crate::spatial_ref::{CoordTransform, SpatialRef};
use crate::value::FieldValue;

/// The value written by a calculate stage.
#[derive(Clone, Debug)]
pub enum Assignment {
    Value(FieldValue),
    /// Evaluated against each record's attributes before the assignment.
    Expression(Expression),
}

impl From<FieldValue> for Assignment {
    fn from(value: FieldValue) -> Self {
        Assignment::Value(value)
    }
}

impl From<Expression> for Assignment {
    fn from(expression: Expression) -> Self {
        Assignment::Expression(expression)
    }
}

/// One step of a [`Pipeline`]. Field positions refer to the schema as it was when
/// the stage was appended.
#[derive(Debug)]
pub(crate) enum Stage {
    AttributeFilter(Query),
    SpatialFilter {
        predicate: SpatialPredicate,
        operand: Geometry,
    },
    AddField(FieldValue),
    DropFields(Vec<usize>),
    Buffer(f64),
    Overlay {
        operation: Overlay,
        operand: Geometry,
        policy: ResultPolicy,
    },
    Project(SpatialRef),
    Transform(CoordTransform),
    Calculate {
        index: usize,
        value: Assignment,
        clause: Option<Query>,
    },
}

impl Stage {
    /// Runs the stage on one record; `None` drops the record.
    fn apply(&self, mut record: Record) -> Result<Option<Record>> {
        match self {
            Stage::AttributeFilter(query) => {
                Ok(query.test(record.attributes())?.then_some(record))
            }
            Stage::SpatialFilter { predicate, operand } => {
                Ok(predicate.evaluate(record.geometry(), operand).then_some(record))
            }
            Stage::AddField(default) => {
                record.attributes_mut().push(default.clone());
                Ok(Some(record))
            }
            Stage::DropFields(indices) => {
                record.remove_attributes(indices);
                Ok(Some(record))
            }
            Stage::Buffer(distance) => record.buffer(*distance).map(Some),
            Stage::Overlay {
                operation,
                operand,
                policy,
            } => checked_overlay(&record, operand, *policy, |a, b| operation.apply(a, b)),
            Stage::Project(spatial_ref) => {
                record.project(spatial_ref);
                Ok(Some(record))
            }
            Stage::Transform(transform) => {
                record.transform_with(transform)?;
                Ok(Some(record))
            }
            Stage::Calculate {
                index,
                value,
                clause,
            } => {
                if let Some(clause) = clause {
                    if !clause.test(record.attributes())? {
                        return Ok(Some(record));
                    }
                }
                let value = match value {
                    Assignment::Value(value) => value.clone(),
                    Assignment::Expression(expression) => expression.evaluate(record.attributes())?,
                };
                record.set(*index, value)?;
                Ok(Some(record))
            }
        }
    }
}

/// An ordered list of stages folded over each record as it is pulled.
#[derive(Debug, Default)]
pub(crate) struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub(crate) fn push(&mut self, stage: Stage) {
        trace!("appending pipeline stage {}: {stage:?}", self.stages.len());
        self.stages.push(stage);
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }

    /// Passes `record` through every stage, stopping at the first that drops it.
    pub(crate) fn run(&self, record: Record) -> Result<Option<Record>> {
        self.stages
            .iter()
            .try_fold(Some(record), |record, stage| match record {
                Some(record) => stage.apply(record),
                None => Ok(None),
            })
    }
}
