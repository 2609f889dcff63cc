//! Attribute clauses compiled against an ordered list of field names.
//!
//! A clause such as `score >= 5 and name != 'a'` is tokenized and parsed once into
//! an expression tree whose identifiers are bound to field positions. The tree is
//! then evaluated against any row of attribute values with the same field order.
//!
//! ```
//! use easy_ogr::{FieldValue, Query};
//!
//! let query = Query::compile(&["name", "score"], "score >= 5 and name in ('b', 'c')").unwrap();
//! let row = vec![FieldValue::from("b"), FieldValue::from(5)];
//! assert!(query.test(&row).unwrap());
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::errors::{EasyOgrError, Result};
use crate::value::FieldValue;

mod lexer;
mod parser;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(FieldValue),
    Field(usize),
    Neg(Box<Expr>),
    Binary(ArithOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` holds when every adjacent pair holds.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    In {
        value: Box<Expr>,
        items: Vec<Expr>,
        negated: bool,
    },
    IsNull {
        value: Box<Expr>,
        negated: bool,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn evaluate(&self, row: &[FieldValue]) -> Result<FieldValue> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Field(index) => row.get(*index).cloned().ok_or_else(|| {
                EasyOgrError::Schema(format!(
                    "row has {} attributes, clause reads attribute {index}",
                    row.len()
                ))
            }),
            Expr::Neg(inner) => negate(inner.evaluate(row)?),
            Expr::Binary(op, left, right) => arithmetic(*op, left.evaluate(row)?, right.evaluate(row)?),
            Expr::Compare { first, rest } => {
                let mut left = first.evaluate(row)?;
                for (op, next) in rest {
                    let right = next.evaluate(row)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(false.into());
                    }
                    left = right;
                }
                Ok(true.into())
            }
            Expr::In {
                value,
                items,
                negated,
            } => {
                let value = value.evaluate(row)?;
                let mut found = false;
                for item in items {
                    if equals(&value, &item.evaluate(row)?) {
                        found = true;
                        break;
                    }
                }
                Ok((found != *negated).into())
            }
            Expr::IsNull { value, negated } => Ok((value.evaluate(row)?.is_null() != *negated).into()),
            Expr::Not(inner) => Ok((!inner.evaluate(row)?.is_truthy()).into()),
            Expr::And(left, right) => {
                let left = left.evaluate(row)?;
                if left.is_truthy() {
                    right.evaluate(row)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = left.evaluate(row)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    right.evaluate(row)
                }
            }
        }
    }
}

fn type_error(op: impl fmt::Debug, left: &FieldValue, right: &FieldValue) -> EasyOgrError {
    EasyOgrError::Query(format!(
        "unsupported operand types for {op:?}: {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn negate(value: FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::Null => Ok(FieldValue::Null),
        FieldValue::Integer(v) => v
            .checked_neg()
            .map(FieldValue::Integer)
            .ok_or_else(|| EasyOgrError::Query("integer overflow".to_string())),
        FieldValue::Real(v) => Ok(FieldValue::Real(-v)),
        other => Err(EasyOgrError::Query(format!(
            "cannot negate a {} value",
            other.type_name()
        ))),
    }
}

fn floor_rem_i64(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
}

fn floor_rem_f64(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn arithmetic(op: ArithOp, left: FieldValue, right: FieldValue) -> Result<FieldValue> {
    let overflow = || EasyOgrError::Query("integer overflow".to_string());
    let zero = || EasyOgrError::Query("division by zero".to_string());
    match (&left, &right) {
        (FieldValue::Null, _) | (_, FieldValue::Null) => Ok(FieldValue::Null),
        (FieldValue::Integer(a), FieldValue::Integer(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                ArithOp::Add => a.checked_add(b).ok_or_else(overflow)?,
                ArithOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
                ArithOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
                ArithOp::Div if b == 0 => return Err(zero()),
                ArithOp::Div => return Ok(FieldValue::Real(a as f64 / b as f64)),
                ArithOp::Rem if b == 0 => return Err(zero()),
                ArithOp::Rem => floor_rem_i64(a, b).ok_or_else(overflow)?,
            };
            Ok(FieldValue::Integer(value))
        }
        (FieldValue::String(a), FieldValue::String(b)) if op == ArithOp::Add => {
            Ok(FieldValue::String(format!("{a}{b}")))
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(type_error(op, &left, &right));
            };
            let value = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div | ArithOp::Rem if b == 0.0 => return Err(zero()),
                ArithOp::Div => a / b,
                ArithOp::Rem => floor_rem_f64(a, b),
            };
            Ok(FieldValue::Real(value))
        }
    }
}

fn equals(left: &FieldValue, right: &FieldValue) -> bool {
    match (left, right) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
        (FieldValue::Date(_) | FieldValue::DateTime(_), FieldValue::String(s))
        | (FieldValue::String(s), FieldValue::Date(_) | FieldValue::DateTime(_)) => {
            let temporal = if left.as_str().is_some() { right } else { left };
            temporal.to_string() == *s
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

/// Ordering of two values; `None` when either side is null.
fn ordering(left: &FieldValue, right: &FieldValue) -> Result<Option<Ordering>> {
    let ordering = match (left, right) {
        (FieldValue::Null, _) | (_, FieldValue::Null) => return Ok(None),
        (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
        (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
        (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
        (FieldValue::DateTime(a), FieldValue::DateTime(b)) => Some(a.cmp(b)),
        (FieldValue::Date(_) | FieldValue::DateTime(_), FieldValue::String(s)) => {
            Some(left.to_string().as_str().cmp(s.as_str()))
        }
        (FieldValue::String(s), FieldValue::Date(_) | FieldValue::DateTime(_)) => {
            Some(s.as_str().cmp(right.to_string().as_str()))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(type_error("ordering", left, right)),
        },
    };
    Ok(ordering)
}

fn compare(op: CmpOp, left: &FieldValue, right: &FieldValue) -> Result<bool> {
    match op {
        CmpOp::Eq => Ok(equals(left, right)),
        CmpOp::Ne => Ok(!equals(left, right)),
        _ => {
            let Some(ordering) = ordering(left, right)? else {
                return Ok(false);
            };
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

/// A compiled value expression over a row of attributes.
#[derive(Clone, Debug)]
pub struct Expression {
    text: String,
    expr: Expr,
}

impl Expression {
    /// Compiles `text` against `fields`; unknown field names are rejected here.
    pub fn compile<S: AsRef<str>>(fields: &[S], text: &str) -> Result<Expression> {
        let tokens = lexer::tokenize(text)?;
        if tokens.is_empty() {
            return Err(EasyOgrError::Query("empty clause".to_string()));
        }
        let expr = parser::Parser::new(tokens, fields).parse()?;
        Ok(Expression {
            text: text.to_string(),
            expr,
        })
    }

    pub fn evaluate(&self, row: &[FieldValue]) -> Result<FieldValue> {
        self.expr.evaluate(row)
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A compiled boolean clause. Rows pass when the clause value is truthy.
#[derive(Clone, Debug)]
pub struct Query {
    expression: Expression,
}

impl Query {
    pub fn compile<S: AsRef<str>>(fields: &[S], clause: &str) -> Result<Query> {
        Ok(Query {
            expression: Expression::compile(fields, clause)?,
        })
    }

    pub fn test(&self, row: &[FieldValue]) -> Result<bool> {
        Ok(self.expression.evaluate(row)?.is_truthy())
    }

    pub fn text(&self) -> &str {
        self.expression.text()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expression.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::*;

    const FIELDS: [&str; 5] = ["name", "score", "ratio", "born", "Notes"];

    fn row() -> Vec<FieldValue> {
        vec![
            FieldValue::from("b"),
            FieldValue::from(5),
            FieldValue::from(0.5),
            FieldValue::Date(NaiveDate::from_ymd_opt(1990, 4, 1).unwrap()),
            FieldValue::Null,
        ]
    }

    #[rstest]
    #[case("score >= 5", true)]
    #[case("score = 5", true)]
    #[case("score == 5.0", true)]
    #[case("score <> 5", false)]
    #[case("score != 4", true)]
    #[case("1 < score < 10", true)]
    #[case("1 < score < 3", false)]
    #[case("name = 'b' and score > 1", true)]
    #[case("name = 'a' or ratio < 1", true)]
    #[case("not name = 'b'", false)]
    #[case("name in ('a', 'b')", true)]
    #[case("name not in ['a', 'b']", false)]
    #[case("score in ()", false)]
    #[case("notes is None", true)]
    #[case("NOTES is not null", false)]
    #[case("notes > 1", false)]
    #[case("notes == None", true)]
    #[case("SCORE * 2 - 1 == 9", true)]
    #[case("score / 2 == 2.5", true)]
    #[case("-score % 3 == 1", true)]
    #[case("(score + 1) * 2 == 12", true)]
    #[case("score + 1 * 2 == 7", true)]
    #[case("name + 'x' == 'bx'", true)]
    #[case("name == 5", false)]
    #[case("born == '1990-04-01'", true)]
    #[case("born > '1989-12-31'", true)]
    #[case("`score` > 4", true)]
    #[case("ratio", true)]
    #[case("notes + 1", false)]
    #[case("True and not False", true)]
    fn test_clauses(#[case] clause: &str, #[case] expected: bool) {
        let query = Query::compile(&FIELDS, clause).unwrap();
        assert_eq!(query.test(&row()).unwrap(), expected, "{clause}");
    }

    #[rstest]
    #[case("missing > 1")]
    #[case("score >")]
    #[case("score > 1 1")]
    #[case("(score > 1")]
    #[case("score is 5")]
    #[case("")]
    #[case("name not like 'x'")]
    fn test_compile_errors(#[case] clause: &str) {
        let err = Query::compile(&FIELDS, clause).unwrap_err();
        assert!(matches!(err, EasyOgrError::Query(_)), "{clause}: {err}");
    }

    #[rstest]
    #[case("name > 1")]
    #[case("score / 0")]
    #[case("score % 0")]
    #[case("-name")]
    #[case("name - 'a'")]
    fn test_evaluation_errors(#[case] clause: &str) {
        let query = Query::compile(&FIELDS, clause).unwrap();
        assert!(matches!(query.test(&row()), Err(EasyOgrError::Query(_))));
    }

    #[test]
    fn test_exact_name_wins_over_case_insensitive() {
        let query = Query::compile(&["a", "A"], "A == 2").unwrap();
        let row = vec![FieldValue::from(1), FieldValue::from(2)];
        assert!(query.test(&row).unwrap());
    }

    #[test]
    fn test_expression_values() {
        let expression = Expression::compile(&FIELDS, "score * ratio").unwrap();
        assert_eq!(expression.evaluate(&row()).unwrap(), FieldValue::Real(2.5));
        let expression = Expression::compile(&FIELDS, "notes or name").unwrap();
        assert_eq!(expression.evaluate(&row()).unwrap(), FieldValue::from("b"));
        let expression = Expression::compile(&FIELDS, "7 // 2").unwrap_err();
        assert!(matches!(expression, EasyOgrError::Query(_)));
        assert_eq!(Expression::compile(&FIELDS, "score + 1").unwrap().to_string(), "score + 1");
    }

    #[test]
    fn test_short_rows_are_schema_errors() {
        let query = Query::compile(&FIELDS, "notes is None").unwrap();
        let err = query.test(&row()[..2]).unwrap_err();
        assert!(matches!(err, EasyOgrError::Schema(_)));
    }
}
