//! The search expression grammar (spec.md §4.7, C7).
//!
//! ```text
//! Expression  := Term | Logical
//! Term        := (attr_name, attr_type, op, value)
//! Logical     := (AND|OR, [Expression+]) | (NOT, [Expression])
//! op          ∈ { EQ, NE, LT, LE, GT, GE, IN, EXISTS }
//! ```

use catalogd_types::codec::AttrValue;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::model::ObjectType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum AttrType {
    Boolean,
    Integer,
    Float,
    Decimal,
    String,
    Date,
    Datetime,
}

impl AttrType {
    /// Whether `<`/`<=`/`>`/`>=` are meaningful for this type (spec.md
    /// §4.7 "LT/LE/GT/GE: only on ordered types").
    pub fn is_ordered(&self) -> bool {
        !matches!(self, AttrType::Boolean | AttrType::String)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub attr_name: String,
    pub attr_type: AttrType,
    pub op: Op,
    /// Absent only for `Op::Exists`, where no value is required.
    pub value: Option<AttrValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogicalKind {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Term(Term),
    Logical(LogicalKind, Vec<Expression>),
}

/// `SearchParameters` as passed to `search(tenant, params)` (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub object_type: ObjectType,
    pub expression: Option<Expression>,
    pub as_of: Option<DateTime<FixedOffset>>,
    /// Consider every version, not just the latest (spec.md §4.7 "Temporal
    /// scope").
    pub prior_versions: bool,
    /// Consider every tag of included versions (spec.md §4.7 "Temporal
    /// scope").
    pub prior_tags: bool,
}

impl SearchParameters {
    pub fn validate(&self) -> Result<(), crate::error::CatalogError> {
        if self.prior_tags && !self.prior_versions {
            // prior_tags without prior_versions is meaningful (every tag of
            // the latest version), so this is allowed; nothing to reject.
        }
        validate_expression(self.expression.as_ref())
    }
}

fn validate_expression(expr: Option<&Expression>) -> Result<(), crate::error::CatalogError> {
    let Some(expr) = expr else { return Ok(()) };
    match expr {
        Expression::Term(term) => validate_term(term),
        Expression::Logical(kind, children) => {
            if children.is_empty() {
                return Err(crate::error::CatalogError::InputValidation(
                    "logical expression requires at least one child".into(),
                ));
            }
            if matches!(kind, LogicalKind::Not) && children.len() != 1 {
                return Err(crate::error::CatalogError::InputValidation(
                    "NOT takes exactly one child expression".into(),
                ));
            }
            for child in children {
                validate_expression(Some(child))?;
            }
            Ok(())
        }
    }
}

fn validate_term(term: &Term) -> Result<(), crate::error::CatalogError> {
    match term.op {
        Op::Exists => Ok(()),
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            if !term.attr_type.is_ordered() {
                return Err(crate::error::CatalogError::InputValidation(format!(
                    "{:?} is not a valid operator for attribute type {}",
                    term.op, term.attr_type
                )));
            }
            if term.value.is_none() {
                return Err(crate::error::CatalogError::InputValidation(
                    "comparison operators require a value".into(),
                ));
            }
            Ok(())
        }
        Op::In => {
            if !matches!(term.value, Some(AttrValue::Array(_))) {
                return Err(crate::error::CatalogError::InputValidation(
                    "IN requires an array value".into(),
                ));
            }
            if term.attr_type == AttrType::Boolean {
                return Err(crate::error::CatalogError::InputValidation(
                    "IN is forbidden on BOOLEAN attributes".into(),
                ));
            }
            Ok(())
        }
        Op::Eq | Op::Ne => {
            if term.value.is_none() {
                return Err(crate::error::CatalogError::InputValidation(
                    "EQ/NE require a value".into(),
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogd_types::codec::PrimitiveValue;

    fn term(op: Op, attr_type: AttrType, value: Option<AttrValue>) -> Term {
        Term { attr_name: "region".to_string(), attr_type, op, value }
    }

    #[test]
    fn ordered_ops_reject_boolean() {
        let t = term(Op::Lt, AttrType::Boolean, Some(AttrValue::Scalar(PrimitiveValue::Bool(true))));
        assert!(validate_term(&t).is_err());
    }

    #[test]
    fn in_rejects_boolean_attr_type() {
        let t = term(
            Op::In,
            AttrType::Boolean,
            Some(AttrValue::Array(vec![PrimitiveValue::Bool(true)])),
        );
        assert!(validate_term(&t).is_err());
    }

    #[test]
    fn exists_needs_no_value() {
        let t = term(Op::Exists, AttrType::String, None);
        assert!(validate_term(&t).is_ok());
    }

    #[test]
    fn not_requires_exactly_one_child() {
        let expr = Expression::Logical(LogicalKind::Not, vec![]);
        assert!(validate_expression(Some(&expr)).is_err());
    }
}
