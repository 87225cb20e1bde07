use crate::ast::{Expr, LogicalOp, Operator, SortOrder, Value};
use serde::{Deserialize, Serialize};

/// A single comparison: `left op value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: Expr,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(left: impl Into<Expr>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            left: left.into(),
            op,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.op.needs_value() {
            write!(f, "{} {} {}", self.left, self.op.sql_symbol(), self.value)
        } else {
            write!(f, "{} {}", self.left, self.op.sql_symbol())
        }
    }
}

/// A condition together with the connector joining it to the previous
/// clause in the same list (`WHERE`/`HAVING`). The connector on the first
/// clause in a list is ignored by the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub condition: Condition,
    pub connector: LogicalOp,
}

impl WhereClause {
    pub fn and(condition: Condition) -> Self {
        Self {
            condition,
            connector: LogicalOp::And,
        }
    }

    pub fn or(condition: Condition) -> Self {
        Self {
            condition,
            connector: LogicalOp::Or,
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub column: String,
    pub direction: SortOrder,
}

impl OrderSpec {
    pub fn new(column: impl Into<String>, direction: SortOrder) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}
