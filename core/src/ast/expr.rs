use crate::ast::{AggregateFunc, Condition, ModKind, OrderSpec, Value};
use serde::{Deserialize, Serialize};

/// A projection, assignment target, or `RETURNING` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// All columns (`*`).
    Star,
    /// A bare column or table.column reference.
    Named(String),
    /// `expr AS alias`.
    Aliased { expr: Box<Expr>, alias: String },
    /// A literal value used where an expression is expected.
    Literal(Value),
    /// `func(col)`, optionally `DISTINCT` and with a `FILTER (WHERE ...)` clause.
    Aggregate {
        func: AggregateFunc,
        col: String,
        distinct: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Vec<Condition>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// Ordinary function call: `name(args...)`.
    FuncCall {
        name: String,
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// `COALESCE(args...)`.
    Coalesce {
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// `CASE WHEN cond THEN expr ... [ELSE expr] END`.
    CaseWhen {
        when_clauses: Vec<(Condition, Box<Expr>)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_value: Option<Box<Expr>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// A column definition inside `make`/`alter` (`name TYPE [constraints]`).
    ColumnDef {
        name: String,
        data_type: String,
        #[serde(default)]
        is_primary_key: bool,
        #[serde(default)]
        is_unique: bool,
        #[serde(default)]
        is_not_null: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        references: Option<String>,
    },
    /// `func(args) OVER (PARTITION BY ... ORDER BY ...)`.
    Window {
        func: String,
        args: Vec<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<OrderSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// `ADD COLUMN`/`DROP COLUMN` wrapped around a [`Expr::ColumnDef`] or
    /// [`Expr::Named`], used by `alter`/`alter_drop` commands.
    ColMod { kind: ModKind, inner: Box<Expr> },
    /// A function whose arguments take keyword form, e.g.
    /// `SUBSTRING(expr FROM pos FOR len)`, `EXTRACT(YEAR FROM col)`.
    SpecialFunc {
        name: String,
        args: Vec<(Option<String>, Box<Expr>)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Named(name.into())
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        Expr::Aliased {
            expr: Box::new(self),
            alias: alias.into(),
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Named(s.to_string())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Named(s)
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Star => write!(f, "*"),
            Expr::Named(n) => write!(f, "{n}"),
            Expr::Aliased { expr, alias } => write!(f, "{expr} AS {alias}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Aggregate { func, col, .. } => write!(f, "{func}({col})"),
            Expr::FuncCall { name, .. } => write!(f, "{name}(...)"),
            Expr::Coalesce { .. } => write!(f, "COALESCE(...)"),
            Expr::CaseWhen { .. } => write!(f, "CASE ... END"),
            Expr::ColumnDef { name, data_type, .. } => write!(f, "{name} {data_type}"),
            Expr::Window { func, .. } => write!(f, "{func}(...) OVER (...)"),
            Expr::ColMod { inner, .. } => write!(f, "{inner}"),
            Expr::SpecialFunc { name, .. } => write!(f, "{name}(...)"),
        }
    }
}
