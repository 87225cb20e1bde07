//! The AST-native command model.
//!
//! A [`Command`] is built up through the fluent methods here and handed
//! straight to the wire encoder in `qail-pg`; there is no intermediate SQL
//! string at any point in this crate.

mod command;
mod conditions;
mod expr;
mod index_def;
mod join;
mod operators;
mod values;

pub use command::{Assignment, Command};
pub use conditions::{Condition, OrderSpec, WhereClause};
pub use expr::Expr;
pub use index_def::IndexDef;
pub use join::Join;
pub use operators::{Action, AggregateFunc, JoinKind, LogicalOp, ModKind, Operator, SortOrder};
pub use values::Value;
