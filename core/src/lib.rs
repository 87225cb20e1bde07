//! AST-native command model.
//!
//! Queries, DDL and transaction control are built as typed [`Command`]
//! values, never as SQL text. The `qail-pg` crate owns the only renderer
//! that turns a `Command` into bytes, so there is exactly one path from
//! AST to wire protocol.
//!
//! ```ignore
//! use qail_core::ast::{Command, Operator};
//! let cmd = Command::get("users").column("name").eq("active", true);
//! ```

pub mod ast;
pub mod error;

pub use ast::Command;
pub use error::{CommandError, CommandResult};

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::error::{CommandError, CommandResult};
}
