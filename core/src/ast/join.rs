use crate::ast::JoinKind;
use serde::{Deserialize, Serialize};

/// `{kind} JOIN {table} [AS {alias}] ON {on_left} = {on_right}`.
///
/// Only equi-joins on a single column pair are representable; richer join
/// conditions go through a `raw` command instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub on_left: String,
    pub on_right: String,
}

impl Join {
    pub fn new(
        kind: JoinKind,
        table: impl Into<String>,
        on_left: impl Into<String>,
        on_right: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: None,
            on_left: on_left.into(),
            on_right: on_right.into(),
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}
