use crate::ast::{
    Action, Condition, Expr, IndexDef, Join, LogicalOp, OrderSpec, Value, WhereClause,
};
use serde::{Deserialize, Serialize};

/// `column = value` inside a `set`/`mod` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

/// The AST-native command. One `Command` fully describes one statement;
/// the wire encoder never sees SQL text except through [`Command::raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: Action,
    #[serde(default)]
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<Join>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub where_clauses: Vec<WhereClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub having: Vec<WhereClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub for_update: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returning: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_def: Option<IndexDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savepoint_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sql: Option<String>,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            kind: Action::Get,
            table: String::new(),
            alias: None,
            columns: Vec::new(),
            joins: Vec::new(),
            where_clauses: Vec::new(),
            assignments: Vec::new(),
            insert_values: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            for_update: false,
            returning: Vec::new(),
            index_def: None,
            savepoint_name: None,
            channel: None,
            payload: None,
            raw_sql: None,
        }
    }
}

// ---------------------------------------------------------------------
// Static constructors, one per `Action`.
// ---------------------------------------------------------------------

impl Command {
    pub fn get(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Get,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn set(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Set,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn del(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Del,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn add(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Add,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn make(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Make,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn drop_table(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Drop,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn alter(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Alter,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn alter_drop(table: impl Into<String>) -> Self {
        Self {
            kind: Action::AlterDrop,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn modify(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Mod,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn create_index(def: IndexDef) -> Self {
        Self {
            kind: Action::Index,
            table: def.table.clone(),
            index_def: Some(def),
            ..Default::default()
        }
    }

    pub fn drop_index(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            kind: Action::DropIndex,
            table: table.into(),
            index_def: Some(IndexDef::new(name, "", Vec::new())),
            ..Default::default()
        }
    }

    pub fn truncate(table: impl Into<String>) -> Self {
        Self {
            kind: Action::Truncate,
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn begin() -> Self {
        Self {
            kind: Action::Begin,
            ..Default::default()
        }
    }

    pub fn commit() -> Self {
        Self {
            kind: Action::Commit,
            ..Default::default()
        }
    }

    pub fn rollback() -> Self {
        Self {
            kind: Action::Rollback,
            ..Default::default()
        }
    }

    pub fn savepoint(name: impl Into<String>) -> Self {
        Self {
            kind: Action::Savepoint,
            savepoint_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn release(name: impl Into<String>) -> Self {
        Self {
            kind: Action::Release,
            savepoint_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn rollback_to(name: impl Into<String>) -> Self {
        Self {
            kind: Action::RollbackTo,
            savepoint_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn listen(channel: impl Into<String>) -> Self {
        Self {
            kind: Action::Listen,
            channel: Some(channel.into()),
            ..Default::default()
        }
    }

    pub fn notify(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: Action::Notify,
            channel: Some(channel.into()),
            payload: Some(payload.into()),
            ..Default::default()
        }
    }

    pub fn unlisten(channel: impl Into<String>) -> Self {
        Self {
            kind: Action::Unlisten,
            channel: Some(channel.into()),
            ..Default::default()
        }
    }

    /// Escape hatch: ship a literal SQL string untouched. Never produced by
    /// the query builder itself, only by callers who opt in explicitly.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            kind: Action::Raw,
            raw_sql: Some(sql.into()),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------
// Fluent builder methods.
// ---------------------------------------------------------------------

impl Command {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn column(mut self, expr: impl Into<Expr>) -> Self {
        self.columns.push(expr.into());
        self
    }

    pub fn columns(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.columns.extend(exprs);
        self
    }

    pub fn select_all(mut self) -> Self {
        self.columns.push(Expr::Star);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// AND-joined condition. The connector is ignored for the first clause
    /// in the list.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.where_clauses.push(WhereClause::and(condition));
        self
    }

    pub fn or_filter(mut self, condition: Condition) -> Self {
        self.where_clauses.push(WhereClause::or(condition));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::Eq, value))
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::Ne, value))
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::Gt, value))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::Gte, value))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::Lt, value))
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::Lte, value))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(Condition::new(Expr::Named(column.into()), super::Operator::IsNull, Value::Null))
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.filter(Condition::new(
            Expr::Named(column.into()),
            super::Operator::IsNotNull,
            Value::Null,
        ))
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(Condition::new(
            Expr::Named(column.into()),
            super::Operator::Like,
            Value::String(pattern.into()),
        ))
    }

    pub fn in_vals(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter(Condition::new(
            Expr::Named(column.into()),
            super::Operator::In,
            Value::Array(values),
        ))
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: super::SortOrder) -> Self {
        self.order_by.push(OrderSpec::new(column, direction));
        self
    }

    pub fn group_by(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having.push(WhereClause::and(condition));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn returning(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.returning.extend(exprs);
        self
    }

    pub fn returning_all(mut self) -> Self {
        self.returning.push(Expr::Star);
        self
    }

    /// Appends one row of values for `add` (`INSERT`). Column order must
    /// match `columns()`.
    pub fn values(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.insert_values.extend(values);
        self
    }

    pub fn set_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push(Assignment {
            column: column.into(),
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator;

    #[test]
    fn get_builder_roundtrip() {
        let cmd = Command::get("users")
            .column(Expr::col("id"))
            .eq("active", true)
            .limit(10);

        assert_eq!(cmd.kind, Action::Get);
        assert_eq!(cmd.table, "users");
        assert_eq!(cmd.where_clauses.len(), 1);
        assert_eq!(cmd.where_clauses[0].condition.op, Operator::Eq);
        assert_eq!(cmd.limit, Some(10));
    }

    #[test]
    fn default_command_has_no_clauses() {
        let cmd = Command::get("t");
        assert!(cmd.where_clauses.is_empty());
        assert!(cmd.columns.is_empty());
        assert!(!cmd.distinct);
    }
}
