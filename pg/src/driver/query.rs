//! AST-native query execution: the extended query protocol driven by
//! [`protocol::render`] and the statement cache.
//!
//! Grounded on the teacher's `fetch_all_cached`/`execute` methods in
//! `driver/mod.rs`, restructured around a single `run` helper since this
//! crate has only one renderer and one cache, not the teacher's cached/
//! uncached/fast split.

use std::sync::Arc;

use qail_core::ast::{Command, Value};

use crate::driver::connection::PgConnection;
use crate::driver::prepared::PreparedStatement;
use crate::driver::row::{PgRow, RowMeta};
use crate::error::{PgError, PgResult};
use crate::protocol::{render, BackendMessage, FrontendMessage, TransactionStatus};

/// Text-format encoding of a bind parameter. `Column`/`Param` have no
/// business reaching a parameter list (the renderer inlines them); a bare
/// `NamedParam` means the caller never bound it.
pub(crate) fn encode_param(value: &Value) -> PgResult<Option<Vec<u8>>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(if *b { b"t".to_vec() } else { b"f".to_vec() })),
        Value::Int(n) => {
            let mut tmp = itoa::Buffer::new();
            Ok(Some(tmp.format(*n).as_bytes().to_vec()))
        }
        Value::Float(n) => Ok(Some(format_float(*n).into_bytes())),
        Value::String(s) => Ok(Some(s.clone().into_bytes())),
        Value::Array(items) => {
            let mut s = String::from("{");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    s.push(',');
                }
                match item {
                    Value::String(v) => {
                        s.push('"');
                        s.push_str(&v.replace('\\', "\\\\").replace('"', "\\\""));
                        s.push('"');
                    }
                    Value::Int(n) => {
                        let mut tmp = itoa::Buffer::new();
                        s.push_str(tmp.format(*n));
                    }
                    Value::Float(n) => s.push_str(&format_float(*n)),
                    other => s.push_str(&other.to_string()),
                }
            }
            s.push('}');
            Ok(Some(s.into_bytes()))
        }
        Value::Column(_) | Value::Param(_) => Err(PgError::InvalidCommand(
            "column/param reference leaked into a bind parameter list".into(),
        )),
        Value::NamedParam(name) => Err(PgError::InvalidCommand(format!(
            "named parameter :{name} was never bound"
        ))),
    }
}

/// Postgres expects `Infinity`/`-Infinity`/`NaN`, not Rust's `inf`/`NaN`
/// casing; `ryu::Buffer::format_finite` panics on non-finite input, so those
/// are special-cased ahead of it.
fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        let mut tmp = ryu::Buffer::new();
        tmp.format_finite(n).to_string()
    }
}

/// Outcome of running one statement through the extended query protocol.
struct RunOutcome {
    rows: Vec<PgRow>,
    affected: u64,
}

impl PgConnection {
    /// Parse (if not cached), bind, execute, and drain one statement.
    ///
    /// A session left in a failed transaction only accepts `ROLLBACK`/
    /// `ROLLBACK TO SAVEPOINT`; anything else is refused up front with
    /// [`PgError::TransactionAborted`] rather than round-tripping to the
    /// server for its 25P02.
    fn run_extended(&mut self, sql: &str, values: &[Value]) -> PgResult<RunOutcome> {
        if self.transaction_status == TransactionStatus::Failed && !sql.starts_with("ROLLBACK") {
            return Err(PgError::TransactionAborted);
        }

        let (stmt, already_parsed) = self.stmt_cache.get_or_insert(sql);

        if !already_parsed {
            self.send(FrontendMessage::Parse {
                name: &stmt.name,
                sql: &stmt.sql,
                param_types: &[],
            })?;
        }

        let mut params = Vec::with_capacity(values.len());
        for v in values {
            params.push(encode_param(v)?);
        }
        let param_formats = vec![0i16; params.len()];

        self.send(FrontendMessage::Bind {
            portal: "",
            statement: &stmt.name,
            param_formats: &param_formats,
            params: &params,
            result_formats: &[],
        })?;
        self.send(FrontendMessage::DescribePortal(""))?;
        self.send(FrontendMessage::Execute { portal: "", max_rows: 0 })?;
        self.send(FrontendMessage::Sync)?;

        let mut rows = Vec::new();
        let mut meta: Option<Arc<RowMeta>> = None;
        let mut affected = 0u64;
        let mut error: Option<PgError> = None;

        loop {
            match self.read_message()? {
                BackendMessage::ParseComplete | BackendMessage::BindComplete => {}
                BackendMessage::RowDescription(fields) => {
                    meta = Some(Arc::new(RowMeta::new(fields)));
                }
                BackendMessage::NoData => {}
                BackendMessage::DataRow(columns) => {
                    if error.is_none() {
                        let meta = meta.clone().unwrap_or_else(|| Arc::new(RowMeta::new(Vec::new())));
                        rows.push(PgRow { columns, meta });
                    }
                }
                BackendMessage::CommandComplete(tag) => {
                    if let Some(n) = tag.split_whitespace().last() {
                        affected = n.parse().unwrap_or(0);
                    }
                }
                BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ErrorResponse(err) => {
                    if error.is_none() {
                        error = Some(PgError::Database(err));
                    }
                    // A failed Parse/Bind leaves the server-side statement
                    // unusable; drop it so the next attempt re-Parses.
                    self.stmt_cache.clear();
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::warn!(code = %notice.code, message = %notice.message, "NoticeResponse");
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.transaction_status = status;
                    return match error {
                        Some(err) => Err(err),
                        None => Ok(RunOutcome { rows, affected }),
                    };
                }
                _ => {}
            }
        }
    }

    /// Render `cmd` and execute it, returning all rows.
    pub fn fetch_all(&mut self, cmd: &Command) -> PgResult<Vec<PgRow>> {
        let rendered = render(cmd)?;
        Ok(self.run_extended(&rendered.sql, &rendered.params)?.rows)
    }

    /// Render `cmd` and execute it, returning the first row. Fails with
    /// [`PgError::NoRows`] if the result set is empty.
    pub fn fetch_one(&mut self, cmd: &Command) -> PgResult<PgRow> {
        self.fetch_all(cmd)?.into_iter().next().ok_or(PgError::NoRows)
    }

    /// Render `cmd` and execute it, returning the number of affected rows.
    pub fn execute(&mut self, cmd: &Command) -> PgResult<u64> {
        let rendered = render(cmd)?;
        Ok(self.run_extended(&rendered.sql, &rendered.params)?.affected)
    }

    /// Prepare `sql` up front (e.g. for repeated execution with varying
    /// parameters) without running it.
    pub fn prepare(&mut self, sql: &str) -> PgResult<PreparedStatement> {
        let (stmt, already_parsed) = self.stmt_cache.get_or_insert(sql);
        if !already_parsed {
            self.send(FrontendMessage::Parse {
                name: &stmt.name,
                sql: &stmt.sql,
                param_types: &[],
            })?;
            self.send(FrontendMessage::Sync)?;
            loop {
                match self.read_message()? {
                    BackendMessage::ParseComplete => {}
                    BackendMessage::ErrorResponse(err) => return Err(PgError::Database(err)),
                    BackendMessage::ReadyForQuery(status) => {
                        self.transaction_status = status;
                        break;
                    }
                    _ => {}
                }
            }
        }
        Ok(stmt)
    }

    /// Execute an already-[`prepare`](Self::prepare)d statement with `params`.
    pub fn fetch_prepared(
        &mut self,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> PgResult<Vec<PgRow>> {
        if params.len() != stmt.param_count() {
            return Err(PgError::InvalidCommand(format!(
                "statement expects {} parameters, got {}",
                stmt.param_count(),
                params.len()
            )));
        }
        Ok(self.run_extended(stmt.sql(), params)?.rows)
    }

    /// Execute a caller-supplied SQL string through the Simple Query
    /// protocol, discarding rows. Intended for bootstrap/administrative DDL
    /// that has no AST representation (`CREATE EXTENSION`, migrations).
    pub fn execute_raw(&mut self, sql: &str) -> PgResult<()> {
        self.execute_simple(sql)
    }

    /// Execute a caller-supplied SQL string through the Simple Query
    /// protocol and collect its rows.
    pub fn fetch_raw(&mut self, sql: &str) -> PgResult<Vec<PgRow>> {
        if sql.as_bytes().contains(&0) {
            return Err(PgError::InvalidCommand("SQL contains a NUL byte".into()));
        }
        self.send(FrontendMessage::Query(sql))?;

        let mut rows = Vec::new();
        let mut meta: Option<Arc<RowMeta>> = None;
        let mut error: Option<PgError> = None;

        loop {
            match self.read_message()? {
                BackendMessage::RowDescription(fields) => {
                    meta = Some(Arc::new(RowMeta::new(fields)));
                }
                BackendMessage::DataRow(columns) => {
                    if error.is_none() {
                        let meta = meta.clone().unwrap_or_else(|| Arc::new(RowMeta::new(Vec::new())));
                        rows.push(PgRow { columns, meta });
                    }
                }
                BackendMessage::CommandComplete(_) | BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ErrorResponse(err) => {
                    if error.is_none() {
                        error = Some(PgError::Database(err));
                    }
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::warn!(code = %notice.code, message = %notice.message, "NoticeResponse");
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.transaction_status = status;
                    return match error {
                        Some(err) => Err(err),
                        None => Ok(rows),
                    };
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars_as_text() {
        assert_eq!(encode_param(&Value::Int(42)).unwrap(), Some(b"42".to_vec()));
        assert_eq!(encode_param(&Value::Bool(true)).unwrap(), Some(b"t".to_vec()));
        assert_eq!(encode_param(&Value::Null).unwrap(), None);
        assert_eq!(
            encode_param(&Value::String("hi".into())).unwrap(),
            Some(b"hi".to_vec())
        );
    }

    #[test]
    fn encodes_array_as_postgres_literal() {
        let arr = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(encode_param(&arr).unwrap(), Some(b"{1,2,3}".to_vec()));
    }

    #[test]
    fn rejects_unbound_named_param() {
        assert!(encode_param(&Value::NamedParam("id".into())).is_err());
    }
}
