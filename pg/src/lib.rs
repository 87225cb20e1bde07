//! # qail-pg
//!
//! An AST-native PostgreSQL client driver. Queries are built as typed
//! [`qail_core::Command`] values and compiled directly to PostgreSQL wire
//! protocol v3 frames; there is no SQL string anywhere on the hot path.
//!
//! ## Architecture
//!
//! ```text
//! Command (AST) -> AstEncoder -> BytesMut -> TCP/TLS -> PostgreSQL
//! ```
//!
//! - `protocol` turns a `Command` into SQL text plus an ordered parameter
//!   list ([`protocol::render`]) and parses bytes back into typed backend
//!   messages. It does no I/O.
//! - `driver` owns the socket, the startup/auth state machine, the
//!   prepared-statement cache and the connection pool. Every connection is
//!   blocking and handles one request at a time; concurrency comes from
//!   holding more than one connection (see [`driver::pool`]).
//!
//! ## Example
//!
//! ```ignore
//! use qail_core::ast::Command;
//! use qail_pg::PgConnection;
//!
//! let mut conn = PgConnection::connect("localhost", 5432, "user", "db")?;
//! let cmd = Command::get("users").column("id").column("email").eq("active", true);
//! let rows = conn.fetch_all(&cmd)?;
//! ```

pub mod driver;
pub mod protocol;
pub mod error;

pub use driver::{
    CancelToken, ConnectOptions, Notification, PgConnection, PgPool, PgRow, PoolConfig, PoolStats,
    PooledConnection, PreparedStatement, RowMeta, SslMode, StatementCache, TlsConfig, TlsVerify,
};
pub use error::{PgError, PgResult};
pub use protocol::{render, Rendered};
