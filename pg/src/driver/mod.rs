//! Connection lifecycle, query execution, pooling, and everything else that
//! touches the socket. `protocol` does the pure encode/decode work; this
//! module owns the state machine and the I/O built on top of it.

pub mod cancel;
pub mod connection;
pub mod copy;
pub mod listen;
pub mod pipeline;
pub mod pool;
pub mod prepared;
pub mod query;
pub mod row;
pub mod stream;
pub mod tls;
pub mod transaction;

pub use cancel::CancelToken;
pub use connection::{ConnectOptions, Notification, PgConnection, SslMode};
pub use pool::{PgPool, PoolConfig, PoolStats, PooledConnection};
pub use prepared::{statement_name, PreparedStatement, StatementCache};
pub use row::{PgRow, RowMeta};
pub use stream::PgStream;
pub use tls::{negotiate, TlsConfig, TlsVerify};

pub use crate::error::{PgError, PgResult};
