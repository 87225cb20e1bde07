//! Wire protocol codec: message catalog, type decoding, SASL/SCRAM
//! authentication, and the single AST-to-SQL renderer.

mod message;
mod render;
mod scram;
mod types;

pub use message::{
    BackendMessage, DecodeError, ErrorInfo, FieldDescriptor, FrontendMessage, TransactionStatus,
    PROTOCOL_VERSION,
};
pub use render::{render, Rendered};
pub use scram::{md5_password_hash, ScramClient};
pub use types as oid;
pub use types::{decode_bool, decode_float, decode_int, decode_jsonb, decode_text, decode_uuid};
