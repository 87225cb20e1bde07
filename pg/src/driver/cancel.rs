//! Query cancellation via a fresh `CancelRequest` connection.
//!
//! Grounded on the teacher's `driver/cancel.rs`, translated to a blocking
//! `TcpStream`.

use std::io::Write;
use std::net::TcpStream;

use crate::driver::connection::{PgConnection, CANCEL_REQUEST_CODE};
use crate::error::PgResult;

/// A cancel key detached from its originating connection: safe to hand to
/// another thread and use after the original connection has moved on (or
/// even closed), since it opens its own socket.
#[derive(Debug, Clone)]
pub struct CancelToken {
    host: String,
    port: u16,
    process_id: i32,
    secret_key: i32,
}

impl CancelToken {
    pub fn cancel_query(&self) -> PgResult<()> {
        send_cancel_request(&self.host, self.port, self.process_id, self.secret_key)
    }
}

impl PgConnection {
    /// Capture a [`CancelToken`] for this connection's currently running
    /// (or next) query.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            host: self.host().to_string(),
            port: self.port(),
            process_id: self.process_id,
            secret_key: self.secret_key,
        }
    }

    /// Cancel whatever this connection is currently executing, from a
    /// separate blocking connection.
    pub fn cancel_query(&self) -> PgResult<()> {
        send_cancel_request(self.host(), self.port(), self.process_id, self.secret_key)
    }
}

fn send_cancel_request(host: &str, port: u16, process_id: i32, secret_key: i32) -> PgResult<()> {
    let mut stream = TcpStream::connect((host, port))?;

    let mut buf = [0u8; 16];
    buf[0..4].copy_from_slice(&16i32.to_be_bytes());
    buf[4..8].copy_from_slice(&CANCEL_REQUEST_CODE.to_be_bytes());
    buf[8..12].copy_from_slice(&process_id.to_be_bytes());
    buf[12..16].copy_from_slice(&secret_key.to_be_bytes());

    stream.write_all(&buf)?;
    // The server closes the connection once it has read the request; there
    // is no reply to wait for.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_request_frame_is_16_bytes_with_fixed_code() {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&16i32.to_be_bytes());
        buf[4..8].copy_from_slice(&CANCEL_REQUEST_CODE.to_be_bytes());
        buf[8..12].copy_from_slice(&7i32.to_be_bytes());
        buf[12..16].copy_from_slice(&42i32.to_be_bytes());
        assert_eq!(i32::from_be_bytes(buf[0..4].try_into().unwrap()), 16);
        assert_eq!(i32::from_be_bytes(buf[4..8].try_into().unwrap()), CANCEL_REQUEST_CODE);
    }
}
