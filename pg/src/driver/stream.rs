//! Stream abstraction for plain TCP and TLS connections.
//!
//! The async teacher keeps one enum implementing `AsyncRead`/`AsyncWrite`
//! over `Tcp`/`Tls`/`Unix` variants; the synchronous redesign (`SPEC_FULL.md`)
//! keeps the same shape over ordinary blocking `Read`/`Write`. Unix sockets
//! are not named by spec.md and are dropped (see `DESIGN.md`).

use std::io::{self, Read, Write};
use std::net::TcpStream;

use rustls::StreamOwned;

/// A PostgreSQL connection stream, plain or TLS.
pub enum PgStream {
    Tcp(TcpStream),
    Tls(Box<StreamOwned<rustls::ClientConnection, TcpStream>>),
}

impl PgStream {
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        match self {
            PgStream::Tcp(s) => s.set_nodelay(nodelay),
            PgStream::Tls(s) => s.sock.set_nodelay(nodelay),
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> io::Result<()> {
        match self {
            PgStream::Tcp(s) => s.set_read_timeout(timeout),
            PgStream::Tls(s) => s.sock.set_read_timeout(timeout),
        }
    }
}

impl Read for PgStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PgStream::Tcp(s) => s.read(buf),
            PgStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for PgStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PgStream::Tcp(s) => s.write(buf),
            PgStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PgStream::Tcp(s) => s.flush(),
            PgStream::Tls(s) => s.flush(),
        }
    }
}
