//! Transport seam.
//!
//! The session engine never subclasses or wraps a socket type directly; it
//! runs over anything implementing the async byte-stream traits. Production
//! use connects a [`tokio::net::TcpStream`] to the configured endpoint;
//! tests drive the same engine over `tokio::io::duplex`.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A byte-stream transport the session can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Open a TCP connection to the given host and port.
pub async fn connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    TcpStream::connect((host, port)).await
}
