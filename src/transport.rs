//! The transport contract consumed by the transaction manager and server
//! dispatch (§6). Concrete sockets/serial ports are external collaborators;
//! this crate only depends on this trait.

use async_trait::async_trait;

use crate::error::Result;

/// Byte-stream transport: TCP socket, serial port, or a TLS session wrapped
/// around one. Implementors must preserve byte order and must not merge
/// frames across an intentional boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write `bytes` to the transport. May suspend until the whole buffer
    /// is accepted.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read the next chunk of bytes, possibly a partial frame. Suspends
    /// until at least one byte is available.
    async fn recv(&mut self) -> Result<Vec<u8>>;

    /// Close the transport. Idempotent.
    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}
