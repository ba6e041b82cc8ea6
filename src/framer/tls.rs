//! TLS framer (§4.2): byte-for-byte the same MBAP layout as plain TCP, but
//! legal only with `device_id=0` and `transaction_id=0` — the Modbus/TLS
//! profile multiplexes neither unit id nor transaction id at this layer
//! because the TLS session itself is the addressing boundary. The actual
//! TLS handshake/encryption is the transport's concern (§6); this framer
//! only ever sees plaintext PDU bytes.

use tracing::warn;

use crate::error::{ModbusError, Result};
use crate::framer::tcp::TcpFramer;
use crate::framer::traits::{DecodedFrame, Framer};

#[derive(Debug, Default, Clone, Copy)]
pub struct TlsFramer {
    inner: TcpFramer,
}

impl TlsFramer {
    pub fn new() -> Self {
        Self { inner: TcpFramer::new() }
    }

    /// Encode, rejecting any `device_id`/`transaction_id` outside the
    /// Modbus/TLS profile instead of silently framing them.
    pub fn try_encode(&self, pdu_bytes: &[u8], device_id: u8, transaction_id: u16) -> Result<Vec<u8>> {
        if device_id != 0 || transaction_id != 0 {
            return Err(ModbusError::configuration(
                "Modbus/TLS requires device_id=0 and transaction_id=0",
            ));
        }
        Ok(self.inner.encode(pdu_bytes, device_id, transaction_id))
    }
}

impl Framer for TlsFramer {
    fn encode(&self, pdu_bytes: &[u8], _device_id: u8, _transaction_id: u16) -> Vec<u8> {
        self.inner.encode(pdu_bytes, 0, 0)
    }

    fn decode(&self, buffer: &[u8]) -> DecodedFrame {
        let decoded = self.inner.decode(buffer);
        if decoded.is_incomplete() {
            return decoded;
        }
        if decoded.device_id != 0 || decoded.transaction_id != 0 {
            warn!(
                device_id = decoded.device_id,
                transaction_id = decoded.transaction_id,
                "non-zero device_id/transaction_id on a Modbus/TLS frame"
            );
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_encode_rejects_nonzero_device_id() {
        let framer = TlsFramer::new();
        assert!(framer.try_encode(&[0x03], 1, 0).is_err());
    }

    #[test]
    fn try_encode_accepts_zero_zero() {
        let framer = TlsFramer::new();
        let frame = framer.try_encode(&[0x03, 0x00, 0x00, 0x00, 0x01], 0, 0).unwrap();
        assert_eq!(&frame[0..4], &[0x00, 0x00, 0x00, 0x00]);
    }
}
