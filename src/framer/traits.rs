//! The shared per-transport framer contract (§4.2): every framer turns a
//! PDU body into wire bytes and back, independent of what carries those
//! bytes (TCP socket, serial port, ...).

use crate::pdu::PduRegistry;

/// Result of attempting to decode one frame out of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Bytes of `buffer` this frame consumed. Callers must drain exactly
    /// this many bytes before calling `decode` again, even when `pdu` is
    /// empty (a consumed-but-garbage prefix during resync).
    pub consumed: usize,
    pub device_id: u8,
    pub transaction_id: u16,
    pub pdu: Vec<u8>,
}

impl DecodedFrame {
    /// "Need more bytes" — nothing consumed, no frame.
    pub fn incomplete() -> Self {
        Self { consumed: 0, device_id: 0, transaction_id: 0, pdu: Vec::new() }
    }

    pub fn is_incomplete(&self) -> bool {
        self.consumed == 0 && self.pdu.is_empty()
    }
}

/// Per-transport encode/decode logic. Implementors own their own framing
/// state (e.g. the RTU framer consults a [`PduRegistry`] for response-size
/// hints); they never touch I/O directly.
pub trait Framer: Send + Sync {
    /// Serialise `pdu_bytes` into a full wire frame for `device_id`/`transaction_id`.
    fn encode(&self, pdu_bytes: &[u8], device_id: u8, transaction_id: u16) -> Vec<u8>;

    /// Attempt to decode one frame from the front of `buffer`. Returns
    /// [`DecodedFrame::incomplete`] when more bytes are needed. On a
    /// malformed frame, `consumed` must still advance past the offending
    /// byte(s) so the caller can resynchronise (§8 property 2).
    fn decode(&self, buffer: &[u8]) -> DecodedFrame;

    /// Convenience: serialise a PDU body and frame it in one call.
    fn build_packet(&self, pdu_bytes: &[u8], device_id: u8, transaction_id: u16) -> Vec<u8> {
        self.encode(pdu_bytes, device_id, transaction_id)
    }
}
