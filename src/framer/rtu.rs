//! RTU framer (§4.2): `device_id(1) + pdu + CRC16_LE(2)` with byte-at-a-time
//! resynchronisation when the tentative frame size can't be confirmed.
//!
//! Unlike TCP/TLS, RTU carries no length field: the decoder has to guess how
//! many bytes a frame is before it can check the trailing CRC. It consults
//! the [`PduRegistry`]'s length hint for the function code sitting at
//! `buffer[1]` — a request-shaped hint on a server's framer, a
//! response-shaped one on a client's, since the same function code differs
//! in wire shape by direction.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::crc::{compute as crc16, CRC_LEN};
use crate::framer::traits::{DecodedFrame, Framer};
use crate::pdu::registry::ResponseSize;
use crate::pdu::PduRegistry;

const MIN_FRAME_LEN: usize = 4; // device_id + function_code + crc(2)

/// RTU framer. Holds a registry handle so it can size variable-length
/// frames before their CRC has fully arrived. Owns an `Arc` rather than
/// borrowing so it can live in a transaction manager without a lifetime
/// parameter.
#[derive(Clone)]
pub struct RtuFramer {
    registry: Arc<PduRegistry>,
}

impl RtuFramer {
    pub fn new(registry: Arc<PduRegistry>) -> Self {
        Self { registry }
    }

    /// Guess the total frame length (device_id + pdu + crc) from the
    /// function code at `buffer[1]`, given what's been received so far.
    /// Returns `None` when not enough bytes are present yet to know.
    ///
    /// A server decodes incoming *requests*; a client decodes incoming
    /// *responses* — the two have different wire shapes for the same
    /// function code, so this consults whichever table matches
    /// [`PduRegistry::is_server`].
    fn estimate_frame_len(&self, buffer: &[u8]) -> Option<usize> {
        if buffer.len() < 2 {
            return None;
        }
        let function_code = buffer[1];
        match self.registry.frame_size(function_code) {
            Some(ResponseSize::Fixed(body_len)) => Some(1 + body_len + CRC_LEN),
            Some(ResponseSize::ByteCountAt { count_offset, trailer_len }) => {
                let count_index = 1 + count_offset;
                let count = *buffer.get(count_index)?;
                Some(1 + count_offset + 1 + count as usize + trailer_len + CRC_LEN)
            }
            None => {
                // No hint registered for this function code — fall back to
                // the minimum viable frame and let the CRC check reject
                // false positives.
                Some(MIN_FRAME_LEN)
            }
        }
    }
}

impl Framer for RtuFramer {
    fn encode(&self, pdu_bytes: &[u8], device_id: u8, _transaction_id: u16) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + pdu_bytes.len() + CRC_LEN);
        out.push(device_id);
        out.extend_from_slice(pdu_bytes);
        let crc = crc16(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    fn decode(&self, buffer: &[u8]) -> DecodedFrame {
        if buffer.len() < MIN_FRAME_LEN {
            return DecodedFrame::incomplete();
        }
        let Some(frame_len) = self.estimate_frame_len(buffer) else {
            return DecodedFrame::incomplete();
        };
        if buffer.len() < frame_len {
            return DecodedFrame::incomplete();
        }

        let body = &buffer[..frame_len - CRC_LEN];
        let received_crc = u16::from_le_bytes([buffer[frame_len - 2], buffer[frame_len - 1]]);
        if crc16(body) != received_crc {
            warn!(frame_len, "RTU CRC mismatch, advancing one byte to resync");
            return DecodedFrame { consumed: 1, ..DecodedFrame::incomplete() };
        }

        debug!(device_id = buffer[0], frame_len, "decoded RTU frame");
        DecodedFrame {
            consumed: frame_len,
            device_id: buffer[0],
            transaction_id: 0,
            pdu: body[1..].to_vec(),
        }
    }
}
