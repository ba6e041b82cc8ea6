//! MBAP (Modbus Application Protocol) framer for plain TCP (§4.2).
//!
//! Header layout: `transaction_id(u16 BE), protocol_id=0(u16 BE),
//! length(u16 BE), unit_id(u8)`, followed by the PDU. `length` counts
//! `unit_id` plus the PDU bytes — not the four header bytes before it.

use tracing::{debug, warn};

use crate::framer::traits::{DecodedFrame, Framer};

const MBAP_HEADER_LEN: usize = 7;
const MAX_LENGTH_FIELD: u16 = 260;

/// Framer for the plain-TCP Modbus transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpFramer;

impl TcpFramer {
    pub fn new() -> Self {
        Self
    }
}

impl Framer for TcpFramer {
    fn encode(&self, pdu_bytes: &[u8], device_id: u8, transaction_id: u16) -> Vec<u8> {
        let length = (pdu_bytes.len() + 1) as u16;
        let mut out = Vec::with_capacity(MBAP_HEADER_LEN + pdu_bytes.len());
        out.extend_from_slice(&transaction_id.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.push(device_id);
        out.extend_from_slice(pdu_bytes);
        out
    }

    fn decode(&self, buffer: &[u8]) -> DecodedFrame {
        if buffer.len() < MBAP_HEADER_LEN {
            return DecodedFrame::incomplete();
        }
        let transaction_id = u16::from_be_bytes([buffer[0], buffer[1]]);
        let protocol_id = u16::from_be_bytes([buffer[2], buffer[3]]);
        let length = u16::from_be_bytes([buffer[4], buffer[5]]);
        let device_id = buffer[6];

        if protocol_id != 0 || length == 0 || length > MAX_LENGTH_FIELD {
            warn!(protocol_id, length, "malformed MBAP header, skipping one byte");
            return DecodedFrame { consumed: 1, ..DecodedFrame::incomplete() };
        }

        let frame_len = MBAP_HEADER_LEN + (length as usize - 1);
        if buffer.len() < frame_len {
            return DecodedFrame::incomplete();
        }
        debug!(transaction_id, device_id, frame_len, "decoded MBAP/TCP frame");
        DecodedFrame {
            consumed: frame_len,
            device_id,
            transaction_id,
            pdu: buffer[MBAP_HEADER_LEN..frame_len].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_tcp_read_holding_registers_request_frame() {
        let framer = TcpFramer::new();
        let pdu = [0x03, 0x00, 0x6B, 0x00, 0x03];
        let frame = framer.encode(&pdu, 0x11, 0x0001);
        assert_eq!(
            frame,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]
        );
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let framer = TcpFramer::new();
        let pdu = vec![0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40];
        let frame = framer.encode(&pdu, 0x11, 7);
        let decoded = framer.decode(&frame);
        assert_eq!(decoded.consumed, frame.len());
        assert_eq!(decoded.device_id, 0x11);
        assert_eq!(decoded.transaction_id, 7);
        assert_eq!(decoded.pdu, pdu);
    }

    #[test]
    fn incomplete_header_requests_more_bytes() {
        let framer = TcpFramer::new();
        assert!(framer.decode(&[0x00, 0x01]).is_incomplete());
    }

    #[test]
    fn bad_protocol_id_skips_one_byte_to_resync() {
        let framer = TcpFramer::new();
        let mut garbage = vec![0x00, 0x01, 0xFF, 0xFF, 0x00, 0x06, 0x11];
        garbage.extend_from_slice(&[0; 6]);
        let decoded = framer.decode(&garbage);
        assert_eq!(decoded.consumed, 1);
    }
}
