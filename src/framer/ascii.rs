//! ASCII framer (§4.2): `':' + HEX(device_id ++ pdu) + HEX(LRC) + CR LF`,
//! all hex digits uppercase on encode, either case accepted on decode.

use tracing::{debug, warn};

use crate::codec::lrc::compute as lrc8;
use crate::framer::traits::{DecodedFrame, Framer};

const START: u8 = b':';
const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiFramer;

impl AsciiFramer {
    pub fn new() -> Self {
        Self
    }
}

impl Framer for AsciiFramer {
    fn encode(&self, pdu_bytes: &[u8], device_id: u8, _transaction_id: u16) -> Vec<u8> {
        let mut payload = Vec::with_capacity(1 + pdu_bytes.len());
        payload.push(device_id);
        payload.extend_from_slice(pdu_bytes);
        let checksum = lrc8(&payload);

        let mut out = Vec::with_capacity(1 + payload.len() * 2 + 2 + 2);
        out.push(START);
        out.extend(hex::encode_upper(&payload).into_bytes());
        out.extend(hex::encode_upper([checksum]).into_bytes());
        out.push(CR);
        out.push(LF);
        out
    }

    fn decode(&self, buffer: &[u8]) -> DecodedFrame {
        let Some(start) = buffer.iter().position(|&b| b == START) else {
            // No start byte at all yet: the whole buffer is noise so far.
            return DecodedFrame { consumed: buffer.len(), ..DecodedFrame::incomplete() };
        };
        if start > 0 {
            // Drop leading noise before the frame start one byte at a time
            // so the caller can resynchronise (§8 property 2).
            return DecodedFrame { consumed: start, ..DecodedFrame::incomplete() };
        }

        let Some(cr_pos) = buffer.iter().position(|&b| b == CR) else {
            return DecodedFrame::incomplete();
        };
        if buffer.get(cr_pos + 1) != Some(&LF) {
            return DecodedFrame::incomplete();
        }
        let frame_len = cr_pos + 2;
        let hex_body = &buffer[1..cr_pos];

        let Ok(decoded) = hex::decode(hex_body) else {
            warn!("non-hex ASCII frame body, skipping start byte to resync");
            return DecodedFrame { consumed: 1, ..DecodedFrame::incomplete() };
        };
        if decoded.len() < 2 {
            warn!("ASCII frame too short, skipping start byte to resync");
            return DecodedFrame { consumed: 1, ..DecodedFrame::incomplete() };
        }
        let (payload, checksum) = decoded.split_at(decoded.len() - 1);
        if lrc8(payload) != checksum[0] {
            warn!("ASCII LRC mismatch, skipping start byte to resync");
            return DecodedFrame { consumed: 1, ..DecodedFrame::incomplete() };
        }

        debug!(device_id = payload[0], frame_len, "decoded ASCII frame");
        DecodedFrame {
            consumed: frame_len,
            device_id: payload[0],
            transaction_id: 0,
            pdu: payload[1..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_ascii_read_coils_frame_shape() {
        let framer = AsciiFramer::new();
        let pdu = [0x01, 0x00, 0x13, 0x00, 0x13];
        let frame = framer.encode(&pdu, 0x11, 0);
        let text = String::from_utf8(frame.clone()).unwrap();
        assert!(text.starts_with(":1101"));
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let framer = AsciiFramer::new();
        let pdu = [0x01, 0x00, 0x13, 0x00, 0x13];
        let frame = framer.encode(&pdu, 0x11, 0);
        let decoded = framer.decode(&frame);
        assert_eq!(decoded.consumed, frame.len());
        assert_eq!(decoded.device_id, 0x11);
        assert_eq!(decoded.pdu, pdu);
    }

    #[test]
    fn lower_case_hex_is_accepted() {
        let framer = AsciiFramer::new();
        let pdu = [0x01, 0x00, 0x13, 0x00, 0x13];
        let frame = framer.encode(&pdu, 0x11, 0);
        let mut text = String::from_utf8(frame).unwrap();
        text = text.to_lowercase();
        text = format!(":{}", &text[1..]); // restore uppercase ':'... no-op, kept for clarity
        let decoded = framer.decode(text.as_bytes());
        assert_eq!(decoded.device_id, 0x11);
    }

    #[test]
    fn garbage_before_start_byte_is_skipped_one_byte_at_a_time() {
        let framer = AsciiFramer::new();
        let pdu = [0x01, 0x00, 0x13, 0x00, 0x13];
        let valid = framer.encode(&pdu, 0x11, 0);
        let mut buffer = b"xy".to_vec();
        buffer.extend_from_slice(&valid);

        let first = framer.decode(&buffer);
        assert_eq!(first.consumed, 1);
        buffer.drain(0..1);
        let second = framer.decode(&buffer);
        assert_eq!(second.consumed, 1);
        buffer.drain(0..1);
        let third = framer.decode(&buffer);
        assert_eq!(third.consumed, valid.len());
    }
}
