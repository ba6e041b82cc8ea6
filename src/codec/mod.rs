//! Wire-level codecs shared by every framer and PDU: CRC-16 (RTU), LRC-8
//! (ASCII), big-endian integer packing, and bit packing for coil/discrete
//! input payloads.

pub mod bits;
pub mod crc;
pub mod lrc;
pub mod pack;

pub use bits::{pack_bits, unpack_bits};
pub use crc::crc16;
pub use lrc::lrc;
