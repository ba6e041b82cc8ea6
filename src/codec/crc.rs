//! CRC-16 (Modbus RTU variant).
//!
//! Polynomial 0xA001 (reflected 0x8005), initial value 0xFFFF, emitted
//! little-endian on the wire. Delegates to the `crc` crate's catalog
//! algorithm rather than a hand-rolled table.

use crc::{Crc, CRC_16_MODBUS};

/// Width in bytes of the trailing CRC field on an RTU frame.
pub const CRC_LEN: usize = 2;

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the CRC-16/MODBUS of `data`.
pub fn compute(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// Verify that the trailing two bytes of `bytes_including_crc` are the
/// little-endian CRC-16 of everything preceding them.
pub fn check(bytes_including_crc: &[u8]) -> bool {
    if bytes_including_crc.len() < 2 {
        return false;
    }
    let split = bytes_including_crc.len() - 2;
    let (payload, trailer) = bytes_including_crc.split_at(split);
    let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
    compute(payload) == expected
}

/// Convenience wrapper matching the free function re-exported at the
/// `codec` module root.
pub fn crc16(data: &[u8]) -> u16 {
    compute(data)
}
