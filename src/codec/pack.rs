//! Big-endian integer packing helpers shared by every PDU encoder/decoder.
//! Modbus is big-endian on the wire for every multi-byte field (§6).

use byteorder::{BigEndian, ByteOrder};

pub fn push_u16(buf: &mut Vec<u8>, value: u16) {
    let mut tmp = [0u8; 2];
    BigEndian::write_u16(&mut tmp, value);
    buf.extend_from_slice(&tmp);
}

pub fn push_registers(buf: &mut Vec<u8>, values: &[u16]) {
    for &v in values {
        push_u16(buf, v);
    }
}

pub fn read_u16(bytes: &[u8], offset: usize) -> crate::error::Result<u16> {
    if bytes.len() < offset + 2 {
        return Err(crate::error::ModbusError::protocol("truncated PDU"));
    }
    Ok(BigEndian::read_u16(&bytes[offset..offset + 2]))
}

pub fn read_registers(bytes: &[u8], offset: usize, count: usize) -> crate::error::Result<Vec<u16>> {
    if bytes.len() < offset + count * 2 {
        return Err(crate::error::ModbusError::protocol("truncated register payload"));
    }
    Ok((0..count)
        .map(|i| BigEndian::read_u16(&bytes[offset + i * 2..offset + i * 2 + 2]))
        .collect())
}
