//! Request PDU variants for every standard Modbus function code (§3).
//!
//! Decoding here only concerns itself with wire shape (truncated PDU,
//! byte-count mismatch); *semantic* range checks against the §3 table are
//! the job of [`crate::pdu::dispatch`], which runs them as part of
//! `update_datastore` so badly-wired-but-otherwise-valid-looking requests
//! still round-trip through `decode`.

use crate::codec::bits::{pack_bits, unpack_bits};
use crate::codec::pack::{push_registers, push_u16, read_registers, read_u16};
use crate::error::{ModbusError, Result};

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_READ_EXCEPTION_STATUS: u8 = 0x07;
pub const FC_DIAGNOSTICS: u8 = 0x08;
pub const FC_GET_COMM_EVENT_COUNTER: u8 = 0x0B;
pub const FC_GET_COMM_EVENT_LOG: u8 = 0x0C;
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
pub const FC_REPORT_SLAVE_ID: u8 = 0x11;
pub const FC_READ_FILE_RECORD: u8 = 0x14;
pub const FC_WRITE_FILE_RECORD: u8 = 0x15;
pub const FC_MASK_WRITE_REGISTER: u8 = 0x16;
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
pub const FC_READ_FIFO_QUEUE: u8 = 0x18;
pub const FC_READ_DEVICE_IDENTIFICATION: u8 = 0x2B;
pub const MEI_READ_DEVICE_IDENTIFICATION: u8 = 0x0E;

/// Diagnostics (FC 8) sub-function 0x04: the device stops transmitting
/// responses until a Restart Communications Option request clears it.
pub const DIAG_FORCE_LISTEN_ONLY_MODE: u16 = 0x0004;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// One `(file, record, length)` sub-request of a Read File Record request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecordSubRequest {
    pub file_number: u16,
    pub record_number: u16,
    pub record_length: u16,
}

/// One `(file, record, values)` sub-request of a Write File Record request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecordSubWrite {
    pub file_number: u16,
    pub record_number: u16,
    pub values: Vec<u16>,
}

const FILE_RECORD_REFERENCE_TYPE: u8 = 6;

/// A Modbus request PDU body (the function code is implied by the variant,
/// except where one variant covers several codes — see [`Request::function_code`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// FC 1 (Read Coils) or FC 2 (Read Discrete Inputs).
    ReadBits { function_code: u8, address: u16, count: u16 },
    /// FC 3 (Read Holding Registers) or FC 4 (Read Input Registers).
    ReadRegisters { function_code: u8, address: u16, count: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    ReadExceptionStatus,
    Diagnostics { sub_code: u16, payload: Vec<u8> },
    GetCommEventCounter,
    GetCommEventLog,
    WriteMultipleCoils { address: u16, count: u16, bits: Vec<bool> },
    WriteMultipleRegisters { address: u16, count: u16, registers: Vec<u16> },
    ReportSlaveId,
    ReadFileRecord { requests: Vec<FileRecordSubRequest> },
    WriteFileRecord { requests: Vec<FileRecordSubWrite> },
    MaskWriteRegister { address: u16, and_mask: u16, or_mask: u16 },
    ReadWriteMultipleRegisters {
        read_address: u16,
        read_count: u16,
        write_address: u16,
        write_registers: Vec<u16>,
    },
    ReadFifoQueue { address: u16 },
    ReadDeviceInformation { read_code: u8, object_id: u8 },
    /// A request for a function code with no built-in handling — produces
    /// an `IllegalFunction` exception from `update_datastore` (§4.3).
    Unknown { function_code: u8 },
}

impl Request {
    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadBits { function_code, .. } => *function_code,
            Request::ReadRegisters { function_code, .. } => *function_code,
            Request::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Request::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Request::ReadExceptionStatus => FC_READ_EXCEPTION_STATUS,
            Request::Diagnostics { .. } => FC_DIAGNOSTICS,
            Request::GetCommEventCounter => FC_GET_COMM_EVENT_COUNTER,
            Request::GetCommEventLog => FC_GET_COMM_EVENT_LOG,
            Request::WriteMultipleCoils { .. } => FC_WRITE_MULTIPLE_COILS,
            Request::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Request::ReportSlaveId => FC_REPORT_SLAVE_ID,
            Request::ReadFileRecord { .. } => FC_READ_FILE_RECORD,
            Request::WriteFileRecord { .. } => FC_WRITE_FILE_RECORD,
            Request::MaskWriteRegister { .. } => FC_MASK_WRITE_REGISTER,
            Request::ReadWriteMultipleRegisters { .. } => FC_READ_WRITE_MULTIPLE_REGISTERS,
            Request::ReadFifoQueue { .. } => FC_READ_FIFO_QUEUE,
            Request::ReadDeviceInformation { .. } => FC_READ_DEVICE_IDENTIFICATION,
            Request::Unknown { function_code } => *function_code,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![self.function_code()];
        match self {
            Request::ReadBits { address, count, .. }
            | Request::ReadRegisters { address, count, .. } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *count);
            }
            Request::WriteSingleCoil { address, value } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, if *value { COIL_ON } else { COIL_OFF });
            }
            Request::WriteSingleRegister { address, value } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *value);
            }
            Request::ReadExceptionStatus
            | Request::GetCommEventCounter
            | Request::GetCommEventLog
            | Request::ReportSlaveId => {}
            Request::Diagnostics { sub_code, payload } => {
                push_u16(&mut buf, *sub_code);
                buf.extend_from_slice(payload);
            }
            Request::WriteMultipleCoils { address, count, bits } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *count);
                let packed = pack_bits(bits);
                buf.push(packed.len() as u8);
                buf.extend_from_slice(&packed);
            }
            Request::WriteMultipleRegisters { address, count, registers } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *count);
                buf.push((registers.len() * 2) as u8);
                push_registers(&mut buf, registers);
            }
            Request::ReadFileRecord { requests } => {
                buf.push((requests.len() * 7) as u8);
                for r in requests {
                    buf.push(FILE_RECORD_REFERENCE_TYPE);
                    push_u16(&mut buf, r.file_number);
                    push_u16(&mut buf, r.record_number);
                    push_u16(&mut buf, r.record_length);
                }
            }
            Request::WriteFileRecord { requests } => {
                let total: usize = requests.iter().map(|r| 7 + r.values.len() * 2).sum();
                buf.push(total as u8);
                for r in requests {
                    buf.push(FILE_RECORD_REFERENCE_TYPE);
                    push_u16(&mut buf, r.file_number);
                    push_u16(&mut buf, r.record_number);
                    push_u16(&mut buf, r.values.len() as u16);
                    push_registers(&mut buf, &r.values);
                }
            }
            Request::MaskWriteRegister { address, and_mask, or_mask } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *and_mask);
                push_u16(&mut buf, *or_mask);
            }
            Request::ReadWriteMultipleRegisters {
                read_address,
                read_count,
                write_address,
                write_registers,
            } => {
                push_u16(&mut buf, *read_address);
                push_u16(&mut buf, *read_count);
                push_u16(&mut buf, *write_address);
                push_u16(&mut buf, write_registers.len() as u16);
                buf.push((write_registers.len() * 2) as u8);
                push_registers(&mut buf, write_registers);
            }
            Request::ReadFifoQueue { address } => {
                push_u16(&mut buf, *address);
            }
            Request::ReadDeviceInformation { read_code, object_id } => {
                buf.push(MEI_READ_DEVICE_IDENTIFICATION);
                buf.push(*read_code);
                buf.push(*object_id);
            }
            Request::Unknown { .. } => {}
        }
        buf
    }

    /// Decode a request body from `bytes` (which excludes the function-code
    /// byte — the registry has already consumed it to dispatch here).
    pub fn decode(function_code: u8, bytes: &[u8]) -> Result<Self> {
        match function_code {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS => Ok(Request::ReadBits {
                function_code,
                address: read_u16(bytes, 0)?,
                count: read_u16(bytes, 2)?,
            }),
            FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => Ok(Request::ReadRegisters {
                function_code,
                address: read_u16(bytes, 0)?,
                count: read_u16(bytes, 2)?,
            }),
            FC_WRITE_SINGLE_COIL => Ok(Request::WriteSingleCoil {
                address: read_u16(bytes, 0)?,
                value: read_u16(bytes, 2)? == COIL_ON,
            }),
            FC_WRITE_SINGLE_REGISTER => Ok(Request::WriteSingleRegister {
                address: read_u16(bytes, 0)?,
                value: read_u16(bytes, 2)?,
            }),
            FC_READ_EXCEPTION_STATUS => Ok(Request::ReadExceptionStatus),
            FC_DIAGNOSTICS => Ok(Request::Diagnostics {
                sub_code: read_u16(bytes, 0)?,
                payload: bytes.get(2..).unwrap_or(&[]).to_vec(),
            }),
            FC_GET_COMM_EVENT_COUNTER => Ok(Request::GetCommEventCounter),
            FC_GET_COMM_EVENT_LOG => Ok(Request::GetCommEventLog),
            FC_WRITE_MULTIPLE_COILS => {
                let address = read_u16(bytes, 0)?;
                let count = read_u16(bytes, 2)?;
                let byte_count = *bytes
                    .get(4)
                    .ok_or_else(|| ModbusError::protocol("truncated write-multiple-coils PDU"))?
                    as usize;
                let data = bytes
                    .get(5..5 + byte_count)
                    .ok_or_else(|| ModbusError::protocol("byte count exceeds payload"))?;
                Ok(Request::WriteMultipleCoils {
                    address,
                    count,
                    bits: unpack_bits(data, count as usize),
                })
            }
            FC_WRITE_MULTIPLE_REGISTERS => {
                let address = read_u16(bytes, 0)?;
                let count = read_u16(bytes, 2)?;
                Ok(Request::WriteMultipleRegisters {
                    address,
                    count,
                    registers: read_registers(bytes, 5, count as usize)?,
                })
            }
            FC_REPORT_SLAVE_ID => Ok(Request::ReportSlaveId),
            FC_READ_FILE_RECORD => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated read-file-record PDU"))?
                    as usize;
                let body = bytes
                    .get(1..1 + byte_count)
                    .ok_or_else(|| ModbusError::protocol("byte count exceeds payload"))?;
                let mut requests = Vec::new();
                for chunk in body.chunks(7) {
                    if chunk.len() < 7 {
                        return Err(ModbusError::protocol("truncated file record sub-request"));
                    }
                    requests.push(FileRecordSubRequest {
                        file_number: read_u16(chunk, 1)?,
                        record_number: read_u16(chunk, 3)?,
                        record_length: read_u16(chunk, 5)?,
                    });
                }
                Ok(Request::ReadFileRecord { requests })
            }
            FC_WRITE_FILE_RECORD => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated write-file-record PDU"))?
                    as usize;
                let mut body = bytes
                    .get(1..1 + byte_count)
                    .ok_or_else(|| ModbusError::protocol("byte count exceeds payload"))?;
                let mut requests = Vec::new();
                while !body.is_empty() {
                    if body.len() < 7 {
                        return Err(ModbusError::protocol("truncated file record sub-request"));
                    }
                    let file_number = read_u16(body, 1)?;
                    let record_number = read_u16(body, 3)?;
                    let record_length = read_u16(body, 5)? as usize;
                    let values = read_registers(body, 7, record_length)?;
                    requests.push(FileRecordSubWrite {
                        file_number,
                        record_number,
                        values,
                    });
                    body = &body[7 + record_length * 2..];
                }
                Ok(Request::WriteFileRecord { requests })
            }
            FC_MASK_WRITE_REGISTER => Ok(Request::MaskWriteRegister {
                address: read_u16(bytes, 0)?,
                and_mask: read_u16(bytes, 2)?,
                or_mask: read_u16(bytes, 4)?,
            }),
            FC_READ_WRITE_MULTIPLE_REGISTERS => {
                let read_address = read_u16(bytes, 0)?;
                let read_count = read_u16(bytes, 2)?;
                let write_address = read_u16(bytes, 4)?;
                let write_count = read_u16(bytes, 6)?;
                Ok(Request::ReadWriteMultipleRegisters {
                    read_address,
                    read_count,
                    write_address,
                    write_registers: read_registers(bytes, 9, write_count as usize)?,
                })
            }
            FC_READ_FIFO_QUEUE => Ok(Request::ReadFifoQueue {
                address: read_u16(bytes, 0)?,
            }),
            FC_READ_DEVICE_IDENTIFICATION => {
                if bytes.first() != Some(&MEI_READ_DEVICE_IDENTIFICATION) {
                    return Err(ModbusError::protocol("unsupported MEI type"));
                }
                Ok(Request::ReadDeviceInformation {
                    read_code: *bytes
                        .get(1)
                        .ok_or_else(|| ModbusError::protocol("truncated MEI request"))?,
                    object_id: *bytes
                        .get(2)
                        .ok_or_else(|| ModbusError::protocol("truncated MEI request"))?,
                })
            }
            other => Ok(Request::Unknown { function_code: other }),
        }
    }
}
