//! Response PDU variants, including the shared [`ExceptionResponse`] carried
//! as [`Response::Exception`].

use std::collections::BTreeMap;

use crate::codec::bits::{pack_bits, unpack_bits};
use crate::codec::pack::{push_registers, push_u16, read_registers, read_u16};
use crate::error::{ModbusError, Result};
use crate::pdu::exception::ExceptionResponse;
use crate::pdu::request::{
    FC_DIAGNOSTICS, FC_GET_COMM_EVENT_COUNTER, FC_GET_COMM_EVENT_LOG, FC_MASK_WRITE_REGISTER,
    FC_READ_DEVICE_IDENTIFICATION, FC_READ_EXCEPTION_STATUS, FC_READ_FIFO_QUEUE,
    FC_READ_FILE_RECORD, FC_READ_WRITE_MULTIPLE_REGISTERS, FC_REPORT_SLAVE_ID,
    FC_WRITE_FILE_RECORD, FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, FileRecordSubWrite, MEI_READ_DEVICE_IDENTIFICATION,
};

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;
const FILE_RECORD_REFERENCE_TYPE: u8 = 6;

/// One sub-response of a Read File Record response: the raw register data
/// of that sub-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecordSubResponse {
    pub data: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// FC 1/2 response.
    ReadBits { function_code: u8, bits: Vec<bool> },
    /// FC 3/4 response.
    ReadRegisters { function_code: u8, registers: Vec<u16> },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    ReadExceptionStatus { status: u8 },
    Diagnostics { sub_code: u16, payload: Vec<u8> },
    GetCommEventCounter { status: u16, count: u16 },
    GetCommEventLog {
        status: u16,
        event_count: u16,
        message_count: u16,
        events: Vec<u8>,
    },
    WriteMultipleCoils { address: u16, count: u16 },
    WriteMultipleRegisters { address: u16, count: u16 },
    ReportSlaveId { identifier: Vec<u8>, status: bool },
    ReadFileRecord { responses: Vec<FileRecordSubResponse> },
    WriteFileRecord { requests: Vec<FileRecordSubWrite> },
    MaskWriteRegister { address: u16, and_mask: u16, or_mask: u16 },
    ReadWriteMultipleRegisters { registers: Vec<u16> },
    ReadFifoQueue { values: Vec<u16> },
    ReadDeviceInformation {
        read_code: u8,
        conformity: u8,
        more_follows: bool,
        next_object_id: u8,
        objects: BTreeMap<u8, Vec<u8>>,
    },
    Exception(ExceptionResponse),
}

impl Response {
    pub fn function_code(&self) -> u8 {
        match self {
            Response::ReadBits { function_code, .. } => *function_code,
            Response::ReadRegisters { function_code, .. } => *function_code,
            Response::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Response::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Response::ReadExceptionStatus { .. } => FC_READ_EXCEPTION_STATUS,
            Response::Diagnostics { .. } => FC_DIAGNOSTICS,
            Response::GetCommEventCounter { .. } => FC_GET_COMM_EVENT_COUNTER,
            Response::GetCommEventLog { .. } => FC_GET_COMM_EVENT_LOG,
            Response::WriteMultipleCoils { .. } => FC_WRITE_MULTIPLE_COILS,
            Response::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Response::ReportSlaveId { .. } => FC_REPORT_SLAVE_ID,
            Response::ReadFileRecord { .. } => FC_READ_FILE_RECORD,
            Response::WriteFileRecord { .. } => FC_WRITE_FILE_RECORD,
            Response::MaskWriteRegister { .. } => FC_MASK_WRITE_REGISTER,
            Response::ReadWriteMultipleRegisters { .. } => FC_READ_WRITE_MULTIPLE_REGISTERS,
            Response::ReadFifoQueue { .. } => FC_READ_FIFO_QUEUE,
            Response::ReadDeviceInformation { .. } => FC_READ_DEVICE_IDENTIFICATION,
            Response::Exception(e) => e.function_code | 0x80,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        if let Response::Exception(e) = self {
            return e.encode();
        }
        let mut buf = vec![self.function_code()];
        match self {
            Response::ReadBits { bits, .. } => {
                let packed = pack_bits(bits);
                buf.push(packed.len() as u8);
                buf.extend_from_slice(&packed);
            }
            Response::ReadRegisters { registers, .. } => {
                buf.push((registers.len() * 2) as u8);
                push_registers(&mut buf, registers);
            }
            Response::WriteSingleCoil { address, value } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, if *value { COIL_ON } else { COIL_OFF });
            }
            Response::WriteSingleRegister { address, value } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *value);
            }
            Response::ReadExceptionStatus { status } => buf.push(*status),
            Response::Diagnostics { sub_code, payload } => {
                push_u16(&mut buf, *sub_code);
                buf.extend_from_slice(payload);
            }
            Response::GetCommEventCounter { status, count } => {
                push_u16(&mut buf, *status);
                push_u16(&mut buf, *count);
            }
            Response::GetCommEventLog {
                status,
                event_count,
                message_count,
                events,
            } => {
                buf.push((6 + events.len()) as u8);
                push_u16(&mut buf, *status);
                push_u16(&mut buf, *event_count);
                push_u16(&mut buf, *message_count);
                buf.extend_from_slice(events);
            }
            Response::WriteMultipleCoils { address, count }
            | Response::WriteMultipleRegisters { address, count } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *count);
            }
            Response::ReportSlaveId { identifier, status } => {
                buf.push(identifier.len() as u8 + 1);
                buf.extend_from_slice(identifier);
                buf.push(if *status { 0xFF } else { 0x00 });
            }
            Response::ReadFileRecord { responses } => {
                let total: usize = responses.iter().map(|r| 2 + r.data.len() * 2).sum();
                buf.push(total as u8);
                for r in responses {
                    buf.push((1 + r.data.len() * 2) as u8);
                    buf.push(FILE_RECORD_REFERENCE_TYPE);
                    push_registers(&mut buf, &r.data);
                }
            }
            Response::WriteFileRecord { requests } => {
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
            Response::MaskWriteRegister { address, and_mask, or_mask } => {
                push_u16(&mut buf, *address);
                push_u16(&mut buf, *and_mask);
                push_u16(&mut buf, *or_mask);
            }
            Response::ReadWriteMultipleRegisters { registers } => {
                buf.push((registers.len() * 2) as u8);
                push_registers(&mut buf, registers);
            }
            Response::ReadFifoQueue { values } => {
                let byte_count = (2 + values.len() * 2) as u16;
                push_u16(&mut buf, byte_count);
                push_u16(&mut buf, values.len() as u16);
                push_registers(&mut buf, values);
            }
            Response::ReadDeviceInformation {
                read_code,
                conformity,
                more_follows,
                next_object_id,
                objects,
            } => {
                buf.push(MEI_READ_DEVICE_IDENTIFICATION);
                buf.push(*read_code);
                buf.push(*conformity);
                buf.push(if *more_follows { 0xFF } else { 0x00 });
                buf.push(*next_object_id);
                buf.push(objects.len() as u8);
                for (id, value) in objects {
                    buf.push(*id);
                    buf.push(value.len() as u8);
                    buf.extend_from_slice(value);
                }
            }
            Response::Exception(_) => unreachable!("handled above"),
        }
        buf
    }

    pub fn decode(function_code: u8, bytes: &[u8]) -> Result<Self> {
        if function_code & 0x80 != 0 {
            return Ok(Response::Exception(ExceptionResponse::decode(
                &[[function_code], bytes.to_vec()].concat(),
            )?));
        }
        use crate::pdu::request::{
            FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS,
            FC_READ_INPUT_REGISTERS,
        };
        match function_code {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated bits response"))?
                    as usize;
                let data = bytes
                    .get(1..1 + byte_count)
                    .ok_or_else(|| ModbusError::protocol("byte count exceeds payload"))?;
                Ok(Response::ReadBits {
                    function_code,
                    bits: unpack_bits(data, byte_count * 8),
                })
            }
            FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated registers response"))?
                    as usize;
                Ok(Response::ReadRegisters {
                    function_code,
                    registers: read_registers(bytes, 1, byte_count / 2)?,
                })
            }
            FC_WRITE_SINGLE_COIL => Ok(Response::WriteSingleCoil {
                address: read_u16(bytes, 0)?,
                value: read_u16(bytes, 2)? == COIL_ON,
            }),
            FC_WRITE_SINGLE_REGISTER => Ok(Response::WriteSingleRegister {
                address: read_u16(bytes, 0)?,
                value: read_u16(bytes, 2)?,
            }),
            FC_READ_EXCEPTION_STATUS => Ok(Response::ReadExceptionStatus {
                status: *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated exception status"))?,
            }),
            FC_DIAGNOSTICS => Ok(Response::Diagnostics {
                sub_code: read_u16(bytes, 0)?,
                payload: bytes.get(2..).unwrap_or(&[]).to_vec(),
            }),
            FC_GET_COMM_EVENT_COUNTER => Ok(Response::GetCommEventCounter {
                status: read_u16(bytes, 0)?,
                count: read_u16(bytes, 2)?,
            }),
            FC_GET_COMM_EVENT_LOG => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated comm event log"))?
                    as usize;
                let events_len = byte_count.saturating_sub(6);
                Ok(Response::GetCommEventLog {
                    status: read_u16(bytes, 1)?,
                    event_count: read_u16(bytes, 3)?,
                    message_count: read_u16(bytes, 5)?,
                    events: bytes.get(7..7 + events_len).unwrap_or(&[]).to_vec(),
                })
            }
            FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => Ok(
                if function_code == FC_WRITE_MULTIPLE_COILS {
                    Response::WriteMultipleCoils {
                        address: read_u16(bytes, 0)?,
                        count: read_u16(bytes, 2)?,
                    }
                } else {
                    Response::WriteMultipleRegisters {
                        address: read_u16(bytes, 0)?,
                        count: read_u16(bytes, 2)?,
                    }
                },
            ),
            FC_REPORT_SLAVE_ID => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated report-slave-id"))?
                    as usize;
                let identifier_len = byte_count.saturating_sub(1);
                let identifier = bytes.get(1..1 + identifier_len).unwrap_or(&[]).to_vec();
                let status = *bytes.get(1 + identifier_len).unwrap_or(&0) == 0xFF;
                Ok(Response::ReportSlaveId { identifier, status })
            }
            FC_READ_FILE_RECORD => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated read-file-record response"))?
                    as usize;
                let mut body = bytes.get(1..1 + byte_count).unwrap_or(&[]);
                let mut responses = Vec::new();
                while !body.is_empty() {
                    let sub_len = *body
                        .first()
                        .ok_or_else(|| ModbusError::protocol("truncated file sub-response"))?
                        as usize;
                    let data_len = sub_len.saturating_sub(1) / 2;
                    let data = read_registers(body, 2, data_len)?;
                    responses.push(FileRecordSubResponse { data });
                    body = &body[1 + sub_len..];
                }
                Ok(Response::ReadFileRecord { responses })
            }
            FC_WRITE_FILE_RECORD => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated write-file-record response"))?
                    as usize;
                let mut body = bytes.get(1..1 + byte_count).unwrap_or(&[]);
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
                Ok(Response::WriteFileRecord { requests })
            }
            FC_MASK_WRITE_REGISTER => Ok(Response::MaskWriteRegister {
                address: read_u16(bytes, 0)?,
                and_mask: read_u16(bytes, 2)?,
                or_mask: read_u16(bytes, 4)?,
            }),
            FC_READ_WRITE_MULTIPLE_REGISTERS => {
                let byte_count = *bytes
                    .first()
                    .ok_or_else(|| ModbusError::protocol("truncated read-write response"))?
                    as usize;
                Ok(Response::ReadWriteMultipleRegisters {
                    registers: read_registers(bytes, 1, byte_count / 2)?,
                })
            }
            FC_READ_FIFO_QUEUE => {
                let count = read_u16(bytes, 2)? as usize;
                Ok(Response::ReadFifoQueue {
                    values: read_registers(bytes, 4, count)?,
                })
            }
            FC_READ_DEVICE_IDENTIFICATION => {
                if bytes.first() != Some(&MEI_READ_DEVICE_IDENTIFICATION) {
                    return Err(ModbusError::protocol("unsupported MEI type"));
                }
                let read_code = *bytes
                    .get(1)
                    .ok_or_else(|| ModbusError::protocol("truncated MEI response"))?;
                let conformity = *bytes
                    .get(2)
                    .ok_or_else(|| ModbusError::protocol("truncated MEI response"))?;
                let more_follows = *bytes.get(3).unwrap_or(&0) == 0xFF;
                let next_object_id = *bytes.get(4).unwrap_or(&0);
                let number_of_objects = *bytes.get(5).unwrap_or(&0) as usize;
                let mut objects = BTreeMap::new();
                let mut offset = 6;
                for _ in 0..number_of_objects {
                    let id = *bytes
                        .get(offset)
                        .ok_or_else(|| ModbusError::protocol("truncated MEI object"))?;
                    let len = *bytes
                        .get(offset + 1)
                        .ok_or_else(|| ModbusError::protocol("truncated MEI object"))?
                        as usize;
                    let value = bytes
                        .get(offset + 2..offset + 2 + len)
                        .ok_or_else(|| ModbusError::protocol("truncated MEI object value"))?
                        .to_vec();
                    objects.insert(id, value);
                    offset += 2 + len;
                }
                Ok(Response::ReadDeviceInformation {
                    read_code,
                    conformity,
                    more_follows,
                    next_object_id,
                    objects,
                })
            }
            other => Err(ModbusError::protocol(format!(
                "no response decoder registered for function code 0x{other:02X}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::exception::ExceptionCode;
    use crate::pdu::request::FC_READ_HOLDING_REGISTERS;

    #[test]
    fn s1_tcp_read_holding_registers_response() {
        let resp = Response::ReadRegisters {
            function_code: FC_READ_HOLDING_REGISTERS,
            registers: vec![0xAE41, 0x5652, 0x4340],
        };
        assert_eq!(
            resp.encode(),
            vec![0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40]
        );
    }

    #[test]
    fn exception_round_trips() {
        let resp = Response::Exception(ExceptionResponse::new(0x03, ExceptionCode::IllegalValue));
        let bytes = resp.encode();
        assert_eq!(bytes, vec![0x83, 0x03]);
        let decoded = Response::decode(0x83, &bytes[1..]).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn read_device_information_more_follows_false_emits_zero_next_id() {
        let mut objects = BTreeMap::new();
        objects.insert(0u8, b"Voltage".to_vec());
        let resp = Response::ReadDeviceInformation {
            read_code: 1,
            conformity: 1,
            more_follows: false,
            next_object_id: 0,
            objects,
        };
        let bytes = resp.encode();
        let decoded = Response::decode(0x2B, &bytes[1..]).unwrap();
        assert_eq!(decoded, resp);
        if let Response::ReadDeviceInformation {
            more_follows,
            next_object_id,
            ..
        } = decoded
        {
            assert!(!more_follows);
            assert_eq!(next_object_id, 0);
        } else {
            panic!("wrong variant");
        }
    }
}
