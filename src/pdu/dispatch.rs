//! `update_datastore`: turns a decoded [`Request`] plus a [`SlaveContext`]
//! into a [`Response`], enforcing the §3 range table and mapping datastore
//! failures onto the right exception code (§4.3).
//!
//! Field-shape errors (truncated PDU, byte-count mismatch) are caught by
//! [`Request::decode`] before this ever runs; everything here is a
//! *semantic* check against the address/count ranges or the datastore.

use tracing::{debug, warn};

use crate::datastore::{SlaveContext, Values};
use crate::pdu::exception::{ExceptionCode, ExceptionResponse};
use crate::pdu::request::{DIAG_FORCE_LISTEN_ONLY_MODE, FC_READ_HOLDING_REGISTERS};
use crate::pdu::response::FileRecordSubResponse;
use crate::pdu::{Header, Request, RequestPdu, Response, ResponsePdu};

const MAX_READ_BITS: u16 = 0x7D0;
const MAX_READ_REGISTERS: u16 = 0x7D;
const MAX_WRITE_COILS: u16 = 0x7B0;
const MAX_WRITE_REGISTERS: u16 = 0x7B;
const MAX_READ_WRITE_READ: u16 = 0x7D;
const MAX_READ_WRITE_WRITE: u16 = 0x79;

fn exception(function_code: u8, code: ExceptionCode) -> Response {
    Response::Exception(ExceptionResponse::new(function_code, code))
}

/// Execute `request` against `context`, returning the response body.
///
/// This is the server-side counterpart to [`Request::decode`]: every branch
/// here corresponds to one row of the §3 function-code table.
pub fn update_datastore(request: &Request, context: &SlaveContext) -> Response {
    let fc = request.function_code();
    match request {
        Request::ReadBits { function_code, address, count } => {
            if !(1..=MAX_READ_BITS).contains(count) {
                warn!(fc, count, "read bits count out of range");
                return exception(fc, ExceptionCode::IllegalValue);
            }
            if !context.validate(*function_code, *address, *count) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            match context.get_values(*function_code, *address, *count) {
                Ok(Values::Bits(bits)) => Response::ReadBits { function_code: *function_code, bits },
                Ok(Values::Words(_)) => exception(fc, ExceptionCode::SlaveFailure),
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::ReadRegisters { function_code, address, count } => {
            if !(1..=MAX_READ_REGISTERS).contains(count) {
                warn!(fc, count, "read registers count out of range");
                return exception(fc, ExceptionCode::IllegalValue);
            }
            if !context.validate(*function_code, *address, *count) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            match context.get_values(*function_code, *address, *count) {
                Ok(Values::Words(registers)) => {
                    Response::ReadRegisters { function_code: *function_code, registers }
                }
                Ok(Values::Bits(_)) => exception(fc, ExceptionCode::SlaveFailure),
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::WriteSingleCoil { address, value } => {
            if !context.validate(fc, *address, 1) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            match context.set_bits(fc, *address, &[*value]) {
                Ok(()) => Response::WriteSingleCoil { address: *address, value: *value },
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::WriteSingleRegister { address, value } => {
            if !context.validate(fc, *address, 1) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            match context.set_words(fc, *address, &[*value]) {
                Ok(()) => Response::WriteSingleRegister { address: *address, value: *value },
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::ReadExceptionStatus => {
            Response::ReadExceptionStatus { status: context.exception_status() }
        }
        Request::Diagnostics { sub_code, payload } => {
            // Sub-function 0x00 (Return Query Data) and 0x04 (Force Listen
            // Only Mode) are the only two with observable semantics at this
            // layer. Every other sub-code is accepted and echoed too — this
            // crate has no device-internal counters for the rest.
            if *sub_code == DIAG_FORCE_LISTEN_ONLY_MODE {
                context.set_listen_only(true);
                debug!("diagnostics: device forced into listen-only mode");
            } else {
                debug!(sub_code, "diagnostics echo");
            }
            Response::Diagnostics { sub_code: *sub_code, payload: payload.clone() }
        }
        Request::GetCommEventCounter => {
            let (_, count) = context.comm_event_counter();
            Response::GetCommEventCounter { status: 0x0000, count }
        }
        Request::GetCommEventLog => {
            let (event_count, message_count) = context.comm_event_counter();
            Response::GetCommEventLog {
                status: 0x0000,
                event_count,
                message_count,
                events: context.comm_event_log(),
            }
        }
        Request::WriteMultipleCoils { address, count, bits } => {
            if !(1..=MAX_WRITE_COILS).contains(count) || bits.len() != *count as usize {
                warn!(fc, count, "write multiple coils count out of range");
                return exception(fc, ExceptionCode::IllegalValue);
            }
            if !context.validate(fc, *address, *count) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            match context.set_bits(fc, *address, bits) {
                Ok(()) => Response::WriteMultipleCoils { address: *address, count: *count },
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::WriteMultipleRegisters { address, count, registers } => {
            if !(1..=MAX_WRITE_REGISTERS).contains(count) || registers.len() != *count as usize {
                warn!(fc, count, "write multiple registers count out of range");
                return exception(fc, ExceptionCode::IllegalValue);
            }
            if !context.validate(fc, *address, *count) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            match context.set_words(fc, *address, registers) {
                Ok(()) => Response::WriteMultipleRegisters { address: *address, count: *count },
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::ReportSlaveId => {
            let identifier = context.identity.product_code.clone().into_bytes();
            Response::ReportSlaveId { identifier, status: true }
        }
        Request::ReadFileRecord { requests } => {
            let responses = requests
                .iter()
                .map(|r| FileRecordSubResponse {
                    data: context.file_read(r.file_number, r.record_number, r.record_length),
                })
                .collect();
            Response::ReadFileRecord { responses }
        }
        Request::WriteFileRecord { requests } => {
            for r in requests {
                context.file_write(r.file_number, r.record_number, r.values.clone());
            }
            Response::WriteFileRecord { requests: requests.clone() }
        }
        Request::MaskWriteRegister { address, and_mask, or_mask } => {
            if !context.validate(FC_READ_HOLDING_REGISTERS, *address, 1) {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            let old = match context.get_values(FC_READ_HOLDING_REGISTERS, *address, 1) {
                Ok(Values::Words(values)) => values[0],
                _ => return exception(fc, ExceptionCode::SlaveFailure),
            };
            // §8 property 7: (old AND) | (OR AND NOT AND).
            let new = (old & *and_mask) | (*or_mask & !*and_mask);
            match context.set_words(FC_READ_HOLDING_REGISTERS, *address, &[new]) {
                Ok(()) => Response::MaskWriteRegister {
                    address: *address,
                    and_mask: *and_mask,
                    or_mask: *or_mask,
                },
                Err(_) => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::ReadWriteMultipleRegisters {
            read_address,
            read_count,
            write_address,
            write_registers,
        } => {
            let write_count = write_registers.len() as u16;
            if !(1..=MAX_READ_WRITE_READ).contains(read_count)
                || !(1..=MAX_READ_WRITE_WRITE).contains(&write_count)
            {
                warn!(fc, read_count, write_count, "read/write multiple counts out of range");
                return exception(fc, ExceptionCode::IllegalValue);
            }
            if !context.validate(FC_READ_HOLDING_REGISTERS, *write_address, write_count)
                || !context.validate(FC_READ_HOLDING_REGISTERS, *read_address, *read_count)
            {
                return exception(fc, ExceptionCode::IllegalAddress);
            }
            // §8 property 8: write happens before read, same call.
            if context
                .set_words(FC_READ_HOLDING_REGISTERS, *write_address, write_registers)
                .is_err()
            {
                return exception(fc, ExceptionCode::SlaveFailure);
            }
            match context.get_values(FC_READ_HOLDING_REGISTERS, *read_address, *read_count) {
                Ok(Values::Words(registers)) => Response::ReadWriteMultipleRegisters { registers },
                _ => exception(fc, ExceptionCode::SlaveFailure),
            }
        }
        Request::ReadFifoQueue { address } => {
            let values = context.fifo_read(*address);
            if values.len() > crate::datastore::slave::FIFO_MAX_LEN {
                return exception(fc, ExceptionCode::SlaveFailure);
            }
            Response::ReadFifoQueue { values }
        }
        Request::ReadDeviceInformation { read_code, object_id } => {
            let all = context.identity.objects();
            let start = all.iter().position(|(id, _)| id == object_id).unwrap_or(0);
            // read_code 1/2/3 all return the basic set in this crate; there
            // is only one category of object modelled.
            let _ = read_code;
            let objects: std::collections::BTreeMap<u8, Vec<u8>> =
                all[start..].iter().cloned().collect();
            Response::ReadDeviceInformation {
                read_code: *read_code,
                conformity: 0x01,
                more_follows: false,
                next_object_id: 0,
                objects,
            }
        }
        Request::Unknown { function_code } => {
            warn!(function_code, "no handler registered for function code");
            exception(*function_code, ExceptionCode::IllegalFunction)
        }
    }
}

/// Wraps [`update_datastore`] with the header bookkeeping every server
/// dispatch needs: the response carries the request's `transaction_id` and
/// `device_id` unchanged (§4.3 step 4 / §4.6 step 5).
pub fn dispatch(request: &RequestPdu, context: &SlaveContext) -> ResponsePdu {
    let body = update_datastore(&request.body, context);
    ResponsePdu::new(Header::new(request.header.transaction_id, request.header.device_id), body)
}
