//! The function-code registry (§4.3): maps a wire function code to a
//! request/response decoder. Every standard code is handled by
//! [`Request::decode`]/[`Response::decode`] directly; this type exists for
//! the genuinely dynamic case — user-registered custom function codes —
//! and for the RTU framer's expected-length prediction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::pdu::request::{
    FC_GET_COMM_EVENT_COUNTER, FC_GET_COMM_EVENT_LOG, FC_MASK_WRITE_REGISTER, FC_READ_COILS,
    FC_READ_DEVICE_IDENTIFICATION, FC_READ_DISCRETE_INPUTS, FC_READ_EXCEPTION_STATUS,
    FC_READ_FIFO_QUEUE, FC_READ_FILE_RECORD, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_READ_WRITE_MULTIPLE_REGISTERS, FC_REPORT_SLAVE_ID, FC_WRITE_FILE_RECORD,
    FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_COIL,
    FC_WRITE_SINGLE_REGISTER,
};
use crate::pdu::{Request, Response};

/// How to size an RTU frame before its CRC has even arrived, so the framer
/// can read exactly `size` bytes off the wire (§4.5). Requests and
/// responses have different wire shapes for the same function code (a read
/// request's PDU is a fixed 5 bytes; its response carries a byte count), so
/// [`PduRegistry`] keeps one table per direction and picks the right one
/// off `is_server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSize {
    /// The PDU is always this many bytes (function code + payload).
    Fixed(usize),
    /// Byte `count_offset` of the PDU (0-indexed, so PDU byte 0 is the
    /// function code itself) is a byte count; the PDU is
    /// `count_offset + 1 + count + trailer_len` bytes long.
    ByteCountAt { count_offset: usize, trailer_len: usize },
}

/// Response-side sizing: what a server sends back for each function code.
fn builtin_response_size(function_code: u8) -> Option<ResponseSize> {
    Some(match function_code {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_READ_HOLDING_REGISTERS
        | FC_READ_INPUT_REGISTERS => ResponseSize::ByteCountAt { count_offset: 1, trailer_len: 0 },
        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER | FC_WRITE_MULTIPLE_COILS
        | FC_WRITE_MULTIPLE_REGISTERS => ResponseSize::Fixed(5),
        FC_READ_EXCEPTION_STATUS => ResponseSize::Fixed(2),
        FC_MASK_WRITE_REGISTER => ResponseSize::Fixed(7),
        FC_REPORT_SLAVE_ID | FC_READ_FILE_RECORD | FC_WRITE_FILE_RECORD
        | FC_READ_DEVICE_IDENTIFICATION => ResponseSize::ByteCountAt { count_offset: 1, trailer_len: 0 },
        FC_READ_FIFO_QUEUE => ResponseSize::ByteCountAt { count_offset: 2, trailer_len: 0 },
        FC_READ_WRITE_MULTIPLE_REGISTERS => {
            ResponseSize::ByteCountAt { count_offset: 1, trailer_len: 0 }
        }
        _ => return None,
    })
}

/// Request-side sizing: what a client sends for each function code. A
/// server's RTU framer needs this table, not the response one — a request
/// and its response rarely share a wire shape (e.g. FC3's request is a
/// fixed 5 bytes; its response carries a byte count).
fn builtin_request_size(function_code: u8) -> Option<ResponseSize> {
    Some(match function_code {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_READ_HOLDING_REGISTERS
        | FC_READ_INPUT_REGISTERS => ResponseSize::Fixed(5),
        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER => ResponseSize::Fixed(5),
        FC_READ_EXCEPTION_STATUS | FC_GET_COMM_EVENT_COUNTER | FC_GET_COMM_EVENT_LOG
        | FC_REPORT_SLAVE_ID => ResponseSize::Fixed(1),
        FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => {
            ResponseSize::ByteCountAt { count_offset: 5, trailer_len: 0 }
        }
        FC_MASK_WRITE_REGISTER => ResponseSize::Fixed(7),
        FC_READ_FILE_RECORD | FC_WRITE_FILE_RECORD => {
            ResponseSize::ByteCountAt { count_offset: 1, trailer_len: 0 }
        }
        FC_READ_WRITE_MULTIPLE_REGISTERS => {
            ResponseSize::ByteCountAt { count_offset: 9, trailer_len: 0 }
        }
        FC_READ_FIFO_QUEUE => ResponseSize::Fixed(3),
        FC_READ_DEVICE_IDENTIFICATION => ResponseSize::Fixed(4),
        _ => return None,
    })
}

type RequestDecoder = Arc<dyn Fn(&[u8]) -> Result<Request> + Send + Sync>;
type ResponseDecoder = Arc<dyn Fn(&[u8]) -> Result<Response> + Send + Sync>;

/// A user-registered function code: a pair of decoders plus the size hints
/// the RTU framer needs to predict a request or response frame's length.
#[derive(Clone)]
pub struct CustomCodec {
    pub function_code: u8,
    pub decode_request: RequestDecoder,
    pub decode_response: ResponseDecoder,
    pub request_size: ResponseSize,
    pub response_size: ResponseSize,
}

/// Function-code registry used by both client (response decoding) and
/// server (request decoding) sides — `is_server` only changes which side of
/// [`Request`]/[`Response`] a caller is expected to invoke.
pub struct PduRegistry {
    is_server: bool,
    custom: HashMap<u8, CustomCodec>,
}

impl PduRegistry {
    pub fn new(is_server: bool) -> Self {
        Self { is_server, custom: HashMap::new() }
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Register (or replace) a custom function code. Per §4.3, registration
    /// is append-only and a duplicate silently replaces the prior entry —
    /// logged here rather than silent.
    pub fn register(&mut self, codec: CustomCodec) {
        if self.custom.contains_key(&codec.function_code) {
            debug!(function_code = codec.function_code, "replacing custom PDU registration");
        }
        self.custom.insert(codec.function_code, codec);
    }

    /// Decode a request PDU body. Falls through to the built-in
    /// [`Request::decode`] unless `function_code` was registered custom.
    pub fn decode_request(&self, function_code: u8, bytes: &[u8]) -> Result<Request> {
        if let Some(codec) = self.custom.get(&function_code) {
            return (codec.decode_request)(bytes);
        }
        Request::decode(function_code, bytes)
    }

    /// Decode a response PDU body. Falls through to the built-in
    /// [`Response::decode`] unless `function_code` was registered custom.
    pub fn decode_response(&self, function_code: u8, bytes: &[u8]) -> Result<Response> {
        if let Some(codec) = self.custom.get(&function_code) {
            return (codec.decode_response)(bytes);
        }
        Response::decode(function_code, bytes)
    }

    /// The RTU framer's length hint for a response to `function_code`, used
    /// to read exactly the right number of bytes off a half-duplex link
    /// before validating the trailing CRC (§4.5). Exception responses (high
    /// bit set) are always a 2-byte PDU regardless of the original code.
    pub fn response_size(&self, function_code: u8) -> Option<ResponseSize> {
        if let Some(codec) = self.custom.get(&function_code) {
            return Some(codec.response_size);
        }
        if function_code & 0x80 != 0 {
            return Some(ResponseSize::Fixed(2));
        }
        builtin_response_size(function_code)
    }

    /// The RTU framer's length hint for a *request* carrying
    /// `function_code`. Used instead of [`PduRegistry::response_size`] when
    /// `is_server` is true, since a server's framer is decoding incoming
    /// requests, not responses — the two have different wire shapes for
    /// the same code (§4.5).
    pub fn request_size(&self, function_code: u8) -> Option<ResponseSize> {
        if let Some(codec) = self.custom.get(&function_code) {
            return Some(codec.request_size);
        }
        builtin_request_size(function_code)
    }

    /// The length hint appropriate for whichever side of the wire this
    /// registry was built for: requests when `is_server`, responses
    /// otherwise.
    pub fn frame_size(&self, function_code: u8) -> Option<ResponseSize> {
        if self.is_server {
            self.request_size(function_code)
        } else {
            self.response_size(function_code)
        }
    }
}
