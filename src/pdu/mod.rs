//! The Modbus PDU (Protocol Data Unit) model: request/response value types,
//! exception PDUs, range validation, `update_datastore`, and the
//! function-code registry.

pub mod dispatch;
pub mod exception;
pub mod registry;
pub mod request;
pub mod response;

pub use dispatch::{dispatch, update_datastore};
pub use exception::{ExceptionCode, ExceptionResponse};
pub use registry::{CustomCodec, PduRegistry, ResponseSize};
pub use request::{FileRecordSubRequest, FileRecordSubWrite, Request};
pub use response::{FileRecordSubResponse, Response};

/// Header shared by every request/response PDU (§3): the ADU framing layer
/// fills in `transaction_id`/`device_id`, the PDU body never encodes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: u16,
    pub device_id: u8,
    /// When set, [`RequestPdu::encode`]/[`ResponsePdu::encode`] pass through
    /// pre-encoded bytes rather than re-serialising the body — used to
    /// round-trip raw wire captures without lossy re-encoding.
    pub skip_encode: bool,
}

impl Header {
    pub fn new(transaction_id: u16, device_id: u8) -> Self {
        Self {
            transaction_id,
            device_id,
            skip_encode: false,
        }
    }
}

/// A request PDU together with its correlating header.
#[derive(Debug, Clone)]
pub struct RequestPdu {
    pub header: Header,
    pub body: Request,
    /// Raw bytes, present when `header.skip_encode` is set.
    pub raw: Option<Vec<u8>>,
}

impl RequestPdu {
    pub fn new(header: Header, body: Request) -> Self {
        Self {
            header,
            body,
            raw: None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        if self.header.skip_encode {
            if let Some(raw) = &self.raw {
                return raw.clone();
            }
        }
        self.body.encode()
    }

    /// Whether this request expects a response at all. Per §4.6, only a
    /// handful of diagnostic sub-functions suppress a response — right now
    /// just Force Listen Only Mode, which the addressed device must not
    /// acknowledge. A device already in listen-only mode suppresses every
    /// later request too, but that's server-side state tracked on
    /// [`crate::datastore::SlaveContext`], not a property of the request
    /// itself.
    pub fn should_respond(&self) -> bool {
        !matches!(
            &self.body,
            Request::Diagnostics { sub_code, .. }
                if *sub_code == crate::pdu::request::DIAG_FORCE_LISTEN_ONLY_MODE
        )
    }
}

/// A response PDU (normal or exception) together with its correlating
/// header.
#[derive(Debug, Clone)]
pub struct ResponsePdu {
    pub header: Header,
    pub body: Response,
}

impl ResponsePdu {
    pub fn new(header: Header, body: Response) -> Self {
        Self { header, body }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.body.encode()
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.body, Response::Exception(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::request::DIAG_FORCE_LISTEN_ONLY_MODE;

    #[test]
    fn force_listen_only_mode_request_does_not_respond() {
        let request = RequestPdu::new(
            Header::new(1, 0x11),
            Request::Diagnostics { sub_code: DIAG_FORCE_LISTEN_ONLY_MODE, payload: vec![0, 0] },
        );
        assert!(!request.should_respond());
    }

    #[test]
    fn other_diagnostic_sub_codes_still_respond() {
        let request = RequestPdu::new(
            Header::new(1, 0x11),
            Request::Diagnostics { sub_code: 0x00, payload: vec![0xAB, 0xCD] },
        );
        assert!(request.should_respond());
    }

    #[test]
    fn non_diagnostic_requests_always_respond() {
        let request = RequestPdu::new(Header::new(1, 0x11), Request::ReadExceptionStatus);
        assert!(request.should_respond());
    }
}
