//! Modbus exception codes and the exception PDU shape.

use serde::{Deserialize, Serialize};

/// Standard Modbus exception codes (function response with the high bit of
/// the function code set carries one of these as its second byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalAddress = 0x02,
    IllegalValue = 0x03,
    SlaveFailure = 0x04,
    Acknowledge = 0x05,
    SlaveBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayNoResponse = 0x0B,
}

impl From<ExceptionCode> for u8 {
    fn from(code: ExceptionCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ExceptionCode {
    type Error = crate::error::ModbusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalAddress,
            0x03 => ExceptionCode::IllegalValue,
            0x04 => ExceptionCode::SlaveFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::SlaveBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayNoResponse,
            other => {
                return Err(crate::error::ModbusError::protocol(format!(
                    "unknown exception code 0x{other:02X}"
                )))
            }
        })
    }
}

/// An exception response: `function_code` is the *original* request's
/// function code (the 0x80 bit is added back on encode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function_code: u8,
    pub exception_code: ExceptionCode,
}

impl ExceptionResponse {
    pub fn new(function_code: u8, exception_code: ExceptionCode) -> Self {
        Self {
            function_code: function_code & 0x7F,
            exception_code,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![self.function_code | 0x80, self.exception_code.into()]
    }

    pub fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        if bytes.len() < 2 {
            return Err(crate::error::ModbusError::protocol(
                "truncated exception PDU",
            ));
        }
        Ok(Self {
            function_code: bytes[0] & 0x7F,
            exception_code: ExceptionCode::try_from(bytes[1])?,
        })
    }
}
