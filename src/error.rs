//! Error handling for the Modbus protocol core.
//!
//! Mirrors the shape of `comsrv::utils::error::ComSrvError`: one `thiserror`
//! enum at the crate root, plus a crate-local [`Result`] alias. Protocol
//! exceptions get their own variant carrying a real [`ExceptionCode`] so
//! callers can match on the wire exception rather than parse text.

use std::fmt;
use thiserror::Error;

use crate::pdu::exception::ExceptionCode;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ModbusError>;

/// All error conditions surfaced by this crate's public API.
///
/// Protocol-level exceptions (illegal function/address/value, slave busy,
/// ...) are not transport failures: they are valid Modbus responses and are
/// carried in [`ModbusError::Modbus`] only when a caller's `execute` needs to
/// turn them into a `Result::Err` for ergonomics (see [`crate::client`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Transport-level I/O failure: disconnect, timeout, connect failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Frame or codec failure: bad CRC/LRC, malformed MBAP header, truncated
    /// ASCII frame. Never fatal to the connection; the framer has already
    /// resynchronised past the offending bytes.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Eagerly-raised setup/configuration failure: unknown framer, illegal
    /// address range, out-of-range device id.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure encoding/decoding a value into its wire representation.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A device responded with (or a local dispatch produced) a Modbus
    /// exception PDU.
    #[error("Modbus exception: {exception}")]
    Modbus {
        /// Original (non-exception) function code this responds to.
        function_code: u8,
        /// The exception code reported.
        exception: ExceptionCode,
    },
}

impl ModbusError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn modbus(function_code: u8, exception: ExceptionCode) -> Self {
        Self::Modbus {
            function_code,
            exception,
        }
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02X})", self, u8::from(*self))
    }
}
