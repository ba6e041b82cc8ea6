//! modbus_core
//!
//! Protocol core for Modbus ASCII/RTU/TCP/TLS: wire framers, the full PDU
//! function-code set, a datastore for server-side dispatch, and a
//! transaction manager for client-side request/response correlation.

pub mod client;
pub mod codec;
pub mod config;
pub mod datastore;
pub mod error;
pub mod framer;
pub mod pdu;
pub mod server;
pub mod transaction;
pub mod transport;

pub use client::Client;
pub use config::{ClientDefaults, DeviceIdentity, ServerDefaults};
pub use error::{ModbusError, Result};
pub use framer::{AsciiFramer, DecodedFrame, Framer, RtuFramer, TcpFramer, TlsFramer};
pub use pdu::{ExceptionCode, ExceptionResponse, Header, PduRegistry, Request, RequestPdu, Response, ResponsePdu};
pub use transaction::TransactionManager;
pub use transport::Transport;
