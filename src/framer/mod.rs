//! Per-transport wire framers: ASCII, RTU, TCP (MBAP), and TLS (§4.2).

pub mod ascii;
pub mod rtu;
pub mod tcp;
pub mod tls;
pub mod traits;

pub use ascii::AsciiFramer;
pub use rtu::RtuFramer;
pub use tcp::TcpFramer;
pub use tls::TlsFramer;
pub use traits::{DecodedFrame, Framer};
