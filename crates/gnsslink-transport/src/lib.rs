//! Receiver link transports.
//!
//! Provides a single async contract over the ways a GNSS/INS receiver can be
//! reached:
//! - TCP sockets (receiver IP port or a serial-to-ethernet bridge)
//! - Serial ports (USB CDC or RS-232)
//! - Recorded log files (replay)
//!
//! This is the lowest layer of gnsslink. The framing and supervision layers are
//! generic over any [`Transport`].

pub mod error;
pub mod replay;
pub mod serial;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use replay::{ReplayStream, ReplayTransport};
pub use serial::{SerialConfig, SerialTransport};
pub use tcp::{TcpConfig, TcpTransport};
pub use traits::{Transport, TransportKind};
