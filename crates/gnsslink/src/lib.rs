//! Transport, framing and supervision for GNSS/INS receiver links.
//!
//! gnsslink turns the raw byte stream of a receiver (serial port, TCP socket or
//! a recorded log) into validated telegrams, and keeps the link alive while it
//! does so.
//!
//! # Crate Structure
//!
//! - [`transport`]: Link transports (TCP, serial, file replay)
//! - [`frame`]: Telegram framing state machine and CRC check
//! - [`supervisor`]: Watchdog, reconnect and keepalive (behind `supervisor` feature)

/// Re-export transport types.
pub mod transport {
    pub use gnsslink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gnsslink_frame::*;
}

/// Re-export supervisor types (requires `supervisor` feature).
#[cfg(feature = "supervisor")]
pub mod supervisor {
    pub use gnsslink_supervisor::*;
}
