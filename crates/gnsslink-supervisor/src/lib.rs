//! Connection supervision for GNSS/INS receiver links.
//!
//! This is the "keep it running" layer. A [`Supervisor`] connects a
//! [`Transport`](gnsslink_transport::Transport), frames its byte stream into
//! telegrams for a [`TelegramSink`](gnsslink_frame::TelegramSink), writes
//! commands, and recovers from link loss on its own:
//! - live links are reconnected at a fixed interval until they come back
//! - replayed logs end cleanly in [`SupervisorState::Drained`]
//! - TCP links get a one-byte keepalive so a silently dead peer is noticed

pub mod config;
pub mod error;
pub mod supervisor;

pub use config::{Settings, SupervisorConfig, DEFAULT_RECONNECT_INTERVAL, DEFAULT_WATCHDOG_INTERVAL};
pub use error::{Result, SupervisorError};
pub use supervisor::{Supervisor, SupervisorState, KEEPALIVE};
