/// Errors that can occur in supervisor operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gnsslink_transport::TransportError),

    /// `send` was called with nothing to send.
    #[error("refusing to send an empty command")]
    EmptyCommand,

    /// The supervisor is already running its connection tasks.
    #[error("supervisor is already connected")]
    AlreadyConnected,

    /// Replay finished; the supervisor will not connect again.
    #[error("replay finished")]
    Drained,

    /// The supervisor was shut down.
    #[error("supervisor stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
