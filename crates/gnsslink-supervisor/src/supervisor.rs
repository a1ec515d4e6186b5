use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use gnsslink_frame::{AsyncTelegramReader, FrameError, TelegramSink};
use gnsslink_transport::{Transport, TransportKind};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};

/// Liveness check written on every watchdog tick to TCP links: one ASCII
/// space, which the receiver ignores.
pub const KEEPALIVE: &[u8] = b" ";

/// Lifecycle of a [`Supervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Not connected yet.
    Disconnected,
    /// Link up, telegrams flowing.
    Active,
    /// Link lost; retrying connect.
    Reconnecting,
    /// Replay reached end-of-stream. Terminal.
    Drained,
    /// Shut down. Terminal.
    Stopped,
}

impl SupervisorState {
    pub fn name(self) -> &'static str {
        match self {
            SupervisorState::Disconnected => "disconnected",
            SupervisorState::Active => "active",
            SupervisorState::Reconnecting => "reconnecting",
            SupervisorState::Drained => "drained",
            SupervisorState::Stopped => "stopped",
        }
    }

    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, SupervisorState::Drained | SupervisorState::Stopped)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
enum Outbound {
    Command(Bytes),
    Keepalive,
}

type OutboundRx = mpsc::UnboundedReceiver<Outbound>;

/// State shared by the supervisor handle and its two tasks.
struct Shared {
    sink: Arc<dyn TelegramSink>,
    cancel: CancellationToken,
    state: watch::Sender<SupervisorState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    config: SupervisorConfig,
}

impl Shared {
    fn set_state(&self, state: SupervisorState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "supervisor state changed");
        }
    }
}

/// Keeps a receiver link alive and its telegrams flowing.
///
/// After [`connect`](Supervisor::connect) two tasks run until
/// [`shutdown`](Supervisor::shutdown):
/// - the I/O task frames inbound bytes into telegrams for the sink and writes
///   queued commands, in submission order;
/// - the watchdog checks the I/O task once per interval. When the link died it
///   reconnects (live mode) or settles in [`SupervisorState::Drained`] (replay
///   mode). While the link is up it sends [`KEEPALIVE`] on TCP links.
///
/// Dropping the supervisor cancels both tasks without waiting for them.
pub struct Supervisor<T: Transport> {
    shared: Arc<Shared>,
    transport: Option<T>,
    commands: Option<OutboundRx>,
    watchdog: Option<JoinHandle<()>>,
}

impl<T: Transport> Supervisor<T> {
    /// Create a supervisor that delivers telegrams to `sink`.
    pub fn new(transport: T, sink: impl TelegramSink, config: SupervisorConfig) -> Self {
        let sink: Arc<dyn TelegramSink> = Arc::new(sink);
        let (outbound, commands) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SupervisorState::Disconnected);

        Self {
            shared: Arc::new(Shared {
                sink,
                cancel: CancellationToken::new(),
                state,
                outbound,
                config,
            }),
            transport: Some(transport),
            commands: Some(commands),
            watchdog: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.shared.state.subscribe()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    /// Change the endpoint used by the next connect.
    ///
    /// Only possible before the first successful connect; afterwards the
    /// transport belongs to the watchdog.
    pub fn set_port(&mut self, port: &str) -> Result<()> {
        match self.transport.as_mut() {
            Some(transport) => Ok(transport.set_port(port)?),
            None => Err(SupervisorError::AlreadyConnected),
        }
    }

    /// Open the link and start the I/O and watchdog tasks.
    ///
    /// A failed connect is returned as is; no task is started and the
    /// supervisor stays [`Disconnected`](SupervisorState::Disconnected).
    pub async fn connect(&mut self) -> Result<()> {
        match self.state() {
            SupervisorState::Disconnected => {}
            SupervisorState::Active | SupervisorState::Reconnecting => {
                return Err(SupervisorError::AlreadyConnected)
            }
            SupervisorState::Drained => return Err(SupervisorError::Drained),
            SupervisorState::Stopped => return Err(SupervisorError::Stopped),
        }

        let transport = self
            .transport
            .as_mut()
            .ok_or(SupervisorError::AlreadyConnected)?;
        let stream = match transport.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                error!(endpoint = %transport.endpoint(), error = %err, "connect failed");
                return Err(err.into());
            }
        };

        let (Some(transport), Some(commands)) = (self.transport.take(), self.commands.take())
        else {
            return Err(SupervisorError::AlreadyConnected);
        };
        info!(
            endpoint = %transport.endpoint(),
            kind = %transport.kind(),
            "receiver connected"
        );

        self.shared.set_state(SupervisorState::Active);
        let io = spawn_io(stream, commands, Arc::clone(&self.shared));
        self.watchdog = Some(tokio::spawn(watchdog(
            transport,
            io,
            Arc::clone(&self.shared),
        )));
        Ok(())
    }

    /// Queue a command for the receiver.
    ///
    /// Returns as soon as the command is queued. Commands are written in the
    /// order they were queued; a write failure is logged, not returned.
    /// Commands queued before `connect` are written once the link is up.
    pub fn send(&self, command: impl Into<Bytes>) -> Result<()> {
        let command = command.into();
        if command.is_empty() {
            error!("refusing to send an empty command");
            return Err(SupervisorError::EmptyCommand);
        }

        match self.state() {
            SupervisorState::Stopped => return Err(SupervisorError::Stopped),
            SupervisorState::Drained => return Err(SupervisorError::Drained),
            _ => {}
        }

        self.shared
            .outbound
            .send(Outbound::Command(command))
            .map_err(|_| SupervisorError::Stopped)
    }

    /// Stop both tasks, close the link, and wait for everything to finish.
    pub async fn shutdown(&mut self) {
        self.shared.cancel.cancel();
        if let Some(watchdog) = self.watchdog.take() {
            if let Err(err) = watchdog.await {
                error!(error = %err, "watchdog task failed");
            }
        }
        self.shared.set_state(SupervisorState::Stopped);
        info!("supervisor stopped");
    }
}

impl<T: Transport> Drop for Supervisor<T> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn watchdog<T: Transport>(
    mut transport: T,
    mut io: JoinHandle<OutboundRx>,
    shared: Arc<Shared>,
) {
    let kind = transport.kind();
    let endpoint = transport.endpoint();
    let replay = shared.config.settings.is_replay() || kind == TransportKind::Replay;
    let keepalive = shared.config.keepalive && kind.needs_keepalive();

    let mut ticker = tokio::time::interval(shared.config.watchdog_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !io.is_finished() {
            if keepalive && shared.outbound.send(Outbound::Keepalive).is_ok() {
                debug!("ping");
            }
            continue;
        }

        let Some(commands) = join_io(io).await else {
            shared.set_state(SupervisorState::Stopped);
            return;
        };

        if replay {
            info!(%endpoint, "replay finished");
            shared.set_state(SupervisorState::Drained);
            return;
        }

        error!(%endpoint, "connection lost, reconnecting");
        shared.set_state(SupervisorState::Reconnecting);
        let Some(stream) = reconnect(&mut transport, &shared).await else {
            return;
        };

        info!(%endpoint, "receiver reconnected");
        shared.set_state(SupervisorState::Active);
        io = spawn_io(stream, commands, Arc::clone(&shared));
        ticker.reset();
    }

    join_io(io).await;
}

/// Retry connect every `reconnect_interval` until it succeeds or the
/// supervisor is cancelled.
async fn reconnect<T: Transport>(transport: &mut T, shared: &Shared) -> Option<T::Stream> {
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return None,
            result = transport.connect() => result,
        };
        match result {
            Ok(stream) => return Some(stream),
            Err(err) => debug!(attempt, error = %err, "reconnect attempt failed"),
        }

        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return None,
            _ = tokio::time::sleep(shared.config.reconnect_interval) => {}
        }
    }
}

async fn join_io(io: JoinHandle<OutboundRx>) -> Option<OutboundRx> {
    match io.await {
        Ok(commands) => Some(commands),
        Err(err) => {
            error!(error = %err, "I/O task failed");
            None
        }
    }
}

fn spawn_io<S>(stream: S, commands: OutboundRx, shared: Arc<Shared>) -> JoinHandle<OutboundRx>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(io_loop(stream, commands, shared))
}

/// Frame inbound telegrams and write outbound commands until the link ends or
/// the supervisor is cancelled. Hands the command queue back for the next link.
///
/// Reads and writes run side by side on the two halves of the stream, so a
/// writer blocked by a peer that does not drain never stalls framing.
async fn io_loop<S>(stream: S, mut commands: OutboundRx, shared: Arc<Shared>) -> OutboundRx
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let link = shared.cancel.child_token();

    let ((), closed_cleanly) = tokio::join!(
        read_telegrams(read_half, &shared, &link),
        write_commands(write_half, &mut commands, &link),
    );
    if !closed_cleanly {
        debug!("link dropped with a write in flight");
    }
    commands
}

async fn read_telegrams<R>(read_half: R, shared: &Shared, link: &CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = AsyncTelegramReader::with_config(read_half, shared.config.framer.clone());

    loop {
        tokio::select! {
            biased;
            _ = link.cancelled() => break,
            result = reader.read_telegram() => match result {
                Ok(telegram) => shared.sink.push(telegram),
                Err(FrameError::ConnectionClosed { pending }) => {
                    info!(pending, "link closed by peer");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "link read failed");
                    break;
                }
            },
        }
    }
    link.cancel();

    let stats = reader.stats();
    debug!(
        delivered = stats.delivered,
        resyncs = stats.resyncs,
        crc_failures = stats.crc_failures,
        "I/O task finished"
    );
}

/// Write queued commands in order until the link ends.
///
/// Returns false when the link ended in the middle of a write; the half is
/// then dropped without a graceful shutdown.
async fn write_commands<W>(
    mut write_half: W,
    commands: &mut OutboundRx,
    link: &CancellationToken,
) -> bool
where
    W: AsyncWrite + Unpin,
{
    loop {
        let outbound = tokio::select! {
            biased;
            _ = link.cancelled() => break,
            outbound = commands.recv() => outbound,
        };
        let Some(outbound) = outbound else {
            link.cancelled().await;
            break;
        };
        tokio::select! {
            biased;
            _ = link.cancelled() => return false,
            _ = write_outbound(&mut write_half, outbound) => {}
        }
    }

    if let Err(err) = write_half.shutdown().await {
        debug!(error = %err, "closing link failed");
    }
    true
}

async fn write_outbound<W: AsyncWrite + Unpin>(writer: &mut W, outbound: Outbound) {
    let (payload, keepalive) = match outbound {
        Outbound::Command(command) => (command, false),
        Outbound::Keepalive => (Bytes::from_static(KEEPALIVE), true),
    };

    let result = match writer.write_all(&payload).await {
        Ok(()) => writer.flush().await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) if keepalive => trace!("keepalive written"),
        Ok(()) => debug!(
            len = payload.len(),
            command = %String::from_utf8_lossy(&payload).trim_end(),
            "command written"
        ),
        Err(err) => error!(len = payload.len(), error = %err, "write failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use gnsslink_frame::Telegram;
    use gnsslink_transport::ReplayTransport;

    use super::*;

    fn idle_supervisor() -> Supervisor<ReplayTransport> {
        let (tx, _rx) = mpsc::channel::<Telegram>();
        Supervisor::new(
            ReplayTransport::new("/nonexistent/receiver.sbf"),
            tx,
            SupervisorConfig::default(),
        )
    }

    #[test]
    fn starts_disconnected() {
        let supervisor = idle_supervisor();
        assert_eq!(supervisor.state(), SupervisorState::Disconnected);
        assert!(!supervisor.state().is_terminal());
    }

    #[test]
    fn empty_command_rejected() {
        let supervisor = idle_supervisor();
        assert!(matches!(
            supervisor.send(Bytes::new()),
            Err(SupervisorError::EmptyCommand)
        ));
        assert!(supervisor.send(&b"grc\r\n"[..]).is_ok());
    }

    #[test]
    fn set_port_before_connect() {
        let mut supervisor = idle_supervisor();
        supervisor.set_port("/tmp/other.sbf").unwrap();
        assert!(supervisor.set_port("  ").is_err());
    }

    #[tokio::test]
    async fn failed_connect_stays_disconnected() {
        let mut supervisor = idle_supervisor();
        let err = supervisor.connect().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Transport(_)));
        assert_eq!(supervisor.state(), SupervisorState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_is_terminal() {
        let mut supervisor = idle_supervisor();
        supervisor.shutdown().await;

        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(matches!(
            supervisor.send(&b"grc\r\n"[..]),
            Err(SupervisorError::Stopped)
        ));
        assert!(matches!(
            supervisor.connect().await,
            Err(SupervisorError::Stopped)
        ));
    }

    #[test]
    fn state_names() {
        assert_eq!(SupervisorState::Reconnecting.to_string(), "reconnecting");
        assert!(SupervisorState::Drained.is_terminal());
    }
}
