use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use gnsslink_frame::{encode_block, Telegram, TelegramFormat};
use gnsslink_supervisor::{
    Settings, Supervisor, SupervisorConfig, SupervisorError, SupervisorState,
};
use gnsslink_transport::{ReplayTransport, Transport, TransportError, TransportKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

const WAIT: Duration = Duration::from_secs(30);

/// Transport whose connect attempts follow a script: `Some` hands out the
/// stream, `None` (or an empty script) refuses.
#[derive(Clone)]
struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Option<DuplexStream>>>>,
    attempts: Arc<AtomicUsize>,
    attempted_at: Arc<Mutex<Vec<Instant>>>,
    kind: TransportKind,
}

impl ScriptedTransport {
    fn new(kind: TransportKind) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            attempted_at: Arc::new(Mutex::new(Vec::new())),
            kind,
        }
    }

    /// Queue a successful connect; returns the receiver's end of the link.
    fn accept(&self) -> DuplexStream {
        self.accept_with_capacity(4096)
    }

    /// Like `accept`, with `capacity` bytes of buffering in each direction.
    fn accept_with_capacity(&self, capacity: usize) -> DuplexStream {
        let (ours, theirs) = tokio::io::duplex(capacity);
        self.script.lock().unwrap().push_back(Some(ours));
        theirs
    }

    fn refuse(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn attempted_at(&self) -> Vec<Instant> {
        self.attempted_at.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    type Stream = DuplexStream;

    async fn connect(&mut self) -> gnsslink_transport::Result<DuplexStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted_at.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front().flatten();
        next.ok_or_else(|| TransportError::Connect {
            endpoint: self.endpoint(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        })
    }

    fn set_port(&mut self, _port: &str) -> gnsslink_transport::Result<()> {
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }
}

fn binary_block(id: u16) -> Vec<u8> {
    let mut wire = BytesMut::new();
    encode_block(id, 0, &[0xA5; 16], &mut wire).unwrap();
    wire.to_vec()
}

async fn next_telegram(rx: &mut mpsc::UnboundedReceiver<Telegram>) -> Telegram {
    timeout(WAIT, rx.recv())
        .await
        .expect("telegram should arrive")
        .expect("sink should stay open")
}

#[tokio::test]
async fn delivers_telegrams_and_writes_commands() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    let mut receiver = transport.accept();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut supervisor = Supervisor::new(transport, tx, SupervisorConfig::default());

    supervisor.connect().await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Active);

    receiver.write_all(&binary_block(4007)).await.unwrap();
    receiver.write_all(b"$GPGGA,1*00\r\n").await.unwrap();

    let first = next_telegram(&mut rx).await;
    assert_eq!(first.format, TelegramFormat::Binary);
    assert_eq!(first.block_id(), Some(4007));
    let second = next_telegram(&mut rx).await;
    assert_eq!(second.format, TelegramFormat::Text);

    supervisor.send(&b"grc\r\n"[..]).unwrap();
    supervisor.send(&b"setDataInOut\r\n"[..]).unwrap();
    let mut written = vec![0u8; 19];
    timeout(WAIT, receiver.read_exact(&mut written))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(written, b"grc\r\nsetDataInOut\r\n");

    supervisor.shutdown().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn failed_connect_starts_nothing() {
    let transport = ScriptedTransport::new(TransportKind::Tcp);
    transport.refuse();
    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let mut supervisor = Supervisor::new(transport.clone(), tx, SupervisorConfig::default());

    let err = supervisor.connect().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Transport(_)));
    assert_eq!(supervisor.state(), SupervisorState::Disconnected);

    let _receiver = transport.accept();
    supervisor.connect().await.unwrap();
    assert_eq!(transport.attempts(), 2);
    assert!(matches!(
        supervisor.connect().await,
        Err(SupervisorError::AlreadyConnected)
    ));

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_link_loss() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    let first = transport.accept();
    transport.refuse();
    transport.refuse();
    transport.refuse();
    let mut second = transport.accept();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = SupervisorConfig::default();
    let watchdog_interval = config.watchdog_interval;
    let reconnect_interval = config.reconnect_interval;
    let mut supervisor = Supervisor::new(transport.clone(), tx, config);
    let mut states = supervisor.subscribe_state();
    supervisor.connect().await.unwrap();

    let dropped_at = Instant::now();
    drop(first);
    timeout(WAIT, states.wait_for(|s| *s == SupervisorState::Reconnecting))
        .await
        .unwrap()
        .unwrap();

    second.write_all(b"$R: grc\r\n").await.unwrap();
    let telegram = next_telegram(&mut rx).await;
    assert_eq!(telegram.format, TelegramFormat::Response);
    assert_eq!(supervisor.state(), SupervisorState::Active);
    assert_eq!(transport.attempts(), 5);

    // The loss is noticed on the next watchdog tick and the first attempt
    // follows at once.
    let attempted_at = transport.attempted_at();
    let tolerance = Duration::from_millis(50);
    assert!(attempted_at[1] - dropped_at <= watchdog_interval + tolerance);

    // Retries are evenly spaced, with no backoff.
    for pair in attempted_at[1..].windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= reconnect_interval, "retry after {gap:?}");
        assert!(gap < reconnect_interval + tolerance, "retry after {gap:?}");
    }

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn commands_survive_reconnect() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    let first = transport.accept();
    transport.refuse();
    let mut second = transport.accept();

    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let mut supervisor = Supervisor::new(transport.clone(), tx, SupervisorConfig::default());
    let mut states = supervisor.subscribe_state();
    supervisor.connect().await.unwrap();

    drop(first);
    timeout(WAIT, states.wait_for(|s| *s == SupervisorState::Reconnecting))
        .await
        .unwrap()
        .unwrap();
    supervisor.send(&b"lif\r\n"[..]).unwrap();

    let mut written = [0u8; 5];
    timeout(WAIT, second.read_exact(&mut written))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&written, b"lif\r\n");

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn replay_mode_drains_instead_of_reconnecting() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    let mut log = transport.accept();
    let _unused = transport.accept();

    let config = SupervisorConfig {
        settings: Settings {
            read_from_log_file: true,
            ..Settings::default()
        },
        ..SupervisorConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut supervisor = Supervisor::new(transport.clone(), tx, config);
    let mut states = supervisor.subscribe_state();
    supervisor.connect().await.unwrap();

    log.write_all(b"$INHDT,90.0,T*00\r\n").await.unwrap();
    drop(log);

    assert_eq!(next_telegram(&mut rx).await.format, TelegramFormat::TextInertial);
    timeout(WAIT, states.wait_for(|s| *s == SupervisorState::Drained))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(transport.attempts(), 1);
    assert!(matches!(
        supervisor.send(&b"grc\r\n"[..]),
        Err(SupervisorError::Drained)
    ));
    assert!(matches!(
        supervisor.connect().await,
        Err(SupervisorError::Drained)
    ));

    supervisor.shutdown().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn tcp_links_get_keepalive() {
    let transport = ScriptedTransport::new(TransportKind::Tcp);
    let mut receiver = transport.accept();
    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let mut supervisor = Supervisor::new(transport, tx, SupervisorConfig::default());
    supervisor.connect().await.unwrap();

    let mut pings = [0u8; 3];
    timeout(WAIT, receiver.read_exact(&mut pings))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&pings, b"   ");

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn serial_links_get_no_keepalive() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    let mut receiver = transport.accept();
    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let mut supervisor = Supervisor::new(transport, tx, SupervisorConfig::default());
    supervisor.connect().await.unwrap();

    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(5), receiver.read(&mut buf)).await;
    assert!(read.is_err(), "serial link received {buf:?}");

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn keepalive_can_be_disabled() {
    let transport = ScriptedTransport::new(TransportKind::Tcp);
    let mut receiver = transport.accept();
    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let config = SupervisorConfig {
        keepalive: false,
        ..SupervisorConfig::default()
    };
    let mut supervisor = Supervisor::new(transport, tx, config);
    supervisor.connect().await.unwrap();

    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(5), receiver.read(&mut buf)).await;
    assert!(read.is_err());

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stalled_write_does_not_block_reads_or_shutdown() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    // The receiver never reads, so a large command fills the link.
    let mut receiver = transport.accept_with_capacity(64);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut supervisor = Supervisor::new(transport, tx, SupervisorConfig::default());
    supervisor.connect().await.unwrap();

    supervisor.send(vec![b'x'; 1024]).unwrap();
    tokio::task::yield_now().await;
    receiver.write_all(b"$GPZDA,1\r\n").await.unwrap();

    let telegram = next_telegram(&mut rx).await;
    assert_eq!(telegram.bytes.as_ref(), b"$GPZDA,1\r\n");

    timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .expect("shutdown should not wait for the stalled write");
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn shutdown_closes_the_link() {
    let transport = ScriptedTransport::new(TransportKind::Serial);
    let mut receiver = transport.accept();
    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let mut supervisor = Supervisor::new(transport, tx, SupervisorConfig::default());
    supervisor.connect().await.unwrap();

    supervisor.shutdown().await;

    let mut buf = [0u8; 8];
    let read = timeout(WAIT, receiver.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(read, 0);
    assert!(matches!(
        supervisor.send(&b"grc\r\n"[..]),
        Err(SupervisorError::Stopped)
    ));
}

#[tokio::test]
async fn shutdown_interrupts_reconnect_loop() {
    let transport = ScriptedTransport::new(TransportKind::Tcp);
    let first = transport.accept();
    let (tx, _rx) = mpsc::unbounded_channel::<Telegram>();
    let config = SupervisorConfig {
        watchdog_interval: Duration::from_millis(10),
        reconnect_interval: Duration::from_millis(10),
        ..SupervisorConfig::default()
    };
    let mut supervisor = Supervisor::new(transport.clone(), tx, config);
    let mut states = supervisor.subscribe_state();
    supervisor.connect().await.unwrap();

    drop(first);
    timeout(WAIT, states.wait_for(|s| *s == SupervisorState::Reconnecting))
        .await
        .unwrap()
        .unwrap();

    timeout(WAIT, supervisor.shutdown()).await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn replays_recorded_log_file() {
    let path = std::env::temp_dir().join(format!(
        "gnsslink-replay-{}-{}.sbf",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    let mut log = binary_block(4007);
    log.extend_from_slice(b"garbage");
    log.extend_from_slice(&binary_block(5914));
    log.extend_from_slice(b"$GPZDA,1\r\n");
    std::fs::write(&path, &log).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = SupervisorConfig {
        watchdog_interval: Duration::from_millis(20),
        ..SupervisorConfig::default()
    };
    let mut supervisor = Supervisor::new(ReplayTransport::new(&path), tx, config);
    let mut states = supervisor.subscribe_state();
    supervisor.connect().await.unwrap();

    assert_eq!(next_telegram(&mut rx).await.block_id(), Some(4007));
    assert_eq!(next_telegram(&mut rx).await.block_id(), Some(5914));
    assert_eq!(next_telegram(&mut rx).await.format, TelegramFormat::Text);

    timeout(WAIT, states.wait_for(|s| *s == SupervisorState::Drained))
        .await
        .unwrap()
        .unwrap();

    supervisor.shutdown().await;
    let _ = std::fs::remove_file(&path);
}
