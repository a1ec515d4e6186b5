//! Print every telegram a receiver sends.
//!
//! ```text
//! cargo run --example monitor -- tcp 192.168.3.1
//! cargo run --example monitor -- serial /dev/ttyACM0 --baud 115200
//! cargo run --example monitor -- replay capture.sbf --log-level debug
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gnsslink::frame::{Telegram, TelegramFormat};
use gnsslink::supervisor::{Settings, Supervisor, SupervisorConfig, SupervisorState};
use gnsslink::transport::tcp::DEFAULT_TCP_PORT;
use gnsslink::transport::{
    ReplayTransport, SerialConfig, SerialTransport, TcpConfig, TcpTransport, Transport,
};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "monitor", about = "Print telegrams from a GNSS/INS receiver")]
struct Cli {
    /// Emit logs as JSON lines (stderr).
    #[arg(long, global = true)]
    json_logs: bool,

    /// Minimum log level (stderr): error, warn, info, debug or trace.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: tracing::Level,

    /// Command to send once connected (repeatable). CR LF is appended.
    #[arg(long = "command", value_name = "CMD", global = true)]
    commands: Vec<String>,

    #[command(subcommand)]
    link: Link,
}

#[derive(Subcommand, Debug)]
enum Link {
    /// Receiver IP port.
    Tcp {
        host: String,
        #[arg(long, default_value_t = DEFAULT_TCP_PORT)]
        port: u16,
    },
    /// Serial device.
    Serial {
        device: String,
        #[arg(long, default_value_t = 921_600)]
        baud: u32,
    },
    /// Recorded receiver log.
    Replay { path: PathBuf },
}

fn init_logging(json: bool, level: tracing::Level) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs, cli.log_level);

    let result = match cli.link {
        Link::Tcp { host, port } => {
            monitor(TcpTransport::new(TcpConfig::new(host, port)), cli.commands, false).await
        }
        Link::Serial { device, baud } => {
            monitor(
                SerialTransport::new(SerialConfig::new(device, baud)),
                cli.commands,
                false,
            )
            .await
        }
        Link::Replay { path } => monitor(ReplayTransport::new(path), cli.commands, true).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn monitor<T: Transport>(
    transport: T,
    commands: Vec<String>,
    replay: bool,
) -> gnsslink::supervisor::Result<()> {
    let config = SupervisorConfig {
        settings: Settings {
            read_from_log_file: replay,
            ..Settings::default()
        },
        ..SupervisorConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut supervisor = Supervisor::new(transport, tx, config);
    let mut states = supervisor.subscribe_state();
    supervisor.connect().await?;

    for command in commands {
        supervisor.send(format!("{command}\r\n"))?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(telegram) = rx.recv() => print_telegram(&telegram),
            changed = states.changed() => {
                if changed.is_err() || *states.borrow() == SupervisorState::Drained {
                    break;
                }
            }
        }
    }

    // Anything framed before the replay ended is still queued.
    while let Ok(telegram) = rx.try_recv() {
        print_telegram(&telegram);
    }
    supervisor.shutdown().await;
    Ok(())
}

fn print_telegram(telegram: &Telegram) {
    match telegram.format {
        TelegramFormat::Binary => println!(
            "{:<22} block {:>5} rev {} ({} bytes)",
            telegram.format,
            telegram.block_id().unwrap_or_default(),
            telegram.block_revision().unwrap_or_default(),
            telegram.len()
        ),
        _ => println!(
            "{:<22} {}",
            telegram.format,
            telegram.text().unwrap_or_default()
        ),
    }
}
