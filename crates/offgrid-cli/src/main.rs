//! OffGrid Relay CLI
//!
//! Thin wrapper around offgrid-core functions for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Show this device's id and store counts
//! offgrid info
//!
//! # Send a text to one device, or to everyone with "0"
//! offgrid send 1a2b3c4d "Meet at the school"
//!
//! # Broadcast an SOS
//! offgrid sos "Injured, north trail marker 4"
//!
//! # Read what arrived here / what we carry for others
//! offgrid inbox
//! offgrid outbox --to 1a2b3c4d
//!
//! # Produce a bundle (optionally as a QR code) and take one in
//! offgrid export --qr
//! offgrid import eyJmcm9tIjoi...
//! offgrid import --file bundle.txt
//! pbpaste | offgrid import
//!
//! # Wipe everything, including the device id
//! offgrid reset --force
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offgrid_core::{
    BodyPolicy, DeviceId, Message, MessageKind, RelayConfig, RelayEngine, ZeroTtlPolicy,
};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// OffGrid Relay - store-and-forward messaging without a network
#[derive(Parser)]
#[command(name = "offgrid")]
#[command(version = "0.1.0")]
#[command(about = "OffGrid Relay - store-and-forward messaging without a network")]
#[command(
    long_about = "Messages travel between devices as text bundles carried by hand. Every device that imports a bundle relays what it learned in its next export."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (default: ~/.offgrid/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Cut bodies longer than 280 characters instead of refusing them
    #[arg(long, global = true)]
    truncate: bool,

    /// Keep exporting messages whose ttl has reached zero
    #[arg(long, global = true)]
    keep_zero_ttl: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device id, data directory and store counts
    Info,

    /// Send a text message
    Send {
        /// Recipient device id ("0" or empty for broadcast)
        to: String,
        /// Message text (up to 280 characters)
        body: String,
        /// Priority (higher is more urgent)
        #[arg(short, long, default_value_t = 0)]
        prio: i32,
        /// Hop budget
        #[arg(short, long)]
        ttl: Option<u32>,
    },

    /// Broadcast an SOS message
    Sos {
        /// Message text (up to 280 characters)
        body: String,
    },

    /// List messages delivered to this device
    Inbox,

    /// List messages this device carries for others
    Outbox {
        /// Only show messages addressed to this device id
        #[arg(long)]
        to: Option<String>,
    },

    /// List ids of messages confirmed as received
    Acks,

    /// Print a bundle for carrying to another device
    Export {
        /// Write the bundle to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also render the bundle as a QR code
        #[arg(long)]
        qr: bool,
    },

    /// Import a bundle from another device
    Import {
        /// Bundle string (read from stdin if neither this nor --file is given)
        bundle: Option<String>,
        /// Read the bundle from a file
        #[arg(short, long, conflicts_with = "bundle")]
        file: Option<PathBuf>,
    },

    /// Wipe all messages, acks and the device id
    Reset {
        /// Confirm the reset
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config = build_config(&cli);
    debug!(?data_dir, ?config, "Opening relay store");
    let engine = RelayEngine::with_config(&data_dir, config)
        .await
        .with_context(|| format!("Failed to open relay store in {}", data_dir.display()))?;

    match cli.command {
        Commands::Info => {
            let stats = engine.stats()?;
            let config = engine.config();

            println!("OffGrid Relay v0.1.0");
            println!();
            println!("Device ID: {}", engine.device_id());
            println!("Data directory: {}", engine.data_dir().display());
            println!();
            println!("Messages: {}", stats.messages);
            println!("Acks: {}", stats.acks);
            println!("Seen: {}", stats.seen);
            println!();
            println!("Default ttl: {}", config.default_ttl);
            println!(
                "Zero-ttl messages: {}",
                match config.zero_ttl_policy {
                    ZeroTtlPolicy::StopForwarding => "kept, not forwarded",
                    ZeroTtlPolicy::KeepForwarding => "forwarded",
                }
            );
        }

        Commands::Send { to, body, prio, .. } => {
            let to = DeviceId::recipient_or_broadcast(&to);
            let msg = engine
                .create_outgoing(MessageKind::Text, to, &body, prio)
                .await?;
            println!("Queued message {}", msg.id);
            println!("  To: {}", describe_recipient(&msg.to));
            println!("  TTL: {}", msg.ttl);
        }

        Commands::Sos { body } => {
            let msg = engine.send_sos(&body).await?;
            println!("Queued SOS {}", msg.id);
            println!("  TTL: {}", msg.ttl);
        }

        Commands::Inbox => {
            let messages = engine.list_inbox().await?;
            if messages.is_empty() {
                println!("Inbox is empty.");
            } else {
                println!("Inbox ({}):", messages.len());
                for msg in &messages {
                    println!("{}", render_message(msg, None));
                }
            }
        }

        Commands::Outbox { to } => {
            let messages = match to {
                Some(to) => {
                    engine
                        .list_outbox_for(&DeviceId::recipient_or_broadcast(&to))
                        .await?
                }
                None => engine.list_outbox().await?,
            };
            if messages.is_empty() {
                println!("Outbox is empty.");
            } else {
                println!("Outbox ({}):", messages.len());
                for msg in &messages {
                    let status = engine.delivery_status(msg.id)?;
                    println!("{}", render_message(msg, Some(status.is_delivered())));
                }
            }
        }

        Commands::Acks => {
            let acks = engine.list_acks()?;
            if acks.is_empty() {
                println!("No acks.");
            } else {
                println!("Acks ({}):", acks.len());
                for id in acks {
                    println!("  {}", id);
                }
            }
        }

        Commands::Export { out, qr } => {
            let bundle = engine.export_bundle().await?;

            match out {
                Some(path) => {
                    tokio::fs::write(&path, format!("{}\n", bundle))
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Bundle written to {}", path.display());
                }
                None => println!("{}", bundle),
            }

            if qr {
                println!();
                println!("{}", render_qr(&bundle)?);
            }
        }

        Commands::Import { bundle, file } => {
            let input = match (bundle, file) {
                (Some(bundle), _) => bundle,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => {
                    let mut buf = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buf)
                        .await
                        .context("Failed to read bundle from stdin")?;
                    buf
                }
            };

            let report = engine.import_bundle(&input).await?;

            println!("Bundle imported.");
            println!(
                "  Messages: {} new, {} already seen",
                report.merged, report.duplicates
            );
            println!("  Delivered to inbox: {}", report.delivered);
            println!(
                "  Acks: {} received, {} new, {} generated",
                report.acks_received, report.acks_new, report.acks_generated
            );
        }

        Commands::Reset { force } => {
            if !force {
                println!("WARNING: Reset is IRREVERSIBLE!");
                println!();
                println!("This will:");
                println!("  - Delete every stored message");
                println!("  - Forget all acks and seen ids");
                println!("  - Replace this device's id with a new one");
                println!();
                println!("To confirm, run: offgrid reset --force");
            } else {
                let new_id = engine.reset_all().await?;
                println!("Relay state reset.");
                println!("  New Device ID: {}", new_id);
            }
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> RelayConfig {
    let mut config = RelayConfig::default();
    if cli.truncate {
        config.body_policy = BodyPolicy::Truncate;
    }
    if cli.keep_zero_ttl {
        config.zero_ttl_policy = ZeroTtlPolicy::KeepForwarding;
    }
    if let Commands::Send { ttl: Some(ttl), .. } = &cli.command {
        config.default_ttl = *ttl;
    }
    config
}

fn describe_recipient(to: &DeviceId) -> String {
    if to.is_broadcast() {
        "everyone (broadcast)".to_string()
    } else {
        to.to_string()
    }
}

fn format_time(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => ts.to_string(),
    }
}

fn render_message(msg: &Message, delivered: Option<bool>) -> String {
    let tag = msg.kind.tag();
    let head = if tag.is_empty() {
        format!("{}  {}", format_time(msg.ts), msg.body)
    } else {
        format!("{} {}  {}", tag, format_time(msg.ts), msg.body)
    };
    let mark = match delivered {
        Some(true) => "  ✓ delivered",
        _ => "",
    };
    format!(
        "  {}\n    {} → {}  id {}  ttl {}{}",
        head, msg.from, msg.to, msg.id, msg.ttl, mark
    )
}

fn render_qr(data: &str) -> Result<String> {
    use qrcode::render::unicode::Dense1x2;
    use qrcode::QrCode;

    let code = QrCode::new(data.as_bytes()).context("Bundle is too large for a QR code")?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .build())
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries bundles, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".offgrid")
        .join("data")
}
