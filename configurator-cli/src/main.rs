mod sink;

use anyhow::Context;
use clap::{Parser, Subcommand};
use configurator_core::config::ConsoleConfig;
use configurator_core::session::{available_ports, Session};
use configurator_core::traits::DisplaySink;
use configurator_core::transaction::TransactionEvent;
use configurator_core::{qr, status};
use sink::TerminalSink;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Configure Wi-Fi on a headless board over its serial console and show the
/// resulting address as a QR code.
#[derive(Parser)]
#[command(name = "wifi-configurator", version)]
struct Cli {
    /// Path to a TOML config (serial parameters, prompt marker, remote
    /// commands). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial devices on this machine
    Ports,
    /// Scan for Wi-Fi networks through the board's console
    Scan {
        /// Serial device, e.g. /dev/ttyUSB0
        #[arg(short, long)]
        port: String,
    },
    /// Connect the board to a network, then report its status
    Connect {
        #[arg(short, long)]
        port: String,
        #[arg(short, long)]
        ssid: String,
        /// Empty for open networks
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Query connection status and render the portal QR code
    Status {
        #[arg(short, long)]
        port: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConsoleConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ConsoleConfig::default(),
    };
    let sink = TerminalSink;

    match cli.command {
        Command::Ports => {
            for port in available_ports()? {
                println!("{}", port);
            }
        }
        Command::Scan { port } => {
            let session = open_session(&port, config, &sink).await?;
            let output = run_command(&session, &sink, &session.config().commands.scan.clone()).await?;
            let ssids = status::parse_ssid_list(&output);
            sink.show_networks(&ssids).await;
            refresh_status(&session, &sink).await?;
            session.close().await;
        }
        Command::Connect {
            port,
            ssid,
            password,
        } => {
            let session = open_session(&port, config, &sink).await?;
            let command = session
                .config()
                .commands
                .connect_command(&shell_single_quote(&ssid), &shell_single_quote(&password));
            run_command(&session, &sink, &command).await?;
            refresh_status(&session, &sink).await?;
            session.close().await;
        }
        Command::Status { port } => {
            let session = open_session(&port, config, &sink).await?;
            refresh_status(&session, &sink).await?;
            session.close().await;
        }
    }
    Ok(())
}

/// Open the serial console and note the connected device in the log view.
async fn open_session(
    port: &str,
    config: ConsoleConfig,
    sink: &TerminalSink,
) -> anyhow::Result<Session> {
    let session = Session::open(port, config)?;
    sink.append_log(&format!("serial console connected: {}", session.port_name()))
        .await;
    Ok(session)
}

/// Run one transaction and collect its output, forwarding it to the log
/// view. Ctrl-C while the command runs sends the remote interrupt instead of
/// killing the process; the transaction then ends at the next prompt.
async fn run_command(
    session: &Session,
    sink: &TerminalSink,
    command: &str,
) -> anyhow::Result<String> {
    tracing::debug!("running remote command: {}", command);
    let mut events = session.execute(command).await?;
    let mut output = String::new();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransactionEvent::Output(text)) => {
                    sink.append_log(&text).await;
                    output = text;
                }
                Some(TransactionEvent::Done) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                sink.append_log("cancel requested, interrupting remote command...").await;
                session.cancel().await?;
            }
        }
    }
    Ok(output)
}

/// Query the board's connection state, update the labels and re-derive the
/// portal QR code (or clear it).
async fn refresh_status(session: &Session, sink: &TerminalSink) -> anyhow::Result<()> {
    let query = session.config().commands.status_query.clone();
    let raw = run_command(session, sink, &query).await?;
    let network_status = status::parse_network_status(&raw);
    sink.show_status(&network_status).await;
    let image = if network_status.has_address() {
        qr::encode_portal(&network_status.ip_address)?
    } else {
        None
    };
    sink.show_qr(image.as_ref()).await;
    Ok(())
}

/// POSIX single-quoting for values interpolated into remote shell commands.
/// Quoting is this caller's responsibility; the transaction runner sends the
/// command verbatim.
fn shell_single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::shell_single_quote;

    #[test]
    fn plain_values_are_wrapped() {
        assert_eq!(shell_single_quote("HomeNet"), "'HomeNet'");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        assert_eq!(
            shell_single_quote("Bob's WiFi"),
            r"'Bob'\''s WiFi'"
        );
    }

    #[test]
    fn empty_value_stays_quoted() {
        assert_eq!(shell_single_quote(""), "''");
    }
}
