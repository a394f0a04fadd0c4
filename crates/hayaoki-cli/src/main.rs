//! hayaoki - command-line front end for hayaokid
//!
//! Stands in for a chat bridge: relays `/hayaoki` invocations on behalf of a
//! user, triggers the daily report, and prints broadcast notices.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hayaoki_api::{Command, Event, EventPayload, ResponsePayload, Visibility};
use hayaoki_ipc::{IpcClient, IpcError};
use hayaoki_util::{ParticipantId, default_socket_path};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// hayaoki - talk to the early check-in service
#[derive(Parser, Debug)]
#[command(name = "hayaoki")]
#[command(about = "Command-line front end for hayaokid", long_about = None)]
struct Args {
    /// Socket path for hayaokid connection (or set HAYAOKI_SOCKET env var)
    #[arg(short, long, env = "HAYAOKI_SOCKET")]
    socket: Option<PathBuf>,

    /// Print raw JSON payloads instead of text
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Relay a `/hayaoki` invocation, e.g. `command --user alice kiken 3/20`
    Command {
        /// Chat identity of the caller
        #[arg(short, long)]
        user: String,

        /// Command text after `/hayaoki`; empty checks in
        text: Vec<String>,
    },

    /// Run the daily report now
    Report,

    /// Print notices and reports as they are broadcast
    Watch,

    /// Show service status
    Status,

    /// Check that the service answers
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let socket_path = args.socket.unwrap_or_else(default_socket_path);
    debug!(path = %socket_path.display(), "Connecting to hayaokid");

    let client = IpcClient::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to hayaokid at {}", socket_path.display()))?;

    match args.action {
        Action::Command { user, text } => {
            let user = ParticipantId::new(user);
            if user.is_empty() {
                bail!("--user must not be empty");
            }
            let text = text.join(" ");
            let payload = request(client, Command::SlashCommand { user, text }).await?;
            print_payload(&payload, args.json)
        }
        Action::Report => {
            let payload = request(client, Command::RunDailyReport).await?;
            print_payload(&payload, args.json)
        }
        Action::Status => {
            let payload = request(client, Command::GetStatus).await?;
            print_payload(&payload, args.json)
        }
        Action::Ping => {
            let payload = request(client, Command::Ping).await?;
            print_payload(&payload, args.json)
        }
        Action::Watch => watch(client, args.json).await,
    }
}

async fn request(mut client: IpcClient, command: Command) -> Result<ResponsePayload> {
    client
        .request(command)
        .await
        .context("hayaokid rejected the request")
}

async fn watch(client: IpcClient, json: bool) -> Result<()> {
    let mut events = client.subscribe().await?;
    info!("Subscribed to hayaokid events");

    loop {
        match events.next().await {
            Ok(event) => {
                if !print_event(&event, json)? {
                    return Ok(());
                }
            }
            Err(IpcError::ConnectionClosed) => {
                info!("hayaokid closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_payload(payload: &ResponsePayload, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(payload)?);
        return Ok(());
    }

    match payload {
        ResponsePayload::Reply(reply) => {
            let tag = match reply.visibility {
                Visibility::Ephemeral => "private",
                Visibility::InChannel => "channel",
            };
            println!("[{}] {}", tag, reply.text);
        }
        ResponsePayload::ReportSent { day, text } => {
            println!("report for {}:\n{}", day, text);
        }
        ResponsePayload::Status(status) => {
            println!("live:        {}", status.live);
            println!("store:       {}", if status.store_ok { "ok" } else { "unavailable" });
            println!("tracking:    {}", status.tracking_day.as_deref().unwrap_or("-"));
            println!("schedule:    {}", status.report_schedule.as_deref().unwrap_or("off"));
            println!("last report: {}", status.last_report_day.as_deref().unwrap_or("-"));
        }
        ResponsePayload::Pong => println!("pong"),
        ResponsePayload::Subscribed { client_id } => println!("subscribed as {}", client_id),
        ResponsePayload::Unsubscribed => println!("unsubscribed"),
    }

    Ok(())
}

/// Returns false once the service announces shutdown
fn print_event(event: &Event, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(!matches!(event.payload, EventPayload::Shutdown));
    }

    let at = event.timestamp.format("%H:%M:%S");
    match &event.payload {
        EventPayload::Notice { channel, text, .. } => {
            println!("{} #{} {}", at, channel, text);
        }
        EventPayload::ReportSent {
            channel, day, text, ..
        } => {
            println!("{} #{} report {}\n{}", at, channel, day, text);
        }
        EventPayload::TrackingDayAdvanced { day } => {
            println!("{} tracking day is now {}", at, day);
        }
        EventPayload::Shutdown => {
            println!("{} hayaokid is shutting down", at);
            return Ok(false);
        }
    }

    Ok(true)
}
