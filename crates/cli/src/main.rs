//! Ghostveil CLI
//!
//! Command-line interface for controlling the Ghostveil daemon.
//!
//! Each invocation opens one IPC connection (Unix socket or named pipe),
//! sends a single JSON command line, and prints the response.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ghostveil_ipc::{GhostCommand, GhostResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "ghostveil-cli")]
#[command(author, version, about = "Control the Ghostveil daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show ghost-mode status and the applied capabilities
    Status,
    /// Enable ghost mode (persisted)
    Enable,
    /// Disable ghost mode (persisted)
    Disable,
    /// Re-apply the hiding strategy now
    Reapply,
    /// Stop the daemon
    Stop,
}

impl Commands {
    fn to_ipc(&self) -> GhostCommand {
        match self {
            Commands::Status => GhostCommand::Status,
            Commands::Enable => GhostCommand::Enable,
            Commands::Disable => GhostCommand::Disable,
            Commands::Reapply => GhostCommand::Reapply,
            Commands::Stop => GhostCommand::Stop,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let response = send_command(cli.command.to_ipc()).await?;
    print_response(response)
}

/// Send one command to the daemon and read the single response line.
async fn send_command(cmd: GhostCommand) -> Result<GhostResponse> {
    let stream = connect()
        .await
        .context("could not reach the ghostveil daemon (is it running?)")?;

    let (reader, mut writer) = tokio::io::split(stream);

    let json = serde_json::to_string(&cmd)? + "\n";
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    if line.trim().is_empty() {
        bail!("daemon closed the connection without responding");
    }

    serde_json::from_str(line.trim()).context("invalid response from daemon")
}

#[cfg(unix)]
async fn connect() -> std::io::Result<tokio::net::UnixStream> {
    tokio::net::UnixStream::connect(ghostveil_ipc::socket_path()).await
}

#[cfg(windows)]
async fn connect() -> std::io::Result<tokio::net::windows::named_pipe::NamedPipeClient> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(ghostveil_ipc::PIPE_NAME)
}

fn print_response(response: GhostResponse) -> Result<()> {
    match response {
        GhostResponse::Ok => {
            println!("ok");
            Ok(())
        }
        GhostResponse::Error { message } => bail!("daemon error: {message}"),
        GhostResponse::Status {
            platform,
            is_windows,
            is_linux,
            is_mac,
            enabled,
            state,
            depth,
            applied,
            mask_window,
        } => {
            println!("platform:      {platform}");
            println!("ghost mode:    {}", if enabled { "enabled" } else { "disabled" });
            println!("state:         {state:?}");
            if let Some(depth) = depth {
                println!("depth:         {depth:?}");
            }
            if applied.is_empty() {
                println!("applied:       (none)");
            } else {
                let labels: Vec<&str> = applied.iter().map(|c| c.label()).collect();
                println!("applied:       {}", labels.join(", "));
            }
            if let Some(mask) = mask_window {
                println!("overlay mask:  {mask}");
            }
            println!(
                "os flags:      windows={is_windows} linux={is_linux} mac={is_mac}"
            );
            Ok(())
        }
    }
}
