//! Ghostveil Daemon
//!
//! Hosts the ghost-mode controller for one target window.
//!
//! Responsibilities:
//! - Probe the host environment once at startup
//! - Select and re-apply the hiding strategy on lifecycle transitions
//! - Serve IPC commands from the CLI (status, enable, disable, reapply,
//!   stop)
//! - Record overlay masks reported by detached creation tasks

mod config;
mod controller;
mod native_window;

use anyhow::Result;
use config::Config;
use controller::{GhostModeController, WindowLifecycleEvent};
use ghostveil_core::{MaskWindowId, NativeWindowId};
use ghostveil_ipc::{GhostCommand, GhostResponse, MAX_IPC_MESSAGE_SIZE};
use ghostveil_platform::{EnvironmentProbe, StrategyConfig};
use native_window::NativeWindow;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// IPC read timeout - clients must send within this period.
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC command from a CLI client.
    IpcCommand {
        cmd: GhostCommand,
        responder: oneshot::Sender<GhostResponse>,
    },
    /// A window lifecycle transition from the embedding shell.
    Lifecycle(WindowLifecycleEvent),
    /// A settle timer elapsed; apply the strategy if still current.
    ApplyGhost { generation: u64 },
    /// A detached mask task created an overlay mask window.
    MaskCreated(MaskWindowId),
    /// Shutdown signal.
    Shutdown,
}

/// Daemon state driven by the single event loop.
struct DaemonState {
    config: Config,
    controller: GhostModeController,
    event_tx: mpsc::Sender<DaemonEvent>,
}

impl DaemonState {
    /// Register a lifecycle event and arm its settle timer.
    fn schedule_apply(&mut self, event: WindowLifecycleEvent) {
        let generation = self.controller.bump_generation(event);
        let delay = self.controller.settle_delay();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A closed channel means the daemon is already shutting down;
            // the timer's window no longer exists either way.
            let _ = tx.send(DaemonEvent::ApplyGhost { generation }).await;
        });
    }

    /// Run the strategy for a fired settle timer. The enabled flag is
    /// re-read from the settings store at this point, not at scheduling
    /// time.
    async fn handle_apply(&mut self, generation: u64) {
        let enabled = self.config.ghost.enabled;
        self.controller.apply_if_current(generation, enabled).await;
    }

    fn handle_command(&mut self, cmd: GhostCommand) -> GhostResponse {
        match cmd {
            GhostCommand::Status => self.status_response(),
            GhostCommand::Enable => {
                self.config.ghost.enabled = true;
                self.persist_config();
                self.schedule_apply(WindowLifecycleEvent::Shown);
                GhostResponse::Ok
            }
            GhostCommand::Disable => {
                self.config.ghost.enabled = false;
                self.persist_config();
                GhostResponse::Ok
            }
            GhostCommand::Reapply => {
                self.schedule_apply(WindowLifecycleEvent::Shown);
                GhostResponse::Ok
            }
            GhostCommand::Stop => GhostResponse::Ok,
        }
    }

    fn status_response(&self) -> GhostResponse {
        let report = self.controller.describe();
        let session = self.controller.session();
        GhostResponse::Status {
            platform: report.platform,
            is_windows: report.is_windows,
            is_linux: report.is_linux,
            is_mac: report.is_mac,
            enabled: self.config.ghost.enabled,
            state: session.state,
            depth: session.depth,
            applied: session.applied_capabilities().iter().copied().collect(),
            mask_window: session.mask_window,
        }
    }

    fn persist_config(&self) {
        if let Err(e) = self.config.save() {
            warn!("failed to persist settings: {e}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (needed for log level).
    let mut config = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {}. Using defaults.", e);
        Config::default()
    });

    let log_level = match config.behavior.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    for w in config.validate() {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("Ghostveil daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if check_already_running().await {
        error!("Another ghostveil daemon is already running");
        return Ok(());
    }

    // One-shot environment snapshot, passed explicitly from here on.
    let env = Arc::new(EnvironmentProbe::detect().await);

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    // Detached mask tasks report created masks through this channel so
    // session bookkeeping stays on the event loop.
    let (mask_tx, mut mask_rx) = mpsc::unbounded_channel::<MaskWindowId>();
    {
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(mask) = mask_rx.recv().await {
                if event_tx.send(DaemonEvent::MaskCreated(mask)).await.is_err() {
                    break;
                }
            }
        });
    }

    let strategy_config = StrategyConfig {
        window_class: config.window.class.clone(),
        window_title: config.window.title.clone(),
        mask_notifier: Some(mask_tx),
    };

    let native_id = config.window.native_id.map(NativeWindowId::from_raw);
    if native_id.is_none() {
        info!(
            class = %config.window.class,
            "no native window id configured, strategies fall back to class discovery"
        );
    }
    let window = Arc::new(NativeWindow::new(native_id, env.display.target.clone()));

    let controller = GhostModeController::new(
        Arc::clone(&env),
        window,
        strategy_config,
        native_id,
        config.ghost.enabled,
        Duration::from_millis(config.ghost.settle_delay_ms),
    );

    let mut state = DaemonState {
        config,
        controller,
        event_tx: event_tx.clone(),
    };

    // IPC server runs for the daemon's whole lifetime.
    tokio::spawn(run_ipc_server(event_tx.clone()));

    // The target window already exists when the daemon attaches. The
    // receiver is live at this point, so the send cannot fail.
    let _ = event_tx
        .send(DaemonEvent::Lifecycle(WindowLifecycleEvent::Created))
        .await;

    info!(
        platform = %state.controller.describe().platform,
        enabled = state.config.ghost.enabled,
        "Ghostveil daemon ready"
    );

    while let Some(event) = event_rx.recv().await {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                debug!(?cmd, "handling IPC command");
                let response = state.handle_command(cmd);
                let _ = responder.send(response);
            }
            DaemonEvent::Lifecycle(event) => state.schedule_apply(event),
            DaemonEvent::ApplyGhost { generation } => state.handle_apply(generation).await,
            DaemonEvent::MaskCreated(mask) => state.controller.record_mask(mask),
            DaemonEvent::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    state.controller.shutdown();
    cleanup_ipc_endpoint();
    info!("Ghostveil daemon stopped");
    Ok(())
}

/// Handle a single client connection: one JSON command line in, one JSON
/// response line out.
async fn handle_client<S>(stream: S, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
    let mut reader = BufReader::new(limited_reader);
    let mut line = String::new();

    // Read command (single line of JSON) with timeout and size bound.
    let read_result = tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await;
    let bytes_read = match read_result {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            // Timeout: client did not send in time, silently close.
            return Ok(());
        }
    };
    if bytes_read == 0 {
        return Ok(()); // Client disconnected
    }

    let line = line.trim();
    debug!("Received command: {}", line);

    let cmd: GhostCommand = match serde_json::from_str(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = GhostResponse::error(format!("Invalid command: {}", e));
            write_response(&mut writer, &response).await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, GhostCommand::Stop);

    let (resp_tx, resp_rx) = oneshot::channel();
    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        let response = GhostResponse::error("Daemon is shutting down");
        write_response(&mut writer, &response).await?;
        return Ok(());
    }

    let response = match resp_rx.await {
        Ok(resp) => resp,
        Err(_) => GhostResponse::error("Failed to get response from daemon"),
    };
    write_response(&mut writer, &response).await?;

    // Stop is acknowledged first, then the loop is signalled.
    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &GhostResponse) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let json = match serde_json::to_string(response) {
        Ok(json) => json + "\n",
        Err(e) => {
            warn!("Failed to serialize IPC response: {}", e);
            "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
        }
    };
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

#[cfg(unix)]
async fn run_ipc_server(event_tx: mpsc::Sender<DaemonEvent>) {
    let path = ghostveil_ipc::socket_path();

    // A stale socket file from a crashed daemon would block the bind;
    // check_already_running() has verified nothing is listening.
    let _ = std::fs::remove_file(&path);

    let listener = match tokio::net::UnixListener::bind(&path) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind IPC socket {:?}: {}", path, e);
            return;
        }
    };
    info!("IPC server listening on {:?}", path);

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, event_tx).await {
                        warn!("Client handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept client connection: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(windows)]
async fn run_ipc_server(event_tx: mpsc::Sender<DaemonEvent>) {
    use tokio::net::windows::named_pipe::{PipeMode, ServerOptions};

    let mut is_first_instance = true;

    loop {
        let server = match ServerOptions::new()
            .first_pipe_instance(is_first_instance)
            .pipe_mode(PipeMode::Byte)
            .create(ghostveil_ipc::PIPE_NAME)
        {
            Ok(s) => {
                is_first_instance = false;
                s
            }
            Err(e) => {
                error!("Failed to create named pipe server: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        debug!("Waiting for client connection on {}", ghostveil_ipc::PIPE_NAME);

        if let Err(e) = server.connect().await {
            error!("Failed to accept client connection: {}", e);
            continue;
        }

        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(server, event_tx).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

/// Check if another daemon instance is already running by probing the IPC
/// endpoint.
#[cfg(unix)]
async fn check_already_running() -> bool {
    tokio::net::UnixStream::connect(ghostveil_ipc::socket_path())
        .await
        .is_ok()
}

#[cfg(windows)]
async fn check_already_running() -> bool {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(ghostveil_ipc::PIPE_NAME)
        .is_ok()
}

#[cfg(unix)]
fn cleanup_ipc_endpoint() {
    let _ = std::fs::remove_file(ghostveil_ipc::socket_path());
}

#[cfg(windows)]
fn cleanup_ipc_endpoint() {
    // Named pipe instances close with their handles.
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghostveil_core::{
        ApplyState, DisplaySession, HostEnvironment, OsFamily, ToolAvailability,
    };

    fn test_state(enabled: bool) -> (DaemonState, mpsc::Receiver<DaemonEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);

        let env = Arc::new(HostEnvironment {
            os_family: OsFamily::Linux,
            display: DisplaySession::default(),
            tools: ToolAvailability::none(),
        });
        let window = Arc::new(NativeWindow::new(None, None));
        let controller = GhostModeController::new(
            Arc::clone(&env),
            window,
            StrategyConfig::default(),
            None,
            enabled,
            Duration::from_millis(1),
        );

        let mut config = Config::default();
        config.ghost.enabled = enabled;

        (
            DaemonState {
                config,
                controller,
                event_tx,
            },
            event_rx,
        )
    }

    #[tokio::test]
    async fn status_command_reports_platform_and_setting() {
        let (mut state, _rx) = test_state(true);
        match state.handle_command(GhostCommand::Status) {
            GhostResponse::Status {
                platform,
                is_linux,
                enabled,
                state: apply_state,
                ..
            } => {
                assert_eq!(platform, "linux");
                assert!(is_linux);
                assert!(enabled);
                assert_eq!(apply_state, ApplyState::NotApplied);
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reapply_and_stop_respond_ok() {
        let (mut state, _rx) = test_state(true);
        assert_eq!(state.handle_command(GhostCommand::Reapply), GhostResponse::Ok);
        assert_eq!(state.handle_command(GhostCommand::Stop), GhostResponse::Ok);
    }

    #[tokio::test]
    async fn settle_timer_fires_apply_event() {
        let (mut state, mut rx) = test_state(true);
        state.schedule_apply(WindowLifecycleEvent::Shown);

        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(DaemonEvent::ApplyGhost { generation })) => assert_eq!(generation, 1),
            other => panic!(
                "expected ApplyGhost event, got {:?}",
                other.map(|e| e.is_some())
            ),
        }
    }

    #[tokio::test]
    async fn disabled_setting_leaves_session_untouched() {
        let (mut state, _rx) = test_state(false);
        state.schedule_apply(WindowLifecycleEvent::Created);
        state.handle_apply(1).await;
        assert_eq!(state.controller.session().state, ApplyState::NotApplied);
    }

    #[tokio::test]
    async fn stale_generation_does_not_apply() {
        let (mut state, _rx) = test_state(true);
        state.schedule_apply(WindowLifecycleEvent::Created);
        state.schedule_apply(WindowLifecycleEvent::Shown);

        // Generation 1 is stale once generation 2 exists.
        state.handle_apply(1).await;
        assert_eq!(state.controller.session().state, ApplyState::NotApplied);
    }
}
