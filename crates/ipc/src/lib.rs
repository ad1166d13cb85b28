//! Ghostveil IPC Protocol
//!
//! Shared types for daemon-CLI communication: one JSON command per
//! connection, newline-delimited, answered by one JSON response line.
//! Transport is a Unix domain socket on unix and a named pipe on Windows.

use ghostveil_core::{ApplyDepth, ApplyState, CapabilityId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Named pipe path used on Windows.
pub const PIPE_NAME: &str = r"\\.\pipe\ghostveil";

/// Upper bound on a single IPC message; longer lines are truncated and
/// rejected by the parser.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Unix socket path: the user runtime directory when available, the
/// system temp directory otherwise.
pub fn socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join("ghostveil.sock")
}

/// Commands sent from the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GhostCommand {
    /// Query ghost-mode status for the trust indicator.
    Status,
    /// Enable ghost mode and persist the setting.
    Enable,
    /// Disable ghost mode and persist the setting.
    Disable,
    /// Re-apply the hiding strategy now (same path as a window-shown
    /// event).
    Reapply,
    /// Stop the daemon.
    Stop,
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GhostResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// Ghost-mode status query response.
    Status {
        /// OS family label.
        platform: String,
        is_windows: bool,
        is_linux: bool,
        is_mac: bool,
        /// The persisted ghost-mode setting.
        enabled: bool,
        /// Current apply state of the session.
        state: ApplyState,
        /// Depth reached by the last application, if any.
        depth: Option<ApplyDepth>,
        /// Capabilities applied in the last pass.
        applied: Vec<CapabilityId>,
        /// Live overlay mask window id, if one exists.
        mask_window: Option<u64>,
    },
}

impl GhostResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = GhostCommand::Status;
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("status"));

        let cmd2: GhostCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_all_command_types_roundtrip() {
        let commands = vec![
            GhostCommand::Status,
            GhostCommand::Enable,
            GhostCommand::Disable,
            GhostCommand::Reapply,
            GhostCommand::Stop,
        ];

        for cmd in commands {
            let json = serde_json::to_string(&cmd).expect("Failed to serialize command");
            let roundtrip: GhostCommand =
                serde_json::from_str(&json).expect("Failed to deserialize command");
            assert_eq!(cmd, roundtrip, "Roundtrip failed for {:?}", cmd);
        }
    }

    #[test]
    fn test_status_response_roundtrip() {
        let resp = GhostResponse::Status {
            platform: "linux".to_string(),
            is_windows: false,
            is_linux: true,
            is_mac: false,
            enabled: true,
            state: ApplyState::Applied,
            depth: Some(ApplyDepth::Native),
            applied: vec![
                CapabilityId::ToolkitShim,
                CapabilityId::X11WindowTypeOverride,
            ],
            mask_window: Some(92274690),
        };

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"platform\":\"linux\""));
        assert!(json.contains("x11_window_type_override"));

        let resp2: GhostResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_error_response() {
        let resp = GhostResponse::error("Something went wrong");
        if let GhostResponse::Error { message } = resp {
            assert_eq!(message, "Something went wrong");
        } else {
            panic!("Expected Error response");
        }
    }

    #[test]
    fn test_line_delimited_protocol() {
        // Simulate the actual IPC protocol: JSON + newline.
        let cmd = GhostCommand::Reapply;
        let wire_format = serde_json::to_string(&cmd).unwrap() + "\n";
        let parsed: GhostCommand = serde_json::from_str(wire_format.trim()).unwrap();
        assert_eq!(cmd, parsed);

        let resp = GhostResponse::Ok;
        let wire_format = serde_json::to_string(&resp).unwrap() + "\n";
        let parsed: GhostResponse = serde_json::from_str(wire_format.trim()).unwrap();
        assert_eq!(resp, parsed);
    }

    #[test]
    fn test_invalid_json_handling() {
        let result: Result<GhostCommand, _> = serde_json::from_str("not valid json");
        assert!(result.is_err());

        let result: Result<GhostCommand, _> = serde_json::from_str("{\"type\": \"unknown_command\"}");
        assert!(result.is_err());

        let result: Result<GhostResponse, _> = serde_json::from_str("{\"status\": \"invalid\"}");
        assert!(result.is_err());
    }

    #[test]
    fn test_pipe_name_format() {
        assert!(PIPE_NAME.starts_with(r"\\.\pipe\"));
        assert_eq!(PIPE_NAME, r"\\.\pipe\ghostveil");
    }

    #[test]
    fn test_socket_path_ends_with_socket_name() {
        assert!(socket_path().ends_with("ghostveil.sock"));
    }
}
