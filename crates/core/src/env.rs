//! Host environment snapshot.
//!
//! A [`HostEnvironment`] is computed once at process startup by the
//! environment probe and passed explicitly into every component that needs
//! it. It is never mutated afterwards; a changed environment requires a
//! process restart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operating-system family as seen by the hiding strategies.
///
/// `LinuxOnWindowsCompat` is a Linux kernel hosted inside Windows (WSL):
/// it runs Linux userland but cannot reach the host's native window APIs,
/// so it gets its own degraded strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
    LinuxOnWindowsCompat,
}

impl OsFamily {
    /// Stable lowercase label used in logs and the status query.
    pub fn label(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::MacOs => "macos",
            OsFamily::Linux => "linux",
            OsFamily::LinuxOnWindowsCompat => "linux_on_windows_compat",
        }
    }

    /// Whether this family runs a Linux userland (genuine or compat layer).
    pub fn is_linux_like(&self) -> bool {
        matches!(self, OsFamily::Linux | OsFamily::LinuxOnWindowsCompat)
    }
}

/// Display-server protocol reported by the session environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayProtocol {
    X11,
    Wayland,
    #[default]
    Unknown,
}

/// Graphical display session properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplaySession {
    /// Session protocol (from `XDG_SESSION_TYPE` or equivalent).
    pub protocol: DisplayProtocol,
    /// Display target (the `DISPLAY` value), if one was resolved.
    pub target: Option<String>,
}

impl DisplaySession {
    /// True when a display target was resolved and X11 tools can be pointed
    /// at it.
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }
}

/// Helper tools the strategies may shell out to.
///
/// The concrete binary names live in the probe; strategies only reason
/// about the abstract kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Window geometry/property inspector (xwininfo).
    WindowInspector,
    /// Display-server property editor (xprop).
    PropertyEditor,
    /// Input/window automation tool (xdotool).
    WindowAutomation,
    /// Lightweight display-server query command (xset).
    DisplayQuery,
    /// Privileged scripting host for native interop fallback (powershell).
    ScriptHost,
    /// Compiled-in native window-API bindings.
    NativeBridge,
}

/// Presence map for helper tools, probed once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAvailability {
    present: BTreeMap<ToolKind, bool>,
    /// First hit from the ordered screen-capture preference list, if any.
    pub capture_tool: Option<String>,
}

impl ToolAvailability {
    /// A map with every tool absent.
    pub fn none() -> Self {
        Self::default()
    }

    /// Record a probe result.
    pub fn set(&mut self, kind: ToolKind, present: bool) {
        self.present.insert(kind, present);
    }

    /// Whether a tool was found. Unprobed tools count as absent.
    pub fn has(&self, kind: ToolKind) -> bool {
        self.present.get(&kind).copied().unwrap_or(false)
    }
}

/// The four signals used to classify a Linux kernel as a Windows-hosted
/// compatibility layer.
///
/// Classification is the logical OR of the four: a false positive merely
/// selects a weaker hiding strategy, a false negative would attempt native
/// calls that cannot work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WslSignals {
    /// `/proc/version` mentions the host vendor or the layer name.
    pub kernel_version_marker: bool,
    /// `/proc/sys/kernel/osrelease` mentions the layer name.
    pub kernel_release_marker: bool,
    /// A layer-specific environment variable is set.
    pub env_marker: bool,
    /// A layer-specific mount point exists.
    pub mount_point: bool,
}

impl WslSignals {
    /// OR-combine the signals. Any single positive signal classifies the
    /// environment as the compatibility layer.
    pub fn is_compat_layer(&self) -> bool {
        self.kernel_version_marker
            || self.kernel_release_marker
            || self.env_marker
            || self.mount_point
    }
}

/// Immutable snapshot of the host environment, computed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEnvironment {
    pub os_family: OsFamily,
    pub display: DisplaySession,
    pub tools: ToolAvailability,
}

impl HostEnvironment {
    /// Status summary consumed by the UI layer's trust indicator.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            platform: self.os_family.label().to_string(),
            is_windows: self.os_family == OsFamily::Windows,
            is_linux: self.os_family.is_linux_like(),
            is_mac: self.os_family == OsFamily::MacOs,
        }
    }
}

/// Answer to the status query exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub platform: String,
    pub is_windows: bool,
    pub is_linux: bool,
    pub is_mac: bool,
}
