//! Per-OS hiding strategies.
//!
//! A strategy walks the state machine `NotApplied → Applying → Applied |
//! Degraded` for one window. Application fires on window creation and on
//! every shown/restored event (after the settle delay, scheduled by the
//! controller), and is idempotent: re-applying with the window already in
//! the desired state succeeds and leaves the same effective state.

pub(crate) mod linux;
mod macos;
mod windows;
mod wsl;

#[cfg(target_os = "windows")]
mod win32;

pub use linux::LinuxStrategy;
pub use macos::MacOsStrategy;
pub use windows::{
    InteropError, NativeInterop, PowershellHost, ScriptError, ScriptHost, ScriptOutcome,
    UnavailableInterop, WindowsStrategy,
};
pub use wsl::WslStrategy;

#[cfg(target_os = "windows")]
pub use win32::Win32Interop;

use ghostveil_core::{
    ApplyDepth, ApplyState, GhostSession, HostEnvironment, MaskWindowId, OsFamily, ToolkitWindow,
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Wait inserted after a visibility transition before re-asserting hiding
/// attributes. Several compositors reset capture-exclusion flags during
/// their own show/restore transition; the delay outlasts it. This is a
/// fixed wait, not a poll.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Result of one strategy application pass. The session carries the
/// matching capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub state: ApplyState,
    pub depth: ApplyDepth,
}

impl ApplyOutcome {
    pub fn is_degraded(&self) -> bool {
        self.state == ApplyState::Degraded || self.depth == ApplyDepth::BaselineOnly
    }
}

/// Strategy construction knobs supplied by the embedding application.
#[derive(Clone)]
pub struct StrategyConfig {
    /// Window class used by last-resort display-server discovery.
    pub window_class: String,
    /// Window title used when class search finds nothing.
    pub window_title: String,
    /// Channel on which detached mask creation reports the new mask
    /// window id. Absent means mask results are observed via logs only.
    pub mask_notifier: Option<UnboundedSender<MaskWindowId>>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            window_class: "ghostveil".to_string(),
            window_title: "Ghostveil".to_string(),
            mask_notifier: None,
        }
    }
}

/// The strategy selected for the detected environment.
pub enum SelectedStrategy {
    Windows(WindowsStrategy),
    MacOs(MacOsStrategy),
    Linux(LinuxStrategy),
    Wsl(WslStrategy),
}

impl SelectedStrategy {
    /// Select the strategy matching the environment's OS family.
    pub fn for_environment(env: &HostEnvironment, config: StrategyConfig) -> Self {
        match env.os_family {
            OsFamily::Windows => SelectedStrategy::Windows(WindowsStrategy::with_defaults()),
            OsFamily::MacOs => SelectedStrategy::MacOs(MacOsStrategy),
            OsFamily::Linux => SelectedStrategy::Linux(LinuxStrategy::new(config)),
            OsFamily::LinuxOnWindowsCompat => SelectedStrategy::Wsl(WslStrategy::new(config)),
        }
    }

    /// Run one application pass against `window`, updating `session`.
    pub async fn apply(
        &self,
        window: &dyn ToolkitWindow,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> ApplyOutcome {
        match self {
            SelectedStrategy::Windows(s) => s.apply(window, env, session).await,
            SelectedStrategy::MacOs(s) => s.apply(window, env, session),
            SelectedStrategy::Linux(s) => s.apply(window, env, session).await,
            SelectedStrategy::Wsl(s) => s.apply(window, env, session).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SelectedStrategy::Windows(_) => "windows",
            SelectedStrategy::MacOs(_) => "macos",
            SelectedStrategy::Linux(_) => "linux",
            SelectedStrategy::Wsl(_) => "wsl",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{env_with, tools_with};
    use ghostveil_core::ToolKind;

    #[test]
    fn selection_follows_os_family() {
        let cases = [
            (OsFamily::Windows, "windows"),
            (OsFamily::MacOs, "macos"),
            (OsFamily::Linux, "linux"),
            (OsFamily::LinuxOnWindowsCompat, "wsl"),
        ];
        for (family, expected) in cases {
            let env = env_with(family, tools_with(&[ToolKind::PropertyEditor]));
            let strategy = SelectedStrategy::for_environment(&env, StrategyConfig::default());
            assert_eq!(strategy.name(), expected);
        }
    }
}
