//! Windows hiding strategy.
//!
//! Three tiers, strongest first:
//!
//! 1. Native interop: display-affinity exclusion (the single strongest
//!    primitive: the composition engine omits the window from every
//!    captured or duplicated frame buffer), DWM cloaking, tool-window
//!    extended style bits, and layered alpha.
//! 2. Scripting-host fallback: a generated PowerShell snippet performs
//!    the affinity and cloak calls through reflection-based P/Invoke when
//!    the native bridge is unavailable.
//! 3. Toolkit baseline: content-protection, screen-saver always-on-top,
//!    and skip-taskbar are applied regardless of how the upper tiers
//!    fared.
//!
//! Failure of tier 1 degrades to tier 2; failure of both leaves the
//! toolkit baseline (depth `BaselineOnly`). The window stays usable in
//! every case.

use futures::future::BoxFuture;
use ghostveil_core::{
    ApplyDepth, ApplyState, AttributeProfile, CapabilityId, GhostSession, HostEnvironment,
    NativeWindowId, ToolkitWindow,
};
use std::io::Write;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ApplyOutcome;
use crate::applier::WindowAttributeApplier;
use crate::exec::{run_for_stdout, ExecError, COMMAND_TIMEOUT};

/// Alpha asserted on the layered window: visibly opaque, but not the
/// sentinel 255 that some capture pipelines special-case.
const LAYERED_ALPHA: u8 = 254;

/// Errors from the native interop tier.
#[derive(Debug, Error)]
pub enum InteropError {
    #[error("native window bridge unavailable in this build")]
    Unavailable,

    #[error("{call} failed: {reason}")]
    CallFailed {
        call: &'static str,
        reason: String,
    },
}

/// Native window-API calls used by tier 1. Injectable so the tier walk can
/// be exercised off-Windows and under simulated failures.
pub trait NativeInterop: Send + Sync {
    /// Whether the bridge can be called at all in this build/environment.
    fn is_available(&self) -> bool;

    /// Exclude the window's pixels from capture consumers.
    fn exclude_from_capture(&self, window: NativeWindowId) -> Result<(), InteropError>;

    /// Cloak the window and exclude it from peek previews.
    fn cloak(&self, window: NativeWindowId) -> Result<(), InteropError>;

    /// Mark the window as a layered tool window (off the taskbar and
    /// task switcher, per-window alpha enabled).
    fn set_tool_window_style(&self, window: NativeWindowId) -> Result<(), InteropError>;

    /// Set the layered-window alpha.
    fn set_layered_alpha(&self, window: NativeWindowId, alpha: u8) -> Result<(), InteropError>;
}

/// Interop stand-in for builds without the native bridge.
pub struct UnavailableInterop;

impl NativeInterop for UnavailableInterop {
    fn is_available(&self) -> bool {
        false
    }

    fn exclude_from_capture(&self, _window: NativeWindowId) -> Result<(), InteropError> {
        Err(InteropError::Unavailable)
    }

    fn cloak(&self, _window: NativeWindowId) -> Result<(), InteropError> {
        Err(InteropError::Unavailable)
    }

    fn set_tool_window_style(&self, _window: NativeWindowId) -> Result<(), InteropError> {
        Err(InteropError::Unavailable)
    }

    fn set_layered_alpha(&self, _window: NativeWindowId, _alpha: u8) -> Result<(), InteropError> {
        Err(InteropError::Unavailable)
    }
}

/// What the scripting-host fallback managed to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub affinity_applied: bool,
    pub cloak_applied: bool,
}

/// Errors from the scripting-host tier.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("scripting host unavailable")]
    Unavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Tier-2 seam: executes the generated interop snippet.
pub trait ScriptHost: Send + Sync {
    fn is_available(&self) -> bool;

    fn apply_ghost_attributes(
        &self,
        window: NativeWindowId,
    ) -> BoxFuture<'_, Result<ScriptOutcome, ScriptError>>;
}

/// PowerShell-backed script host.
pub struct PowershellHost {
    binary: &'static str,
}

impl PowershellHost {
    pub fn new() -> Self {
        Self {
            binary: "powershell",
        }
    }
}

impl Default for PowershellHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost for PowershellHost {
    fn is_available(&self) -> bool {
        which::which(self.binary).is_ok()
    }

    fn apply_ghost_attributes(
        &self,
        window: NativeWindowId,
    ) -> BoxFuture<'_, Result<ScriptOutcome, ScriptError>> {
        Box::pin(async move {
            if !self.is_available() {
                return Err(ScriptError::Unavailable);
            }

            let mut file = tempfile::Builder::new()
                .prefix("ghostveil-")
                .suffix(".ps1")
                .tempfile()?;
            file.write_all(ghost_script_body(&window.to_hex()).as_bytes())?;
            file.flush()?;

            let mut cmd = Command::new(self.binary);
            cmd.args(["-ExecutionPolicy", "Bypass", "-File"])
                .arg(file.path());
            let stdout = run_for_stdout(cmd, COMMAND_TIMEOUT).await?;

            // `file` drops here, removing the script on every exit path.
            Ok(parse_script_report(&stdout))
        })
    }
}

/// The P/Invoke snippet executed by the scripting host. The handle is
/// rendered as a hex pointer-sized integer.
fn ghost_script_body(hwnd_hex: &str) -> String {
    format!(
        r#"Add-Type -TypeDefinition @"
using System;
using System.Runtime.InteropServices;

public class GhostveilInterop {{
    [DllImport("user32.dll")]
    public static extern bool SetWindowDisplayAffinity(IntPtr hWnd, uint dwAffinity);

    [DllImport("dwmapi.dll")]
    public static extern int DwmSetWindowAttribute(IntPtr hwnd, uint dwAttribute, ref int pvAttribute, uint cbAttribute);
}}
"@

$hwnd = {hwnd_hex}
$WDA_EXCLUDEFROMCAPTURE = 1
$DWMWA_CLOAK = 13
$DWM_CLOAKED_APP = 2

$result1 = [GhostveilInterop]::SetWindowDisplayAffinity([IntPtr]$hwnd, $WDA_EXCLUDEFROMCAPTURE)

$value = $DWM_CLOAKED_APP
$result2 = [GhostveilInterop]::DwmSetWindowAttribute([IntPtr]$hwnd, $DWMWA_CLOAK, [ref]$value, 4)

Write-Output "SetWindowDisplayAffinity: $result1"
Write-Output "DwmSetWindowAttribute: $result2"
"#
    )
}

/// Parse the two result lines printed by the snippet. The cloak call
/// reports an HRESULT; zero is success.
pub fn parse_script_report(stdout: &str) -> ScriptOutcome {
    let affinity_applied = stdout
        .lines()
        .any(|line| line.trim() == "SetWindowDisplayAffinity: True");
    let cloak_applied = stdout
        .lines()
        .any(|line| line.trim() == "DwmSetWindowAttribute: 0");
    ScriptOutcome {
        affinity_applied,
        cloak_applied,
    }
}

/// The Windows strategy with its two injectable native tiers.
pub struct WindowsStrategy {
    interop: Box<dyn NativeInterop>,
    script: Box<dyn ScriptHost>,
}

impl WindowsStrategy {
    pub fn new(interop: Box<dyn NativeInterop>, script: Box<dyn ScriptHost>) -> Self {
        Self { interop, script }
    }

    /// Platform defaults: the compiled-in Win32 bridge where available,
    /// PowerShell as the fallback host.
    pub fn with_defaults() -> Self {
        Self::new(default_interop(), Box::new(PowershellHost::new()))
    }

    /// One application pass. Idempotent: every native call is a no-op
    /// success when the window is already in the requested state.
    pub async fn apply(
        &self,
        window: &dyn ToolkitWindow,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> ApplyOutcome {
        session.begin_apply();

        let target = session.native_id.or_else(|| window.native_window_id());
        let mut native_reached = false;

        match target {
            Some(id) => match self.apply_native_tier(id, env, session) {
                Ok(()) => {
                    info!(hwnd = %id.to_hex(), "native capture exclusion applied");
                    native_reached = true;
                }
                Err(e) => {
                    warn!("native interop tier failed ({e}), trying scripting host");
                    native_reached = self.apply_script_tier(id, env, session).await;
                }
            },
            None => warn!("no native window id available, skipping native tiers"),
        }

        // Toolkit baseline regardless of how the native tiers fared.
        let protected =
            WindowAttributeApplier::apply(window, &AttributeProfile::windows_baseline());
        if protected {
            session.record_capability(env, CapabilityId::ToolkitShim);
        }

        let state = if protected || native_reached {
            ApplyState::Applied
        } else {
            ApplyState::Degraded
        };
        let depth = if native_reached {
            ApplyDepth::Native
        } else {
            ApplyDepth::BaselineOnly
        };
        session.finish_apply(state, depth);

        ApplyOutcome { state, depth }
    }

    /// Tier 1. The display-affinity call gates the tier: without the
    /// strongest primitive the whole tier counts as failed. The follow-up
    /// calls are individually best-effort.
    fn apply_native_tier(
        &self,
        id: NativeWindowId,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> Result<(), InteropError> {
        if !self.interop.is_available() {
            return Err(InteropError::Unavailable);
        }

        self.interop.exclude_from_capture(id)?;
        session.record_capability(env, CapabilityId::DisplayAffinityExclusion);

        match self.interop.cloak(id) {
            Ok(()) => {
                session.record_capability(env, CapabilityId::DwmCloak);
            }
            Err(e) => warn!("DWM cloak failed: {e}"),
        }

        match self.interop.set_tool_window_style(id) {
            Ok(()) => {
                session.record_capability(env, CapabilityId::ToolWindowStyle);
            }
            Err(e) => warn!("tool-window style failed: {e}"),
        }

        match self.interop.set_layered_alpha(id, LAYERED_ALPHA) {
            Ok(()) => {
                session.record_capability(env, CapabilityId::LayeredAlpha);
            }
            Err(e) => warn!("layered alpha failed: {e}"),
        }

        Ok(())
    }

    /// Tier 2. Returns whether any native attribute was applied.
    async fn apply_script_tier(
        &self,
        id: NativeWindowId,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> bool {
        if !self.script.is_available() {
            debug!("scripting host not available");
            return false;
        }

        match self.script.apply_ghost_attributes(id).await {
            Ok(outcome) => {
                if outcome.affinity_applied {
                    session.record_capability(env, CapabilityId::DisplayAffinityExclusion);
                }
                if outcome.cloak_applied {
                    session.record_capability(env, CapabilityId::DwmCloak);
                }
                outcome.affinity_applied || outcome.cloak_applied
            }
            Err(e) => {
                warn!("scripting host tier failed: {e}");
                false
            }
        }
    }
}

#[cfg(target_os = "windows")]
fn default_interop() -> Box<dyn NativeInterop> {
    Box::new(super::win32::Win32Interop)
}

#[cfg(not(target_os = "windows"))]
fn default_interop() -> Box<dyn NativeInterop> {
    Box::new(UnavailableInterop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{env_with, tools_with, MockWindow};
    use ghostveil_core::{OsFamily, ToolKind};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockInterop {
        available: bool,
        affinity_fails: bool,
    }

    impl NativeInterop for MockInterop {
        fn is_available(&self) -> bool {
            self.available
        }

        fn exclude_from_capture(&self, _window: NativeWindowId) -> Result<(), InteropError> {
            if self.affinity_fails {
                Err(InteropError::CallFailed {
                    call: "SetWindowDisplayAffinity",
                    reason: "simulated".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn cloak(&self, _window: NativeWindowId) -> Result<(), InteropError> {
            Ok(())
        }

        fn set_tool_window_style(&self, _window: NativeWindowId) -> Result<(), InteropError> {
            Ok(())
        }

        fn set_layered_alpha(
            &self,
            _window: NativeWindowId,
            _alpha: u8,
        ) -> Result<(), InteropError> {
            Ok(())
        }
    }

    struct MockScriptHost {
        available: bool,
        outcome: Result<ScriptOutcome, ()>,
        invoked: AtomicBool,
    }

    impl MockScriptHost {
        fn failing() -> Self {
            Self {
                available: true,
                outcome: Err(()),
                invoked: AtomicBool::new(false),
            }
        }
    }

    impl ScriptHost for MockScriptHost {
        fn is_available(&self) -> bool {
            self.available
        }

        fn apply_ghost_attributes(
            &self,
            _window: NativeWindowId,
        ) -> BoxFuture<'_, Result<ScriptOutcome, ScriptError>> {
            self.invoked.store(true, Ordering::SeqCst);
            let outcome = self.outcome;
            Box::pin(async move { outcome.map_err(|_| ScriptError::Unavailable) })
        }
    }

    fn windows_env() -> ghostveil_core::HostEnvironment {
        env_with(
            OsFamily::Windows,
            tools_with(&[ToolKind::NativeBridge, ToolKind::ScriptHost]),
        )
    }

    fn session_with_hwnd() -> GhostSession {
        GhostSession::with_native_id(true, NativeWindowId::from_raw(0x1a2b3c))
    }

    #[tokio::test]
    async fn full_native_success_records_all_capabilities() {
        let strategy = WindowsStrategy::new(
            Box::new(MockInterop {
                available: true,
                affinity_fails: false,
            }),
            Box::new(MockScriptHost::failing()),
        );
        let env = windows_env();
        let window = MockWindow::new();
        let mut session = session_with_hwnd();

        let outcome = strategy.apply(&window, &env, &mut session).await;

        assert_eq!(outcome.state, ApplyState::Applied);
        assert_eq!(outcome.depth, ApplyDepth::Native);
        let applied = session.applied_capabilities();
        assert!(applied.contains(&CapabilityId::DisplayAffinityExclusion));
        assert!(applied.contains(&CapabilityId::DwmCloak));
        assert!(applied.contains(&CapabilityId::ToolWindowStyle));
        assert!(applied.contains(&CapabilityId::LayeredAlpha));
        assert!(applied.contains(&CapabilityId::ToolkitShim));
        assert!(env.status().is_windows);
        assert!(!env.status().is_linux);
        assert!(!env.status().is_mac);
    }

    #[tokio::test]
    async fn native_failure_falls_back_to_script_host() {
        let script = MockScriptHost {
            available: true,
            outcome: Ok(ScriptOutcome {
                affinity_applied: true,
                cloak_applied: true,
            }),
            invoked: AtomicBool::new(false),
        };
        let strategy = WindowsStrategy::new(
            Box::new(MockInterop {
                available: true,
                affinity_fails: true,
            }),
            Box::new(script),
        );
        let env = windows_env();
        let window = MockWindow::new();
        let mut session = session_with_hwnd();

        let outcome = strategy.apply(&window, &env, &mut session).await;

        assert_eq!(outcome.depth, ApplyDepth::Native);
        let applied = session.applied_capabilities();
        assert!(applied.contains(&CapabilityId::DisplayAffinityExclusion));
        assert!(applied.contains(&CapabilityId::DwmCloak));
        // The bridge-only style bits cannot come from the script tier.
        assert!(!applied.contains(&CapabilityId::ToolWindowStyle));
        assert!(!applied.contains(&CapabilityId::LayeredAlpha));
    }

    #[tokio::test]
    async fn both_native_tiers_failing_degrades_to_baseline() {
        let strategy = WindowsStrategy::new(
            Box::new(MockInterop {
                available: false,
                affinity_fails: false,
            }),
            Box::new(MockScriptHost::failing()),
        );
        let env = windows_env();
        let window = MockWindow::new();
        let mut session = session_with_hwnd();

        let outcome = strategy.apply(&window, &env, &mut session).await;

        // Toolkit baseline succeeded, so the strategy still reports
        // Applied; the depth marker records the degradation.
        assert_eq!(outcome.state, ApplyState::Applied);
        assert_eq!(outcome.depth, ApplyDepth::BaselineOnly);
        assert!(outcome.is_degraded());
        assert_eq!(
            session.applied_capabilities().iter().copied().collect::<Vec<_>>(),
            vec![CapabilityId::ToolkitShim]
        );
    }

    #[tokio::test]
    async fn everything_failing_is_degraded_not_a_panic() {
        let strategy = WindowsStrategy::new(
            Box::new(MockInterop {
                available: false,
                affinity_fails: false,
            }),
            Box::new(MockScriptHost::failing()),
        );
        let env = windows_env();
        let window = MockWindow::new().failing_call("set_content_protection");
        let mut session = session_with_hwnd();

        let outcome = strategy.apply(&window, &env, &mut session).await;

        assert_eq!(outcome.state, ApplyState::Degraded);
        assert!(session.applied_capabilities().is_empty());
    }

    #[tokio::test]
    async fn applying_twice_is_idempotent() {
        let strategy = WindowsStrategy::new(
            Box::new(MockInterop {
                available: true,
                affinity_fails: false,
            }),
            Box::new(MockScriptHost::failing()),
        );
        let env = windows_env();
        let window = MockWindow::new();
        let mut session = session_with_hwnd();

        let first = strategy.apply(&window, &env, &mut session).await;
        let first_caps = session.applied_capabilities().clone();
        let second = strategy.apply(&window, &env, &mut session).await;

        assert_eq!(first, second);
        assert_eq!(&first_caps, session.applied_capabilities());
    }

    #[test]
    fn script_report_parsing() {
        let report = parse_script_report(
            "SetWindowDisplayAffinity: True\nDwmSetWindowAttribute: 0\n",
        );
        assert!(report.affinity_applied);
        assert!(report.cloak_applied);

        let report = parse_script_report(
            "SetWindowDisplayAffinity: False\nDwmSetWindowAttribute: -2147024809\n",
        );
        assert!(!report.affinity_applied);
        assert!(!report.cloak_applied);

        assert_eq!(parse_script_report(""), ScriptOutcome::default());
    }

    #[test]
    fn script_body_embeds_the_handle() {
        let body = ghost_script_body("0x1a2b3c");
        assert!(body.contains("$hwnd = 0x1a2b3c"));
        assert!(body.contains("SetWindowDisplayAffinity"));
        assert!(body.contains("DwmSetWindowAttribute"));
    }
}
