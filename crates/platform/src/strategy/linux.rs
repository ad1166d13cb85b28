//! Linux/X11 hiding strategy.
//!
//! The toolkit baseline always runs. When the property editor is present
//! and the window's display-server identifier can be resolved, a batch of
//! property overrides is issued as concurrently-pending subprocess calls
//! (the properties are independent, so ordering among them is not
//! significant), and overlay-mask creation is kicked off as a detached
//! background task that can never block or fail the primary result.

use futures::future::join_all;
use ghostveil_core::{
    ApplyDepth, ApplyState, AttributeProfile, CapabilityId, GhostSession, HostEnvironment,
    NativeWindowId, ToolKind, ToolkitWindow,
};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{ApplyOutcome, StrategyConfig};
use crate::applier::WindowAttributeApplier;
use crate::exec::{run_command, run_for_stdout, COMMAND_TIMEOUT};
use crate::mask::OverlayMaskGenerator;

/// Delay before the detached mask task starts, giving the window manager
/// time to finish mapping the freshly configured window.
const MASK_KICKOFF_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// One X11 property override issued by the batch.
struct PropOverride {
    label: &'static str,
    property: &'static str,
    format: &'static str,
    value: &'static str,
}

/// The property batch, mirroring what a compositor needs to see to treat
/// the window as a low-visibility utility surface. The opacity value is
/// one step below the fully-opaque sentinel: some compositors exclude
/// non-maximal-opacity windows from certain capture paths.
const X11_PROPERTY_OVERRIDES: &[PropOverride] = &[
    PropOverride {
        label: "state_skip",
        property: "_NET_WM_STATE",
        format: "32a",
        value: "_NET_WM_STATE_SKIP_PAGER,_NET_WM_STATE_SKIP_TASKBAR",
    },
    PropOverride {
        label: "opacity",
        property: "_NET_WM_WINDOW_OPACITY",
        format: "32c",
        value: "0xfffffffe",
    },
    PropOverride {
        label: "window_type",
        property: "_NET_WM_WINDOW_TYPE",
        format: "32a",
        value: "_NET_WM_WINDOW_TYPE_UTILITY,_NET_WM_WINDOW_TYPE_NOTIFICATION",
    },
    PropOverride {
        label: "motif_hints",
        property: "_MOTIF_WM_HINTS",
        format: "32c",
        value: "0x2, 0x0, 0x1, 0x0, 0x0",
    },
    PropOverride {
        label: "bypass_compositor",
        property: "_NET_WM_BYPASS_COMPOSITOR",
        format: "32c",
        value: "1",
    },
    PropOverride {
        label: "state_above",
        property: "_NET_WM_STATE",
        format: "32a",
        value: "_NET_WM_STATE_ABOVE,_NET_WM_STATE_FOCUSED",
    },
];

/// What the property batch managed to set.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct X11BatchReport {
    pub window_type_applied: bool,
    pub compositor_hint_applied: bool,
    pub succeeded: usize,
    pub attempted: usize,
}

pub struct LinuxStrategy {
    config: StrategyConfig,
}

impl LinuxStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// One application pass. The baseline alone is enough for `Applied`;
    /// the native property path only deepens it.
    pub async fn apply(
        &self,
        window: &dyn ToolkitWindow,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> ApplyOutcome {
        session.begin_apply();

        let protected = WindowAttributeApplier::apply(window, &AttributeProfile::linux());
        if protected {
            session.record_capability(env, CapabilityId::ToolkitShim);
        }

        let mut native_reached = false;
        if env.tools.has(ToolKind::PropertyEditor) {
            let preferred = session.native_id.or_else(|| window.native_window_id());
            if let Some(id) =
                resolve_x11_window(env, preferred, &self.config.window_class, &self.config.window_title)
                    .await
            {
                let report = apply_x11_property_batch(env, id).await;
                info!(
                    window_id = id,
                    succeeded = report.succeeded,
                    attempted = report.attempted,
                    "X11 property batch issued"
                );
                if report.window_type_applied {
                    session.record_capability(env, CapabilityId::X11WindowTypeOverride);
                }
                if report.compositor_hint_applied {
                    session.record_capability(env, CapabilityId::CompositorBypassHint);
                }
                native_reached = report.succeeded > 0;

                spawn_mask_task(env, session, &self.config, id);
            } else {
                debug!("X11 window id could not be resolved, staying on toolkit baseline");
            }
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
}

/// Resolve the window's display-server identifier.
///
/// The toolkit-provided native id always wins. Class/title search through
/// the automation tool is the documented last resort: the class match is
/// inherently best-effort, and with several matching windows the last
/// listed (most recently created) one is taken.
pub(crate) async fn resolve_x11_window(
    env: &HostEnvironment,
    preferred: Option<NativeWindowId>,
    window_class: &str,
    window_title: &str,
) -> Option<u64> {
    if let Some(id) = preferred {
        return Some(id.as_raw());
    }

    if !env.tools.has(ToolKind::WindowAutomation) {
        return None;
    }

    for (flag, needle) in [("--class", window_class), ("--name", window_title)] {
        let mut cmd = Command::new("xdotool");
        cmd.args(["search", flag, needle]);
        with_display(&mut cmd, env);

        match run_for_stdout(cmd, COMMAND_TIMEOUT).await {
            Ok(output) => {
                let ids = parse_window_ids(&output);
                if let Some(&id) = ids.last() {
                    if ids.len() > 1 {
                        warn!(
                            matches = ids.len(),
                            needle, "multiple windows matched, taking the most recent"
                        );
                    }
                    return Some(id);
                }
            }
            Err(e) => debug!("window search via {flag} failed: {e}"),
        }
    }

    None
}

/// Parse the automation tool's one-id-per-line search output.
pub(crate) fn parse_window_ids(output: &str) -> Vec<u64> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u64>().ok())
        .collect()
}

/// Issue the property batch as concurrently-pending subprocess calls.
/// Each command is fire-and-forget: individual failures are logged and
/// ignored, never aborting the batch.
pub(crate) async fn apply_x11_property_batch(env: &HostEnvironment, window_id: u64) -> X11BatchReport {
    let id_arg = window_id.to_string();
    let futures = X11_PROPERTY_OVERRIDES.iter().map(|prop| {
        let mut cmd = Command::new("xprop");
        cmd.args([
            "-id",
            id_arg.as_str(),
            "-f",
            prop.property,
            prop.format,
            "-set",
            prop.property,
            prop.value,
        ]);
        with_display(&mut cmd, env);

        async move {
            match run_command(cmd, COMMAND_TIMEOUT).await {
                Ok(_) => {
                    debug!(label = prop.label, "property override applied");
                    (prop.label, true)
                }
                Err(e) => {
                    debug!(label = prop.label, "property override failed: {e}");
                    (prop.label, false)
                }
            }
        }
    });

    let results = join_all(futures).await;

    let mut report = X11BatchReport {
        attempted: results.len(),
        ..Default::default()
    };
    for (label, ok) in results {
        if !ok {
            continue;
        }
        report.succeeded += 1;
        match label {
            "window_type" | "state_skip" | "state_above" | "motif_hints" => {
                report.window_type_applied = true;
            }
            "opacity" | "bypass_compositor" => {
                report.compositor_hint_applied = true;
            }
            _ => {}
        }
    }
    report
}

/// Kick off overlay-mask creation as a detached task.
///
/// Creation is capped to one attempt per session; the result is observed
/// via logging and, when a notifier is wired, a mask-id message back to
/// the controller. The primary strategy result never depends on it.
pub(crate) fn spawn_mask_task(
    env: &HostEnvironment,
    session: &mut GhostSession,
    config: &StrategyConfig,
    target: u64,
) {
    if session.mask_attempted || !env.tools.has(ToolKind::WindowAutomation) {
        return;
    }
    session.mask_attempted = true;

    let env = env.clone();
    let notifier = config.mask_notifier.clone();
    let generator = OverlayMaskGenerator::new(&config.window_class, &config.window_title);

    tokio::spawn(async move {
        tokio::time::sleep(MASK_KICKOFF_DELAY).await;
        match generator.create_mask(&env, Some(target)).await {
            Ok(mask_id) => {
                info!(mask_id, "overlay mask window created");
                if let Some(notifier) = notifier {
                    let _ = notifier.send(mask_id);
                }
            }
            Err(e) => debug!("overlay mask creation failed: {e}"),
        }
    });
}

/// Point a command at the resolved display target, when one exists.
pub(crate) fn with_display(cmd: &mut Command, env: &HostEnvironment) {
    if let Some(target) = &env.display.target {
        cmd.env("DISPLAY", target);
    }
}
