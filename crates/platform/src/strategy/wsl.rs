//! Degraded strategy for the Linux-on-Windows compatibility layer.
//!
//! Host DLLs are not reachable from inside the layer, so the Win32 tiers
//! are never attempted. The toolkit baseline always runs; when the probe
//! resolved a display target, the Linux/X11 native path is attempted
//! opportunistically. The strategy reports `Degraded` whenever that native
//! path could not run, `Applied` otherwise.

use ghostveil_core::{
    ApplyDepth, ApplyState, AttributeProfile, CapabilityId, GhostSession, HostEnvironment,
    ToolKind, ToolkitWindow,
};
use tracing::{debug, info};

use super::linux::{apply_x11_property_batch, resolve_x11_window, spawn_mask_task};
use super::{ApplyOutcome, StrategyConfig};
use crate::applier::WindowAttributeApplier;

pub struct WslStrategy {
    config: StrategyConfig,
}

impl WslStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub async fn apply(
        &self,
        window: &dyn ToolkitWindow,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> ApplyOutcome {
        session.begin_apply();

        let protected = WindowAttributeApplier::apply(window, &AttributeProfile::wsl());
        if protected {
            session.record_capability(env, CapabilityId::ToolkitShim);
        }

        let mut native_reached = false;
        if env.display.has_target() && env.tools.has(ToolKind::PropertyEditor) {
            let preferred = session.native_id.or_else(|| window.native_window_id());
            if let Some(id) = resolve_x11_window(
                env,
                preferred,
                &self.config.window_class,
                &self.config.window_title,
            )
            .await
            {
                let report = apply_x11_property_batch(env, id).await;
                info!(
                    window_id = id,
                    succeeded = report.succeeded,
                    "opportunistic X11 path ran inside the compat layer"
                );
                if report.window_type_applied {
                    session.record_capability(env, CapabilityId::X11WindowTypeOverride);
                }
                if report.compositor_hint_applied {
                    session.record_capability(env, CapabilityId::CompositorBypassHint);
                }
                native_reached = report.succeeded > 0;

                spawn_mask_task(env, session, &self.config, id);
            }
        } else {
            debug!("no display target resolved, staying on toolkit baseline");
        }

        let state = if native_reached {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{env_with, tools_with, MockWindow};
    use ghostveil_core::OsFamily;

    #[tokio::test]
    async fn no_display_target_reports_degraded() {
        let strategy = WslStrategy::new(StrategyConfig::default());
        let env = env_with(OsFamily::LinuxOnWindowsCompat, tools_with(&[]));
        let window = MockWindow::new();
        let mut session = GhostSession::new(true);

        let outcome = strategy.apply(&window, &env, &mut session).await;

        // The toolkit baseline succeeded but the native path never ran,
        // so the compat layer honestly reports degradation.
        assert_eq!(outcome.state, ApplyState::Degraded);
        assert_eq!(outcome.depth, ApplyDepth::BaselineOnly);
        assert_eq!(
            session.applied_capabilities().iter().copied().collect::<Vec<_>>(),
            vec![CapabilityId::ToolkitShim]
        );
    }

    #[tokio::test]
    async fn win32_capabilities_never_recorded_in_compat_layer() {
        let strategy = WslStrategy::new(StrategyConfig::default());
        let env = env_with(OsFamily::LinuxOnWindowsCompat, tools_with(&[]));
        let window = MockWindow::new();
        let mut session = GhostSession::new(true);

        strategy.apply(&window, &env, &mut session).await;

        for cap in session.applied_capabilities() {
            assert!(!matches!(
                cap,
                CapabilityId::DisplayAffinityExclusion
                    | CapabilityId::DwmCloak
                    | CapabilityId::ToolWindowStyle
                    | CapabilityId::LayeredAlpha
            ));
        }
    }

    #[tokio::test]
    async fn applying_twice_is_idempotent() {
        let strategy = WslStrategy::new(StrategyConfig::default());
        let env = env_with(OsFamily::LinuxOnWindowsCompat, tools_with(&[]));
        let window = MockWindow::new();
        let mut session = GhostSession::new(true);

        let first = strategy.apply(&window, &env, &mut session).await;
        let first_caps = session.applied_capabilities().clone();
        let second = strategy.apply(&window, &env, &mut session).await;

        assert_eq!(first, second);
        assert_eq!(&first_caps, session.applied_capabilities());
    }
}
