//! macOS hiding strategy.
//!
//! Toolkit-only: there is no native-interop path on this OS in the current
//! design. The profile combines modal-panel always-on-top, visibility on
//! all workspaces (including over fullscreen apps), the opacity shim, the
//! content-protection flag, dock removal, and hidden window buttons.

use ghostveil_core::{
    ApplyDepth, ApplyState, AttributeProfile, CapabilityId, GhostSession, HostEnvironment,
    ToolkitWindow,
};
use tracing::warn;

use super::ApplyOutcome;
use crate::applier::WindowAttributeApplier;

pub struct MacOsStrategy;

impl MacOsStrategy {
    /// One application pass. On profile failure the content-protection
    /// flag alone is retried before conceding `Degraded`.
    pub fn apply(
        &self,
        window: &dyn ToolkitWindow,
        env: &HostEnvironment,
        session: &mut GhostSession,
    ) -> ApplyOutcome {
        session.begin_apply();

        let mut protected = WindowAttributeApplier::apply(window, &AttributeProfile::macos());

        if !protected {
            warn!("macOS profile failed, retrying content protection alone");
            protected = window.set_content_protection(true).is_ok();
        }

        let state = if protected {
            session.record_capability(env, CapabilityId::ToolkitShim);
            ApplyState::Applied
        } else {
            ApplyState::Degraded
        };
        session.finish_apply(state, ApplyDepth::BaselineOnly);

        ApplyOutcome {
            state,
            depth: ApplyDepth::BaselineOnly,
        }
    }
}
