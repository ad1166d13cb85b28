//! Per-window ghost session state.
//!
//! A [`GhostSession`] tracks what has been applied to one top-level window.
//! It is created when the window is created, recomputed (idempotently) on
//! every show/restore event, and dropped when the window closes. All
//! mutation happens from the controller's event loop; the session itself is
//! plain state with invariant-preserving methods.

use crate::env::HostEnvironment;
use crate::registry::{CapabilityId, CapabilityRegistry};
use crate::toolkit::NativeWindowId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Display-server identifier of an auxiliary overlay mask window.
pub type MaskWindowId = u64;

/// Strategy application state machine.
///
/// `Applying` fires on initial creation and on every show/restore event
/// (after the settle delay); it resolves to `Applied` or `Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    #[default]
    NotApplied,
    Applying,
    Applied,
    Degraded,
}

/// How deep the last application reached.
///
/// `Applied` state with `BaselineOnly` depth means the window is protected
/// by toolkit calls alone: usable, but weaker than the native path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyDepth {
    Native,
    BaselineOnly,
}

/// Runtime state for one ghosted window.
#[derive(Debug, Clone)]
pub struct GhostSession {
    /// User setting, read from the settings store before every attempt.
    pub enabled: bool,
    /// Native window identifier handed over by the toolkit at creation
    /// time, when the toolkit exposes one. Class-based discovery is the
    /// last-resort fallback for windows without it.
    pub native_id: Option<NativeWindowId>,
    /// Current position in the apply state machine.
    pub state: ApplyState,
    /// Depth reached by the last application.
    pub depth: Option<ApplyDepth>,
    applied: BTreeSet<CapabilityId>,
    /// Live overlay mask window, if one was created.
    pub mask_window: Option<MaskWindowId>,
    /// Whether mask creation has been attempted for this session. Creation
    /// is capped to one attempt per session so repeated show/restore cycles
    /// cannot accumulate orphaned mask windows.
    pub mask_attempted: bool,
}

impl GhostSession {
    /// New session for a freshly created window.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            native_id: None,
            state: ApplyState::NotApplied,
            depth: None,
            applied: BTreeSet::new(),
            mask_window: None,
            mask_attempted: false,
        }
    }

    /// New session carrying the toolkit-provided native window id.
    pub fn with_native_id(enabled: bool, native_id: NativeWindowId) -> Self {
        let mut session = Self::new(enabled);
        session.native_id = Some(native_id);
        session
    }

    /// Enter the `Applying` state and clear the per-application capability
    /// set so a re-application recomputes it from scratch.
    pub fn begin_apply(&mut self) {
        self.state = ApplyState::Applying;
        self.applied.clear();
        self.depth = None;
    }

    /// Record a successfully applied capability.
    ///
    /// Enforces the session invariant: the capability must be listed for
    /// the environment's OS family and its prerequisite must hold right
    /// now. Returns `false` (recording nothing) otherwise.
    pub fn record_capability(&mut self, env: &HostEnvironment, id: CapabilityId) -> bool {
        match CapabilityRegistry::find(env.os_family, id) {
            Some(cap) if cap.requires.is_met(&env.tools) => {
                self.applied.insert(id);
                true
            }
            _ => false,
        }
    }

    /// Conclude an application pass.
    pub fn finish_apply(&mut self, state: ApplyState, depth: ApplyDepth) {
        self.state = state;
        self.depth = Some(depth);
    }

    /// Capabilities successfully applied in the last pass.
    pub fn applied_capabilities(&self) -> &BTreeSet<CapabilityId> {
        &self.applied
    }

    /// Record a newly created overlay mask window.
    ///
    /// At most one mask is live per session; a second recording is refused
    /// so stale handles are never silently replaced.
    pub fn record_mask(&mut self, mask: MaskWindowId) -> bool {
        if self.mask_window.is_some() {
            return false;
        }
        self.mask_window = Some(mask);
        true
    }
}
