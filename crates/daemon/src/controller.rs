//! Ghost-mode controller.
//!
//! Owns one [`GhostSession`] per top-level window and re-runs the selected
//! hiding strategy on window lifecycle transitions. Scheduling works
//! through a generation counter: every lifecycle event bumps the
//! generation and a settle-delayed apply only runs if its generation is
//! still current, so bursts of show/restore events collapse into a single
//! application of the newest state. The session is only ever mutated from
//! the event loop.

use ghostveil_core::{
    CapabilityId, GhostSession, HostEnvironment, MaskWindowId, NativeWindowId, StatusReport,
    ToolkitWindow,
};
use ghostveil_platform::strategy::{ApplyOutcome, SelectedStrategy, StrategyConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Window lifecycle transitions that re-trigger strategy application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLifecycleEvent {
    Created,
    Shown,
    Restored,
}

impl WindowLifecycleEvent {
    pub fn label(&self) -> &'static str {
        match self {
            WindowLifecycleEvent::Created => "created",
            WindowLifecycleEvent::Shown => "shown",
            WindowLifecycleEvent::Restored => "restored",
        }
    }
}

pub struct GhostModeController {
    env: Arc<HostEnvironment>,
    strategy: SelectedStrategy,
    session: GhostSession,
    window: Arc<dyn ToolkitWindow + Send + Sync>,
    settle_delay: Duration,
    generation: u64,
    teardown_hooks: Vec<Box<dyn FnOnce() + Send>>,
}

impl GhostModeController {
    pub fn new(
        env: Arc<HostEnvironment>,
        window: Arc<dyn ToolkitWindow + Send + Sync>,
        strategy_config: StrategyConfig,
        native_id: Option<NativeWindowId>,
        enabled: bool,
        settle_delay: Duration,
    ) -> Self {
        let strategy = SelectedStrategy::for_environment(&env, strategy_config);
        info!(strategy = strategy.name(), "hiding strategy selected");

        let session = match native_id.or_else(|| window.native_window_id()) {
            Some(id) => GhostSession::with_native_id(enabled, id),
            None => GhostSession::new(enabled),
        };

        Self {
            env,
            strategy,
            session,
            window,
            settle_delay,
            generation: 0,
            teardown_hooks: Vec::new(),
        }
    }

    /// Register a lifecycle event. Returns the new generation; the caller
    /// schedules an apply for it after [`settle_delay`](Self::settle_delay).
    pub fn bump_generation(&mut self, event: WindowLifecycleEvent) -> u64 {
        self.generation += 1;
        debug!(
            event = event.label(),
            generation = self.generation,
            "lifecycle event registered"
        );
        self.generation
    }

    /// The settle delay the caller must wait before applying.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Run the strategy for `generation`, unless a newer lifecycle event
    /// superseded it or the user setting disables ghost mode. `enabled`
    /// is read from the settings store immediately before every attempt.
    pub async fn apply_if_current(&mut self, generation: u64, enabled: bool) -> Option<ApplyOutcome> {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "stale settle timer, skipping apply"
            );
            return None;
        }

        self.session.enabled = enabled;
        if !enabled {
            debug!("ghost mode disabled, skipping apply");
            return None;
        }

        let outcome = self
            .strategy
            .apply(self.window.as_ref(), &self.env, &mut self.session)
            .await;

        info!(
            state = ?outcome.state,
            depth = ?outcome.depth,
            applied = self.session.applied_capabilities().len(),
            "hiding strategy applied"
        );

        Some(outcome)
    }

    /// Record an overlay mask created by the detached mask task.
    pub fn record_mask(&mut self, mask: MaskWindowId) {
        if self.session.record_mask(mask) {
            self.session.record_capability(&self.env, CapabilityId::OverlayMask);
            info!(mask, "overlay mask registered with session");
        } else {
            debug!(mask, "mask already live, ignoring late creation report");
        }
    }

    /// Status summary for the UI layer's trust indicator.
    pub fn describe(&self) -> StatusReport {
        self.env.status()
    }

    pub fn session(&self) -> &GhostSession {
        &self.session
    }

    /// Register a hook run once at process teardown (the external
    /// collaborator releasing global shortcuts, for instance). Applied
    /// window attributes need no teardown; they die with the window.
    pub fn add_teardown_hook(&mut self, hook: Box<dyn FnOnce() + Send>) {
        self.teardown_hooks.push(hook);
    }

    /// Run and drain the teardown hooks.
    pub fn shutdown(&mut self) {
        for hook in self.teardown_hooks.drain(..) {
            hook();
        }
        info!("ghost-mode controller shut down");
    }
}
