//! Shared test doubles for the strategy and applier tests.

use ghostveil_core::{
    AlwaysOnTopLevel, DisplaySession, HostEnvironment, NativeWindowId, OsFamily, ToolAvailability,
    ToolKind, ToolkitError, ToolkitWindow,
};
use std::sync::Mutex;

/// Tool availability with exactly the given kinds present.
pub fn tools_with(kinds: &[ToolKind]) -> ToolAvailability {
    let mut tools = ToolAvailability::none();
    for kind in kinds {
        tools.set(*kind, true);
    }
    tools
}

/// Synthetic environment with a default (target-less) display session.
pub fn env_with(os_family: OsFamily, tools: ToolAvailability) -> HostEnvironment {
    HostEnvironment {
        os_family,
        display: DisplaySession::default(),
        tools,
    }
}

/// Toolkit window double recording every call, with configurable
/// per-call failures.
pub struct MockWindow {
    calls: Mutex<Vec<String>>,
    failing: Vec<&'static str>,
    native_id: Option<NativeWindowId>,
    last_level: Mutex<Option<AlwaysOnTopLevel>>,
}

impl MockWindow {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Vec::new(),
            native_id: None,
            last_level: Mutex::new(None),
        }
    }

    /// Make the named toolkit call fail.
    pub fn failing_call(mut self, call: &'static str) -> Self {
        self.failing.push(call);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_always_on_top_level(&self) -> Option<AlwaysOnTopLevel> {
        *self.last_level.lock().unwrap()
    }

    fn record(&self, call: &'static str) -> Result<(), ToolkitError> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.failing.contains(&call) {
            Err(ToolkitError::CallFailed {
                call,
                reason: "simulated failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl ToolkitWindow for MockWindow {
    fn set_always_on_top(
        &self,
        _enabled: bool,
        level: AlwaysOnTopLevel,
    ) -> Result<(), ToolkitError> {
        *self.last_level.lock().unwrap() = Some(level);
        self.record("set_always_on_top")
    }

    fn set_content_protection(&self, _enabled: bool) -> Result<(), ToolkitError> {
        self.record("set_content_protection")
    }

    fn set_opacity(&self, _opacity: f64) -> Result<(), ToolkitError> {
        self.record("set_opacity")
    }

    fn set_skip_taskbar(&self, _skip: bool) -> Result<(), ToolkitError> {
        self.record("set_skip_taskbar")
    }

    fn set_visible_on_all_workspaces(
        &self,
        _visible: bool,
        _include_fullscreen: bool,
    ) -> Result<(), ToolkitError> {
        self.record("set_visible_on_all_workspaces")
    }

    fn set_menu_bar_visible(&self, _visible: bool) -> Result<(), ToolkitError> {
        self.record("set_menu_bar_visible")
    }

    fn set_window_buttons_visible(&self, _visible: bool) -> Result<(), ToolkitError> {
        self.record("set_window_buttons_visible")
    }

    fn native_window_id(&self) -> Option<NativeWindowId> {
        self.native_id
    }
}
