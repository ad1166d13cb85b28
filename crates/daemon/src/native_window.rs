//! Toolkit adapter for a window the daemon does not own.
//!
//! The daemon ghosts an externally owned window identified by its native
//! id (from the config, or discovered by the strategies). This adapter
//! bridges the [`ToolkitWindow`] seam onto that id: on X11 the toolkit
//! operations map to display-server property calls, on Windows they map
//! onto the compiled-in bridge. Operations with no sensible mapping report
//! `Unsupported`; callers treat every toolkit call as best-effort, and
//! the strategies' own native paths do the heavy lifting.

use ghostveil_core::{AlwaysOnTopLevel, NativeWindowId, ToolkitError, ToolkitWindow};
#[cfg(all(unix, not(target_os = "macos")))]
use tracing::debug;

pub struct NativeWindow {
    native_id: Option<NativeWindowId>,
    display_target: Option<String>,
}

impl NativeWindow {
    pub fn new(native_id: Option<NativeWindowId>, display_target: Option<String>) -> Self {
        Self {
            native_id,
            display_target,
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn id(&self, call: &'static str) -> Result<NativeWindowId, ToolkitError> {
        self.native_id.ok_or(ToolkitError::Unsupported(call))
    }

    /// Run an xprop property set against the adapted window.
    #[cfg(all(unix, not(target_os = "macos")))]
    fn xprop_set(
        &self,
        call: &'static str,
        property: &str,
        format: &str,
        value: &str,
    ) -> Result<(), ToolkitError> {
        let id = self.id(call)?;
        let id_arg = id.as_raw().to_string();
        let mut cmd = std::process::Command::new("xprop");
        cmd.args([
            "-id",
            id_arg.as_str(),
            "-f",
            property,
            format,
            "-set",
            property,
            value,
        ]);
        if let Some(target) = &self.display_target {
            cmd.env("DISPLAY", target);
        }

        match cmd.output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(ToolkitError::CallFailed {
                call,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(e) => Err(ToolkitError::CallFailed {
                call,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl ToolkitWindow for NativeWindow {
    fn set_always_on_top(
        &self,
        _enabled: bool,
        level: AlwaysOnTopLevel,
    ) -> Result<(), ToolkitError> {
        debug!(?level, "mapping always-on-top to _NET_WM_STATE_ABOVE");
        self.xprop_set(
            "set_always_on_top",
            "_NET_WM_STATE",
            "32a",
            "_NET_WM_STATE_ABOVE",
        )
    }

    fn set_content_protection(&self, _enabled: bool) -> Result<(), ToolkitError> {
        // X11 has no toolkit-level capture-exclusion primitive for a
        // foreign window; the strategy's property batch carries the
        // compositor hints instead.
        Err(ToolkitError::Unsupported("set_content_protection"))
    }

    fn set_opacity(&self, opacity: f64) -> Result<(), ToolkitError> {
        let value = (opacity.clamp(0.0, 1.0) * u32::MAX as f64) as u32;
        let value = format!("{:#x}", value);
        self.xprop_set("set_opacity", "_NET_WM_WINDOW_OPACITY", "32c", &value)
    }

    fn set_skip_taskbar(&self, _skip: bool) -> Result<(), ToolkitError> {
        self.xprop_set(
            "set_skip_taskbar",
            "_NET_WM_STATE",
            "32a",
            "_NET_WM_STATE_SKIP_TASKBAR,_NET_WM_STATE_SKIP_PAGER",
        )
    }

    fn set_visible_on_all_workspaces(
        &self,
        _visible: bool,
        _include_fullscreen: bool,
    ) -> Result<(), ToolkitError> {
        self.xprop_set(
            "set_visible_on_all_workspaces",
            "_NET_WM_DESKTOP",
            "32c",
            "0xffffffff",
        )
    }

    fn set_menu_bar_visible(&self, _visible: bool) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_menu_bar_visible"))
    }

    fn set_window_buttons_visible(&self, _visible: bool) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_window_buttons_visible"))
    }

    fn native_window_id(&self) -> Option<NativeWindowId> {
        self.native_id
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
impl ToolkitWindow for NativeWindow {
    fn set_always_on_top(
        &self,
        _enabled: bool,
        _level: AlwaysOnTopLevel,
    ) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_always_on_top"))
    }

    fn set_content_protection(&self, _enabled: bool) -> Result<(), ToolkitError> {
        // On Windows the strategy's native interop tier performs the
        // equivalent display-affinity call directly against the id.
        Err(ToolkitError::Unsupported("set_content_protection"))
    }

    fn set_opacity(&self, _opacity: f64) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_opacity"))
    }

    fn set_skip_taskbar(&self, _skip: bool) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_skip_taskbar"))
    }

    fn set_visible_on_all_workspaces(
        &self,
        _visible: bool,
        _include_fullscreen: bool,
    ) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_visible_on_all_workspaces"))
    }

    fn set_menu_bar_visible(&self, _visible: bool) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_menu_bar_visible"))
    }

    fn set_window_buttons_visible(&self, _visible: bool) -> Result<(), ToolkitError> {
        Err(ToolkitError::Unsupported("set_window_buttons_visible"))
    }

    fn native_window_id(&self) -> Option<NativeWindowId> {
        self.native_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_id_is_exposed_through_the_seam() {
        let window = NativeWindow::new(Some(NativeWindowId::from_raw(0x5400007)), None);
        assert_eq!(
            window.native_window_id(),
            Some(NativeWindowId::from_raw(0x5400007))
        );

        let window = NativeWindow::new(None, None);
        assert_eq!(window.native_window_id(), None);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn calls_without_an_id_report_unsupported() {
        let window = NativeWindow::new(None, None);
        assert!(matches!(
            window.set_always_on_top(true, AlwaysOnTopLevel::PopUpMenu),
            Err(ToolkitError::Unsupported(_))
        ));
    }
}
