//! Toolkit-level window attribute applier.
//!
//! The OS-agnostic entry point used by every platform path: applies an
//! [`AttributeProfile`] through the toolkit seam, one attribute at a time.
//! Each call is individually wrapped so a failure on one attribute never
//! aborts the others; failures are logged and swallowed.

use ghostveil_core::{AttributeProfile, ToolkitError, ToolkitWindow};
use tracing::{debug, warn};

/// Applies toolkit-level attributes to a window, best-effort per call.
pub struct WindowAttributeApplier;

impl WindowAttributeApplier {
    /// Apply every attribute in `profile` to `window`.
    ///
    /// Returns `true` iff the toolkit content-protection call specifically
    /// succeeded; the other attributes are supporting signals whose
    /// failures only weaken the result.
    pub fn apply(window: &dyn ToolkitWindow, profile: &AttributeProfile) -> bool {
        if let Some(level) = profile.always_on_top {
            log_failure(
                "set_always_on_top",
                window.set_always_on_top(true, level),
            );
        }

        if profile.skip_taskbar {
            log_failure("set_skip_taskbar", window.set_skip_taskbar(true));
        }

        if profile.visible_on_all_workspaces {
            log_failure(
                "set_visible_on_all_workspaces",
                window.set_visible_on_all_workspaces(true, true),
            );
        }

        if profile.hide_menu_bar {
            log_failure("set_menu_bar_visible", window.set_menu_bar_visible(false));
        }

        if profile.hide_window_buttons {
            log_failure(
                "set_window_buttons_visible",
                window.set_window_buttons_visible(false),
            );
        }

        if let Some(opacity) = profile.opacity {
            log_failure("set_opacity", window.set_opacity(opacity));
        }

        let mut protected = false;
        if profile.content_protection {
            match window.set_content_protection(true) {
                Ok(()) => {
                    debug!("toolkit content protection enabled");
                    protected = true;
                }
                Err(e) => warn!("toolkit content protection failed: {e}"),
            }
        }

        protected
    }
}

fn log_failure(call: &'static str, result: Result<(), ToolkitError>) {
    if let Err(e) = result {
        warn!(call, "toolkit attribute call failed: {e}");
    }
}
