//! The GUI-toolkit seam.
//!
//! The hiding subsystem never owns a window; it drives one through this
//! trait. The host application (or the daemon's native-window adapter)
//! implements [`ToolkitWindow`] over whatever windowing layer it uses.
//! Every operation is best-effort: callers wrap each call individually and
//! a failure never aborts sibling calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opacity shim applied to ghosted windows.
///
/// Many capture pipelines and compositors treat a window with opacity
/// exactly 1.0 differently from one just below it; 0.99 is a deliberate
/// signal, not a visual effect.
pub const OPACITY_SHIM: f64 = 0.99;

/// Errors surfaced by toolkit window operations.
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("toolkit call {call} failed: {reason}")]
    CallFailed {
        call: &'static str,
        reason: String,
    },

    #[error("operation not supported by this toolkit: {0}")]
    Unsupported(&'static str),
}

/// Always-on-top level hint, mirroring the levels the hiding strategies
/// request per OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlwaysOnTopLevel {
    #[default]
    Normal,
    /// Above normal windows; the Linux baseline.
    PopUpMenu,
    /// Above modal panels; the macOS baseline.
    ModalPanel,
    /// Above fullscreen content; the Windows/WSL baseline.
    ScreenSaver,
}

/// Native window identifier (HWND, X11 window id, …) as an opaque integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeWindowId(u64);

impl NativeWindowId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Decode a raw little-endian handle buffer as exposed by toolkits
    /// that hand out the native handle as bytes, using the host's pointer
    /// width.
    pub fn from_handle_buffer(buf: &[u8]) -> Option<Self> {
        #[cfg(target_pointer_width = "64")]
        let raw = decode_le_handle(buf, 8)?;
        #[cfg(not(target_pointer_width = "64"))]
        let raw = decode_le_handle(buf, 4)?;
        Some(Self(raw))
    }

    /// Render as the hex literal consumed by the scripting-host fallback.
    pub fn to_hex(&self) -> String {
        format!("{:#x}", self.0)
    }
}

/// Read a pointer-sized little-endian integer from a handle buffer.
/// `width` is 8 for 64-bit handles, 4 for 32-bit ones.
pub fn decode_le_handle(buf: &[u8], width: usize) -> Option<u64> {
    if buf.len() < width {
        return None;
    }
    match width {
        8 => {
            let bytes: [u8; 8] = buf[..8].try_into().ok()?;
            Some(u64::from_le_bytes(bytes))
        }
        4 => {
            let bytes: [u8; 4] = buf[..4].try_into().ok()?;
            Some(u64::from(u32::from_le_bytes(bytes)))
        }
        _ => None,
    }
}

/// The option set consumed by the window attribute applier.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeProfile {
    /// Always-on-top with the given level hint, when set.
    pub always_on_top: Option<AlwaysOnTopLevel>,
    /// Remove the window from the taskbar/dock.
    pub skip_taskbar: bool,
    /// Toolkit-level capture-exclusion primitive.
    pub content_protection: bool,
    /// Opacity shim value just below 1.0, when set.
    pub opacity: Option<f64>,
    /// Keep the window visible on all workspaces, including over
    /// fullscreen applications.
    pub visible_on_all_workspaces: bool,
    /// Hide the menu bar (Linux).
    pub hide_menu_bar: bool,
    /// Hide the native close/minimize/zoom affordances (macOS).
    pub hide_window_buttons: bool,
}

impl AttributeProfile {
    /// Windows baseline: applied regardless of how the native tiers fared.
    pub fn windows_baseline() -> Self {
        Self {
            always_on_top: Some(AlwaysOnTopLevel::ScreenSaver),
            skip_taskbar: true,
            content_protection: true,
            opacity: None,
            visible_on_all_workspaces: false,
            hide_menu_bar: false,
            hide_window_buttons: false,
        }
    }

    /// macOS profile: the whole strategy is toolkit-level.
    pub fn macos() -> Self {
        Self {
            always_on_top: Some(AlwaysOnTopLevel::ModalPanel),
            skip_taskbar: true,
            content_protection: true,
            opacity: Some(OPACITY_SHIM),
            visible_on_all_workspaces: true,
            hide_menu_bar: false,
            hide_window_buttons: true,
        }
    }

    /// Linux/X11 baseline applied before the native property batch.
    pub fn linux() -> Self {
        Self {
            always_on_top: Some(AlwaysOnTopLevel::PopUpMenu),
            skip_taskbar: true,
            content_protection: true,
            opacity: Some(OPACITY_SHIM),
            visible_on_all_workspaces: true,
            hide_menu_bar: true,
            hide_window_buttons: false,
        }
    }

    /// Degraded WSL profile: toolkit calls only.
    pub fn wsl() -> Self {
        Self {
            always_on_top: Some(AlwaysOnTopLevel::ScreenSaver),
            skip_taskbar: true,
            content_protection: true,
            opacity: None,
            visible_on_all_workspaces: false,
            hide_menu_bar: false,
            hide_window_buttons: false,
        }
    }
}

/// Handle to a toolkit-owned top-level window.
///
/// The subsystem holds a non-owning reference; applied attributes die with
/// the window and need no explicit teardown.
pub trait ToolkitWindow {
    fn set_always_on_top(&self, enabled: bool, level: AlwaysOnTopLevel) -> Result<(), ToolkitError>;

    fn set_content_protection(&self, enabled: bool) -> Result<(), ToolkitError>;

    fn set_opacity(&self, opacity: f64) -> Result<(), ToolkitError>;

    fn set_skip_taskbar(&self, skip: bool) -> Result<(), ToolkitError>;

    fn set_visible_on_all_workspaces(
        &self,
        visible: bool,
        include_fullscreen: bool,
    ) -> Result<(), ToolkitError>;

    fn set_menu_bar_visible(&self, visible: bool) -> Result<(), ToolkitError>;

    fn set_window_buttons_visible(&self, visible: bool) -> Result<(), ToolkitError>;

    /// The native window identifier, when the toolkit exposes one.
    fn native_window_id(&self) -> Option<NativeWindowId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_64_bit_handle_buffer() {
        let raw: u64 = 0x0000_7ffa_1234_abcd;
        let buf = raw.to_le_bytes();
        assert_eq!(decode_le_handle(&buf, 8), Some(raw));
    }

    #[test]
    fn decode_32_bit_handle_buffer() {
        let raw: u32 = 0x00a4_06b2;
        let buf = raw.to_le_bytes();
        assert_eq!(decode_le_handle(&buf, 4), Some(u64::from(raw)));
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert_eq!(decode_le_handle(&[0x01, 0x02], 8), None);
        assert_eq!(decode_le_handle(&[0x01], 4), None);
    }

    #[test]
    fn hex_rendering_for_script_host() {
        let id = NativeWindowId::from_raw(0x1a2b3c);
        assert_eq!(id.to_hex(), "0x1a2b3c");
    }

    #[test]
    fn profiles_follow_platform_call_sets() {
        let mac = AttributeProfile::macos();
        assert_eq!(mac.always_on_top, Some(AlwaysOnTopLevel::ModalPanel));
        assert!(mac.hide_window_buttons);
        assert_eq!(mac.opacity, Some(OPACITY_SHIM));

        let linux = AttributeProfile::linux();
        assert_eq!(linux.always_on_top, Some(AlwaysOnTopLevel::PopUpMenu));
        assert!(linux.hide_menu_bar);
        assert!(linux.visible_on_all_workspaces);

        let win = AttributeProfile::windows_baseline();
        assert_eq!(win.always_on_top, Some(AlwaysOnTopLevel::ScreenSaver));
        assert!(win.content_protection);
        assert!(win.opacity.is_none());

        let wsl = AttributeProfile::wsl();
        assert!(wsl.skip_taskbar);
        assert!(wsl.content_protection);
    }

    #[test]
    fn opacity_shim_is_just_below_opaque() {
        assert!(OPACITY_SHIM < 1.0);
        assert!(OPACITY_SHIM > 0.9);
    }
}
