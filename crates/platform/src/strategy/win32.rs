//! Compiled-in Win32 bridge for the native interop tier.
//!
//! All calls are repeat-safe: asserting an attribute the window already
//! carries is a no-op success, which is what makes the strategy's
//! re-application on show/restore idempotent.

use ghostveil_core::NativeWindowId;
use std::ffi::c_void;
use windows::Win32::Foundation::{COLORREF, HWND};
use windows::Win32::Graphics::Dwm::{
    DwmSetWindowAttribute, DWMWA_CLOAK, DWMWA_EXCLUDED_FROM_PEEK,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetWindowLongPtrW, SetLayeredWindowAttributes, SetWindowDisplayAffinity, SetWindowLongPtrW,
    GWL_EXSTYLE, LWA_ALPHA, WDA_EXCLUDEFROMCAPTURE, WS_EX_LAYERED, WS_EX_TOOLWINDOW,
};

use super::windows::{InteropError, NativeInterop};

/// Cloak value marking the window as cloaked by the application itself.
const DWM_CLOAKED_APP: i32 = 2;

pub struct Win32Interop;

impl Win32Interop {
    fn hwnd(window: NativeWindowId) -> HWND {
        HWND(window.as_raw() as *mut c_void)
    }
}

impl NativeInterop for Win32Interop {
    fn is_available(&self) -> bool {
        true
    }

    fn exclude_from_capture(&self, window: NativeWindowId) -> Result<(), InteropError> {
        unsafe {
            SetWindowDisplayAffinity(Self::hwnd(window), WDA_EXCLUDEFROMCAPTURE).map_err(|e| {
                InteropError::CallFailed {
                    call: "SetWindowDisplayAffinity",
                    reason: e.message(),
                }
            })
        }
    }

    fn cloak(&self, window: NativeWindowId) -> Result<(), InteropError> {
        let hwnd = Self::hwnd(window);
        unsafe {
            let cloak = DWM_CLOAKED_APP;
            DwmSetWindowAttribute(
                hwnd,
                DWMWA_CLOAK,
                &cloak as *const i32 as *const c_void,
                std::mem::size_of::<i32>() as u32,
            )
            .map_err(|e| InteropError::CallFailed {
                call: "DwmSetWindowAttribute(DWMWA_CLOAK)",
                reason: e.message(),
            })?;

            // Peek exclusion is supporting-only; its failure does not undo
            // the cloak.
            let excluded: i32 = 1;
            let _ = DwmSetWindowAttribute(
                hwnd,
                DWMWA_EXCLUDED_FROM_PEEK,
                &excluded as *const i32 as *const c_void,
                std::mem::size_of::<i32>() as u32,
            );
        }
        Ok(())
    }

    fn set_tool_window_style(&self, window: NativeWindowId) -> Result<(), InteropError> {
        let hwnd = Self::hwnd(window);
        unsafe {
            let current = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            let wanted = current | (WS_EX_TOOLWINDOW.0 | WS_EX_LAYERED.0) as isize;
            if wanted != current && SetWindowLongPtrW(hwnd, GWL_EXSTYLE, wanted) == 0 {
                return Err(InteropError::CallFailed {
                    call: "SetWindowLongPtrW(GWL_EXSTYLE)",
                    reason: windows::core::Error::from_win32().message(),
                });
            }
        }
        Ok(())
    }

    fn set_layered_alpha(&self, window: NativeWindowId, alpha: u8) -> Result<(), InteropError> {
        unsafe {
            SetLayeredWindowAttributes(Self::hwnd(window), COLORREF(0), alpha, LWA_ALPHA).map_err(
                |e| InteropError::CallFailed {
                    call: "SetLayeredWindowAttributes",
                    reason: e.message(),
                },
            )
        }
    }
}
