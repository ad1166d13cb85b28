//! Overlay mask window generation (Linux auxiliary).
//!
//! Creates an auxiliary, property-tagged window carrying capture-blocking
//! display-server hints, distinct from the application's primary window.
//! Compositor support for these hints varies; the mask is a secondary
//! hardening signal, never a guarantee.
//!
//! The interactive window-selection step and the property tagging run
//! through a generated single-use shell script that is removed on every
//! exit path.

use ghostveil_core::{HostEnvironment, MaskWindowId, ToolKind};
use regex::Regex;
use std::io::Write;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::exec::{run_command, run_for_stdout, COMMAND_TIMEOUT};
use crate::strategy::linux::{parse_window_ids, with_display};

/// On-screen geometry of the mask's target window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Errors from mask creation.
#[derive(Debug, Error)]
pub enum MaskError {
    #[error("window automation tool not available")]
    AutomationUnavailable,

    #[error("no window matched class {class:?} or title {title:?}")]
    TargetNotFound { class: String, title: String },

    #[error("window inspector failed: {0}")]
    Inspector(String),

    #[error("could not parse window geometry from inspector output")]
    GeometryParse,

    #[error("mask script failed: {0}")]
    Script(String),

    #[error("mask script produced no window id")]
    NoWindowId,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Property overrides applied to the mask window after creation. The
/// opacity sentinel is chosen empirically to interfere with recording
/// pipelines on some compositors.
const MASK_PROPERTY_OVERRIDES: &[(&str, &str, &str)] = &[
    (
        "_NET_WM_WINDOW_TYPE",
        "32a",
        "_NET_WM_WINDOW_TYPE_DOCK,_NET_WM_WINDOW_TYPE_NOTIFICATION,_NET_WM_WINDOW_TYPE_DROPDOWN_MENU",
    ),
    (
        "_NET_WM_STATE",
        "32a",
        "_NET_WM_STATE_ABOVE,_NET_WM_STATE_FOCUSED,_NET_WM_STATE_MODAL",
    ),
    ("_NET_WM_BYPASS_COMPOSITOR", "32c", "2"),
    ("_NET_WM_WINDOW_OPACITY", "32c", "0xfffffffc"),
    ("_MUTTER_HINTS", "32c", "0x1"),
    ("_COMPIZ_WM_WINDOW_BLUR", "32c", "2"),
];

/// Creates overlay mask windows for a given application window class.
pub struct OverlayMaskGenerator {
    window_class: String,
    window_title: String,
}

impl OverlayMaskGenerator {
    pub fn new(window_class: &str, window_title: &str) -> Self {
        Self {
            window_class: window_class.to_string(),
            window_title: window_title.to_string(),
        }
    }

    /// Create a mask for `target`, or for a discovered window when no
    /// target is given. Returns the mask's display-server identifier.
    pub async fn create_mask(
        &self,
        env: &HostEnvironment,
        target: Option<u64>,
    ) -> Result<MaskWindowId, MaskError> {
        if !env.tools.has(ToolKind::WindowAutomation) {
            return Err(MaskError::AutomationUnavailable);
        }

        let target = match target {
            Some(id) => id,
            None => self.find_target_window(env).await?,
        };

        // All four geometry fields must parse; a partial read aborts mask
        // creation before any property call is issued.
        let geometry = self.window_geometry(env, target).await?;
        debug!(?geometry, target, "creating overlay mask");

        let mask_id = run_mask_script(env, &geometry).await?;

        self.tag_mask_window(env, mask_id).await;

        Ok(mask_id)
    }

    /// Last-resort target discovery: class search, then title search, the
    /// last listed (most recently created) match wins.
    async fn find_target_window(&self, env: &HostEnvironment) -> Result<u64, MaskError> {
        for (flag, needle) in [
            ("--class", self.window_class.as_str()),
            ("--name", self.window_title.as_str()),
        ] {
            let mut cmd = Command::new("xdotool");
            cmd.args(["search", flag, needle]);
            with_display(&mut cmd, env);

            if let Ok(output) = run_for_stdout(cmd, COMMAND_TIMEOUT).await {
                let ids = parse_window_ids(&output);
                if let Some(&id) = ids.last() {
                    if ids.len() > 1 {
                        warn!(
                            matches = ids.len(),
                            needle, "multiple mask targets matched, taking the most recent"
                        );
                    }
                    return Ok(id);
                }
            }
        }

        Err(MaskError::TargetNotFound {
            class: self.window_class.clone(),
            title: self.window_title.clone(),
        })
    }

    async fn window_geometry(
        &self,
        env: &HostEnvironment,
        window_id: u64,
    ) -> Result<MaskGeometry, MaskError> {
        let id_arg = window_id.to_string();
        let mut cmd = Command::new("xwininfo");
        cmd.args(["-id", id_arg.as_str()]);
        with_display(&mut cmd, env);

        let output = run_for_stdout(cmd, COMMAND_TIMEOUT)
            .await
            .map_err(|e| MaskError::Inspector(e.to_string()))?;

        parse_geometry(&output).ok_or(MaskError::GeometryParse)
    }

    /// Second property-tagging pass against the created mask. Each command
    /// failure is logged and ignored, never aborting the batch.
    async fn tag_mask_window(&self, env: &HostEnvironment, mask_id: MaskWindowId) {
        let id_arg = mask_id.to_string();
        for (property, format, value) in MASK_PROPERTY_OVERRIDES {
            let mut cmd = Command::new("xprop");
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
            with_display(&mut cmd, env);

            if let Err(e) = run_command(cmd, COMMAND_TIMEOUT).await {
                debug!(property, "mask property tagging failed: {e}");
            }
        }
    }
}

/// Parse the inspector's geometry output. All four fields are required.
pub fn parse_geometry(output: &str) -> Option<MaskGeometry> {
    let x = capture_number(output, r"Absolute upper-left X:\s+(-?\d+)")?;
    let y = capture_number(output, r"Absolute upper-left Y:\s+(-?\d+)")?;
    let width = capture_number(output, r"Width:\s+(\d+)")?;
    let height = capture_number(output, r"Height:\s+(\d+)")?;

    Some(MaskGeometry {
        x: x as i32,
        y: y as i32,
        width: width as u32,
        height: height as u32,
    })
}

fn capture_number(output: &str, pattern: &str) -> Option<i64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

/// Write and execute the single-use mask script, returning the selected
/// window's id. The script file is deleted on every exit path.
async fn run_mask_script(
    env: &HostEnvironment,
    geometry: &MaskGeometry,
) -> Result<MaskWindowId, MaskError> {
    let mut file = tempfile::Builder::new()
        .prefix("ghostveil-mask-")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(mask_script_body(geometry).as_bytes())?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))?;
    }

    let mut cmd = Command::new("bash");
    cmd.arg(file.path());
    with_display(&mut cmd, env);

    let output = run_for_stdout(cmd, COMMAND_TIMEOUT)
        .await
        .map_err(|e| MaskError::Script(e.to_string()))?;

    // `file` drops below regardless of the parse result.
    parse_mask_id(&output).ok_or(MaskError::NoWindowId)
}

/// The generated script: the automation tool interactively selects a
/// window, which is then tagged with capture-blocking hints and reported
/// by id on stdout.
fn mask_script_body(geometry: &MaskGeometry) -> String {
    format!(
        r#"#!/bin/bash
# anti-capture mask; target region x={x} y={y} w={width} h={height}

WINDOW_ID=$(xdotool selectwindow)

xprop -id $WINDOW_ID -f _NET_WM_WINDOW_TYPE 32a -set _NET_WM_WINDOW_TYPE _NET_WM_WINDOW_TYPE_UTILITY,_NET_WM_WINDOW_TYPE_DND
xprop -id $WINDOW_ID -f _NET_WM_STATE 32a -set _NET_WM_STATE _NET_WM_STATE_ABOVE,_NET_WM_STATE_FOCUSED
xprop -id $WINDOW_ID -f _NET_WM_BYPASS_COMPOSITOR 32c -set _NET_WM_BYPASS_COMPOSITOR 1
xprop -id $WINDOW_ID -f _COMPIZ_WM_WINDOW_BLUR 32c -set _COMPIZ_WM_WINDOW_BLUR 1
xprop -id $WINDOW_ID -f _NET_WM_WINDOW_OPACITY 32c -set _NET_WM_WINDOW_OPACITY 0xfffffffd

echo "mask window id: $WINDOW_ID"
"#,
        x = geometry.x,
        y = geometry.y,
        width = geometry.width,
        height = geometry.height,
    )
}

/// Parse the single id line printed by the mask script.
pub fn parse_mask_id(output: &str) -> Option<MaskWindowId> {
    let re = Regex::new(r"mask window id:\s*(\d+)").ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}
