//! Startup environment probe.
//!
//! Computes the immutable [`HostEnvironment`] snapshot: OS family (with
//! the WSL sub-check on Linux kernels), the graphical display session, and
//! the availability of every helper tool the strategies may shell out to.
//!
//! Every individual probe failure is non-fatal and defaults its field to
//! absent/unknown; `detect()` itself never fails.

use ghostveil_core::{
    DisplayProtocol, DisplaySession, HostEnvironment, OsFamily, ToolAvailability, ToolKind,
    WslSignals,
};
use std::future::Future;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::{command_succeeds, PROBE_TIMEOUT};

/// Environment variables set by the Linux-on-Windows compatibility layer.
const WSL_ENV_MARKERS: &[&str] = &["WSL_DISTRO_NAME", "WSL_INTEROP"];

/// Mount points created by the compatibility layer.
const WSL_MOUNT_POINTS: &[&str] = &["/run/WSL", "/mnt/wsl"];

/// Ordered screen-capture command preference per OS family.
const LINUX_CAPTURE_TOOLS: &[&str] = &["gnome-screenshot", "scrot", "maim", "import"];
const MACOS_CAPTURE_TOOLS: &[&str] = &["screencapture"];

/// One-shot host environment detection.
pub struct EnvironmentProbe;

impl EnvironmentProbe {
    /// Detect the host environment. Invoked once per process lifetime.
    pub async fn detect() -> HostEnvironment {
        let os_family = detect_os_family();
        let display_session = detect_display_session(os_family).await;
        let tools = detect_tools(os_family);

        info!(
            os_family = os_family.label(),
            display_protocol = ?display_session.protocol,
            display_target = display_session.target.as_deref().unwrap_or("<none>"),
            capture_tool = tools.capture_tool.as_deref().unwrap_or("<none>"),
            "host environment detected"
        );

        HostEnvironment {
            os_family,
            display: display_session,
            tools,
        }
    }
}

/// OS family from the compile-time target, refined by the WSL sub-check on
/// Linux kernels.
fn detect_os_family() -> OsFamily {
    if cfg!(target_os = "windows") {
        OsFamily::Windows
    } else if cfg!(target_os = "macos") {
        OsFamily::MacOs
    } else if collect_wsl_signals().is_compat_layer() {
        OsFamily::LinuxOnWindowsCompat
    } else {
        OsFamily::Linux
    }
}

/// Gather the four compatibility-layer signals. Read failures count as a
/// negative signal, never as an error.
pub fn collect_wsl_signals() -> WslSignals {
    let kernel_version_marker = std::fs::read_to_string("/proc/version")
        .map(|text| contains_wsl_marker(&text))
        .unwrap_or(false);

    let kernel_release_marker = std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|text| contains_wsl_marker(&text))
        .unwrap_or(false);

    let env_marker = WSL_ENV_MARKERS
        .iter()
        .any(|name| std::env::var_os(name).is_some());

    let mount_point = WSL_MOUNT_POINTS.iter().any(|path| Path::new(path).exists());

    WslSignals {
        kernel_version_marker,
        kernel_release_marker,
        env_marker,
        mount_point,
    }
}

/// Marker match used for both kernel strings.
pub fn contains_wsl_marker(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("microsoft") || text.contains("wsl")
}

/// Resolve the display session: protocol from `XDG_SESSION_TYPE`, target
/// from `DISPLAY`, falling back through candidate targets on linux-like
/// hosts without one.
async fn detect_display_session(os_family: OsFamily) -> DisplaySession {
    let protocol = match std::env::var("XDG_SESSION_TYPE").as_deref() {
        Ok("x11") => DisplayProtocol::X11,
        Ok("wayland") => DisplayProtocol::Wayland,
        _ => DisplayProtocol::Unknown,
    };

    let mut target = std::env::var("DISPLAY").ok().filter(|v| !v.is_empty());

    if target.is_none() && os_family.is_linux_like() {
        let candidates = display_candidates(windows_host_ip().as_deref());
        target = resolve_display_target(&candidates, display_query_succeeds).await;
    }

    DisplaySession { protocol, target }
}

/// Candidate display targets tried in order when `DISPLAY` is unset:
/// host-IP-based (the compat layer's X server lives on the Windows host),
/// bare local, and hostname-based forms.
pub fn display_candidates(host_ip: Option<&str>) -> Vec<String> {
    let ip = host_ip.unwrap_or("127.0.0.1");
    vec![
        format!("{ip}:0.0"),
        ":0".to_string(),
        ":0.0".to_string(),
        "localhost:0.0".to_string(),
    ]
}

/// Try candidates in order and accept the first for which the probe
/// succeeds. No later candidate is tried after a success.
pub async fn resolve_display_target<F, Fut>(candidates: &[String], mut probe: F) -> Option<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    for candidate in candidates {
        debug!(display = %candidate, "probing display target");
        if probe(candidate.clone()).await {
            debug!(display = %candidate, "display target accepted");
            return Some(candidate.clone());
        }
    }
    None
}

/// Lightweight display-server query against a candidate target.
async fn display_query_succeeds(candidate: String) -> bool {
    let mut cmd = Command::new("xset");
    cmd.arg("q").env("DISPLAY", candidate);
    command_succeeds(cmd, PROBE_TIMEOUT).await
}

/// Windows host IP as seen from inside the compat layer: the nameserver in
/// `/etc/resolv.conf` points at the host.
fn windows_host_ip() -> Option<String> {
    let text = std::fs::read_to_string("/etc/resolv.conf").ok()?;
    parse_nameserver(&text)
}

/// Extract the first dotted-quad nameserver address.
pub fn parse_nameserver(resolv_conf: &str) -> Option<String> {
    resolv_conf
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let addr = line.strip_prefix("nameserver")?.trim();
            is_dotted_quad(addr).then(|| addr.to_string())
        })
        .next()
}

fn is_dotted_quad(addr: &str) -> bool {
    let octets: Vec<&str> = addr.split('.').collect();
    octets.len() == 4 && octets.iter().all(|o| !o.is_empty() && o.parse::<u8>().is_ok())
}

/// Probe helper-tool availability for the detected family.
fn detect_tools(os_family: OsFamily) -> ToolAvailability {
    let mut tools = ToolAvailability::none();

    match os_family {
        OsFamily::Windows => {
            // The Win32 bindings are compiled in on Windows builds.
            tools.set(ToolKind::NativeBridge, cfg!(target_os = "windows"));
            tools.set(ToolKind::ScriptHost, binary_present("powershell"));
        }
        OsFamily::MacOs => {
            tools.capture_tool = first_present(MACOS_CAPTURE_TOOLS);
        }
        OsFamily::Linux | OsFamily::LinuxOnWindowsCompat => {
            tools.set(ToolKind::WindowInspector, binary_present("xwininfo"));
            tools.set(ToolKind::PropertyEditor, binary_present("xprop"));
            tools.set(ToolKind::WindowAutomation, binary_present("xdotool"));
            tools.set(ToolKind::DisplayQuery, binary_present("xset"));
            tools.capture_tool = first_present(LINUX_CAPTURE_TOOLS);

            if os_family == OsFamily::LinuxOnWindowsCompat {
                // Interop-exposed host shell, usable for diagnostics only.
                tools.set(ToolKind::ScriptHost, binary_present("powershell.exe"));
            }
        }
    }

    tools
}

fn binary_present(name: &str) -> bool {
    let present = which::which(name).is_ok();
    debug!(tool = name, present, "tool probe");
    present
}

fn first_present(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find(|name| which::which(name).is_ok())
        .map(|name| (*name).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn wsl_marker_matching() {
        assert!(contains_wsl_marker(
            "Linux version 5.15.90.1-microsoft-standard-WSL2"
        ));
        assert!(contains_wsl_marker("5.15.90.1-Microsoft-standard"));
        assert!(!contains_wsl_marker("Linux version 6.8.0-41-generic"));
    }

    #[test]
    fn nameserver_parsing() {
        let conf = "# generated by the compat layer\nnameserver 172.29.32.1\nsearch localdomain\n";
        assert_eq!(parse_nameserver(conf), Some("172.29.32.1".to_string()));

        // IPv6 and malformed entries are skipped.
        assert_eq!(parse_nameserver("nameserver fe80::1\n"), None);
        assert_eq!(parse_nameserver("nameserver 999.1.1.1\n"), None);
        assert_eq!(parse_nameserver(""), None);
    }

    #[test]
    fn candidate_order_is_host_ip_first() {
        let candidates = display_candidates(Some("172.29.32.1"));
        assert_eq!(
            candidates,
            vec!["172.29.32.1:0.0", ":0", ":0.0", "localhost:0.0"]
        );

        // Without a host IP the loopback form leads.
        let candidates = display_candidates(None);
        assert_eq!(candidates[0], "127.0.0.1:0.0");
    }

    #[tokio::test]
    async fn fallback_selects_first_succeeding_candidate_and_stops() {
        let candidates = display_candidates(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_probe = Arc::clone(&calls);

        // Only the third candidate works.
        let selected = resolve_display_target(&candidates, move |candidate| {
            let calls = Arc::clone(&calls_in_probe);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                candidate == ":0.0"
            }
        })
        .await;

        assert_eq!(selected.as_deref(), Some(":0.0"));
        // The fourth candidate must not have been probed.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fallback_yields_none_when_every_candidate_fails() {
        let candidates = display_candidates(None);
        let selected = resolve_display_target(&candidates, |_| async { false }).await;
        assert_eq!(selected, None);
    }

    #[tokio::test]
    async fn detect_never_fails() {
        // Whatever the host looks like, detection completes with a family
        // consistent with the compile target.
        let env = EnvironmentProbe::detect().await;
        if cfg!(target_os = "linux") {
            assert!(env.os_family.is_linux_like());
        }
        if cfg!(target_os = "macos") {
            assert_eq!(env.os_family, OsFamily::MacOs);
        }
        if cfg!(target_os = "windows") {
            assert_eq!(env.os_family, OsFamily::Windows);
        }
    }
}
