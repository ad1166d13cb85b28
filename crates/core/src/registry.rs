//! Static capability registry.
//!
//! Maps each OS family to the ordered list of hiding techniques available
//! on it. Ordering reflects decreasing strength: the most OS-deep
//! technique comes first, the generic toolkit-level fallback last. The
//! strategies apply capabilities in order and tolerate individual
//! failures, so a weaker entry is always reachable.

use crate::env::{OsFamily, ToolAvailability, ToolKind};
use serde::{Deserialize, Serialize};

/// A named hiding technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityId {
    /// Windows display-affinity exclusion (composition engine omits the
    /// window from captured frame buffers).
    DisplayAffinityExclusion,
    /// DWM cloak plus exclusion from peek previews.
    DwmCloak,
    /// Extended style bits marking the window as a tool window.
    ToolWindowStyle,
    /// Layered-window alpha set to a near-opaque value.
    LayeredAlpha,
    /// X11 window-type/state property overrides.
    X11WindowTypeOverride,
    /// Compositor bypass and opacity hints.
    CompositorBypassHint,
    /// Auxiliary property-tagged overlay mask window.
    OverlayMask,
    /// Toolkit-level always-on-top + skip-taskbar + opacity shim +
    /// content-protection baseline.
    ToolkitShim,
}

impl CapabilityId {
    /// Stable lowercase label used in logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            CapabilityId::DisplayAffinityExclusion => "display_affinity_exclusion",
            CapabilityId::DwmCloak => "dwm_cloak",
            CapabilityId::ToolWindowStyle => "tool_window_style",
            CapabilityId::LayeredAlpha => "layered_alpha",
            CapabilityId::X11WindowTypeOverride => "x11_window_type_override",
            CapabilityId::CompositorBypassHint => "compositor_bypass_hint",
            CapabilityId::OverlayMask => "overlay_mask",
            CapabilityId::ToolkitShim => "toolkit_shim",
        }
    }
}

/// Prerequisite predicate over the probed tool availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// No prerequisite; always applicable.
    None,
    /// A single helper tool must be present.
    Tool(ToolKind),
    /// At least one of the listed tools must be present.
    AnyOf(&'static [ToolKind]),
}

impl Requirement {
    /// Evaluate the predicate against a probed environment.
    pub fn is_met(&self, tools: &ToolAvailability) -> bool {
        match self {
            Requirement::None => true,
            Requirement::Tool(kind) => tools.has(*kind),
            Requirement::AnyOf(kinds) => kinds.iter().any(|kind| tools.has(*kind)),
        }
    }
}

/// A hiding technique tagged with the family it applies to and its
/// prerequisite. Static, compiled-in data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidingCapability {
    pub id: CapabilityId,
    pub os_family: OsFamily,
    pub requires: Requirement,
}

const WINDOWS_CAPABILITIES: &[HidingCapability] = &[
    HidingCapability {
        id: CapabilityId::DisplayAffinityExclusion,
        os_family: OsFamily::Windows,
        requires: Requirement::AnyOf(&[ToolKind::NativeBridge, ToolKind::ScriptHost]),
    },
    HidingCapability {
        id: CapabilityId::DwmCloak,
        os_family: OsFamily::Windows,
        requires: Requirement::AnyOf(&[ToolKind::NativeBridge, ToolKind::ScriptHost]),
    },
    HidingCapability {
        id: CapabilityId::ToolWindowStyle,
        os_family: OsFamily::Windows,
        requires: Requirement::Tool(ToolKind::NativeBridge),
    },
    HidingCapability {
        id: CapabilityId::LayeredAlpha,
        os_family: OsFamily::Windows,
        requires: Requirement::Tool(ToolKind::NativeBridge),
    },
    HidingCapability {
        id: CapabilityId::ToolkitShim,
        os_family: OsFamily::Windows,
        requires: Requirement::None,
    },
];

const MACOS_CAPABILITIES: &[HidingCapability] = &[HidingCapability {
    id: CapabilityId::ToolkitShim,
    os_family: OsFamily::MacOs,
    requires: Requirement::None,
}];

const LINUX_CAPABILITIES: &[HidingCapability] = &[
    HidingCapability {
        id: CapabilityId::X11WindowTypeOverride,
        os_family: OsFamily::Linux,
        requires: Requirement::Tool(ToolKind::PropertyEditor),
    },
    HidingCapability {
        id: CapabilityId::CompositorBypassHint,
        os_family: OsFamily::Linux,
        requires: Requirement::Tool(ToolKind::PropertyEditor),
    },
    HidingCapability {
        id: CapabilityId::OverlayMask,
        os_family: OsFamily::Linux,
        requires: Requirement::Tool(ToolKind::WindowAutomation),
    },
    HidingCapability {
        id: CapabilityId::ToolkitShim,
        os_family: OsFamily::Linux,
        requires: Requirement::None,
    },
];

const WSL_CAPABILITIES: &[HidingCapability] = &[
    HidingCapability {
        id: CapabilityId::X11WindowTypeOverride,
        os_family: OsFamily::LinuxOnWindowsCompat,
        requires: Requirement::Tool(ToolKind::PropertyEditor),
    },
    HidingCapability {
        id: CapabilityId::CompositorBypassHint,
        os_family: OsFamily::LinuxOnWindowsCompat,
        requires: Requirement::Tool(ToolKind::PropertyEditor),
    },
    HidingCapability {
        id: CapabilityId::OverlayMask,
        os_family: OsFamily::LinuxOnWindowsCompat,
        requires: Requirement::Tool(ToolKind::WindowAutomation),
    },
    HidingCapability {
        id: CapabilityId::ToolkitShim,
        os_family: OsFamily::LinuxOnWindowsCompat,
        requires: Requirement::None,
    },
];

/// Lookup over the static capability tables. No I/O.
pub struct CapabilityRegistry;

impl CapabilityRegistry {
    /// Ordered capability list for an OS family, strongest first.
    /// Non-empty for every supported family.
    pub fn list_for(os_family: OsFamily) -> &'static [HidingCapability] {
        match os_family {
            OsFamily::Windows => WINDOWS_CAPABILITIES,
            OsFamily::MacOs => MACOS_CAPABILITIES,
            OsFamily::Linux => LINUX_CAPABILITIES,
            OsFamily::LinuxOnWindowsCompat => WSL_CAPABILITIES,
        }
    }

    /// Find a capability entry by id within a family's table.
    pub fn find(os_family: OsFamily, id: CapabilityId) -> Option<&'static HidingCapability> {
        Self::list_for(os_family).iter().find(|cap| cap.id == id)
    }
}
