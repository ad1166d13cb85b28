//! Ghostveil Core
//!
//! Platform-agnostic foundation for the Ghostveil content-protection
//! subsystem.
//!
//! This crate holds:
//! - The host environment model (OS family, display session, helper tools)
//! - The static capability registry mapping OS families to hiding techniques
//! - Per-window ghost session state and its apply state machine
//! - The `ToolkitWindow` seam through which the host GUI toolkit is driven
//!
//! Nothing in this crate performs I/O; probing, subprocess execution, and
//! native calls live in `ghostveil-platform`.

pub mod env;
pub mod registry;
pub mod session;
pub mod toolkit;

pub use env::{
    DisplayProtocol, DisplaySession, HostEnvironment, OsFamily, StatusReport, ToolAvailability,
    ToolKind, WslSignals,
};
pub use registry::{CapabilityId, CapabilityRegistry, HidingCapability, Requirement};
pub use session::{ApplyDepth, ApplyState, GhostSession, MaskWindowId};
pub use toolkit::{
    AlwaysOnTopLevel, AttributeProfile, NativeWindowId, ToolkitError, ToolkitWindow, OPACITY_SHIM,
};
