//! Ghostveil Platform
//!
//! OS-specific capture-exclusion machinery.
//!
//! This crate handles:
//! - One-shot host environment probing (OS family, WSL sub-check, display
//!   session, helper-tool discovery)
//! - Toolkit-level window attribute application
//! - The per-OS hiding strategies (Windows native/script tiers, macOS
//!   toolkit profile, Linux/X11 property batch, degraded WSL variant)
//! - Overlay mask window generation on X11
//!
//! All external commands run with bounded timeouts on the tokio runtime;
//! no operation here is fatal to the process.

pub mod applier;
pub mod exec;
pub mod mask;
pub mod probe;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testutil;

pub use applier::WindowAttributeApplier;
pub use mask::{MaskError, MaskGeometry, OverlayMaskGenerator};
pub use probe::EnvironmentProbe;
pub use strategy::{ApplyOutcome, SelectedStrategy, StrategyConfig, SETTLE_DELAY};
