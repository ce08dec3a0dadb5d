//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-playback`). Host applications can
//! depend on `floatplay-workspace` and enable `desktop-shims` to pull in the
//! desktop bridges, or `core-only` to embed just the synchronization core.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "core-only")]
pub use core_playback as playback;
