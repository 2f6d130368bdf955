//! GPU-backed resources and their lifetime tracking.
//!
//! This module contains:
//! - [`DeviceResource`] - the capability contract every GPU-backed resource
//!   exposes to the recovery coordinator
//! - [`LifetimeState`] - the per-resource state machine
//! - [`ResourceRegistry`] - thread-safe set of all live resources of a device
//! - [`Buffer`], [`Texture`], [`TextureView`] - concrete resource kinds
//!
//! Resources are reference-counted with [`Arc`] and independently owned by
//! application code; the registry holds weak, non-owning tracking handles.
//!
//! [`Arc`]: std::sync::Arc

mod buffer;
mod registry;
mod texture;

use std::sync::Arc;

pub use buffer::{Buffer, BufferDescriptor, BufferUsage};
pub use registry::{Registration, ResourceId, ResourceRegistry};
pub use texture::{Texture, TextureDescriptor, TextureFormat, TextureUsage, TextureView};

/// Lifetime state of a registered resource.
///
/// ```text
/// Active --(pause)--> Paused --(resume)--> Active
/// Active|Paused --(device loss)--> Destroyed --(reload|recreate)--> Active
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifetimeState {
    /// Fully usable.
    #[default]
    Active,
    /// Voluntarily reduced footprint while the application is backgrounded.
    Paused,
    /// Native state lost; must be reloaded or recreated before use.
    Destroyed,
}

/// Capability contract between a GPU-backed resource and the recovery
/// coordinator.
///
/// Every resource registered with a device implements this trait. The
/// coordinator drives the [`LifetimeState`] machine exclusively through
/// these hooks; it never inspects resource internals.
pub trait DeviceResource: Send + Sync {
    /// Identity used in logs and recovery failure reports.
    fn label(&self) -> &str;

    /// Attempt to voluntarily release an easily-recreated footprint.
    ///
    /// Returns whether the resource is now in a reduced state. Returning
    /// `false` is non-fatal; the resource simply stays active.
    fn on_pause(&self) -> bool {
        false
    }

    /// Restore from paused back to fully usable.
    fn on_resume(&self) {}

    /// Release all native handles unconditionally. The device is already
    /// lost; native objects are invalid regardless of prior state.
    fn on_destroyed(&self);

    /// Attempt to fully reconstruct native state from already-active
    /// dependencies.
    ///
    /// Returns success. Failure means "try again after other resources
    /// complete" and feeds the coordinator's fixed-point loop.
    fn on_recreate(&self) -> bool;
}

/// Caller-supplied closure reconstructing a resource's content from
/// externally held data (e.g. re-read a file and re-upload).
///
/// Reload callbacks depend only on external data, never on other resources,
/// so the coordinator runs them before the recreation fixed point. The
/// closure captures its target resource (weakly), which is why it takes no
/// arguments.
pub type ReloadFn = Arc<dyn Fn() + Send + Sync>;
