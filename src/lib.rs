//! # Vitreous Graphics
//!
//! Hardware-agnostic graphics device layer: the intermediate layer between
//! high-level rendering code and a native GPU API.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ValueKeyedCache`] - content-addressed interning of native GPU objects
//! - [`PipelineStateCache`] / [`SamplerStateCache`] - per-device state caches
//! - [`MutablePipelineStateResolver`] - per-draw-call pipeline resolution
//! - [`ResourceRegistry`] + [`DeviceResource`] - live-resource tracking and
//!   the capability contract for recovery
//! - [`RecoveryCoordinator`] - pause/resume and device loss/restore
//!   orchestration over the whole resource graph
//! - [`GraphicsDevice`] - the ownership root tying the pieces together
//!
//! ## Example
//!
//! ```
//! use vitreous_graphics::{BlendState, GraphicsDevice, PipelineStateDescription};
//!
//! let device = GraphicsDevice::new("main");
//!
//! // Resolve a pipeline state; structurally equal descriptions intern to
//! // the same native object.
//! let mut resolver = device.pipeline_resolver(PipelineStateDescription::new());
//! let opaque = resolver.resolve().unwrap();
//! resolver.state_mut().blend = BlendState::alpha();
//! let alpha = resolver.resolve().unwrap();
//! assert!(!std::sync::Arc::ptr_eq(&opaque, &alpha));
//! ```

pub mod cache;
pub mod device;
pub mod error;
pub mod presenter;
pub mod recovery;
pub mod resolver;
pub mod resources;
pub mod state_cache;
pub mod types;

// Re-export main types for convenience
pub use cache::ValueKeyedCache;
pub use device::GraphicsDevice;
pub use error::{GraphicsError, RecoveryFailure};
pub use presenter::{Presenter, PresenterConfig, SurfacePresenter};
pub use recovery::RecoveryCoordinator;
pub use resolver::{MutablePipelineStateResolver, PipelineStateFactory};
pub use resources::{
    Buffer, BufferDescriptor, BufferUsage, DeviceResource, LifetimeState, Registration, ReloadFn,
    ResourceId, ResourceRegistry, Texture, TextureDescriptor, TextureFormat, TextureUsage,
    TextureView,
};
pub use state_cache::{
    HandleAllocator, NativeHandle, PipelineState, PipelineStateCache, SamplerState,
    SamplerStateCache,
};
pub use types::{
    AddressMode, BlendFactor, BlendOperation, BlendState, CompareFunction, CullMode,
    DepthStencilState, FillMode, FilterMode, FrontFace, InputElement, PipelineStateDescription,
    PrimitiveTopology, RasterizerState, SamplerStateDescription, ShaderRef, VertexFormat,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Vitreous Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
