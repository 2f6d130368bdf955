//! State descriptions and enums used as cache keys.
//!
//! This module contains the value types that describe native GPU state:
//! - [`PipelineStateDescription`] - full fixed-function + shader configuration
//! - [`SamplerStateDescription`] - texture filtering and addressing
//!
//! Descriptions are the cache-key contract of the crate: deep structural
//! equality and a stable hash over every state field, so two descriptions
//! built independently but with equal content resolve to the same cached
//! native object. Debug labels are excluded from equality and hashing.

mod common;
mod pipeline;
mod sampler;

pub use common::CompareFunction;
pub use pipeline::{
    BlendFactor, BlendOperation, BlendState, CullMode, DepthStencilState, FillMode, FrontFace,
    InputElement, PipelineStateDescription, PrimitiveTopology, RasterizerState, ShaderRef,
    VertexFormat,
};
pub use sampler::{AddressMode, FilterMode, SamplerStateDescription};
