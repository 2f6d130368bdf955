//! Pipeline state description and its sub-states.

use std::hash::{Hash, Hasher};

use crate::types::CompareFunction;

/// Source/destination factor for blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// How source and destination are combined when blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Color/alpha blending configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Whether blending is enabled for the render target.
    pub enabled: bool,
    /// Source color factor.
    pub src_factor: BlendFactor,
    /// Destination color factor.
    pub dst_factor: BlendFactor,
    /// Color blend operation.
    pub operation: BlendOperation,
    /// Source alpha factor.
    pub src_alpha_factor: BlendFactor,
    /// Destination alpha factor.
    pub dst_alpha_factor: BlendFactor,
    /// Alpha blend operation.
    pub alpha_operation: BlendOperation,
}

impl BlendState {
    /// Opaque rendering: blending disabled.
    pub fn opaque() -> Self {
        Self {
            enabled: false,
            ..Self::alpha()
        }
    }

    /// Standard premultiplied alpha blending.
    pub fn alpha() -> Self {
        Self {
            enabled: true,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            alpha_operation: BlendOperation::Add,
        }
    }

    /// Additive blending.
    pub fn additive() -> Self {
        Self {
            enabled: true,
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::One,
            alpha_operation: BlendOperation::Add,
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::opaque()
    }
}

/// Which triangle faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Winding order considered front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    /// Face culling mode.
    pub cull_mode: CullMode,
    /// Front-face winding.
    pub front_face: FrontFace,
    /// Polygon fill mode.
    pub fill_mode: FillMode,
    /// Constant depth bias in native units.
    pub depth_bias: i32,
    /// Whether scissor testing is enabled.
    pub scissor_enabled: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            fill_mode: FillMode::Solid,
            depth_bias: 0,
            scissor_enabled: false,
        }
    }
}

/// Depth/stencil configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Whether depth testing is enabled.
    pub depth_test_enabled: bool,
    /// Whether depth writes are enabled.
    pub depth_write_enabled: bool,
    /// Depth comparison function.
    pub depth_compare: CompareFunction,
    /// Whether stencil testing is enabled.
    pub stencil_enabled: bool,
    /// Stencil read mask.
    pub stencil_read_mask: u8,
    /// Stencil write mask.
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil_enabled: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    #[default]
    Float32x3,
    Float32x4,
    Uint32,
    Sint32,
    Unorm8x4,
}

/// One element of the input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset within the vertex.
    pub offset: u32,
    /// Vertex buffer slot the element is fetched from.
    pub buffer_slot: u32,
}

impl InputElement {
    /// Create an input element for buffer slot 0.
    pub fn new(location: u32, format: VertexFormat, offset: u32) -> Self {
        Self {
            location,
            format,
            offset,
            buffer_slot: 0,
        }
    }
}

/// Reference to compiled shader bytecode.
///
/// The bytecode itself lives in the content layer; the description only
/// carries a stable content hash and entry point, which is what the cache
/// key needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderRef {
    /// Content hash of the compiled bytecode.
    pub bytecode_hash: u64,
    /// Entry point name.
    pub entry_point: String,
}

impl ShaderRef {
    /// Create a shader reference.
    pub fn new(bytecode_hash: u64, entry_point: impl Into<String>) -> Self {
        Self {
            bytecode_hash,
            entry_point: entry_point.into(),
        }
    }
}

impl Default for ShaderRef {
    fn default() -> Self {
        Self::new(0, "main")
    }
}

/// Full description of a pipeline state object.
///
/// This is the cache key for [`PipelineStateCache`]: equality is deep over
/// every state field, including element-wise comparison of the input layout.
/// The debug `label` is excluded from equality and hashing, so two otherwise
/// identical descriptions with different labels resolve to the same cached
/// native object.
///
/// In the builder usage pattern the description is mutated between draw
/// calls; the cache always clones it before interning, so mutating a
/// description after resolution cannot corrupt the cache.
///
/// [`PipelineStateCache`]: crate::state_cache::PipelineStateCache
#[derive(Debug, Clone, Default)]
pub struct PipelineStateDescription {
    /// Debug label, excluded from equality and hashing.
    pub label: Option<String>,
    /// Blend configuration.
    pub blend: BlendState,
    /// Rasterizer configuration.
    pub rasterizer: RasterizerState,
    /// Depth/stencil configuration.
    pub depth_stencil: DepthStencilState,
    /// Vertex shader reference.
    pub vertex_shader: ShaderRef,
    /// Fragment shader reference.
    pub fragment_shader: ShaderRef,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Input layout elements.
    pub input_elements: Vec<InputElement>,
}

impl PipelineStateDescription {
    /// Create a default description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the blend state.
    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = blend;
        self
    }

    /// Set the rasterizer state.
    pub fn with_rasterizer(mut self, rasterizer: RasterizerState) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Set the depth/stencil state.
    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    /// Set the vertex and fragment shaders.
    pub fn with_shaders(mut self, vertex: ShaderRef, fragment: ShaderRef) -> Self {
        self.vertex_shader = vertex;
        self.fragment_shader = fragment;
        self
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the input layout.
    pub fn with_input_elements(mut self, elements: Vec<InputElement>) -> Self {
        self.input_elements = elements;
        self
    }
}

impl PartialEq for PipelineStateDescription {
    fn eq(&self, other: &Self) -> bool {
        // Label intentionally excluded.
        self.blend == other.blend
            && self.rasterizer == other.rasterizer
            && self.depth_stencil == other.depth_stencil
            && self.vertex_shader == other.vertex_shader
            && self.fragment_shader == other.fragment_shader
            && self.topology == other.topology
            && self.input_elements == other.input_elements
    }
}

impl Eq for PipelineStateDescription {}

impl Hash for PipelineStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.blend.hash(state);
        self.rasterizer.hash(state);
        self.depth_stencil.hash(state);
        self.vertex_shader.hash(state);
        self.fragment_shader.hash(state);
        self.topology.hash(state);
        self.input_elements.hash(state);
    }
}
