//! Types shared between pipeline and sampler state.

/// Comparison function for depth testing and comparison sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if new value < stored value.
    #[default]
    Less,
    /// Passes if new value == stored value.
    Equal,
    /// Passes if new value <= stored value.
    LessEqual,
    /// Passes if new value > stored value.
    Greater,
    /// Passes if new value != stored value.
    NotEqual,
    /// Passes if new value >= stored value.
    GreaterEqual,
    /// Always passes.
    Always,
}
