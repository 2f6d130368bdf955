//! Sampler state description.

use std::hash::{Hash, Hasher};

use crate::types::CompareFunction;

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Texture coordinate addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Full description of a sampler state object.
///
/// Cache key for [`SamplerStateCache`]. Equality is deep over every field
/// except the debug `label`; the f32 LOD clamps compare and hash by bit
/// pattern so the description can serve as a `HashMap` key.
///
/// [`SamplerStateCache`]: crate::state_cache::SamplerStateCache
#[derive(Debug, Clone)]
pub struct SamplerStateDescription {
    /// Debug label, excluded from equality and hashing.
    pub label: Option<String>,
    /// Address mode for U coordinate.
    pub address_mode_u: AddressMode,
    /// Address mode for V coordinate.
    pub address_mode_v: AddressMode,
    /// Address mode for W coordinate.
    pub address_mode_w: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Mipmap filter.
    pub mipmap_filter: FilterMode,
    /// Minimum LOD clamp.
    pub lod_min_clamp: f32,
    /// Maximum LOD clamp.
    pub lod_max_clamp: f32,
    /// Comparison function for depth sampling.
    pub compare: Option<CompareFunction>,
    /// Maximum anisotropy level.
    pub anisotropy_clamp: u16,
}

impl SamplerStateDescription {
    /// Create a new description with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a linear filtering description.
    pub fn linear() -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        }
    }

    /// Create a nearest neighbor filtering description.
    pub fn nearest() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set address mode for all coordinates.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    /// Set comparison function for depth sampling.
    pub fn with_compare(mut self, compare: CompareFunction) -> Self {
        self.compare = Some(compare);
        self
    }

    /// Set anisotropic filtering level.
    pub fn with_anisotropy(mut self, level: u16) -> Self {
        self.anisotropy_clamp = level;
        self
    }
}

impl Default for SamplerStateDescription {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

impl PartialEq for SamplerStateDescription {
    fn eq(&self, other: &Self) -> bool {
        // Label intentionally excluded; floats compared by bit pattern.
        self.address_mode_u == other.address_mode_u
            && self.address_mode_v == other.address_mode_v
            && self.address_mode_w == other.address_mode_w
            && self.mag_filter == other.mag_filter
            && self.min_filter == other.min_filter
            && self.mipmap_filter == other.mipmap_filter
            && self.lod_min_clamp.to_bits() == other.lod_min_clamp.to_bits()
            && self.lod_max_clamp.to_bits() == other.lod_max_clamp.to_bits()
            && self.compare == other.compare
            && self.anisotropy_clamp == other.anisotropy_clamp
    }
}

impl Eq for SamplerStateDescription {}

impl Hash for SamplerStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address_mode_u.hash(state);
        self.address_mode_v.hash(state);
        self.address_mode_w.hash(state);
        self.mag_filter.hash(state);
        self.min_filter.hash(state);
        self.mipmap_filter.hash(state);
        self.lod_min_clamp.to_bits().hash(state);
        self.lod_max_clamp.to_bits().hash(state);
        self.compare.hash(state);
        self.anisotropy_clamp.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = SamplerStateDescription::linear().with_anisotropy(8);
        let b = SamplerStateDescription::linear().with_anisotropy(8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_label_excluded_from_equality() {
        let a = SamplerStateDescription::linear().with_label("albedo");
        let b = SamplerStateDescription::linear().with_label("normal_map");
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_affects_equality() {
        assert_ne!(
            SamplerStateDescription::linear(),
            SamplerStateDescription::nearest()
        );
    }

    #[test]
    fn test_compare_affects_equality() {
        let plain = SamplerStateDescription::linear();
        let shadow = SamplerStateDescription::linear().with_compare(CompareFunction::LessEqual);
        assert_ne!(plain, shadow);
    }
}
