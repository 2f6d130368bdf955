//! Per-device pipeline and sampler state caches.
//!
//! Both caches intern native state objects by structural value of their
//! descriptions through [`ValueKeyedCache`], but follow different retention
//! policies:
//!
//! - [`PipelineStateCache`] retains every entry until [`clear`] at device
//!   teardown. Pipeline descriptions have small cardinality and high lookup
//!   churn, so individual eviction is never worth it.
//! - [`SamplerStateCache`] follows strict reference counting: releasing the
//!   last reference to a sampler state erases it immediately, since sampler
//!   cardinality is small and entries churn across content reloads.
//!
//! [`clear`]: PipelineStateCache::clear

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::ValueKeyedCache;
use crate::error::GraphicsError;
use crate::types::{PipelineStateDescription, SamplerStateDescription};

/// Opaque handle to a native backend object.
///
/// Handles are never reused within a device; a recreated resource gets a
/// fresh handle so stale references cannot alias new objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// Raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Monotonic allocator for [`NativeHandle`]s, one per device.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    /// Create an allocator starting at handle 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next handle.
    pub fn allocate(&self) -> NativeHandle {
        NativeHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled native pipeline state object.
///
/// Holds the immutable description snapshot it was built from plus the
/// native handle. Shared through the cache; identity (`Arc::ptr_eq`) is
/// the interning guarantee callers rely on.
#[derive(Debug)]
pub struct PipelineState {
    description: PipelineStateDescription,
    native: NativeHandle,
}

impl PipelineState {
    /// Create a pipeline state from a description snapshot.
    pub fn new(description: PipelineStateDescription, native: NativeHandle) -> Self {
        Self {
            description,
            native,
        }
    }

    /// The description this state was compiled from.
    pub fn description(&self) -> &PipelineStateDescription {
        &self.description
    }

    /// The native backend handle.
    pub fn native(&self) -> NativeHandle {
        self.native
    }

    /// Debug label, if the description carried one.
    pub fn label(&self) -> Option<&str> {
        self.description.label.as_deref()
    }
}

/// A compiled native sampler state object.
#[derive(Debug)]
pub struct SamplerState {
    description: SamplerStateDescription,
    native: NativeHandle,
}

impl SamplerState {
    /// Create a sampler state from a description snapshot.
    pub fn new(description: SamplerStateDescription, native: NativeHandle) -> Self {
        Self {
            description,
            native,
        }
    }

    /// The description this state was compiled from.
    pub fn description(&self) -> &SamplerStateDescription {
        &self.description
    }

    /// The native backend handle.
    pub fn native(&self) -> NativeHandle {
        self.native
    }
}

/// Per-device cache of compiled pipeline states.
///
/// Entries are retained until [`clear`](Self::clear); there is deliberately
/// no per-entry release.
pub struct PipelineStateCache {
    states: ValueKeyedCache<PipelineStateDescription, PipelineState>,
}

impl PipelineStateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            states: ValueKeyedCache::new(),
        }
    }

    /// Resolve `description` to its interned pipeline state.
    ///
    /// On a miss, `factory` compiles the native object; the cache interns
    /// it keyed by a clone of the description, so the caller is free to keep
    /// mutating its own copy afterwards.
    ///
    /// # Errors
    ///
    /// Propagates factory failure; the cache is left unmodified.
    pub fn get_or_create<F>(
        &self,
        description: &PipelineStateDescription,
        factory: F,
    ) -> Result<Arc<PipelineState>, GraphicsError>
    where
        F: FnOnce(&PipelineStateDescription) -> Result<PipelineState, GraphicsError>,
    {
        self.states.get_or_create(description, |description| {
            log::trace!(
                "PipelineStateCache: compiling pipeline state {:?}",
                description.label
            );
            factory(description)
        })
    }

    /// Number of interned pipeline states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether a state is interned for `description`.
    pub fn contains(&self, description: &PipelineStateDescription) -> bool {
        self.states.contains(description)
    }

    /// Release every entry in one pass (device teardown or device loss).
    pub fn clear(&self) {
        let count = self.states.len();
        self.states.clear();
        log::debug!("PipelineStateCache: cleared {count} pipeline state(s)");
    }
}

impl Default for PipelineStateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-device cache of compiled sampler states, strictly reference counted.
pub struct SamplerStateCache {
    states: ValueKeyedCache<SamplerStateDescription, SamplerState>,
}

impl SamplerStateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            states: ValueKeyedCache::new(),
        }
    }

    /// Resolve `description` to its interned sampler state, incrementing
    /// the entry's reference count.
    ///
    /// # Errors
    ///
    /// Propagates factory failure; the cache is left unmodified.
    pub fn get_or_create<F>(
        &self,
        description: &SamplerStateDescription,
        factory: F,
    ) -> Result<Arc<SamplerState>, GraphicsError>
    where
        F: FnOnce(&SamplerStateDescription) -> Result<SamplerState, GraphicsError>,
    {
        self.states.get_or_create(description, |description| {
            log::trace!(
                "SamplerStateCache: creating sampler state {:?}",
                description.label
            );
            factory(description)
        })
    }

    /// Release one reference to the state for `description`; the entry is
    /// erased when the last reference is released. Returns whether the
    /// entry was erased.
    pub fn release(&self, description: &SamplerStateDescription) -> bool {
        let removed = self.states.release(description);
        if removed {
            log::trace!(
                "SamplerStateCache: released last reference to {:?}",
                description.label
            );
        }
        removed
    }

    /// Number of interned sampler states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Reference count of the entry for `description`, if interned.
    pub fn ref_count(&self, description: &SamplerStateDescription) -> Option<usize> {
        self.states.ref_count(description)
    }

    /// Release every entry in one pass (device teardown or device loss).
    pub fn clear(&self) {
        let count = self.states.len();
        self.states.clear();
        log::debug!("SamplerStateCache: cleared {count} sampler state(s)");
    }
}

impl Default for SamplerStateCache {
    fn default() -> Self {
        Self::new()
    }
}

// Caches are shared between the render thread and loader threads.
static_assertions::assert_impl_all!(PipelineStateCache: Send, Sync);
static_assertions::assert_impl_all!(SamplerStateCache: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlendState, InputElement, VertexFormat};

    fn pipeline_factory(
        handles: &HandleAllocator,
    ) -> impl Fn(&PipelineStateDescription) -> Result<PipelineState, GraphicsError> + '_ {
        move |description| Ok(PipelineState::new(description.clone(), handles.allocate()))
    }

    #[test]
    fn test_pipeline_interning() {
        let handles = HandleAllocator::new();
        let cache = PipelineStateCache::new();

        let description = PipelineStateDescription::new()
            .with_blend(BlendState::alpha())
            .with_input_elements(vec![InputElement::new(0, VertexFormat::Float32x3, 0)]);

        let first = cache
            .get_or_create(&description, pipeline_factory(&handles))
            .unwrap();
        let second = cache
            .get_or_create(&description.clone(), pipeline_factory(&handles))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_pipeline_key_is_snapshot_not_live_reference() {
        let handles = HandleAllocator::new();
        let cache = PipelineStateCache::new();

        let mut description = PipelineStateDescription::new();
        let opaque = cache
            .get_or_create(&description, pipeline_factory(&handles))
            .unwrap();

        // Mutate the caller's description; the interned entry must keep the
        // snapshot it was created from.
        description.blend = BlendState::additive();
        let additive = cache
            .get_or_create(&description, pipeline_factory(&handles))
            .unwrap();
        assert!(!Arc::ptr_eq(&opaque, &additive));
        assert_eq!(cache.len(), 2);

        description.blend = BlendState::opaque();
        let opaque_again = cache
            .get_or_create(&description, pipeline_factory(&handles))
            .unwrap();
        assert!(Arc::ptr_eq(&opaque, &opaque_again));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_pipeline_clear_is_bulk() {
        let handles = HandleAllocator::new();
        let cache = PipelineStateCache::new();

        cache
            .get_or_create(&PipelineStateDescription::new(), pipeline_factory(&handles))
            .unwrap();
        cache
            .get_or_create(
                &PipelineStateDescription::new().with_blend(BlendState::additive()),
                pipeline_factory(&handles),
            )
            .unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_pipeline_factory_error_propagates() {
        let cache = PipelineStateCache::new();
        let result = cache.get_or_create(&PipelineStateDescription::new(), |_| {
            Err(GraphicsError::ResourceCreationFailed(
                "shader stage mismatch".to_string(),
            ))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sampler_strict_ref_counting() {
        let handles = HandleAllocator::new();
        let cache = SamplerStateCache::new();
        let description = SamplerStateDescription::linear();
        let factory = |description: &SamplerStateDescription| {
            Ok(SamplerState::new(description.clone(), handles.allocate()))
        };

        let first = cache.get_or_create(&description, factory).unwrap();
        let second = cache.get_or_create(&description, factory).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.ref_count(&description), Some(2));

        // First release keeps the entry alive.
        assert!(!cache.release(&description));
        assert_eq!(cache.ref_count(&description), Some(1));

        // Last release erases it.
        assert!(cache.release(&description));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sampler_distinct_descriptions() {
        let handles = HandleAllocator::new();
        let cache = SamplerStateCache::new();
        let factory = |description: &SamplerStateDescription| {
            Ok(SamplerState::new(description.clone(), handles.allocate()))
        };

        let linear = cache
            .get_or_create(&SamplerStateDescription::linear(), factory)
            .unwrap();
        let nearest = cache
            .get_or_create(&SamplerStateDescription::nearest(), factory)
            .unwrap();
        assert!(!Arc::ptr_eq(&linear, &nearest));
        assert_ne!(linear.native(), nearest.native());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_handle_allocator_unique() {
        let handles = HandleAllocator::new();
        let a = handles.allocate();
        let b = handles.allocate();
        assert_ne!(a, b);
    }
}
