//! Per-call-site pipeline state resolution.
//!
//! A render call site typically varies one or two fields of an otherwise
//! constant pipeline description across frames (blend mode, topology).
//! [`MutablePipelineStateResolver`] keeps that mutable description and
//! resolves it through the device's shared [`PipelineStateCache`] on
//! demand, so the same handful of pipeline states is interned once and
//! looked up thereafter.
//!
//! [`PipelineStateCache`]: crate::state_cache::PipelineStateCache

use std::sync::Arc;

use crate::error::GraphicsError;
use crate::state_cache::{PipelineState, PipelineStateCache};
use crate::types::PipelineStateDescription;

/// Factory compiling a native pipeline state from a description snapshot.
pub type PipelineStateFactory =
    Arc<dyn Fn(&PipelineStateDescription) -> Result<PipelineState, GraphicsError> + Send + Sync>;

/// A mutable pipeline description bound to a shared pipeline cache.
///
/// Obtain one from [`GraphicsDevice::pipeline_resolver`], mutate
/// [`state_mut`](Self::state_mut) between draws, and call
/// [`resolve`](Self::resolve) to materialize the current state. The cache
/// snapshots the description on every miss, so mutating the resolver's
/// state after resolution can never corrupt an interned entry. The
/// resolver holds no reference-counted claim of its own; the cache backs
/// every interned pipeline state for the lifetime of the device.
///
/// [`GraphicsDevice::pipeline_resolver`]: crate::device::GraphicsDevice::pipeline_resolver
pub struct MutablePipelineStateResolver {
    state: PipelineStateDescription,
    cache: Arc<PipelineStateCache>,
    factory: PipelineStateFactory,
}

impl MutablePipelineStateResolver {
    /// Create a resolver over a shared cache.
    pub fn new(
        state: PipelineStateDescription,
        cache: Arc<PipelineStateCache>,
        factory: PipelineStateFactory,
    ) -> Self {
        Self {
            state,
            cache,
            factory,
        }
    }

    /// The current description.
    pub fn state(&self) -> &PipelineStateDescription {
        &self.state
    }

    /// Mutable access to the description.
    pub fn state_mut(&mut self) -> &mut PipelineStateDescription {
        &mut self.state
    }

    /// Materialize the description as it currently stands.
    ///
    /// # Errors
    ///
    /// Propagates native compilation failure on a cache miss.
    pub fn resolve(&self) -> Result<Arc<PipelineState>, GraphicsError> {
        self.cache
            .get_or_create(&self.state, |state| (self.factory)(state))
    }
}

impl std::fmt::Debug for MutablePipelineStateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutablePipelineStateResolver")
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_cache::HandleAllocator;
    use crate::types::BlendState;

    fn resolver() -> MutablePipelineStateResolver {
        let handles = Arc::new(HandleAllocator::new());
        let factory: PipelineStateFactory = Arc::new(move |description| {
            Ok(PipelineState::new(description.clone(), handles.allocate()))
        });
        MutablePipelineStateResolver::new(
            PipelineStateDescription::new(),
            Arc::new(PipelineStateCache::new()),
            factory,
        )
    }

    #[test]
    fn test_resolve_is_keyed_by_value_snapshot() {
        let mut resolver = resolver();

        let opaque = resolver.resolve().unwrap();

        resolver.state_mut().blend = BlendState::additive();
        let additive = resolver.resolve().unwrap();
        assert!(!Arc::ptr_eq(&opaque, &additive));

        // Back to the original value: the first instance comes back.
        resolver.state_mut().blend = BlendState::opaque();
        let opaque_again = resolver.resolve().unwrap();
        assert!(Arc::ptr_eq(&opaque, &opaque_again));
    }

    #[test]
    fn test_repeated_resolve_same_instance() {
        let resolver = resolver();
        let first = resolver.resolve().unwrap();
        let second = resolver.resolve().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_interned_snapshot_unaffected_by_later_mutation() {
        let mut resolver = resolver();
        let opaque = resolver.resolve().unwrap();

        resolver.state_mut().blend = BlendState::additive();

        // The cached instance keeps the snapshot it was created from.
        assert!(!opaque.description().blend.enabled);
    }
}
