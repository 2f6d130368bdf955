//! Graphics device.
//!
//! The [`GraphicsDevice`] is the ownership root of this crate: it owns the
//! pipeline and sampler state caches, the live-resource registry, the
//! presenter, and the recovery coordinator that ties them together. There
//! is no global state; "one cache per device" falls out of the ownership
//! structure.

use std::sync::Arc;

use crate::error::GraphicsError;
use crate::presenter::{Presenter, PresenterConfig, SurfacePresenter};
use crate::recovery::RecoveryCoordinator;
use crate::resolver::{MutablePipelineStateResolver, PipelineStateFactory};
use crate::resources::{
    Buffer, BufferDescriptor, DeviceResource, Registration, ResourceRegistry, Texture,
    TextureDescriptor, TextureView,
};
use crate::state_cache::{
    HandleAllocator, PipelineState, PipelineStateCache, SamplerState, SamplerStateCache,
};
use crate::types::{PipelineStateDescription, SamplerStateDescription};

/// A graphics device: resource factory, state caches, and recovery.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. Resource creation may happen from
/// any thread (e.g. background content streaming); the pause/resume and
/// lost/restore entry points are a single-threaded orchestration point
/// and are expected to be driven from the render thread with no
/// concurrent registration in flight.
///
/// # Example
///
/// ```
/// use vitreous_graphics::{BufferDescriptor, BufferUsage, GraphicsDevice};
///
/// let device = GraphicsDevice::new("main");
/// let vertices = device
///     .create_buffer_with_data(
///         &BufferDescriptor::new(12, BufferUsage::VERTEX),
///         vec![0u8; 12],
///     )
///     .unwrap();
/// assert!(vertices.is_live());
/// ```
pub struct GraphicsDevice {
    name: String,
    handles: Arc<HandleAllocator>,
    pipeline_cache: Arc<PipelineStateCache>,
    sampler_cache: Arc<SamplerStateCache>,
    registry: Arc<ResourceRegistry>,
    presenter: Arc<dyn Presenter>,
    coordinator: RecoveryCoordinator,
}

impl GraphicsDevice {
    /// Create a device with a default [`SurfacePresenter`].
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_presenter(
            name,
            Arc::new(SurfacePresenter::new(PresenterConfig::default())),
        )
    }

    /// Create a device with a caller-supplied presenter.
    pub fn with_presenter(name: impl Into<String>, presenter: Arc<dyn Presenter>) -> Arc<Self> {
        let name = name.into();
        let pipeline_cache = Arc::new(PipelineStateCache::new());
        let sampler_cache = Arc::new(SamplerStateCache::new());
        let registry = Arc::new(ResourceRegistry::new());
        let coordinator = RecoveryCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&presenter),
            Arc::clone(&pipeline_cache),
            Arc::clone(&sampler_cache),
        );

        log::info!("GraphicsDevice: created device '{name}'");
        Arc::new(Self {
            name,
            handles: Arc::new(HandleAllocator::new()),
            pipeline_cache,
            sampler_cache,
            registry,
            presenter,
            coordinator,
        })
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The device's presenter.
    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }

    /// The device's live-resource registry.
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// The device's pipeline state cache.
    pub fn pipeline_cache(&self) -> &Arc<PipelineStateCache> {
        &self.pipeline_cache
    }

    /// The device's sampler state cache.
    pub fn sampler_cache(&self) -> &Arc<SamplerStateCache> {
        &self.sampler_cache
    }

    // ------------------------------------------------------------------
    // Resource creation
    // ------------------------------------------------------------------

    /// Create a GPU buffer with undefined contents.
    ///
    /// The buffer is registered for recovery; after device loss it is
    /// recreated with undefined contents.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for a zero-size buffer.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        self.create_buffer_inner(descriptor, None)
    }

    /// Create a GPU buffer initialized with `data`.
    ///
    /// The CPU-side copy is retained, which makes the buffer pausable and
    /// gives it a reload callback: after device loss its contents are
    /// re-uploaded from the retained bytes before the recreation fixed
    /// point runs.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for a zero-size buffer
    /// or if `data` does not match the descriptor size.
    pub fn create_buffer_with_data(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
        data: Vec<u8>,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if data.len() as u64 != descriptor.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "initial data length {} does not match buffer size {}",
                data.len(),
                descriptor.size
            )));
        }
        self.create_buffer_inner(descriptor, Some(data))
    }

    fn create_buffer_inner(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
        contents: Option<Vec<u8>>,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let reloadable = contents.is_some();
        let buffer = Arc::new(Buffer::new(
            descriptor.clone(),
            contents.clone(),
            Arc::clone(&self.handles),
        ));

        let reload = contents.map(|bytes| {
            let target = Arc::downgrade(&buffer);
            let reload: crate::resources::ReloadFn = Arc::new(move || {
                if let Some(buffer) = target.upgrade() {
                    buffer.reupload(bytes.clone());
                }
            });
            reload
        });

        let dynamic: Arc<dyn DeviceResource> = Arc::clone(&buffer) as Arc<dyn DeviceResource>;
        let id = self.registry.register(&dynamic, reload);
        buffer.attach_registration(Registration::new(id, Arc::downgrade(&self.registry)));

        log::trace!(
            "GraphicsDevice: created buffer {:?}, size={}, reloadable={}",
            descriptor.label,
            descriptor.size,
            reloadable
        );
        Ok(buffer)
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for zero dimensions.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }

        let texture = Arc::new(Texture::new(descriptor.clone(), Arc::clone(&self.handles)));
        let dynamic: Arc<dyn DeviceResource> = Arc::clone(&texture) as Arc<dyn DeviceResource>;
        let id = self.registry.register(&dynamic, None);
        texture.attach_registration(Registration::new(id, Arc::downgrade(&self.registry)));

        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}",
            descriptor.label,
            descriptor.width,
            descriptor.height
        );
        Ok(texture)
    }

    /// Create a view over `texture`.
    ///
    /// The view's recreation depends on its parent being live; after
    /// device loss it comes back in a later fixed-point iteration than the
    /// texture itself.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the texture has no
    /// native backing.
    pub fn create_texture_view(
        self: &Arc<Self>,
        texture: &Arc<Texture>,
    ) -> Result<Arc<TextureView>, GraphicsError> {
        if !texture.is_live() {
            return Err(GraphicsError::InvalidParameter(format!(
                "cannot create a view over destroyed texture '{}'",
                texture.label()
            )));
        }

        let view = Arc::new(TextureView::new(texture, Arc::clone(&self.handles)));
        let dynamic: Arc<dyn DeviceResource> = Arc::clone(&view) as Arc<dyn DeviceResource>;
        let id = self.registry.register(&dynamic, None);
        view.attach_registration(Registration::new(id, Arc::downgrade(&self.registry)));

        log::trace!("GraphicsDevice: created view {}", view.label());
        Ok(view)
    }

    // ------------------------------------------------------------------
    // State resolution
    // ------------------------------------------------------------------

    /// Resolve a pipeline description through the device's cache.
    ///
    /// # Errors
    ///
    /// Propagates native compilation failure on a cache miss.
    pub fn pipeline_state(
        self: &Arc<Self>,
        description: &PipelineStateDescription,
    ) -> Result<Arc<PipelineState>, GraphicsError> {
        let handles = Arc::clone(&self.handles);
        self.pipeline_cache.get_or_create(description, |description| {
            Ok(PipelineState::new(description.clone(), handles.allocate()))
        })
    }

    /// Resolve a sampler description through the device's cache,
    /// incrementing its reference count.
    ///
    /// Pair with [`release_sampler_state`](Self::release_sampler_state).
    ///
    /// # Errors
    ///
    /// Propagates native creation failure on a cache miss.
    pub fn sampler_state(
        self: &Arc<Self>,
        description: &SamplerStateDescription,
    ) -> Result<Arc<SamplerState>, GraphicsError> {
        let handles = Arc::clone(&self.handles);
        self.sampler_cache.get_or_create(description, |description| {
            Ok(SamplerState::new(description.clone(), handles.allocate()))
        })
    }

    /// Release one reference to a sampler state; the entry is erased when
    /// the last reference goes. Returns whether the entry was erased.
    pub fn release_sampler_state(&self, description: &SamplerStateDescription) -> bool {
        self.sampler_cache.release(description)
    }

    /// Create a per-call-site resolver bound to this device's pipeline
    /// cache, seeded with `initial`.
    pub fn pipeline_resolver(
        self: &Arc<Self>,
        initial: PipelineStateDescription,
    ) -> MutablePipelineStateResolver {
        let handles = Arc::clone(&self.handles);
        let factory: PipelineStateFactory = Arc::new(move |description| {
            Ok(PipelineState::new(description.clone(), handles.allocate()))
        });
        MutablePipelineStateResolver::new(initial, Arc::clone(&self.pipeline_cache), factory)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Ask every resource to voluntarily reduce its footprint
    /// (application backgrounded).
    pub fn pause(&self) {
        self.coordinator.pause();
    }

    /// Restore paused resources (application foregrounded).
    pub fn resume(&self) {
        self.coordinator.resume();
    }

    /// Handle loss of the native device: presenter first, then every
    /// resource, then the state caches.
    pub fn notify_device_lost(&self) {
        self.coordinator.on_device_lost();
    }

    /// Rebuild the full resource set against a restored native device.
    ///
    /// # Errors
    ///
    /// See [`RecoveryCoordinator::on_device_restored`].
    pub fn restore_device(&self) -> Result<(), GraphicsError> {
        self.coordinator.on_device_restored()
    }

    /// Number of resources currently tracked by the registry.
    pub fn resource_count(&self) -> usize {
        self.registry.snapshot().len()
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        // Bulk release of interned state, one pass per cache.
        self.pipeline_cache.clear();
        self.sampler_cache.clear();
        log::info!("GraphicsDevice: destroyed device '{}'", self.name);
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("resources", &self.resource_count())
            .field("pipeline_states", &self.pipeline_cache.len())
            .field("sampler_states", &self.sampler_cache.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
