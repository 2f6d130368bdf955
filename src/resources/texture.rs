//! GPU texture and texture view resources.

use std::sync::{Arc, OnceLock, Weak};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::resources::{DeviceResource, Registration};
use crate::state_cache::{HandleAllocator, NativeHandle};

/// Pixel format of a texture.
///
/// Only the formats the cache keys and recovery paths need; this crate is
/// not a format catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Depth32Float,
}

bitflags! {
    /// Allowed usages of a texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const TEXTURE_BINDING = 1 << 0;
        const RENDER_ATTACHMENT = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A GPU texture.
///
/// Textures are dependency roots: recreation after device loss needs no
/// other resource, so `on_recreate` always succeeds in the first
/// fixed-point iteration.
pub struct Texture {
    descriptor: TextureDescriptor,
    native: Mutex<Option<NativeHandle>>,
    handles: Arc<HandleAllocator>,
    registration: OnceLock<Registration>,
}

impl Texture {
    /// Create a new texture (called by `GraphicsDevice`).
    pub(crate) fn new(descriptor: TextureDescriptor, handles: Arc<HandleAllocator>) -> Self {
        let native = handles.allocate();
        Self {
            descriptor,
            native: Mutex::new(Some(native)),
            handles,
            registration: OnceLock::new(),
        }
    }

    pub(crate) fn attach_registration(&self, registration: Registration) {
        let _ = self.registration.set(registration);
    }

    /// Identity of this texture in its device's registry.
    pub fn resource_id(&self) -> Option<crate::resources::ResourceId> {
        self.registration.get().map(Registration::id)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// The texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Whether a native allocation currently backs the texture.
    pub fn is_live(&self) -> bool {
        self.native.lock().is_some()
    }

    /// Current native handle, if live.
    pub fn native(&self) -> Option<NativeHandle> {
        *self.native.lock()
    }
}

impl DeviceResource for Texture {
    fn label(&self) -> &str {
        self.descriptor.label.as_deref().unwrap_or("texture")
    }

    fn on_destroyed(&self) {
        *self.native.lock() = None;
    }

    fn on_recreate(&self) -> bool {
        *self.native.lock() = Some(self.handles.allocate());
        true
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.descriptor.label)
            .field("size", &(self.descriptor.width, self.descriptor.height))
            .field("live", &self.is_live())
            .finish()
    }
}

/// A view over a [`Texture`].
///
/// Views are dependency-driven: a view's native object derives from its
/// parent texture's, so `on_recreate` fails until the parent has been
/// recreated. This is the case the recovery coordinator's fixed-point loop
/// exists for.
pub struct TextureView {
    label: String,
    texture: Weak<Texture>,
    native: Mutex<Option<NativeHandle>>,
    handles: Arc<HandleAllocator>,
    registration: OnceLock<Registration>,
}

impl TextureView {
    /// Create a new view (called by `GraphicsDevice`).
    pub(crate) fn new(texture: &Arc<Texture>, handles: Arc<HandleAllocator>) -> Self {
        let native = handles.allocate();
        Self {
            label: format!("{}_view", texture.label()),
            texture: Arc::downgrade(texture),
            native: Mutex::new(Some(native)),
            handles,
            registration: OnceLock::new(),
        }
    }

    pub(crate) fn attach_registration(&self, registration: Registration) {
        let _ = self.registration.set(registration);
    }

    /// Identity of this view in its device's registry.
    pub fn resource_id(&self) -> Option<crate::resources::ResourceId> {
        self.registration.get().map(Registration::id)
    }

    /// The parent texture, if it still exists.
    pub fn texture(&self) -> Option<Arc<Texture>> {
        self.texture.upgrade()
    }

    /// Whether a native view currently exists.
    pub fn is_live(&self) -> bool {
        self.native.lock().is_some()
    }
}

impl DeviceResource for TextureView {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_destroyed(&self) {
        *self.native.lock() = None;
    }

    fn on_recreate(&self) -> bool {
        // The view can only be rebuilt over a live parent texture.
        let Some(texture) = self.texture.upgrade() else {
            return false;
        };
        if !texture.is_live() {
            return false;
        }
        *self.native.lock() = Some(self.handles.allocate());
        true
    }
}

impl std::fmt::Debug for TextureView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureView")
            .field("label", &self.label)
            .field("live", &self.is_live())
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
static_assertions::assert_impl_all!(TextureView: Send, Sync);
