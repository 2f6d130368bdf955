//! GPU buffer resource.

use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::resources::{DeviceResource, Registration};
use crate::state_cache::{HandleAllocator, NativeHandle};

bitflags! {
    /// Allowed usages of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A GPU memory buffer.
///
/// Created by [`GraphicsDevice::create_buffer`] and reference-counted.
/// A buffer created with initial contents keeps a CPU-side copy, which
/// makes it pausable (the native allocation can be dropped and re-uploaded
/// on resume) and reloadable after device loss. A buffer without contents
/// is recreated with undefined contents.
///
/// [`GraphicsDevice::create_buffer`]: crate::device::GraphicsDevice::create_buffer
pub struct Buffer {
    descriptor: BufferDescriptor,
    contents: Mutex<Option<Vec<u8>>>,
    native: Mutex<Option<NativeHandle>>,
    handles: Arc<HandleAllocator>,
    registration: OnceLock<Registration>,
}

impl Buffer {
    /// Create a new buffer (called by `GraphicsDevice`).
    pub(crate) fn new(
        descriptor: BufferDescriptor,
        contents: Option<Vec<u8>>,
        handles: Arc<HandleAllocator>,
    ) -> Self {
        let native = handles.allocate();
        Self {
            descriptor,
            contents: Mutex::new(contents),
            native: Mutex::new(Some(native)),
            handles,
            registration: OnceLock::new(),
        }
    }

    pub(crate) fn attach_registration(&self, registration: Registration) {
        // Set exactly once, right after construction.
        let _ = self.registration.set(registration);
    }

    /// Identity of this buffer in its device's registry.
    pub fn resource_id(&self) -> Option<crate::resources::ResourceId> {
        self.registration.get().map(Registration::id)
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Allowed usages.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// The buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Whether a native allocation currently backs the buffer.
    pub fn is_live(&self) -> bool {
        self.native.lock().is_some()
    }

    /// Current native handle, if live.
    pub fn native(&self) -> Option<NativeHandle> {
        *self.native.lock()
    }

    /// Replace the CPU-side contents and re-upload into a fresh native
    /// allocation. Used by the reload path after device loss.
    pub fn reupload(&self, bytes: Vec<u8>) {
        *self.contents.lock() = Some(bytes);
        *self.native.lock() = Some(self.handles.allocate());
        log::trace!("Buffer: re-uploaded {}", self.label());
    }
}

impl DeviceResource for Buffer {
    fn label(&self) -> &str {
        self.descriptor.label.as_deref().unwrap_or("buffer")
    }

    fn on_pause(&self) -> bool {
        // Only buffers with a retained CPU copy can drop their native
        // allocation; anything else has nowhere to restore from.
        if self.contents.lock().is_none() {
            return false;
        }
        *self.native.lock() = None;
        log::trace!("Buffer: paused {}", self.label());
        true
    }

    fn on_resume(&self) {
        let mut native = self.native.lock();
        if native.is_none() {
            *native = Some(self.handles.allocate());
            log::trace!("Buffer: resumed {}", self.label());
        }
    }

    fn on_destroyed(&self) {
        *self.native.lock() = None;
    }

    fn on_recreate(&self) -> bool {
        // No cross-resource dependencies: reallocate immediately. Contents
        // are re-uploaded if retained, undefined otherwise.
        *self.native.lock() = Some(self.handles.allocate());
        true
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .field("live", &self.is_live())
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
