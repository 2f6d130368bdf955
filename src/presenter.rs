//! Presenter (swapchain) abstraction.
//!
//! The presenter owns the window-facing native objects that every
//! swapchain-derived view hangs off. Its lifecycle brackets the rest of
//! the resource set: on device loss it is destroyed *before* any other
//! resource, and on restore it is recreated *before* any other resource.
//! [`RecoveryCoordinator`] enforces that ordering.
//!
//! [`RecoveryCoordinator`]: crate::recovery::RecoveryCoordinator

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::GraphicsError;
use crate::resources::TextureFormat;

/// Swapchain abstraction consumed by the recovery coordinator.
pub trait Presenter: Send + Sync {
    /// Tear down the swapchain and every native object derived from it.
    /// The device may already be lost; this must not fail.
    fn destroy(&self);

    /// Rebuild the swapchain against the restored device.
    ///
    /// # Errors
    ///
    /// Failure aborts recovery before any resource is touched.
    fn recreate(&self) -> Result<(), GraphicsError>;
}

/// Configuration of a [`SurfacePresenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenterConfig {
    /// Backbuffer width in pixels.
    pub width: u32,
    /// Backbuffer height in pixels.
    pub height: u32,
    /// Backbuffer format.
    pub format: TextureFormat,
}

impl PresenterConfig {
    /// Create a configuration with the default backbuffer format.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Bgra8Unorm,
        }
    }
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Default presenter tracking backbuffer configuration and a generation
/// counter.
///
/// The generation is bumped on every recreation so code holding
/// swapchain-derived state can detect that its derivation is stale.
pub struct SurfacePresenter {
    config: RwLock<PresenterConfig>,
    alive: AtomicBool,
    generation: AtomicU64,
}

impl SurfacePresenter {
    /// Create a presenter with the given configuration.
    pub fn new(config: PresenterConfig) -> Self {
        Self {
            config: RwLock::new(config),
            alive: AtomicBool::new(true),
            generation: AtomicU64::new(1),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> PresenterConfig {
        self.config.read().clone()
    }

    /// Update the backbuffer size; takes effect on the next recreation.
    pub fn resize(&self, width: u32, height: u32) {
        let mut config = self.config.write();
        config.width = width;
        config.height = height;
    }

    /// Whether the swapchain currently exists.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Generation counter, bumped on every recreation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SurfacePresenter {
    fn default() -> Self {
        Self::new(PresenterConfig::default())
    }
}

impl Presenter for SurfacePresenter {
    fn destroy(&self) {
        self.alive.store(false, Ordering::Release);
        log::debug!("SurfacePresenter: destroyed");
    }

    fn recreate(&self) -> Result<(), GraphicsError> {
        self.alive.store(true, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let config = self.config.read();
        log::debug!(
            "SurfacePresenter: recreated {}x{} (generation {})",
            config.width,
            config.height,
            generation
        );
        Ok(())
    }
}

impl std::fmt::Debug for SurfacePresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfacePresenter")
            .field("config", &self.config())
            .field("alive", &self.is_alive())
            .field("generation", &self.generation())
            .finish()
    }
}

static_assertions::assert_impl_all!(SurfacePresenter: Send, Sync);
