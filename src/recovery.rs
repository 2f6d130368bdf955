//! Device pause/resume and loss/restore orchestration.
//!
//! [`RecoveryCoordinator`] drives every registered resource through its
//! lifetime state machine when the underlying native device is paused,
//! lost, or restored:
//!
//! ```text
//! Active --(pause)--> Paused --(resume)--> Active
//! Active|Paused --(device loss)--> Destroyed --(reload|recreate)--> Active
//! ```
//!
//! Recreation after device loss runs in three phases, in order:
//!
//! 1. the presenter is recreated (swapchain-derived views depend on it);
//! 2. resources carrying a reload callback are reloaded; they depend only
//!    on externally held data, never on other resources;
//! 3. the remaining destroyed resources are recreated in a fixed-point
//!    loop: repeatedly scan and call `on_recreate`, until either nothing
//!    is destroyed or a full pass makes no progress.
//!
//! The fixed point handles inter-resource dependencies (a view needs its
//! parent texture live) without an explicit dependency graph. Convergence
//! requires the dependency graph to be acyclic; a stalled pass is a fatal
//! [`GraphicsError::RecoveryFailed`] naming every stuck resource. This is
//! a known limitation carried over from the repeat-until-no-progress
//! approach, not a bug to be fixed with a topological sort.
//!
//! The coordinator is a single-threaded orchestration point (typically the
//! render thread). It assumes no resources are being registered or
//! unregistered during a pass; the registry lock only guards membership
//! and is never held across resource callbacks.

use std::sync::Arc;

use crate::error::{GraphicsError, RecoveryFailure};
use crate::presenter::Presenter;
use crate::resources::{DeviceResource, LifetimeState, ResourceRegistry};
use crate::state_cache::{PipelineStateCache, SamplerStateCache};

/// Orchestrates pause, resume, and device loss/restore transitions across
/// a device's resource registry.
pub struct RecoveryCoordinator {
    registry: Arc<ResourceRegistry>,
    presenter: Arc<dyn Presenter>,
    pipeline_cache: Arc<PipelineStateCache>,
    sampler_cache: Arc<SamplerStateCache>,
}

impl RecoveryCoordinator {
    /// Create a coordinator over a device's registry, presenter, and caches.
    pub fn new(
        registry: Arc<ResourceRegistry>,
        presenter: Arc<dyn Presenter>,
        pipeline_cache: Arc<PipelineStateCache>,
        sampler_cache: Arc<SamplerStateCache>,
    ) -> Self {
        Self {
            registry,
            presenter,
            pipeline_cache,
            sampler_cache,
        }
    }

    /// Ask every active resource to voluntarily reduce its footprint.
    ///
    /// Resources whose `on_pause` returns `true` are marked paused; the
    /// rest stay active. Declining to pause is non-fatal (e.g. immutable
    /// resources with no reducible footprint).
    pub fn pause(&self) {
        let mut paused = 0usize;
        let snapshot = self.registry.snapshot();
        for (id, resource) in &snapshot {
            if self.registry.state(*id) != Some(LifetimeState::Active) {
                continue;
            }
            if resource.on_pause() {
                self.registry.set_state(*id, LifetimeState::Paused);
                paused += 1;
            }
        }
        log::info!(
            "RecoveryCoordinator: paused {paused} of {} resource(s)",
            snapshot.len()
        );
    }

    /// Restore every paused resource back to active.
    ///
    /// Paused resources are independently resumable; no ordering or
    /// fixed-point logic is involved.
    pub fn resume(&self) {
        let mut resumed = 0usize;
        for (id, resource) in self.registry.snapshot() {
            if self.registry.state(id) != Some(LifetimeState::Paused) {
                continue;
            }
            resource.on_resume();
            self.registry.set_state(id, LifetimeState::Active);
            resumed += 1;
        }
        log::info!("RecoveryCoordinator: resumed {resumed} resource(s)");
    }

    /// Handle loss of the native device.
    ///
    /// Destroys the presenter first so swapchain-derived views are torn
    /// down before their dependents, then unconditionally destroys every
    /// resource regardless of prior state, then clears the state caches,
    /// whose entries are keyed to now-invalid native handles.
    pub fn on_device_lost(&self) {
        log::warn!("RecoveryCoordinator: device lost");

        self.presenter.destroy();

        let snapshot = self.registry.snapshot();
        for (id, resource) in &snapshot {
            resource.on_destroyed();
            self.registry.set_state(*id, LifetimeState::Destroyed);
        }
        log::info!(
            "RecoveryCoordinator: destroyed {} resource(s)",
            snapshot.len()
        );

        self.pipeline_cache.clear();
        self.sampler_cache.clear();
    }

    /// Rebuild the resource set against a restored device.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::PresenterRecreationFailed`] (or whatever the
    ///   presenter returns) if the swapchain cannot be rebuilt; no
    ///   resource is touched in that case.
    /// - [`GraphicsError::RecoveryFailed`] if the recreation fixed point
    ///   stalls, carrying the label of every resource still destroyed.
    ///   The device is left partially recovered; retrying is the caller's
    ///   decision.
    pub fn on_device_restored(&self) -> Result<(), GraphicsError> {
        log::info!("RecoveryCoordinator: restoring device");

        self.presenter.recreate()?;

        let snapshot = self.registry.snapshot();

        // Phase 1: reload-capable resources. These rebuild from external
        // data and must come back before anything that might depend on them.
        let mut reloaded = 0usize;
        for (id, resource) in &snapshot {
            if self.registry.state(*id) != Some(LifetimeState::Destroyed) {
                continue;
            }
            let Some(reload) = self.registry.reload_fn(*id) else {
                continue;
            };
            reload();
            self.registry.set_state(*id, LifetimeState::Active);
            log::trace!("RecoveryCoordinator: reloaded {}", resource.label());
            reloaded += 1;
        }

        // Phase 2: fixed-point recreation of everything else. A resource
        // whose dependencies are not yet active reports failure and is
        // retried on the next pass.
        let mut iterations = 0usize;
        loop {
            let mut progressed = false;
            let mut remaining = 0usize;
            for (id, resource) in &snapshot {
                if self.registry.state(*id) != Some(LifetimeState::Destroyed) {
                    continue;
                }
                if resource.on_recreate() {
                    self.registry.set_state(*id, LifetimeState::Active);
                    progressed = true;
                } else {
                    remaining += 1;
                }
            }
            iterations += 1;

            if remaining == 0 {
                break;
            }
            if !progressed {
                let resources: Vec<String> = snapshot
                    .iter()
                    .filter(|(id, _)| {
                        self.registry.state(*id) == Some(LifetimeState::Destroyed)
                    })
                    .map(|(_, resource)| resource.label().to_string())
                    .collect();
                log::error!(
                    "RecoveryCoordinator: recreation stalled with {} resource(s) destroyed: {}",
                    resources.len(),
                    resources.join(", ")
                );
                return Err(GraphicsError::RecoveryFailed(RecoveryFailure { resources }));
            }
        }

        log::info!(
            "RecoveryCoordinator: restored {} resource(s) ({reloaded} reloaded, {iterations} recreation pass(es))",
            snapshot.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for RecoveryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryCoordinator")
            .field("registry", &self.registry)
            .finish()
    }
}

static_assertions::assert_impl_all!(RecoveryCoordinator: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::DeviceResource;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records the order of destroy/recreate calls across the presenter
    /// and resources.
    #[derive(Default)]
    struct CallLog {
        calls: Mutex<Vec<String>>,
    }

    impl CallLog {
        fn push(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    struct LoggingPresenter {
        log: Arc<CallLog>,
    }

    impl Presenter for LoggingPresenter {
        fn destroy(&self) {
            self.log.push("presenter.destroy");
        }

        fn recreate(&self) -> Result<(), GraphicsError> {
            self.log.push("presenter.recreate");
            Ok(())
        }
    }

    struct TestResource {
        label: String,
        log: Arc<CallLog>,
        pausable: bool,
        /// Gate for `on_recreate`; `None` means always succeed.
        depends_on: Option<Arc<AtomicBool>>,
        /// Set once this resource has been recreated.
        recreated: Arc<AtomicBool>,
        resume_calls: AtomicUsize,
    }

    impl TestResource {
        fn base(label: &str, log: &Arc<CallLog>) -> Self {
            Self {
                label: label.to_string(),
                log: Arc::clone(log),
                pausable: false,
                depends_on: None,
                recreated: Arc::new(AtomicBool::new(false)),
                resume_calls: AtomicUsize::new(0),
            }
        }

        fn new(label: &str, log: &Arc<CallLog>) -> Arc<Self> {
            Arc::new(Self::base(label, log))
        }

        fn pausable(label: &str, log: &Arc<CallLog>) -> Arc<Self> {
            Arc::new(Self {
                pausable: true,
                ..Self::base(label, log)
            })
        }

        fn dependent(label: &str, log: &Arc<CallLog>, gate: Arc<AtomicBool>) -> Arc<Self> {
            Arc::new(Self {
                depends_on: Some(gate),
                ..Self::base(label, log)
            })
        }
    }

    impl DeviceResource for TestResource {
        fn label(&self) -> &str {
            &self.label
        }

        fn on_pause(&self) -> bool {
            self.log.push(format!("{}.pause", self.label));
            self.pausable
        }

        fn on_resume(&self) {
            self.resume_calls.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("{}.resume", self.label));
        }

        fn on_destroyed(&self) {
            self.recreated.store(false, Ordering::SeqCst);
            self.log.push(format!("{}.destroyed", self.label));
        }

        fn on_recreate(&self) -> bool {
            if let Some(gate) = &self.depends_on {
                if !gate.load(Ordering::SeqCst) {
                    return false;
                }
            }
            self.recreated.store(true, Ordering::SeqCst);
            self.log.push(format!("{}.recreate", self.label));
            true
        }
    }

    struct Harness {
        registry: Arc<ResourceRegistry>,
        coordinator: RecoveryCoordinator,
        log: Arc<CallLog>,
    }

    fn harness() -> Harness {
        let log = Arc::new(CallLog::default());
        let registry = Arc::new(ResourceRegistry::new());
        let coordinator = RecoveryCoordinator::new(
            Arc::clone(&registry),
            Arc::new(LoggingPresenter {
                log: Arc::clone(&log),
            }),
            Arc::new(PipelineStateCache::new()),
            Arc::new(SamplerStateCache::new()),
        );
        Harness {
            registry,
            coordinator,
            log,
        }
    }

    fn register(harness: &Harness, resource: &Arc<TestResource>) -> crate::resources::ResourceId {
        let dynamic: Arc<dyn DeviceResource> = Arc::clone(resource) as Arc<dyn DeviceResource>;
        harness.registry.register(&dynamic, None)
    }

    #[test]
    fn test_pause_marks_only_pausable_resources() {
        let h = harness();
        let a = TestResource::pausable("a", &h.log);
        let b = TestResource::pausable("b", &h.log);
        let c = TestResource::new("c", &h.log);
        let ids = [register(&h, &a), register(&h, &b), register(&h, &c)];

        h.coordinator.pause();

        assert_eq!(h.registry.state(ids[0]), Some(LifetimeState::Paused));
        assert_eq!(h.registry.state(ids[1]), Some(LifetimeState::Paused));
        assert_eq!(h.registry.state(ids[2]), Some(LifetimeState::Active));
    }

    #[test]
    fn test_resume_calls_only_paused_resources() {
        let h = harness();
        let a = TestResource::pausable("a", &h.log);
        let b = TestResource::pausable("b", &h.log);
        let c = TestResource::new("c", &h.log);
        let ids = [register(&h, &a), register(&h, &b), register(&h, &c)];

        h.coordinator.pause();
        h.coordinator.resume();

        for id in ids {
            assert_eq!(h.registry.state(id), Some(LifetimeState::Active));
        }
        assert_eq!(a.resume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.resume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.resume_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_device_lost_destroys_presenter_first() {
        let h = harness();
        let a = TestResource::new("a", &h.log);
        let id = register(&h, &a);

        h.coordinator.on_device_lost();

        let calls = h.log.calls();
        assert_eq!(calls[0], "presenter.destroy");
        assert!(calls.contains(&"a.destroyed".to_string()));
        assert_eq!(h.registry.state(id), Some(LifetimeState::Destroyed));
    }

    #[test]
    fn test_device_lost_destroys_paused_resources_too() {
        let h = harness();
        let a = TestResource::pausable("a", &h.log);
        let id = register(&h, &a);

        h.coordinator.pause();
        assert_eq!(h.registry.state(id), Some(LifetimeState::Paused));

        h.coordinator.on_device_lost();
        assert_eq!(h.registry.state(id), Some(LifetimeState::Destroyed));
    }

    #[test]
    fn test_restore_recreates_presenter_before_resources() {
        let h = harness();
        let a = TestResource::new("a", &h.log);
        register(&h, &a);

        h.coordinator.on_device_lost();
        h.coordinator.on_device_restored().unwrap();

        let calls = h.log.calls();
        let presenter_index = calls
            .iter()
            .position(|c| c == "presenter.recreate")
            .unwrap();
        let resource_index = calls.iter().position(|c| c == "a.recreate").unwrap();
        assert!(presenter_index < resource_index);
    }

    #[test]
    fn test_restore_converges_on_dependency_chain() {
        let h = harness();
        let a = TestResource::new("a", &h.log);
        // b can only recreate after a has; c only after b has.
        let b = TestResource::dependent("b", &h.log, Arc::clone(&a.recreated));
        let c = TestResource::dependent("c", &h.log, Arc::clone(&b.recreated));
        let ids = [register(&h, &c), register(&h, &b), register(&h, &a)];

        h.coordinator.on_device_lost();
        h.coordinator.on_device_restored().unwrap();

        for id in ids {
            assert_eq!(h.registry.state(id), Some(LifetimeState::Active));
        }
        let calls = h.log.calls();
        let index_of = |call: &str| calls.iter().position(|c| c == call).unwrap();
        assert!(index_of("a.recreate") < index_of("b.recreate"));
        assert!(index_of("b.recreate") < index_of("c.recreate"));
    }

    #[test]
    fn test_restore_reloads_before_recreating() {
        let h = harness();
        let reloads = Arc::new(AtomicUsize::new(0));
        let reload_count = Arc::clone(&reloads);

        let reloadable = TestResource::new("mesh_data", &h.log);
        let dynamic: Arc<dyn DeviceResource> = Arc::clone(&reloadable) as Arc<dyn DeviceResource>;
        let id = h.registry.register(
            &dynamic,
            Some(Arc::new(move || {
                reload_count.fetch_add(1, Ordering::SeqCst);
            })),
        );

        h.coordinator.on_device_lost();
        h.coordinator.on_device_restored().unwrap();

        // Reloaded, not recreated: on_recreate must not have run.
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
        assert!(!h.log.calls().contains(&"mesh_data.recreate".to_string()));
        assert_eq!(h.registry.state(id), Some(LifetimeState::Active));
    }

    #[test]
    fn test_restore_stall_reports_stuck_resources() {
        let h = harness();
        let fine = TestResource::new("fine", &h.log);
        // Gate that never opens.
        let stuck = TestResource::dependent(
            "stuck_view",
            &h.log,
            Arc::new(AtomicBool::new(false)),
        );
        register(&h, &fine);
        let stuck_id = register(&h, &stuck);

        h.coordinator.on_device_lost();
        let err = h.coordinator.on_device_restored().unwrap_err();

        match err {
            GraphicsError::RecoveryFailed(failure) => {
                assert_eq!(failure.resources, vec!["stuck_view".to_string()]);
            }
            other => panic!("expected RecoveryFailed, got {other:?}"),
        }
        assert_eq!(h.registry.state(stuck_id), Some(LifetimeState::Destroyed));
    }

    #[test]
    fn test_presenter_failure_aborts_before_resources() {
        struct FailingPresenter;
        impl Presenter for FailingPresenter {
            fn destroy(&self) {}
            fn recreate(&self) -> Result<(), GraphicsError> {
                Err(GraphicsError::PresenterRecreationFailed(
                    "surface unavailable".to_string(),
                ))
            }
        }

        let log = Arc::new(CallLog::default());
        let registry = Arc::new(ResourceRegistry::new());
        let coordinator = RecoveryCoordinator::new(
            Arc::clone(&registry),
            Arc::new(FailingPresenter),
            Arc::new(PipelineStateCache::new()),
            Arc::new(SamplerStateCache::new()),
        );

        let a = TestResource::new("a", &log);
        let dynamic: Arc<dyn DeviceResource> = Arc::clone(&a) as Arc<dyn DeviceResource>;
        let id = registry.register(&dynamic, None);

        coordinator.on_device_lost();
        assert!(coordinator.on_device_restored().is_err());

        // No resource was touched.
        assert_eq!(registry.state(id), Some(LifetimeState::Destroyed));
        assert!(!log.calls().contains(&"a.recreate".to_string()));
    }

    #[test]
    fn test_device_lost_clears_state_caches() {
        let registry = Arc::new(ResourceRegistry::new());
        let pipeline_cache = Arc::new(PipelineStateCache::new());
        let sampler_cache = Arc::new(SamplerStateCache::new());
        let coordinator = RecoveryCoordinator::new(
            Arc::clone(&registry),
            Arc::new(crate::presenter::SurfacePresenter::default()),
            Arc::clone(&pipeline_cache),
            Arc::clone(&sampler_cache),
        );

        let handles = crate::state_cache::HandleAllocator::new();
        pipeline_cache
            .get_or_create(&crate::types::PipelineStateDescription::new(), |d| {
                Ok(crate::state_cache::PipelineState::new(
                    d.clone(),
                    handles.allocate(),
                ))
            })
            .unwrap();
        sampler_cache
            .get_or_create(&crate::types::SamplerStateDescription::linear(), |d| {
                Ok(crate::state_cache::SamplerState::new(
                    d.clone(),
                    handles.allocate(),
                ))
            })
            .unwrap();

        coordinator.on_device_lost();
        assert!(pipeline_cache.is_empty());
        assert!(sampler_cache.is_empty());
    }
}
