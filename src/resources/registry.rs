//! Live-resource registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::resources::{DeviceResource, LifetimeState, ReloadFn};

/// Identity of a registered resource within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

struct Tracked {
    resource: Weak<dyn DeviceResource>,
    state: LifetimeState,
    reload: Option<ReloadFn>,
}

/// Thread-safe set of all live resources of a device.
///
/// Registration happens at resource construction and may come from any
/// thread (e.g. background content streaming), hence the lock. The lock
/// guards membership and lifetime state only; the recovery coordinator
/// iterates over a [`snapshot`](Self::snapshot) so potentially slow
/// per-resource callbacks never run under it.
///
/// The registry holds weak handles: resources are independently owned by
/// application code, and a dropped resource simply disappears from the
/// next snapshot.
pub struct ResourceRegistry {
    entries: Mutex<HashMap<ResourceId, Tracked>>,
    next_id: AtomicU64,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a resource, optionally with a reload callback.
    ///
    /// The resource starts [`LifetimeState::Active`]. O(1) amortized.
    pub fn register(
        &self,
        resource: &Arc<dyn DeviceResource>,
        reload: Option<ReloadFn>,
    ) -> ResourceId {
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock();
        entries.insert(
            id,
            Tracked {
                resource: Arc::downgrade(resource),
                state: LifetimeState::Active,
                reload,
            },
        );
        log::trace!(
            "ResourceRegistry: registered {:?} ({})",
            id,
            resource.label()
        );
        id
    }

    /// Remove a resource from tracking. O(1).
    ///
    /// Returns whether an entry existed. Symmetric with registration:
    /// called when the owning resource is disposed.
    pub fn unregister(&self, id: ResourceId) -> bool {
        let removed = self.entries.lock().remove(&id).is_some();
        if removed {
            log::trace!("ResourceRegistry: unregistered {:?}", id);
        }
        removed
    }

    /// Collect the currently live resources.
    ///
    /// Weak handles are upgraded under the lock; entries whose resource has
    /// been dropped are skipped, so iteration tolerates concurrent removal.
    /// Callers run per-resource callbacks on the returned snapshot without
    /// holding the registry lock.
    pub fn snapshot(&self) -> Vec<(ResourceId, Arc<dyn DeviceResource>)> {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter_map(|(id, tracked)| Some((*id, tracked.resource.upgrade()?)))
            .collect()
    }

    /// Current lifetime state of a registered resource.
    pub fn state(&self, id: ResourceId) -> Option<LifetimeState> {
        self.entries.lock().get(&id).map(|tracked| tracked.state)
    }

    /// Update the lifetime state of a registered resource.
    pub fn set_state(&self, id: ResourceId, state: LifetimeState) {
        if let Some(tracked) = self.entries.lock().get_mut(&id) {
            tracked.state = state;
        }
    }

    /// The reload callback of a registered resource, if it has one.
    ///
    /// Clones the shared closure so the caller can invoke it outside the
    /// registry lock.
    pub fn reload_fn(&self, id: ResourceId) -> Option<ReloadFn> {
        self.entries
            .lock()
            .get(&id)
            .and_then(|tracked| tracked.reload.clone())
    }

    /// Number of tracked entries (including entries whose resource may have
    /// been dropped but not yet unregistered).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry tracks no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

/// RAII registration handle.
///
/// Stored inside a resource; dropping the resource drops the registration,
/// which unregisters it from the registry. Keeps registration and disposal
/// symmetric without a manual `Drop` impl on every resource kind.
pub struct Registration {
    id: ResourceId,
    registry: Weak<ResourceRegistry>,
}

impl Registration {
    /// Create a handle for an already-registered resource.
    pub fn new(id: ResourceId, registry: Weak<ResourceRegistry>) -> Self {
        Self { id, registry }
    }

    /// The registered id.
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

static_assertions::assert_impl_all!(ResourceRegistry: Send, Sync);
