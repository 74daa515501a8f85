//! # Data change listeners
//!
//! Stores notify registered [`DataChangedListener`]s after every completed load
//! and whenever their root list changes.
//!
//! [`LifecycleDataChangedListener`] adapts a listener to a UI lifecycle: while
//! suspended it only remembers which stores changed, and on resume it delivers
//! one notification per store whose data version moved since the last delivery.
//! It forwards [`ChangeKind::Loaded`] only. Root-list changes leave the version
//! untouched and reach raw listeners alone.

use crate::error::{Result, SyncError};
use crate::store::{MediaStore, StoreId};
use core_library::models::Visibility;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A fetch or refresh completed and bumped the data version.
    Loaded,
    /// The root list changed; trees and version are as before.
    RootsChanged,
}

/// Notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChanged {
    pub store_id: StoreId,
    pub visibility: Visibility,
    pub data_version: i64,
    pub kind: ChangeKind,
}

pub trait DataChangedListener: Send + Sync {
    fn on_data_changed(&self, change: &DataChanged);
}

impl<F> DataChangedListener for F
where
    F: Fn(&DataChanged) + Send + Sync,
{
    fn on_data_changed(&self, change: &DataChanged) {
        self(change)
    }
}

/// Registration handle returned by [`MediaStore::register_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Suspended,
    Active,
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Suspended => "suspended",
            LifecycleState::Active => "active",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

struct Registration {
    store: Weak<MediaStore>,
    listener_id: ListenerId,
}

struct LifecycleInner {
    state: LifecycleState,
    pending: HashSet<StoreId>,
    versions: HashMap<StoreId, i64>,
    stores: HashMap<StoreId, Registration>,
}

pub struct LifecycleDataChangedListener {
    delegate: Arc<dyn DataChangedListener>,
    inner: Mutex<LifecycleInner>,
}

impl LifecycleDataChangedListener {
    /// Create a listener in the `Suspended` state.
    pub fn new(delegate: Arc<dyn DataChangedListener>) -> Arc<Self> {
        Arc::new(Self {
            delegate,
            inner: Mutex::new(LifecycleInner {
                state: LifecycleState::Suspended,
                pending: HashSet::new(),
                versions: HashMap::new(),
                stores: HashMap::new(),
            }),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Version last delivered for `store`, if any.
    pub fn delivered_version(&self, store: StoreId) -> Option<i64> {
        self.inner.lock().versions.get(&store).copied()
    }

    /// Listen to `store`. Registering the same store twice is a no-op.
    pub fn register(self: &Arc<Self>, store: &Arc<MediaStore>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Destroyed {
            return Err(SyncError::InvalidStateTransition {
                from: LifecycleState::Destroyed.to_string(),
                to: "registered".to_string(),
            });
        }
        if inner.stores.contains_key(&store.id()) {
            return Ok(());
        }
        let listener: Arc<dyn DataChangedListener> = self.clone();
        let listener_id = store.register_listener(listener);
        inner.stores.insert(
            store.id(),
            Registration {
                store: Arc::downgrade(store),
                listener_id,
            },
        );
        Ok(())
    }

    /// Enter `Active` and flush notifications collected while suspended.
    pub fn resume(&self) -> Result<()> {
        let deliveries = {
            let mut inner = self.inner.lock();
            match inner.state {
                LifecycleState::Destroyed => {
                    return Err(SyncError::InvalidStateTransition {
                        from: inner.state.to_string(),
                        to: LifecycleState::Active.to_string(),
                    })
                }
                LifecycleState::Active => return Ok(()),
                LifecycleState::Suspended => inner.state = LifecycleState::Active,
            }

            let pending: Vec<StoreId> = inner.pending.drain().collect();
            let mut deliveries = Vec::new();
            for store_id in pending {
                let Some(store) = inner.stores.get(&store_id).and_then(|r| r.store.upgrade())
                else {
                    continue;
                };
                let change = DataChanged {
                    store_id,
                    visibility: store.visibility(),
                    data_version: store.data_version(),
                    kind: ChangeKind::Loaded,
                };
                if Self::accept(&mut inner, &change) {
                    deliveries.push(change);
                }
            }
            deliveries
        };

        debug!(count = deliveries.len(), "Flushing pending data changes");
        for change in &deliveries {
            self.delegate.on_data_changed(change);
        }
        Ok(())
    }

    pub fn suspend(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            LifecycleState::Destroyed => Err(SyncError::InvalidStateTransition {
                from: inner.state.to_string(),
                to: LifecycleState::Suspended.to_string(),
            }),
            _ => {
                inner.state = LifecycleState::Suspended;
                Ok(())
            }
        }
    }

    /// Unregister from every store. Terminal.
    pub fn destroy(&self) {
        let registrations: Vec<Registration> = {
            let mut inner = self.inner.lock();
            inner.state = LifecycleState::Destroyed;
            inner.pending.clear();
            inner.stores.drain().map(|(_, r)| r).collect()
        };
        for registration in registrations {
            if let Some(store) = registration.store.upgrade() {
                store.unregister_listener(registration.listener_id);
            }
        }
    }

    /// Remember the version and report whether it changed.
    fn accept(inner: &mut LifecycleInner, change: &DataChanged) -> bool {
        if inner.versions.get(&change.store_id) == Some(&change.data_version) {
            return false;
        }
        inner.versions.insert(change.store_id, change.data_version);
        true
    }
}

impl DataChangedListener for LifecycleDataChangedListener {
    fn on_data_changed(&self, change: &DataChanged) {
        if change.kind != ChangeKind::Loaded {
            return;
        }
        let deliver = {
            let mut inner = self.inner.lock();
            match inner.state {
                LifecycleState::Suspended => {
                    inner.pending.insert(change.store_id);
                    false
                }
                LifecycleState::Active => Self::accept(&mut inner, change),
                LifecycleState::Destroyed => false,
            }
        };
        if deliver {
            self.delegate.on_data_changed(change);
        }
    }
}
