//! Process-wide extension registry.
//!
//! Written during startup behind a lock, then sealed into an immutable
//! snapshot that every reader shares without locking.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::capability::Capability;
use crate::error::RegistryWriteError;

struct Entry {
    class: String,
    /// Always an `Arc<C::Object>` for the slot's capability.
    instance: Box<dyn Any + Send + Sync>,
}

struct Slot {
    capability: &'static str,
    entries: Vec<Entry>,
}

type Slots = HashMap<TypeId, Slot>;

/// Capability → instances table, append-only until sealed.
pub struct ExtensionRegistry {
    /// `None` once sealed.
    pending: RwLock<Option<Slots>>,
    sealed: OnceLock<Arc<RegistrySnapshot>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(Some(HashMap::new())),
            sealed: OnceLock::new(),
        }
    }

    /// Add `instance` under capability `C`.
    ///
    /// Fails without side effects when the registry is sealed or `class` is
    /// already registered for `C`.
    pub fn register<C: Capability>(
        &self,
        class: &str,
        instance: Arc<C::Object>,
    ) -> Result<(), RegistryWriteError> {
        let mut pending = self.pending.write();
        let slots = pending.as_mut().ok_or(RegistryWriteError::Sealed)?;
        let slot = slots.entry(TypeId::of::<C>()).or_insert_with(|| Slot {
            capability: C::NAME,
            entries: Vec::new(),
        });
        if slot.entries.iter().any(|e| e.class == class) {
            return Err(RegistryWriteError::Duplicate);
        }
        slot.entries.push(Entry {
            class: class.to_string(),
            instance: Box::new(instance),
        });
        Ok(())
    }

    /// Stop accepting writes and publish the immutable snapshot.
    ///
    /// Idempotent: later calls return the same snapshot.
    pub fn seal(&self) -> Arc<RegistrySnapshot> {
        let mut pending = self.pending.write();
        self.sealed
            .get_or_init(|| {
                Arc::new(RegistrySnapshot {
                    slots: pending.take().unwrap_or_default(),
                })
            })
            .clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// The sealed snapshot, once [`seal`](Self::seal) has run.
    pub fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.sealed.get().cloned()
    }

    /// Instances registered for `C` so far, sealed or not.
    pub fn instances<C: Capability>(&self) -> Vec<Arc<C::Object>> {
        if let Some(snapshot) = self.sealed.get() {
            return snapshot.instances::<C>();
        }
        let pending = self.pending.read();
        match pending.as_ref() {
            Some(slots) => instances_of::<C>(slots),
            // Sealed while we waited for the lock.
            None => self.sealed_snapshot().instances::<C>(),
        }
    }

    /// Class names registered for `C` so far, in registration order.
    pub fn classes<C: Capability>(&self) -> Vec<String> {
        if let Some(snapshot) = self.sealed.get() {
            return snapshot.classes::<C>().map(str::to_string).collect();
        }
        let pending = self.pending.read();
        match pending.as_ref() {
            Some(slots) => slots
                .get(&TypeId::of::<C>())
                .map(|slot| slot.entries.iter().map(|e| e.class.clone()).collect())
                .unwrap_or_default(),
            None => self
                .sealed_snapshot()
                .classes::<C>()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn contains<C: Capability>(&self, class: &str) -> bool {
        self.classes::<C>().iter().any(|c| c == class)
    }

    /// The snapshot once `pending` has been taken. `seal` publishes it
    /// before releasing the write lock, so this only falls back to an empty
    /// snapshot if that ordering is broken.
    fn sealed_snapshot(&self) -> Arc<RegistrySnapshot> {
        self.sealed
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(RegistrySnapshot::empty()))
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the registry after startup.
pub struct RegistrySnapshot {
    slots: Slots,
}

impl RegistrySnapshot {
    pub fn empty() -> Self {
        Self { slots: HashMap::new() }
    }

    pub fn instances<C: Capability>(&self) -> Vec<Arc<C::Object>> {
        instances_of::<C>(&self.slots)
    }

    pub fn classes<C: Capability>(&self) -> impl Iterator<Item = &str> {
        self.slots
            .get(&TypeId::of::<C>())
            .into_iter()
            .flat_map(|slot| slot.entries.iter().map(|e| e.class.as_str()))
    }

    pub fn contains<C: Capability>(&self, class: &str) -> bool {
        self.classes::<C>().any(|c| c == class)
    }

    pub fn count<C: Capability>(&self) -> usize {
        self.slots
            .get(&TypeId::of::<C>())
            .map_or(0, |slot| slot.entries.len())
    }

    /// `(capability, entry count)` for every populated capability.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let mut summary: Vec<_> = self
            .slots
            .values()
            .map(|slot| (slot.capability, slot.entries.len()))
            .collect();
        summary.sort_unstable();
        summary
    }
}

fn instances_of<C: Capability>(slots: &Slots) -> Vec<Arc<C::Object>> {
    slots
        .get(&TypeId::of::<C>())
        .map(|slot| {
            slot.entries
                .iter()
                .filter_map(|e| e.instance.downcast_ref::<Arc<C::Object>>().cloned())
                .collect()
        })
        .unwrap_or_default()
}
