//! Process-wide memo tables keyed by type identity.
//!
//! The first caller for a key inserts an empty [`Slot`] (the forwarding
//! placeholder) and builds the value; every later caller gets the same slot
//! back immediately, without building. Readers of a resolved slot take no
//! lock. Readers of a slot still under construction block in [`Slot::get`]
//! until the builder publishes.
//!
//! Builders must only collect slot handles for their dependencies and never
//! call [`Slot::get`] on them; that keeps self-referential types from
//! waiting on themselves.
//!
//! A builder that panics marks its slot failed and drops it from the table:
//! blocked readers wake up and panic too, and the next lookup builds again.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

pub struct Slot<V> {
    value: OnceLock<Arc<V>>,
    /// Set when the builder panicked before publishing.
    failed: Mutex<bool>,
    ready: Condvar,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            value: OnceLock::new(),
            failed: Mutex::new(false),
            ready: Condvar::new(),
        }
    }

    /// Returns the published value, waiting for the builder if needed.
    ///
    /// # Panics
    ///
    /// Panics if the builder of this slot panicked.
    pub fn get(&self) -> Arc<V> {
        if let Some(value) = self.value.get() {
            return Arc::clone(value);
        }
        let mut failed = self.failed.lock();
        loop {
            if let Some(value) = self.value.get() {
                return Arc::clone(value);
            }
            if *failed {
                panic!("registry slot builder panicked before publishing");
            }
            self.ready.wait(&mut failed);
        }
    }

    /// Non-blocking read; `None` while the value is being built.
    pub fn try_get(&self) -> Option<Arc<V>> {
        self.value.get().cloned()
    }

    fn publish(&self, value: V) {
        let _guard = self.failed.lock();
        // only the inserting caller publishes, so the cell is still empty
        let _ = self.value.set(Arc::new(value));
        self.ready.notify_all();
    }

    fn fail(&self) {
        *self.failed.lock() = true;
        self.ready.notify_all();
    }
}

/// Armed while a fresh slot is being built; dropping it armed means the
/// builder unwound.
struct PendingBuild<'r, V> {
    registry: &'r Registry<V>,
    key: (TypeId, String),
    slot: &'r Slot<V>,
    armed: bool,
}

impl<V> Drop for PendingBuild<'_, V> {
    fn drop(&mut self) {
        if self.armed {
            self.slot.fail();
            self.registry.slots.remove(&self.key);
        }
    }
}

pub struct Registry<V> {
    slots: DashMap<(TypeId, String), Arc<Slot<V>>>,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Registry<V> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Returns the slot for `(id, tag)`, running `build` when this caller
    /// is the first to ask for it.
    pub fn resolve<F>(&self, id: TypeId, tag: &str, build: F) -> Arc<Slot<V>>
    where
        F: FnOnce() -> V,
    {
        let key = (id, tag.to_string());
        if let Some(slot) = self.slots.get(&key) {
            return Arc::clone(slot.value());
        }

        // the shard lock is released before building so recursive lookups
        // can land in the same shard
        let (slot, fresh) = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(Slot::new());
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        };

        if fresh {
            let mut pending = PendingBuild {
                registry: self,
                key,
                slot: &slot,
                armed: true,
            };
            slot.publish(build());
            pending.armed = false;
        }
        slot
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_resolve_builds_once() {
        let registry: Registry<String> = Registry::new();
        let builds = AtomicUsize::new(0);
        let id = TypeId::of::<u8>();

        let a = registry.resolve(id, "excel", || {
            builds.fetch_add(1, Ordering::SeqCst);
            "built".to_string()
        });
        let b = registry.resolve(id, "excel", || {
            builds.fetch_add(1, Ordering::SeqCst);
            "rebuilt".to_string()
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.get(), &b.get()));
        assert_eq!(*b.get(), "built");
    }

    #[test]
    fn test_tag_is_part_of_the_key() {
        let registry: Registry<&'static str> = Registry::new();
        let id = TypeId::of::<u8>();
        registry.resolve(id, "excel", || "a");
        registry.resolve(id, "json", || "b");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_recursive_resolve_sees_placeholder() {
        let registry: Registry<usize> = Registry::new();
        let id = TypeId::of::<u8>();
        registry.resolve(id, "excel", || {
            let inner = registry.resolve(id, "excel", || 99);
            assert!(inner.try_get().is_none());
            1
        });
        assert_eq!(*registry.resolve(id, "excel", || 2).get(), 1);
    }

    #[test]
    fn test_concurrent_first_use_waits_for_builder() {
        let registry: Arc<Registry<usize>> = Arc::new(Registry::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let id = TypeId::of::<u16>();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    let slot = registry.resolve(id, "excel", || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        42
                    });
                    *slot.get()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_builder_releases_waiters() {
        let registry: Arc<Registry<usize>> = Arc::new(Registry::new());
        let id = TypeId::of::<u32>();
        let (started_tx, started_rx) = mpsc::channel();

        let builder = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.resolve(id, "excel", || {
                    started_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(50));
                    panic!("build failed");
                });
            })
        };

        started_rx.recv().unwrap();
        let placeholder = registry.resolve(id, "excel", || 7);
        let waiter = thread::spawn(move || *placeholder.get());

        assert!(builder.join().is_err());
        assert!(waiter.join().is_err());

        // the failed slot is gone, so the next lookup builds again
        assert_eq!(*registry.resolve(id, "excel", || 7).get(), 7);
    }
}
