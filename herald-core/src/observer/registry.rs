//! Registry: ordered, copy-on-write handler list
//!
//! Handlers are held as `Arc`s in an [`ArcSwap`]ed vector. Writers clone the
//! current vector, apply one structural change and swap the pointer in, so a
//! reader only ever sees a fully applied add or a fully compacted remove.
//! A [`Snapshot`] keeps the vector it loaded alive, which lets a dispatch
//! round iterate without holding any lock while handlers mutate the registry
//! underneath it.
//!
//! Identity is reference identity: two distinct `Arc`s wrapping equal values
//! are different members.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, trace};

pub struct Registry<H: ?Sized> {
    /// Current member list. Replaced wholesale on every change.
    entries: ArcSwap<Vec<Arc<H>>>,

    /// Serializes writers so concurrent changes are never lost
    write_lock: Mutex<()>,
}

impl<H: ?Sized> Registry<H> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Append `handler`. Duplicates are allowed and are invoked once per
    /// occurrence.
    pub fn add(&self, handler: Arc<H>) {
        let _writer = self.write_lock.lock();

        let current: Arc<Vec<Arc<H>>> = self.entries.load_full();
        let mut next: Vec<Arc<H>> = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(handler);

        let count: usize = next.len();
        self.entries.store(Arc::new(next));

        debug!(handlers = count, "Handler registered");
    }

    /// Remove the first occurrence of `handler`.
    ///
    /// Returns `false`, leaving the registry untouched, when `handler` is not
    /// a member.
    pub fn remove(&self, handler: &Arc<H>) -> bool {
        let _writer = self.write_lock.lock();

        let current: Arc<Vec<Arc<H>>> = self.entries.load_full();

        let Some(position) = current.iter().position(|entry| same_handler(entry, handler)) else {
            trace!("Remove requested for unregistered handler");
            return false;
        };

        let mut next: Vec<Arc<H>> = current.as_ref().clone();
        next.remove(position);

        let count: usize = next.len();
        self.entries.store(Arc::new(next));

        debug!(position, handlers = count, "Handler removed");
        true
    }

    /// Ordered view of the members at this instant. Later changes to the
    /// registry are not reflected in it.
    pub fn snapshot(&self) -> Snapshot<H> {
        Snapshot {
            entries: self.entries.load_full(),
        }
    }

    pub fn contains(&self, handler: &Arc<H>) -> bool {
        self.entries
            .load()
            .iter()
            .any(|entry| same_handler(entry, handler))
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Drop every member.
    pub fn clear(&self) {
        let _writer = self.write_lock.lock();
        self.entries.store(Arc::new(Vec::new()));

        debug!("Registry cleared");
    }
}

impl<H: ?Sized> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handler_count", &self.len())
            .finish()
    }
}

/// Compare by the address of the shared allocation, ignoring vtables.
#[inline]
fn same_handler<H: ?Sized>(a: &Arc<H>, b: &Arc<H>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Read-only, point-in-time view of a [`Registry`].
pub struct Snapshot<H: ?Sized> {
    entries: Arc<Vec<Arc<H>>>,
}

impl<H: ?Sized> Snapshot<H> {
    /// Position of the first occurrence of `handler` in this view
    pub fn position(&self, handler: &Arc<H>) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| same_handler(entry, handler))
    }
}

impl<H: ?Sized> Deref for Snapshot<H> {
    type Target = [Arc<H>];

    fn deref(&self) -> &Self::Target {
        self.entries.as_slice()
    }
}

impl<'a, H: ?Sized> IntoIterator for &'a Snapshot<H> {
    type Item = &'a Arc<H>;
    type IntoIter = std::slice::Iter<'a, Arc<H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<H: ?Sized> Clone for Snapshot<H> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<H: ?Sized> fmt::Debug for Snapshot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe(u32);

    fn probe(id: u32) -> Arc<Probe> {
        Arc::new(Probe(id))
    }

    fn ids(registry: &Registry<Probe>) -> Vec<u32> {
        registry.snapshot().iter().map(|p: &Arc<Probe>| p.0).collect()
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let registry: Registry<Probe> = Registry::new();
        registry.add(probe(1));
        registry.add(probe(2));
        registry.add(probe(3));

        assert_eq!(ids(&registry), vec![1, 2, 3]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_first_position() {
        // Position 0 must be removable like any other
        let registry: Registry<Probe> = Registry::new();
        let first = probe(1);
        registry.add(first.clone());
        registry.add(probe(2));

        assert!(registry.remove(&first));
        assert_eq!(ids(&registry), vec![2]);
        assert!(!registry.contains(&first));
    }

    #[test]
    fn test_remove_only_first_duplicate() {
        let registry: Registry<Probe> = Registry::new();
        let dup = probe(7);
        registry.add(dup.clone());
        registry.add(probe(8));
        registry.add(dup.clone());

        assert!(registry.remove(&dup));
        assert_eq!(ids(&registry), vec![8, 7]);
        assert!(registry.contains(&dup));
    }

    #[test]
    fn test_identity_not_value_equality() {
        let registry: Registry<Probe> = Registry::new();
        registry.add(probe(5));

        // Same value, different allocation
        assert!(!registry.remove(&probe(5)));
        assert_eq!(ids(&registry), vec![5]);
    }

    #[test]
    fn test_remove_non_member_is_noop() {
        let registry: Registry<Probe> = Registry::new();
        registry.add(probe(1));
        let before = registry.snapshot();

        assert!(!registry.remove(&probe(9)));

        let after = registry.snapshot();
        assert_eq!(after.len(), before.len());
        assert_eq!(after.position(&before[0]), Some(0));
    }

    #[test]
    fn test_double_remove_is_idempotent() {
        let registry: Registry<Probe> = Registry::new();
        let a = probe(1);
        registry.add(a.clone());
        registry.add(probe(2));

        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert_eq!(ids(&registry), vec![2]);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let registry: Registry<Probe> = Registry::new();
        let a = probe(1);
        registry.add(a.clone());

        let snapshot = registry.snapshot();
        registry.add(probe(2));
        registry.remove(&a);

        let frozen: Vec<u32> = snapshot.iter().map(|p| p.0).collect();
        assert_eq!(frozen, vec![1]);
        assert_eq!(ids(&registry), vec![2]);
    }

    #[test]
    fn test_clear_empties_registry() {
        let registry: Registry<Probe> = Registry::new();
        registry.add(probe(1));
        registry.add(probe(2));

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let registry: Registry<Probe> = Registry::new();
        let keep: Vec<Arc<Probe>> = (0..200).map(probe).collect();
        let drop_me: Vec<Arc<Probe>> = (1000..1200).map(probe).collect();

        for p in &drop_me {
            registry.add(p.clone());
        }

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for p in &keep {
                    registry.add(p.clone());
                }
            });
            scope.spawn(|| {
                for p in &drop_me {
                    assert!(registry.remove(p));
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    // Never a gap, never a half-applied change
                    let snapshot = registry.snapshot();
                    assert!(snapshot.len() <= 400);
                }
            });
        });

        assert_eq!(ids(&registry), (0..200).collect::<Vec<u32>>());
    }
}
