//! Keyed, append-ordered callback registries.
//!
//! Two registries hang off the spawner: one chains setting-override
//! resolvers (keyed by override key) and one chains prize-count resolvers
//! (keyed by prize code). Both share the same bucketed structure: a fixed
//! bucket table indexed by `key % bucket_count`, each bucket holding its
//! entries in registration order.
//!
//! Execution never runs a callback while a registry lock is held. Callers
//! take a [`CallbackRegistry::snapshot`] of the matching entries — a cheap
//! clone of `Arc`s — release the lock, and then invoke the callbacks. This
//! keeps resolvers free to call back into the spawner (registering more
//! callbacks, querying management state) without reentrancy hazards.

use pulsar_services::{ArenaId, ArenaScope, Freq, HullId, PlayerId, PrizeCode, ShipClass};
use smallvec::SmallVec;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Context handed to every setting-override resolver.
#[derive(Debug, Clone, Copy)]
pub struct OverrideContext<'a> {
    /// The player for whom the overrides will be applied.
    pub player: PlayerId,
    /// The hull from which the setting value derives, if any.
    pub hull: Option<HullId>,
    /// The frequency on which the overridden settings will be valid.
    pub freq: Freq,
    /// The ship on which the overridden settings will be valid.
    pub ship: ShipClass,
    pub section: &'a str,
    pub setting: &'a str,
}

/// A registered transformation over one setting's resolved value.
///
/// Resolvers run in registration order, each receiving the value produced
/// so far and returning a replacement. Returned values are clamped by the
/// pipeline afterwards, but resolvers should stay within sane ranges.
pub trait OverrideResolver: Send + Sync {
    fn resolve(&self, ctx: &OverrideContext<'_>, value: i32) -> i32;
}

/// Context handed to every prize-count resolver.
#[derive(Debug, Clone, Copy)]
pub struct PrizeContext {
    pub player: PlayerId,
    pub hull: Option<HullId>,
    pub freq: Freq,
    pub ship: ShipClass,
    /// The prize whose spawn count is being resolved.
    pub prize: PrizeCode,
}

/// A registered transformation over one prize's spawn count.
pub trait PrizeResolver: Send + Sync {
    fn resolve(&self, ctx: &PrizeContext, count: i32) -> i32;
}

// Lock helpers that survive a poisoned lock: a panicking callback in one
// thread must not wedge every other player's compilation.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

struct Entry<T: ?Sized> {
    key: u32,
    scope: ArenaScope,
    callback: Arc<T>,
}

/// Fixed-bucket callback table with append-ordered chains.
pub(crate) struct CallbackRegistry<T: ?Sized> {
    buckets: Box<[RwLock<SmallVec<[Entry<T>; 2]>>]>,
}

impl<T: ?Sized> CallbackRegistry<T> {
    pub fn new(bucket_count: usize) -> Self {
        let buckets = (0..bucket_count)
            .map(|_| RwLock::new(SmallVec::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { buckets }
    }

    fn bucket(&self, key: u32) -> &RwLock<SmallVec<[Entry<T>; 2]>> {
        &self.buckets[key as usize % self.buckets.len()]
    }

    /// Appends a callback to its key's chain.
    pub fn register(&self, key: u32, scope: ArenaScope, callback: Arc<T>) {
        write_lock(self.bucket(key)).push(Entry { key, scope, callback });
    }

    /// Removes every entry matching the key, the exact scope, and the same
    /// callback instance. Returns how many entries were removed so callers
    /// can detect accidental double registration.
    pub fn deregister(&self, key: u32, scope: ArenaScope, callback: &Arc<T>) -> usize {
        let mut entries = write_lock(self.bucket(key));
        let before = entries.len();
        entries.retain(|entry| {
            !(entry.key == key && entry.scope == scope && Arc::ptr_eq(&entry.callback, callback))
        });
        before - entries.len()
    }

    /// The callbacks applicable to `key` in `arena`, in registration
    /// order. Callers invoke these after the method returns, lock-free.
    pub fn snapshot(&self, key: u32, arena: ArenaId) -> Vec<Arc<T>> {
        read_lock(self.bucket(key))
            .iter()
            .filter(|entry| entry.key == key && entry.scope.applies_to(arena))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    /// Drops every registration. Used on subsystem teardown.
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            write_lock(bucket).clear();
        }
    }
}
