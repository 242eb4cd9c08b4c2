//! fetchsync store: in-RAM keyed store with copy-on-write snapshots.
//!
//! Backs local previews and tests. Writers swap in a new map; readers load the
//! current snapshot without locking. Faults can be injected per operation to
//! exercise the `LookupFailed` / `StoreWriteFailed` paths.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use fetchsync_core::{Error, KeyRef, KeyedStore, Result, SinkKind};
use metrics::counter;
use rustc_hash::FxHashMap;
use tracing::debug;

/// (kind, namespace, name) of one object.
pub type ObjectKey = (SinkKind, String, String);

/// Key/value data of every object.
pub type Objects = FxHashMap<ObjectKey, FxHashMap<String, String>>;

#[derive(Default)]
pub struct MemStore {
    snap: ArcSwap<Objects>,
    epoch: AtomicU64,
    fail_gets: AtomicBool,
    fail_writes: AtomicBool,
}

fn object_key(at: &KeyRef) -> ObjectKey {
    (at.kind, at.namespace.clone(), at.name.clone())
}

impl MemStore {
    pub fn new() -> Self { Self::default() }

    /// Builder-style seed for a single entry.
    pub fn with_entry(self, at: &KeyRef, value: &str) -> Self {
        self.insert(at, value);
        self
    }

    pub fn insert(&self, at: &KeyRef, value: &str) {
        self.swap(|objs| {
            objs.entry(object_key(at)).or_default().insert(at.key.clone(), value.to_string());
        });
    }

    /// Remove a whole object, as if it were deleted out of band.
    pub fn remove_object(&self, kind: SinkKind, namespace: &str, name: &str) {
        self.swap(|objs| {
            objs.remove(&(kind, namespace.to_string(), name.to_string()));
        });
    }

    /// Read an entry without going through the async trait.
    pub fn peek(&self, at: &KeyRef) -> Option<String> {
        self.snap.load().get(&object_key(at)).and_then(|data| data.get(&at.key)).cloned()
    }

    pub fn current(&self) -> Arc<Objects> { self.snap.load_full() }

    /// Number of successful mutations so far.
    pub fn epoch(&self) -> u64 { self.epoch.load(Ordering::Acquire) }

    pub fn fail_gets(&self, on: bool) { self.fail_gets.store(on, Ordering::Release); }

    pub fn fail_writes(&self, on: bool) { self.fail_writes.store(on, Ordering::Release); }

    fn swap(&self, f: impl Fn(&mut Objects)) {
        self.snap.rcu(|cur| {
            let mut next = Objects::clone(cur);
            f(&mut next);
            next
        });
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl KeyedStore for MemStore {
    async fn get(&self, at: &KeyRef) -> Result<Option<String>> {
        if self.fail_gets.load(Ordering::Acquire) {
            return Err(Error::lookup(at, "injected lookup failure"));
        }
        Ok(self.peek(at))
    }

    async fn set(&self, at: &KeyRef, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(Error::store_write(at, "injected write failure"));
        }
        self.insert(at, value);
        counter!("store_write_total", 1, "op" => "set");
        debug!(target_ref = %at, bytes = value.len(), "mem store: set");
        Ok(())
    }

    async fn delete(&self, at: &KeyRef) -> Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(Error::store_write(at, "injected write failure"));
        }
        if self.peek(at).is_none() {
            return Ok(());
        }
        self.swap(|objs| {
            if let Some(data) = objs.get_mut(&object_key(at)) {
                data.remove(&at.key);
            }
        });
        counter!("store_write_total", 1, "op" => "delete");
        debug!(target_ref = %at, "mem store: delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(name: &str, key: &str) -> KeyRef {
        KeyRef { kind: SinkKind::ConfigMap, name: name.into(), namespace: "ns".into(), key: key.into() }
    }

    #[test]
    fn kinds_do_not_alias() {
        let s = MemStore::new().with_entry(&cm("a", "k"), "v");
        let secret = KeyRef { kind: SinkKind::Secret, ..cm("a", "k") };
        assert_eq!(s.peek(&cm("a", "k")).as_deref(), Some("v"));
        assert_eq!(s.peek(&secret), None);
    }

    #[test]
    fn snapshots_are_immutable() {
        let s = MemStore::new();
        s.insert(&cm("a", "k"), "v1");
        let before = s.current();
        s.insert(&cm("a", "k"), "v2");
        assert_eq!(before[&(SinkKind::ConfigMap, "ns".into(), "a".into())]["k"], "v1");
        assert_eq!(s.peek(&cm("a", "k")).as_deref(), Some("v2"));
        assert_eq!(s.epoch(), 2);
    }
}
