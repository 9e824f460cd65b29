use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::debug;

/// One table of live resource state, keyed by resource id.
///
/// Writes are last-write-wins. Iteration (`range`, `snapshot`, `values`)
/// works on a copy taken under the read lock, so callbacks may freely call
/// back into the table and concurrent writers are never blocked by a slow
/// reader. Entries come back ordered by id, but that order is an artefact of
/// the map and not part of the contract.
#[derive(Debug)]
pub struct ResourceTable<T> {
    name: &'static str,
    entries: RwLock<BTreeMap<String, T>>,
}

impl<T: Clone + Send + Sync> ResourceTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Upsert; returns the previous value.
    pub async fn store(&self, id: impl Into<String>, value: T) -> Option<T> {
        let id = id.into();
        debug!(table = self.name, %id, "store");
        self.entries.write().await.insert(id, value)
    }

    pub async fn load(&self, id: &str) -> Option<T> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Remove an entry; absent ids are not an error.
    pub async fn delete(&self, id: &str) -> Option<T> {
        debug!(table = self.name, %id, "delete");
        self.entries.write().await.remove(id)
    }

    /// Run `f` against the slot for `id` under the write lock. Setting the
    /// slot to `None` removes the entry.
    pub async fn with_entry<R>(&self, id: &str, f: impl FnOnce(&mut Option<T>) -> R) -> R {
        let mut guard = self.entries.write().await;
        let mut slot = guard.remove(id);
        let result = f(&mut slot);
        if let Some(value) = slot {
            guard.insert(id.to_string(), value);
        }
        result
    }

    /// Mutate an existing entry in place; `None` when absent.
    pub async fn update<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.entries.write().await.get_mut(id).map(f)
    }

    /// Visit a snapshot of every entry until `f` returns `false`.
    pub async fn range(&self, mut f: impl FnMut(&str, &T) -> bool) {
        for (id, value) in self.snapshot().await {
            if !f(&id, &value) {
                break;
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<(String, T)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    pub async fn values(&self) -> Vec<T> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn flush(&self) {
        let mut guard = self.entries.write().await;
        debug!(table = self.name, entries = guard.len(), "flush");
        guard.clear();
    }
}
