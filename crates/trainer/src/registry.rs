//! Bounded LRU registry of per-item entries.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use larder_models::ItemId;

use crate::entry::ItemEntry;

/// Shared handle to one item's locked entry.
pub(crate) type EntryHandle = Arc<Mutex<ItemEntry>>;

/// Bounded LRU of per-item entries. The map lock is held only for
/// lookups and insertions; per-item work happens under the entry's own
/// mutex.
#[derive(Debug)]
pub(crate) struct Registry {
    entries: Mutex<LruCache<ItemId, EntryHandle>>,
}

impl Registry {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity floored at 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the entry for `item_id` if it is resident.
    pub(crate) fn get(&self, item_id: &ItemId) -> Option<EntryHandle> {
        self.entries.lock().get(item_id).cloned()
    }

    /// Returns the resident entry for `item_id`, or inserts `entry` if
    /// none is resident. Atomic with respect to concurrent
    /// materialization of the same item, so two racing callers always
    /// share one entry. The second element is any entry evicted to make
    /// room.
    pub(crate) fn get_or_insert(
        &self,
        item_id: ItemId,
        entry: EntryHandle,
    ) -> (EntryHandle, Option<(ItemId, EntryHandle)>) {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&item_id) {
            return (existing.clone(), None);
        }
        let evicted = entries.push(item_id, entry.clone());
        (entry, evicted)
    }

    /// Removes an entry (item deleted by the host).
    pub(crate) fn remove(&self, item_id: &ItemId) -> Option<EntryHandle> {
        self.entries.lock().pop(item_id)
    }

    /// Item ids currently resident, most recently used first.
    pub(crate) fn resident(&self) -> Vec<ItemId> {
        self.entries.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}
