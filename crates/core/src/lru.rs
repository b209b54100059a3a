//! Bounded concurrent LRU index of cache fingerprints (spec §4.2, C3).
//!
//! Grounded on `examples/original_source/images/lru.go`'s doubly linked list
//! of nodes plus a fingerprint→node lookup map, but re-expressed per the
//! spec's §9 design note as an arena of slots addressed by a small integer
//! handle rather than owning pointers — this sidesteps the ownership-cycle
//! problem the Go version works around with a second `reverseLookup` map,
//! since each slot already carries its own fingerprint.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

type Handle = usize;

struct Slot {
    id: u64,
    fingerprint: String,
    prev: Option<Handle>,
    next: Option<Handle>,
}

struct Inner {
    slots: Vec<Option<Slot>>,
    free: Vec<Handle>,
    by_fingerprint: HashMap<String, Handle>,
    by_id: HashMap<u64, Vec<Handle>>,
    head: Option<Handle>,
    tail: Option<Handle>,
    len: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn alloc_slot(&mut self, id: u64, fingerprint: String) -> Handle {
        let slot = Slot { id, fingerprint, prev: None, next: None };
        if let Some(h) = self.free.pop() {
            self.slots[h] = Some(slot);
            h
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    fn free_slot(&mut self, h: Handle) {
        self.slots[h] = None;
        self.free.push(h);
    }

    fn slot(&self, h: Handle) -> &Slot {
        self.slots[h].as_ref().expect("handle refers to a live slot")
    }

    /// Unlink `h` from the list without touching the maps or freeing it.
    fn unlink(&mut self, h: Handle) {
        let (prev, next) = {
            let s = self.slot(h);
            (s.prev, s.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, h: Handle) {
        let old_head = self.head;
        {
            let s = self.slots[h].as_mut().unwrap();
            s.prev = None;
            s.next = old_head;
        }
        match old_head {
            Some(oh) => self.slots[oh].as_mut().unwrap().prev = Some(h),
            None => self.tail = Some(h),
        }
        self.head = Some(h);
    }

    fn move_to_front(&mut self, h: Handle) {
        if self.head == Some(h) {
            return;
        }
        self.unlink(h);
        self.push_front(h);
    }

    /// Detach and free `h`, removing it from both maps. Does not touch
    /// `len`; callers account for that themselves.
    fn evict_slot(&mut self, h: Handle) -> String {
        self.unlink(h);
        let fingerprint = self.slot(h).fingerprint.clone();
        let id = self.slot(h).id;
        self.by_fingerprint.remove(&fingerprint);
        if let Some(handles) = self.by_id.get_mut(&id) {
            handles.retain(|&x| x != h);
            if handles.is_empty() {
                self.by_id.remove(&id);
            }
        }
        self.free_slot(h);
        fingerprint
    }
}

/// Aggregate counters exposed by [`Lru::stat`] (spec §4.2 `stat()`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LruStat {
    pub items: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded fingerprint → (id) index with LRU eviction. Every eviction
/// (capacity pressure or explicit [`Lru::delete`]) emits the evicted
/// fingerprint's on-disk path to `remover_tx`, which the file remover
/// worker (spec §4.5) drains asynchronously.
pub struct Lru {
    inner: RwLock<Inner>,
    cache_dir: PathBuf,
    remover_tx: UnboundedSender<PathBuf>,
}

impl Lru {
    pub fn new(capacity: usize, cache_dir: PathBuf, remover_tx: UnboundedSender<PathBuf>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                slots: Vec::new(),
                free: Vec::new(),
                by_fingerprint: HashMap::new(),
                by_id: HashMap::new(),
                head: None,
                tail: None,
                len: 0,
                capacity,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            cache_dir,
            remover_tx,
        }
    }

    /// Presence check with no promotion and no counter update.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.inner.read().unwrap().by_fingerprint.contains_key(fingerprint)
    }

    /// If `fingerprint` is present, promote it to MRU, count a hit, and
    /// return `true`. Otherwise insert it at MRU for `id`, count a miss,
    /// evict tail entries down to capacity, and return `false`.
    pub fn add_or_update(&self, id: u64, fingerprint: &str) -> bool {
        let mut evicted = Vec::new();
        let hit;
        {
            let mut inner = self.inner.write().unwrap();
            if let Some(&h) = inner.by_fingerprint.get(fingerprint) {
                inner.move_to_front(h);
                inner.hits += 1;
                hit = true;
            } else {
                let h = inner.alloc_slot(id, fingerprint.to_string());
                inner.push_front(h);
                inner.by_fingerprint.insert(fingerprint.to_string(), h);
                inner.by_id.entry(id).or_default().push(h);
                inner.len += 1;
                inner.misses += 1;
                hit = false;

                while inner.len > inner.capacity {
                    let Some(tail) = inner.tail else { break };
                    let fp = inner.evict_slot(tail);
                    inner.len -= 1;
                    inner.evictions += 1;
                    evicted.push(fp);
                }
            }
        }
        self.emit_evictions(evicted);
        hit
    }

    /// Detach every entry for `id`, emit their paths for removal, and
    /// return the number removed.
    pub fn delete(&self, id: u64) -> usize {
        let evicted = {
            let mut inner = self.inner.write().unwrap();
            let handles = inner.by_id.remove(&id).unwrap_or_default();
            let mut paths = Vec::with_capacity(handles.len());
            for h in handles {
                let fp = inner.evict_slot(h);
                inner.len -= 1;
                inner.evictions += 1;
                paths.push(fp);
            }
            paths
        };
        let count = evicted.len();
        self.emit_evictions(evicted);
        count
    }

    /// All fingerprints currently indexed for `id`, in no particular order.
    /// Does not promote.
    pub fn get(&self, id: u64) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner
            .by_id
            .get(&id)
            .map(|handles| handles.iter().map(|&h| inner.slot(h).fingerprint.clone()).collect())
            .unwrap_or_default()
    }

    /// Every fingerprint currently indexed, across all ids. Does not
    /// promote; used by aggregate stat reporting (spec §4.1 `Stat`).
    pub fn all_fingerprints(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.by_fingerprint.keys().cloned().collect()
    }

    pub fn stat(&self) -> LruStat {
        let inner = self.inner.read().unwrap();
        LruStat {
            items: inner.len,
            capacity: inner.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    fn emit_evictions(&self, fingerprints: Vec<String>) {
        for fp in fingerprints {
            let path = self.cache_dir.join(&fp);
            if self.remover_tx.send(path).is_err() {
                tracing::warn!(fingerprint = %fp, "remover channel closed; dropping eviction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_lru(capacity: usize) -> (Lru, tokio::sync::mpsc::UnboundedReceiver<PathBuf>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Lru::new(capacity, PathBuf::from("/cache"), tx), rx)
    }

    #[test]
    fn miss_then_hit() {
        let (lru, _rx) = new_lru(4);
        assert!(!lru.add_or_update(1, "a"));
        assert!(lru.add_or_update(1, "a"));
        let stat = lru.stat();
        assert_eq!(stat.hits, 1);
        assert_eq!(stat.misses, 1);
        assert_eq!(stat.evictions, 0);
        assert_eq!(stat.items, 1);
    }

    #[test]
    fn eviction_order_is_lru() {
        let (lru, mut rx) = new_lru(3);
        assert!(!lru.add_or_update(1, "a")); // tail after inserts: a
        assert!(!lru.add_or_update(2, "b"));
        assert!(!lru.add_or_update(3, "c")); // head: c, then b, then a (tail)
        assert!(lru.add_or_update(1, "a")); // promote a to head: a, c, b (tail)
        assert!(!lru.add_or_update(4, "d")); // evicts tail = b

        let stat = lru.stat();
        assert_eq!(stat.evictions, 1);
        assert_eq!(stat.items, 3);
        let evicted_path = rx.try_recv().unwrap();
        assert_eq!(evicted_path, PathBuf::from("/cache/b"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn never_exceeds_capacity() {
        let (lru, _rx) = new_lru(2);
        for i in 0..10u64 {
            lru.add_or_update(i, &i.to_string());
            assert!(lru.stat().items <= 2);
        }
    }

    #[test]
    fn delete_removes_all_entries_for_id() {
        let (lru, mut rx) = new_lru(10);
        lru.add_or_update(1, "a1");
        lru.add_or_update(1, "a2");
        lru.add_or_update(1, "a3");
        lru.add_or_update(2, "b1");

        let removed = lru.delete(1);
        assert_eq!(removed, 3);
        assert!(lru.get(1).is_empty());
        assert_eq!(lru.get(2), vec!["b1".to_string()]);
        assert_eq!(lru.stat().items, 1);
        assert_eq!(lru.stat().evictions, 3);

        let mut paths: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![PathBuf::from("/cache/a1"), PathBuf::from("/cache/a2"), PathBuf::from("/cache/a3")]
        );
    }

    #[test]
    fn id_to_fingerprint_index_matches_primary_map() {
        let (lru, _rx) = new_lru(10);
        lru.add_or_update(5, "x");
        lru.add_or_update(5, "y");
        assert!(lru.contains("x"));
        assert!(lru.contains("y"));
        let mut fps = lru.get(5);
        fps.sort();
        assert_eq!(fps, vec!["x".to_string(), "y".to_string()]);
    }
}
