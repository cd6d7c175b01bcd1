//! Least recently used set of loaded nodes, bounded by resident point count.
//!
//! Entries form a doubly linked list threaded through a [`Slab`], oldest
//! first, so touching, inserting and evicting are all O(1).

use crate::octree::node::{NodeId, OctreeNode};
use slab::Slab;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug)]
struct Entry {
    node: OctreeNode,
    points: u64,
    previous: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct LruCache {
    entries: Slab<Entry>,
    index: HashMap<NodeId, usize>,
    oldest: Option<usize>,
    newest: Option<usize>,
    num_points: u64,
    max_points: u64,
}

impl LruCache {
    pub fn new(max_points: u64) -> Self {
        Self {
            entries: Slab::new(),
            index: HashMap::new(),
            oldest: None,
            newest: None,
            num_points: 0,
            max_points,
        }
    }

    /// Total points held by resident nodes.
    pub fn size(&self) -> u64 {
        self.num_points
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_points(&self) -> u64 {
        self.max_points
    }

    pub fn set_max_points(&mut self, max_points: u64) -> usize {
        self.max_points = max_points;
        self.free_memory()
    }

    pub fn contains(&self, node: &OctreeNode) -> bool {
        self.index.contains_key(&node.id())
    }

    /// Mark `node` as most recently used, admitting it if it is loaded and
    /// not yet resident, then evict down to the budget.
    ///
    /// Returns the number of nodes evicted.
    pub fn touch(&mut self, node: &OctreeNode) -> usize {
        let (loaded, points) = {
            let inner = node.borrow();
            (inner.data.loaded, inner.data.num_points as u64)
        };

        match self.index.get(&node.id()).copied() {
            Some(key) if !loaded => {
                // disposed behind our back, drop the stale entry
                self.detach(key);
                return 0;
            }
            Some(key) => {
                self.unlink(key);
                self.push_newest(key);

                let entry = &mut self.entries[key];
                self.num_points = self.num_points - entry.points + points;
                entry.points = points;
            }
            None if !loaded => return 0,
            None => {
                let key = self.entries.insert(Entry {
                    node: node.clone(),
                    points,
                    previous: None,
                    next: None,
                });
                self.index.insert(node.id(), key);
                self.push_newest(key);
                self.num_points += points;
                trace!(node = ?node.id(), points, total = self.num_points, "node admitted");
            }
        }

        self.free_memory()
    }

    /// Drop `node` from the cache and dispose it.
    ///
    /// A node that is not resident is never disposed; if it is loading, that
    /// load is cancelled instead. Returns whether an entry was removed.
    pub fn remove(&mut self, node: &OctreeNode) -> bool {
        match self.index.get(&node.id()).copied() {
            Some(key) => {
                let entry = self.detach(key);
                release(&entry);
                true
            }
            None => {
                if node.cancel_load() {
                    trace!(node = ?node.id(), "in-flight load cancelled");
                }
                false
            }
        }
    }

    /// Evict least recently used nodes until the budget holds.
    pub fn free_memory(&mut self) -> usize {
        let mut evicted = 0;

        while self.num_points > self.max_points {
            let Some(key) = self.oldest else {
                break;
            };
            let entry = self.detach(key);
            release(&entry);
            evicted += 1;
            trace!(node = ?entry.node.id(), points = entry.points, total = self.num_points, "node evicted");
        }

        evicted
    }

    /// Resident nodes, least recently used first.
    pub fn snapshot(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.entries.len());
        let mut cursor = self.oldest;
        while let Some(key) = cursor {
            let entry = &self.entries[key];
            ids.push(entry.node.id());
            cursor = entry.next;
        }
        ids
    }

    fn detach(&mut self, key: usize) -> Entry {
        self.unlink(key);
        let entry = self.entries.remove(key);
        self.index.remove(&entry.node.id());
        self.num_points -= entry.points;
        entry
    }

    fn unlink(&mut self, key: usize) {
        let (previous, next) = {
            let entry = &mut self.entries[key];
            (entry.previous.take(), entry.next.take())
        };

        match previous {
            Some(previous) => self.entries[previous].next = next,
            None => self.oldest = next,
        }
        match next {
            Some(next) => self.entries[next].previous = previous,
            None => self.newest = previous,
        }
    }

    fn push_newest(&mut self, key: usize) {
        self.entries[key].previous = self.newest;
        match self.newest {
            Some(newest) => self.entries[newest].next = Some(key),
            None => self.oldest = Some(key),
        }
        self.newest = Some(key);
    }
}

/// Dispose a detached entry. A node that already went back to unloaded is
/// left alone, so a reload in flight is never touched.
fn release(entry: &Entry) {
    if entry.node.is_loaded() {
        entry.node.dispose();
    }
}
