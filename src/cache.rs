//! An optional cache for decoded data blocks, keyed by the file they came
//! from and their on-disk handle. This is a safe `HashMap` + `VecDeque`
//! LRU rather than an intrusive linked list with raw pointers — the
//! trait boundary is what the reader actually needs, not a specific
//! cache implementation.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::block::Block;
use crate::blockhandle::BlockHandle;

/// Identifies a cached block: which file it came from, plus its handle
/// within that file. Callers mint `file_id` however they like (an inode
/// number, a sequence counter, a pointer's address) as long as it is
/// stable and unique for the lifetime of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file_id: u64,
    pub offset: u64,
}

impl CacheKey {
    pub fn new(file_id: u64, handle: &BlockHandle) -> CacheKey {
        CacheKey {
            file_id,
            offset: handle.offset,
        }
    }
}

/// A cache of decoded blocks, shared behind an `Arc` across readers.
pub trait BlockCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<Block>>;
    fn insert(&self, key: CacheKey, block: Arc<Block>);
}

struct Inner {
    map: HashMap<CacheKey, Arc<Block>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

/// A simple capacity-bounded LRU cache of decoded blocks.
pub struct LruBlockCache {
    inner: Mutex<Inner>,
}

impl LruBlockCache {
    pub fn new(capacity: usize) -> LruBlockCache {
        LruBlockCache {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    fn touch(order: &mut VecDeque<CacheKey>, key: &CacheKey) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push_back(*key);
    }
}

impl BlockCache for LruBlockCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<Block>> {
        let mut inner = self.inner.lock().unwrap();
        let found = inner.map.get(key).cloned();
        if found.is_some() {
            Self::touch(&mut inner.order, key);
        }
        found
    }

    fn insert(&self, key: CacheKey, block: Arc<Block>) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.map.contains_key(&key) && inner.map.len() >= inner.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
            }
        }
        inner.map.insert(key, block);
        Self::touch(&mut inner.order, &key);
    }
}
