use std::num::NonZeroUsize;

use lru::LruCache;

use crate::error::{HarnessError, Result};

use super::CompiledFragment;

/// Strict LRU cache from snippet text to its compiled fragment.
///
/// Every read promotes the entry to most-recently-used; inserting into a full cache evicts exactly
/// the least-recently-used entry.
#[derive(Debug)]
pub struct EvalCache {
    inner: LruCache<String, CompiledFragment>,
}

impl EvalCache {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: LruCache::new(capacity) }
    }

    pub fn get(&mut self, snippet: &str) -> Option<CompiledFragment> {
        self.inner.get(snippet).cloned()
    }

    /// Whether `snippet` is cached, without promoting it.
    pub fn contains(&self, snippet: &str) -> bool {
        self.inner.contains(snippet)
    }

    /// Inserts a fragment, returning the snippet evicted to make room for it.
    pub fn insert(&mut self, snippet: String, fragment: CompiledFragment) -> Result<Option<String>> {
        let evicted = match self.inner.push(snippet.clone(), fragment) {
            Some((key, _)) if key != snippet => Some(key),
            _ => None,
        };
        if let Some(key) = &evicted {
            trace!(evicted = key.as_str(), "eval cache full");
        }

        let (len, capacity) = (self.inner.len(), self.inner.cap().get());
        if len > capacity {
            return Err(HarnessError::CacheInvariantViolation { len, capacity });
        }

        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}
