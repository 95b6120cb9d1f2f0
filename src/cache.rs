//! Bounded source-to-compiled-chain cache.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::debug;

use crate::compiler::{CompiledChain, compile};
use crate::context::{CompileOptions, ParserContext};
use crate::error::CompileError;

struct Entry {
    compiled: Arc<CompiledChain>,
    last_used: AtomicU64,
}

/// A size-capped LRU cache of compiled expressions keyed by source text.
///
/// Lookups take a shared lock and only bump the entry's recency stamp. A miss
/// compiles outside the lock and inserts with a second check, so an entry
/// inserted concurrently by another thread wins.
///
/// # Examples
///
/// ```
/// use mace_lang::ExpressionCache;
/// use std::sync::Arc;
///
/// let cache = ExpressionCache::new(16);
/// let first = cache.get_or_compile("a + b").unwrap();
/// let second = cache.get_or_compile("a + b").unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
pub struct ExpressionCache {
    entries: RwLock<HashMap<String, Entry>>,
    capacity: usize,
    options: CompileOptions,
    clock: AtomicU64,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        ExpressionCache::with_options(capacity, CompileOptions::default())
    }

    /// Cache compiling every entry with `options`.
    pub fn with_options(capacity: usize, options: CompileOptions) -> Self {
        ExpressionCache {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            options,
            clock: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.read().contains_key(source)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn lookup(&self, source: &str) -> Option<Arc<CompiledChain>> {
        let entries = self.entries.read();
        let entry = entries.get(source)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.compiled.clone())
    }

    /// The compiled chain for `source`, compiling it on a miss.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<CompiledChain>, CompileError> {
        if let Some(compiled) = self.lookup(source) {
            return Ok(compiled);
        }

        let compiled = Arc::new(compile(source, ParserContext::new(self.options.clone()))?);

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(source) {
            existing.last_used.store(self.tick(), Ordering::Relaxed);
            return Ok(existing.compiled.clone());
        }
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());
            let Some(oldest) = oldest else { break };
            entries.remove(&oldest);
            debug!(source = %oldest, "evicted compiled expression");
        }
        entries.insert(
            source.to_string(),
            Entry {
                compiled: compiled.clone(),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        Ok(compiled)
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = ExpressionCache::new(2);
        cache.get_or_compile("1 + a").unwrap();
        cache.get_or_compile("2 + a").unwrap();
        cache.get_or_compile("1 + a").unwrap();
        cache.get_or_compile("3 + a").unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("1 + a"));
        assert!(!cache.contains("2 + a"));
        assert!(cache.contains("3 + a"));
    }

    #[test]
    fn test_failed_compilation_is_not_cached() {
        let cache = ExpressionCache::new(4);
        assert!(cache.get_or_compile("a = (1 + 2").is_err());
        assert!(cache.is_empty());
    }
}
