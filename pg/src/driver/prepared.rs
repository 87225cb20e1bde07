//! Server-side prepared statement cache.
//!
//! Grounded on the teacher's `driver/prepared.rs` statement-naming scheme
//! (`s{16 hex}`, a 64-bit hash of the SQL text) generalized into a proper
//! LRU cache with hit/miss counters (spec.md §4.4: "the cache reports
//! hits, misses, and a hit rate").

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use lru::LruCache;

/// A prepared statement handle: its server-side name plus bookkeeping.
#[derive(Clone, Debug)]
pub struct PreparedStatement {
    pub(crate) name: String,
    pub(crate) sql: String,
    pub(crate) param_count: usize,
}

impl PreparedStatement {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }
}

/// Deterministically name a statement from its canonical SQL text: `s` plus
/// 16 lowercase hex digits of a 64-bit hash.
pub fn statement_name(sql: &str) -> String {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    format!("s{:016x}", hasher.finish())
}

fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max_n = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > start
                && let Ok(n) = sql[start..j].parse::<usize>()
            {
                max_n = max_n.max(n);
            }
            i = j;
        } else {
            i += 1;
        }
    }
    max_n
}

/// LRU cache of server-side prepared statements, keyed by canonical SQL.
pub struct StatementCache {
    entries: LruCache<String, PreparedStatement>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a cached statement for `sql`, or mint a new (not-yet-parsed)
    /// handle. Returns `(statement, already_parsed)`.
    pub fn get_or_insert(&mut self, sql: &str) -> (PreparedStatement, bool) {
        if let Some(stmt) = self.entries.get(sql) {
            self.hits += 1;
            return (stmt.clone(), true);
        }
        self.misses += 1;
        let stmt = PreparedStatement {
            name: statement_name(sql),
            sql: sql.to_string(),
            param_count: count_params(sql),
        };
        if self.entries.len() >= self.entries.cap().get() {
            self.evictions += 1;
            tracing::warn!(sql_len = sql.len(), "statement cache evicting an entry");
        }
        self.entries.put(sql.to_string(), stmt.clone());
        (stmt, false)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_deterministic_and_shaped() {
        let a = statement_name("SELECT 1");
        let b = statement_name("SELECT 1");
        assert_eq!(a, b);
        assert!(a.starts_with('s'));
        assert_eq!(a.len(), 17);
    }

    #[test]
    fn counts_params() {
        assert_eq!(count_params("SELECT * FROM t WHERE a = $1 AND b = $2"), 2);
        assert_eq!(count_params("SELECT 1"), 0);
    }

    #[test]
    fn tracks_hits_and_misses() {
        let mut cache = StatementCache::new(2);
        let (_, hit1) = cache.get_or_insert("SELECT 1");
        assert!(!hit1);
        let (_, hit2) = cache.get_or_insert("SELECT 1");
        assert!(hit2);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn evicts_when_over_capacity() {
        let mut cache = StatementCache::new(1);
        cache.get_or_insert("SELECT 1");
        cache.get_or_insert("SELECT 2");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evictions(), 1);
    }
}
