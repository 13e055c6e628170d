//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the core storage engine for DriftKV: a concurrent
//! map from keys to string values, each with an optional expiry instant.
//!
//! ## Design Decisions
//!
//! 1. **One RwLock**: the whole map sits behind a single reader/writer lock.
//!    GETs of live keys share the read lock; every write is exclusive.
//! 2. **Lazy Expiry**: expired entries are removed only when a read finds them.
//!    There is no background sweep, so an expired key that is never read again
//!    stays in memory.
//! 3. **Absolute deadlines**: a TTL is turned into an `Instant` once, at set time.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               StorageEngine                 │
//! │  ┌───────────────────────────────────────┐  │
//! │  │  RwLock<HashMap<Bytes, Entry>>        │  │
//! │  │                                       │  │
//! │  │  get (live key)   -> read lock        │  │
//! │  │  get (expired)    -> write lock       │  │
//! │  │  set              -> write lock       │  │
//! │  └───────────────────────────────────────┘  │
//! │  AtomicU64 counters (gets, sets, expired)   │
//! └─────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates a new entry that expires `ttl` from now.
    ///
    /// A TTL too large to represent as an `Instant` never expires.
    pub fn with_ttl(value: Bytes, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    /// Checks if this entry has expired.
    ///
    /// The deadline itself counts as expired, so a zero TTL is never observed.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// The main storage engine for DriftKV.
///
/// Designed to be wrapped in an `Arc` and shared by every connection task.
/// All operations take `&self`.
///
/// # Example
///
/// ```
/// use driftkv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(engine.get(&Bytes::from("name")), Some(Bytes::from("Ariz")));
///
/// // A zero TTL is already expired
/// engine.set_with_ttl(Bytes::from("gone"), Bytes::from("x"), Duration::ZERO);
/// assert_eq!(engine.get(&Bytes::from("gone")), None);
/// ```
pub struct StorageEngine {
    data: RwLock<HashMap<Bytes, Entry>>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: number of expired keys evicted on read
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    // Every mutation is a single insert or remove, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Entry>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Entry>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, key: Bytes, entry: Entry) {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.write().insert(key, entry);
    }

    /// Sets a key-value pair without expiry.
    ///
    /// Overwrites any existing entry, including its expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.insert(key, Entry::new(value))
    }

    /// Sets a key-value pair that expires `ttl` from now.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.insert(key, Entry::with_ttl(value, ttl))
    }

    /// Sets a key-value pair with a TTL in milliseconds, as given by `SET ... PX`.
    ///
    /// A negative `ttl_ms` means the entry never expires.
    pub fn set_px(&self, key: Bytes, value: Bytes, ttl_ms: i64) {
        match u64::try_from(ttl_ms) {
            Ok(ms) => self.set_with_ttl(key, value, Duration::from_millis(ms)),
            Err(_) => self.set(key, value),
        }
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired entry
    /// is removed as a side effect.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        // Fast path: shared lock for missing or live keys
        {
            let data = self.read();
            match data.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a writer may have replaced it
        let mut data = self.write();
        let entry = data.get(key)?;
        if !entry.is_expired() {
            return Some(entry.value.clone());
        }
        data.remove(key);
        self.expired_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Returns the number of entries held, including expired entries
    /// that have not been read since they expired.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of entries currently stored
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total expired keys evicted on read
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert_eq!(engine.get(&Bytes::from("key")), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(&Bytes::from("nonexistent")), None);
    }

    #[test]
    fn test_overwrite() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("v1"));
        engine.set(Bytes::from("key"), Bytes::from("v2"));
        assert_eq!(engine.get(&Bytes::from("key")), Some(Bytes::from("v2")));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let engine = StorageEngine::new();

        engine.set_px(Bytes::from("k"), Bytes::from("v"), 0);
        assert_eq!(engine.get(&Bytes::from("k")), None);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_negative_ttl_never_expires() {
        let engine = StorageEngine::new();

        engine.set_px(Bytes::from("k"), Bytes::from("v"), -1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.get(&Bytes::from("k")), Some(Bytes::from("v")));

        engine.set(Bytes::from("k2"), Bytes::from("v2"));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.get(&Bytes::from("k2")), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_ttl_expiry() {
        let engine = StorageEngine::new();

        engine.set_px(Bytes::from("temp"), Bytes::from("value"), 50);
        assert_eq!(engine.get(&Bytes::from("temp")), Some(Bytes::from("value")));

        thread::sleep(Duration::from_millis(80));
        assert_eq!(engine.get(&Bytes::from("temp")), None);
    }

    #[test]
    fn test_overwrite_clears_stale_ttl() {
        let engine = StorageEngine::new();

        engine.set_px(Bytes::from("k"), Bytes::from("v1"), 100);
        thread::sleep(Duration::from_millis(150));
        engine.set(Bytes::from("k"), Bytes::from("v2"));

        assert_eq!(engine.get(&Bytes::from("k")), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let engine = StorageEngine::new();

        engine.set_px(Bytes::from("k"), Bytes::from("v"), i64::MAX);
        assert_eq!(engine.get(&Bytes::from("k")), Some(Bytes::from("v")));
    }

    #[test]
    fn test_expired_entry_lingers_until_read() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::ZERO);
        // No sweeper: the entry is still held until someone reads it
        assert_eq!(engine.len(), 1);

        assert_eq!(engine.get(&Bytes::from("k")), None);
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired, 1);
    }

    #[test]
    fn test_entry_expiry() {
        let entry = Entry::new(Bytes::from("v"));
        assert!(!entry.is_expired());

        let entry = Entry::with_ttl(Bytes::from("v"), Duration::from_secs(60));
        assert!(!entry.is_expired());

        let entry = Entry::with_ttl(Bytes::from("v"), Duration::ZERO);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("a"), Bytes::from("1"));
        engine.set(Bytes::from("b"), Bytes::from("2"));
        engine.get(&Bytes::from("a"));
        engine.get(&Bytes::from("missing"));

        let stats = engine.stats();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.set_ops, 2);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.expired, 0);
    }

    #[test]
    fn test_concurrent_writers_then_readers() {
        let engine = Arc::new(StorageEngine::new());
        let n = 16;
        let per_thread = 500;

        let writers: Vec<_> = (0..n)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        engine.set(
                            Bytes::from(format!("key:{}:{}", t, i)),
                            Bytes::from(format!("value:{}:{}", t, i)),
                        );
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let readers: Vec<_> = (0..n)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        let value = engine.get(&Bytes::from(format!("key:{}:{}", t, i)));
                        assert_eq!(value, Some(Bytes::from(format!("value:{}:{}", t, i))));
                    }
                })
            })
            .collect();
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(engine.len(), n * per_thread);
    }

    #[test]
    fn test_concurrent_get_of_expired_key() {
        let engine = Arc::new(StorageEngine::new());
        engine.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::ZERO);

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || engine.get(&Bytes::from("k")))
            })
            .collect();
        for r in readers {
            assert_eq!(r.join().unwrap(), None);
        }

        // Exactly one reader performed the eviction
        assert_eq!(engine.stats().expired, 1);
        assert!(engine.is_empty());
    }
}
