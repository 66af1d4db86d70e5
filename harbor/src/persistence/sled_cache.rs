use crate::clock::Clock;
use crate::domain::{CacheEntry, CacheStats, bytes_to_mb, round2};
use crate::ports::CacheStore;
use chrono::{DateTime, Duration, Utc};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::config::CacheSettings;
use shared::{Error, Result};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Transactional, Tree};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

const DB_FILE: &str = "cache.db";
const ENTRIES_TREE: &str = "cache_entries";
const VALUES_TREE: &str = "cache_values";
const RECENCY_TREE: &str = "cache_recency";

// ~114 years; keeps chrono's Duration::hours clear of overflow
const MAX_TTL_HOURS: u64 = 1_000_000;

/// Bookkeeping stored alongside each payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct EntryMeta {
    created_at: DateTime<Utc>,
    access_count: u64,
    last_accessed: DateTime<Utc>,
    /// Position in the recency index. Unique and strictly increasing per access.
    tick: u64,
}

/// Sled-backed cache store.
///
/// Three trees hold the state: entry metadata, serialized payloads, and a
/// recency index keyed by `tick (big-endian) ++ key`. Iterating the index
/// from the front yields entries least recently accessed first, which is
/// the eviction order. The three trees are only ever written together
/// inside one sled transaction.
pub struct SledCacheStore {
    db: sled::Db,
    entries: Tree,
    values: Tree,
    recency: Tree,
    settings: CacheSettings,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    lock: ReentrantMutex<()>,
    len: AtomicUsize,
    next_tick: AtomicU64,
}

impl SledCacheStore {
    /// Open (or create) the cache under `settings.cache_dir`.
    ///
    /// An unusable directory is a configuration error. Entries that expired
    /// while the process was down are swept before this returns.
    pub fn open(settings: CacheSettings, clock: Arc<dyn Clock>) -> Result<Self> {
        std::fs::create_dir_all(&settings.cache_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create cache directory {}: {}",
                settings.cache_dir.display(),
                e
            ))
        })?;

        let db = sled::open(settings.cache_dir.join(DB_FILE))
            .map_err(|e| Error::Config(format!("Failed to open cache database: {}", e)))?;

        let entries = db.open_tree(ENTRIES_TREE).map_err(storage_failure)?;
        let values = db.open_tree(VALUES_TREE).map_err(storage_failure)?;
        let recency = db.open_tree(RECENCY_TREE).map_err(storage_failure)?;

        let next_tick = match recency.last().map_err(storage_failure)? {
            Some((index_key, _)) => decode_tick(&index_key) + 1,
            None => 0,
        };

        let settings = CacheSettings {
            max_size: settings.max_size.max(1),
            ..settings
        };
        let ttl = Duration::hours(settings.ttl_hours.min(MAX_TTL_HOURS) as i64);

        let store = Self {
            len: AtomicUsize::new(entries.len()),
            next_tick: AtomicU64::new(next_tick),
            db,
            entries,
            values,
            recency,
            settings,
            ttl,
            clock,
            lock: ReentrantMutex::new(()),
        };

        let purged = store.try_purge_expired()?;
        info!(
            cache_dir = %store.settings.cache_dir.display(),
            entries = store.len(),
            purged,
            "cache store opened"
        );

        Ok(store)
    }

    /// Number of entries physically present, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock();

        let Some(mut meta) = self.load_meta_or_discard(key)? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if self.is_expired(&meta, now) {
            debug!(key, "cache entry expired, removing");
            self.remove_entry(key)?;
            return Ok(None);
        }

        let Some(payload) = self.values.get(key.as_bytes()).map_err(storage_failure)? else {
            warn!(key, "cache entry has no payload, removing");
            self.remove_entry(key)?;
            return Ok(None);
        };
        let value: Value = serde_json::from_slice(&payload)?;

        let stale_tick = meta.tick;
        meta.access_count += 1;
        meta.last_accessed = now;
        meta.tick = self.next_tick();
        // Counter updates ride on sled's periodic flush
        self.write_entry(key, &meta, None, Some(stale_tick))?;

        Ok(Some(value))
    }

    fn try_set(&self, key: &str, value: &Value) -> Result<()> {
        let _guard = self.lock.lock();

        let payload = serde_json::to_vec(value)?;
        let stale_tick = self.load_meta_or_discard(key)?.map(|p| p.tick);
        let is_new = stale_tick.is_none();

        if is_new {
            self.evict_if_needed()?;
        }

        let now = self.clock.now();
        let meta = EntryMeta {
            created_at: now,
            access_count: 0,
            last_accessed: now,
            tick: self.next_tick(),
        };
        self.write_entry(key, &meta, Some(&payload), stale_tick)?;

        if is_new {
            self.len.fetch_add(1, Ordering::SeqCst);
        }

        self.flush()
    }

    fn try_delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        if self.remove_entry(key)? {
            self.flush()?;
        }
        Ok(())
    }

    fn try_clear(&self) -> Result<()> {
        let _guard = self.lock.lock();

        self.entries.clear().map_err(storage_failure)?;
        self.values.clear().map_err(storage_failure)?;
        self.recency.clear().map_err(storage_failure)?;
        self.len.store(0, Ordering::SeqCst);

        info!("cache cleared");
        self.flush()
    }

    fn try_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let _guard = self.lock.lock();

        let Some(meta) = self.load_meta(key)? else {
            return Ok(None);
        };
        if self.is_expired(&meta, self.clock.now()) {
            return Ok(None);
        }
        let Some(payload) = self.values.get(key.as_bytes()).map_err(storage_failure)? else {
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            key: key.to_string(),
            value: serde_json::from_slice(&payload)?,
            created_at: meta.created_at,
            access_count: meta.access_count,
            last_accessed: meta.last_accessed,
        }))
    }

    fn try_purge_expired(&self) -> Result<usize> {
        let _guard = self.lock.lock();
        let now = self.clock.now();

        let mut doomed = Vec::new();
        for item in self.entries.iter() {
            let (key, raw) = item.map_err(storage_failure)?;
            let key = String::from_utf8_lossy(&key).into_owned();
            match serde_json::from_slice::<EntryMeta>(&raw) {
                Ok(meta) if self.is_expired(&meta, now) => doomed.push(key),
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "unreadable cache entry, removing");
                    doomed.push(key);
                }
            }
        }

        let mut purged = 0;
        for key in &doomed {
            if self.remove_entry(key)? {
                purged += 1;
            }
        }

        if purged > 0 {
            info!(purged, "removed expired cache entries");
            self.flush()?;
        }
        Ok(purged)
    }

    fn try_stats(&self) -> Result<CacheStats> {
        let _guard = self.lock.lock();
        let now = self.clock.now();

        let mut live = 0usize;
        let mut expired_pending = 0usize;
        let mut total_accesses = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for item in self.entries.iter() {
            let (_, raw) = item.map_err(storage_failure)?;
            let Ok(meta) = serde_json::from_slice::<EntryMeta>(&raw) else {
                continue;
            };
            if self.is_expired(&meta, now) {
                expired_pending += 1;
                continue;
            }

            live += 1;
            total_accesses += meta.access_count;
            oldest = Some(oldest.map_or(meta.created_at, |o| o.min(meta.created_at)));
            newest = Some(newest.map_or(meta.created_at, |n| n.max(meta.created_at)));
        }

        let avg_accesses = if live == 0 {
            0.0
        } else {
            round2(total_accesses as f64 / live as f64)
        };

        Ok(CacheStats {
            total_entries: live,
            expired_pending,
            max_size: self.settings.max_size,
            ttl_hours: self.settings.ttl_hours,
            total_accesses,
            avg_accesses,
            oldest_entry: oldest,
            newest_entry: newest,
            cache_dir: self.settings.cache_dir.display().to_string(),
            db_size_mb: bytes_to_mb(self.db.size_on_disk().map_err(storage_failure)?),
        })
    }

    /// Make room for one more entry, removing the least recently accessed
    /// entries plus a small margin so the next inserts do not each pay for
    /// an eviction pass.
    fn evict_if_needed(&self) -> Result<usize> {
        let _guard = self.lock.lock();
        let max_size = self.settings.max_size;
        let margin = self.settings.eviction_margin.min(max_size / 10);

        let mut evicted = 0;
        loop {
            let count = self.len();
            if count < max_size {
                break;
            }
            let excess = count + 1 - max_size + margin;

            let mut victims = Vec::with_capacity(excess);
            for item in self.recency.iter().take(excess) {
                let (index_key, key) = item.map_err(storage_failure)?;
                victims.push((index_key, String::from_utf8_lossy(&key).into_owned()));
            }

            let mut removed = 0;
            if victims.is_empty() {
                warn!(count, "recency index is empty on a full cache, evicting by last access");
                self.len.store(self.entries.len(), Ordering::SeqCst);
                if self.len() < max_size {
                    break;
                }
                let excess = self.len() + 1 - max_size + margin;
                for key in self.oldest_entries(excess)? {
                    if self.remove_entry(&key)? {
                        removed += 1;
                    }
                }
            } else {
                for (index_key, key) in victims {
                    // An index record is stale when the entry has since moved to another tick
                    let current_tick = self.load_meta(&key).ok().flatten().map(|m| m.tick);
                    if current_tick == Some(decode_tick(&index_key)) || current_tick.is_none() {
                        if self.remove_entry(&key)? {
                            removed += 1;
                        }
                    }
                    self.recency.remove(index_key).map_err(storage_failure)?;
                }
            }

            evicted += removed;
            if removed == 0 && self.recency.is_empty() && self.len() >= max_size {
                warn!(count = self.len(), "no evictable cache entries found");
                break;
            }
        }

        if evicted > 0 {
            info!(evicted, max_size, "evicted least recently accessed cache entries");
        }
        Ok(evicted)
    }

    /// Remove an entry from all three trees. Returns whether it existed.
    fn remove_entry(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock();

        // A corrupt metadata row must still be removable.
        let stale_index = self
            .entries
            .get(key.as_bytes())
            .map_err(storage_failure)?
            .and_then(|raw| serde_json::from_slice::<EntryMeta>(&raw).ok())
            .map(|meta| recency_key(meta.tick, key));

        let existed = (&self.entries, &self.values, &self.recency)
            .transaction(
                |(entries, values, recency)| -> ConflictableTransactionResult<bool, ()> {
                    let existed = entries.remove(key.as_bytes())?.is_some();
                    values.remove(key.as_bytes())?;
                    if let Some(index_key) = &stale_index {
                        recency.remove(index_key.as_slice())?;
                    }
                    Ok(existed)
                },
            )
            .map_err(tx_failure)?;

        if existed {
            let _ = self
                .len
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
        }
        Ok(existed)
    }

    /// Write metadata (and optionally the payload) and move the entry to
    /// its new place in the recency index.
    fn write_entry(
        &self,
        key: &str,
        meta: &EntryMeta,
        payload: Option<&[u8]>,
        stale_tick: Option<u64>,
    ) -> Result<()> {
        let meta_bytes = serde_json::to_vec(meta)?;
        let index_key = recency_key(meta.tick, key);
        let stale_index = stale_tick.map(|tick| recency_key(tick, key));

        (&self.entries, &self.values, &self.recency)
            .transaction(
                |(entries, values, recency)| -> ConflictableTransactionResult<(), ()> {
                    if let Some(stale) = &stale_index {
                        recency.remove(stale.as_slice())?;
                    }
                    entries.insert(key.as_bytes(), meta_bytes.as_slice())?;
                    if let Some(payload) = payload {
                        values.insert(key.as_bytes(), payload)?;
                    }
                    recency.insert(index_key.as_slice(), key.as_bytes())?;
                    Ok(())
                },
            )
            .map_err(tx_failure)
    }

    fn load_meta(&self, key: &str) -> Result<Option<EntryMeta>> {
        match self.entries.get(key.as_bytes()).map_err(storage_failure)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Like `load_meta`, but an undecodable row is removed and reads as absent.
    fn load_meta_or_discard(&self, key: &str) -> Result<Option<EntryMeta>> {
        let Some(raw) = self.entries.get(key.as_bytes()).map_err(storage_failure)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(key, error = %e, "unreadable cache entry, removing");
                self.remove_entry(key)?;
                Ok(None)
            }
        }
    }

    /// Keys ordered by last access, oldest first. Unreadable rows come first.
    fn oldest_entries(&self, limit: usize) -> Result<Vec<String>> {
        let mut ranked = Vec::new();
        for item in self.entries.iter() {
            let (key, raw) = item.map_err(storage_failure)?;
            let rank = serde_json::from_slice::<EntryMeta>(&raw)
                .ok()
                .map(|meta| (meta.last_accessed, meta.tick));
            ranked.push((rank, String::from_utf8_lossy(&key).into_owned()));
        }
        // None sorts before Some
        ranked.sort();
        Ok(ranked.into_iter().take(limit).map(|(_, key)| key).collect())
    }

    fn is_expired(&self, meta: &EntryMeta, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(meta.created_at) > self.ttl
    }

    fn next_tick(&self) -> u64 {
        self.next_tick.fetch_add(1, Ordering::SeqCst)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(storage_failure)?;
        Ok(())
    }
}

impl CacheStore for SledCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.try_get(key)
            .inspect_err(|e| error!(op = "get", key, error = %e, "cache operation failed"))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.try_set(key, value)
            .inspect_err(|e| error!(op = "set", key, error = %e, "cache operation failed"))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.try_delete(key)
            .inspect_err(|e| error!(op = "delete", key, error = %e, "cache operation failed"))
    }

    fn clear(&self) -> Result<()> {
        self.try_clear()
            .inspect_err(|e| error!(op = "clear", error = %e, "cache operation failed"))
    }

    fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.try_entry(key)
            .inspect_err(|e| error!(op = "entry", key, error = %e, "cache operation failed"))
    }

    fn purge_expired(&self) -> Result<usize> {
        self.try_purge_expired()
            .inspect_err(|e| error!(op = "purge_expired", error = %e, "cache operation failed"))
    }

    fn stats(&self) -> Result<CacheStats> {
        self.try_stats()
            .inspect_err(|e| error!(op = "stats", error = %e, "cache operation failed"))
    }
}

impl Drop for SledCacheStore {
    fn drop(&mut self) {
        // Persist access counters that were only written in memory
        if let Err(e) = self.db.flush() {
            warn!(error = %e, "failed to flush cache database on shutdown");
        }
    }
}

impl std::fmt::Debug for SledCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledCacheStore")
            .field("cache_dir", &self.settings.cache_dir)
            .field("entries", &self.len())
            .field("max_size", &self.settings.max_size)
            .field("ttl_hours", &self.settings.ttl_hours)
            .finish()
    }
}

fn recency_key(tick: u64, key: &str) -> Vec<u8> {
    let mut index_key = Vec::with_capacity(8 + key.len());
    index_key.extend_from_slice(&tick.to_be_bytes());
    index_key.extend_from_slice(key.as_bytes());
    index_key
}

fn decode_tick(index_key: &[u8]) -> u64 {
    let mut tick = [0u8; 8];
    let n = index_key.len().min(8);
    tick[..n].copy_from_slice(&index_key[..n]);
    u64::from_be_bytes(tick)
}

fn storage_failure(err: sled::Error) -> Error {
    Error::StorageFailure(err.to_string())
}

fn tx_failure(err: TransactionError<()>) -> Error {
    match err {
        TransactionError::Abort(()) => Error::StorageFailure("transaction aborted".to_string()),
        TransactionError::Storage(e) => storage_failure(e),
    }
}
