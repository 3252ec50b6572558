//! Content-addressed compute cache
//!
//! Memoizes expensive computations behind a SQLite table keyed by a SHA-256
//! digest of the canonicalized request payload. Two payloads that differ only
//! in key ordering hash identically; any content difference changes the key.
//!
//! Concurrency contract: concurrent callers may race to compute the same key
//! when the store is cold; the producer runs outside the connection lock and
//! writes are idempotent upserts, so the last write wins without corruption.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Failures of the cache backing store.
/// The engine's own computation is total; only the store can fail.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache connection lock poisoned")]
    Lock,
}

/// Content-addressed memoization store
///
/// Construct once at startup and pass by reference wherever memoization is
/// needed; `disabled()` yields a cache that always computes and never
/// persists.
pub struct ComputeCache {
    conn: Option<Arc<Mutex<Connection>>>,
}

impl ComputeCache {
    /// Open (or create) the backing store at `path`
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Some(Arc::new(Mutex::new(conn))),
        })
    }

    /// In-memory store, for tests
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Some(Arc::new(Mutex::new(conn))),
        })
    }

    /// A cache with no backing store: every call invokes the producer
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Is a backing store configured?
    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Content hash of a canonicalized payload, as lowercase hex
    pub fn hash_payload(payload: &Value) -> String {
        let mut canonical = String::new();
        canonical_json(payload, &mut canonical);
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Return the stored `(value, meta)` for `payload`, or compute, store
    /// and return a fresh pair.
    ///
    /// A stored row that no longer parses as JSON is treated as a miss and
    /// overwritten. Shape validation of the value is the caller's job.
    pub fn get_or_compute<F>(&self, payload: &Value, producer: F) -> Result<(Value, Value), CacheError>
    where
        F: FnOnce() -> (Value, Value),
    {
        let Some(conn) = &self.conn else {
            return Ok(producer());
        };

        let key = Self::hash_payload(payload);

        {
            let conn = conn.lock().map_err(|_| CacheError::Lock)?;
            ensure_schema(&conn)?;
            let row: Option<(String, Option<String>)> = conn
                .query_row("SELECT v, meta FROM cache WHERE k = ?1", params![key], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;

            if let Some((value_text, meta_text)) = row {
                match decode_row(&value_text, meta_text.as_deref()) {
                    Some(pair) => {
                        tracing::debug!(key = %key, "cache hit");
                        return Ok(pair);
                    }
                    None => {
                        tracing::warn!(key = %key, "corrupted cache row, recomputing");
                    }
                }
            }
        }

        // Miss (or corrupt row). Run the producer without holding the lock.
        let (value, meta) = producer();
        let value_text = value.to_string();
        let meta_text = meta.to_string();
        let created = Utc::now().timestamp_micros() as f64 / 1e6;

        let conn = conn.lock().map_err(|_| CacheError::Lock)?;
        conn.execute(
            "INSERT OR REPLACE INTO cache (k, v, created, meta) VALUES (?1, ?2, ?3, ?4)",
            params![key, value_text, created, meta_text],
        )?;
        tracing::debug!(key = %key, "cache store");
        Ok((value, meta))
    }
}

/// Decode a stored row; `None` signals corruption
fn decode_row(value_text: &str, meta_text: Option<&str>) -> Option<(Value, Value)> {
    let value: Value = serde_json::from_str(value_text).ok()?;
    let meta = match meta_text {
        Some(text) if !text.is_empty() => serde_json::from_str(text).ok()?,
        _ => Value::Object(serde_json::Map::new()),
    };
    Some((value, meta))
}

/// Idempotent schema creation, safe to invoke on every open
fn ensure_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cache (
           k TEXT PRIMARY KEY,
           v TEXT NOT NULL,
           created REAL NOT NULL,
           meta TEXT
         )",
        [],
    )?;
    Ok(())
}

/// Deterministic JSON serialization: object keys sorted, arrays in order
fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                canonical_json(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        }
        other => {
            out.push_str(&other.to_string());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_hash_ignores_key_order() {
        let a = json!({"model": "labeler-v2", "window": 20, "data": [1, 2, 3]});
        let b = json!({"window": 20, "data": [1, 2, 3], "model": "labeler-v2"});
        assert_eq!(ComputeCache::hash_payload(&a), ComputeCache::hash_payload(&b));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = json!({"model": "labeler-v2", "window": 20});
        let b = json!({"model": "labeler-v2", "window": 21});
        assert_ne!(ComputeCache::hash_payload(&a), ComputeCache::hash_payload(&b));
    }

    #[test]
    fn test_hash_is_hex_digest() {
        let key = ComputeCache::hash_payload(&json!({"x": 1}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_nested_key_order() {
        let a = json!({"outer": {"b": 2, "a": 1}});
        let b = json!({"outer": {"a": 1, "b": 2}});
        assert_eq!(ComputeCache::hash_payload(&a), ComputeCache::hash_payload(&b));
    }

    #[test]
    fn test_producer_invoked_exactly_once() {
        let cache = ComputeCache::open_in_memory().unwrap();
        let payload = json!({"input": "abc"});
        let calls = Cell::new(0);

        let produce = || {
            calls.set(calls.get() + 1);
            (json!({"result": 42}), json!({"tokens": 7}))
        };
        let (v1, m1) = cache.get_or_compute(&payload, produce).unwrap();
        assert_eq!(v1, json!({"result": 42}));
        assert_eq!(m1, json!({"tokens": 7}));
        assert_eq!(calls.get(), 1);

        let (v2, m2) = cache
            .get_or_compute(&payload, || {
                calls.set(calls.get() + 1);
                (json!({"result": 99}), json!({}))
            })
            .unwrap();
        assert_eq!(v2, json!({"result": 42}));
        assert_eq!(m2, json!({"tokens": 7}));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_distinct_payloads_compute_separately() {
        let cache = ComputeCache::open_in_memory().unwrap();
        let (v1, _) = cache
            .get_or_compute(&json!({"n": 1}), || (json!(1), json!({})))
            .unwrap();
        let (v2, _) = cache
            .get_or_compute(&json!({"n": 2}), || (json!(2), json!({})))
            .unwrap();
        assert_eq!(v1, json!(1));
        assert_eq!(v2, json!(2));
    }

    #[test]
    fn test_disabled_cache_always_computes() {
        let cache = ComputeCache::disabled();
        assert!(!cache.is_enabled());
        let payload = json!({"input": "abc"});
        let calls = Cell::new(0);
        for _ in 0..3 {
            let (v, _) = cache
                .get_or_compute(&payload, || {
                    calls.set(calls.get() + 1);
                    (json!(calls.get()), json!({}))
                })
                .unwrap();
            assert_eq!(v, json!(calls.get()));
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_corrupted_row_treated_as_miss() {
        let cache = ComputeCache::open_in_memory().unwrap();
        let payload = json!({"input": "abc"});
        let key = ComputeCache::hash_payload(&payload);

        {
            let conn = cache.conn.as_ref().unwrap().lock().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO cache (k, v, created, meta) VALUES (?1, ?2, 0.0, NULL)",
                params![key, "{not json"],
            )
            .unwrap();
        }

        let (v, _) = cache
            .get_or_compute(&payload, || (json!({"fresh": true}), json!({})))
            .unwrap();
        assert_eq!(v, json!({"fresh": true}));

        // The corrupt row was overwritten; next call is a clean hit.
        let (v, _) = cache
            .get_or_compute(&payload, || (json!({"fresh": false}), json!({})))
            .unwrap();
        assert_eq!(v, json!({"fresh": true}));
    }

    #[test]
    fn test_null_meta_decodes_to_empty_object() {
        let cache = ComputeCache::open_in_memory().unwrap();
        let payload = json!({"input": "meta-test"});
        let key = ComputeCache::hash_payload(&payload);
        {
            let conn = cache.conn.as_ref().unwrap().lock().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO cache (k, v, created, meta) VALUES (?1, ?2, 0.0, NULL)",
                params![key, "{\"ok\":true}"],
            )
            .unwrap();
        }
        let (v, m) = cache
            .get_or_compute(&payload, || (json!(null), json!(null)))
            .unwrap();
        assert_eq!(v, json!({"ok": true}));
        assert_eq!(m, json!({}));
    }
}
