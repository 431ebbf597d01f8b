use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{KVStore, Result};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process `KVStore` backed by a sharded hash map. Suitable for
/// single-node deployments and for tolerating transient backend loss; it is
/// not a substitute for a clustered backend in production.
#[derive(Clone, Default)]
pub struct InMemoryKVStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryKVStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(e) if e.is_live(now) => Some(e.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            },
            None => None,
        }
    }
}

#[async_trait]
impl KVStore for InMemoryKVStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let current: i64 = entry.value.parse().unwrap_or(0);
        let updated = current + delta;
        entry.value = updated.to_string();
        if let Some(d) = ttl {
            entry.expires_at = Some(now + d);
        }
        Ok(updated)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn check_and_incr(
        &self,
        key: &str,
        delta: i64,
        limit: i64,
        ttl: Duration,
    ) -> Result<Option<i64>> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let current: i64 = entry.value.parse().unwrap_or(0);
        let updated = current + delta;
        if updated > limit {
            return Ok(None);
        }
        entry.value = updated.to_string();
        entry.expires_at = Some(now + ttl);
        Ok(Some(updated))
    }

    async fn cas(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occ) => {
                let live = occ.get().is_live(now);
                let current = live.then(|| occ.get().value.clone());
                if current.as_deref() != expected {
                    return Ok(false);
                }
                occ.insert(Entry {
                    value: new.to_string(),
                    expires_at: ttl.map(|d| now + d),
                });
                Ok(true)
            },
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vac.insert(Entry {
                    value: new.to_string(),
                    expires_at: ttl.map(|d| now + d),
                });
                Ok(true)
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_set_roundtrip() {
        let kv = InMemoryKVStore::new();
        assert_eq!(kv.get("k").await.unwrap(), None);
        kv.set("k", "v", None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn ttl_expires_entry() {
        let kv = InMemoryKVStore::new();
        kv.set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(kv.exists("k").await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!kv.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn incr_by_accumulates() {
        let kv = InMemoryKVStore::new();
        assert_eq!(kv.incr_by("c", 1, None).await.unwrap(), 1);
        assert_eq!(kv.incr_by("c", 1, None).await.unwrap(), 2);
        assert_eq!(kv.incr_by("c", 5, None).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn check_and_incr_rejects_over_limit() {
        let kv = InMemoryKVStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(
            kv.check_and_incr("rpm", 1, 2, ttl).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            kv.check_and_incr("rpm", 1, 2, ttl).await.unwrap(),
            Some(2)
        );
        assert_eq!(kv.check_and_incr("rpm", 1, 2, ttl).await.unwrap(), None);
    }

    #[tokio::test]
    async fn check_and_incr_is_exact_under_concurrency() {
        let kv = Arc::new(InMemoryKVStore::new());
        let ttl = Duration::from_secs(60);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let kv = Arc::clone(&kv);
            handles.push(tokio::spawn(async move {
                kv.check_and_incr("rpm", 1, 5, ttl).await.unwrap().is_some()
            }));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[tokio::test]
    async fn cas_only_swaps_on_match() {
        let kv = InMemoryKVStore::new();
        assert!(kv.cas("s", None, "a", None).await.unwrap());
        assert!(!kv.cas("s", None, "b", None).await.unwrap());
        assert!(kv.cas("s", Some("a"), "b", None).await.unwrap());
        assert_eq!(kv.get("s").await.unwrap(), Some("b".to_string()));
    }
}
