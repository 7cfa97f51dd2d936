//! In-process [`PullEventStore`] and [`PullStatisticsStore`] implementations.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tagview_core::OciDigest;
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::events::{fields, PullEventStore};
use crate::statistics::{
    ManifestPullStatistics, ManifestPullUpdate, PullStatisticsStore, TagPullStatistics,
    TagPullUpdate,
};

/// Only the trailing-`*` form of Redis glob patterns is supported; anything else must match
/// exactly.
fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

/// Keys are kept ordered so a scan cursor is simply an offset into the keyspace.
#[derive(Clone, Debug, Default)]
pub struct MemoryPullEventStore {
    events: Arc<RwLock<BTreeMap<String, HashMap<String, String>>>>,
}

impl MemoryPullEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the hash at `key` wholesale.
    pub async fn insert(&self, key: impl Into<String>, fields: HashMap<String, String>) {
        self.events.write().await.insert(key.into(), fields);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.events.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl PullEventStore for MemoryPullEventStore {
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let events = self.events.read().await;
        let start = cursor as usize;
        let examined = count.max(1);
        let keys = events
            .keys()
            .skip(start)
            .take(examined)
            .filter(|k| matches_pattern(pattern, k))
            .cloned()
            .collect();
        let next = start + examined;
        let next = if next >= events.len() { 0 } else { next as u64 };
        Ok((next, keys))
    }

    async fn fields(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.events.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut events = self.events.write().await;
        Ok(keys.iter().filter(|k| events.remove(*k).is_some()).count())
    }

    async fn record(
        &self,
        key: &str,
        values: HashMap<String, String>,
        increment: i64,
    ) -> Result<()> {
        let mut events = self.events.write().await;
        let entry = events.entry(key.to_string()).or_default();
        let current = entry
            .get(fields::PULL_COUNT)
            .and_then(|c| c.parse::<i64>().ok())
            .unwrap_or(0);
        entry.extend(values);
        entry.insert(
            fields::PULL_COUNT.to_string(),
            current.saturating_add(increment).to_string(),
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryPullStatisticsStore {
    tags: Arc<RwLock<HashMap<(i64, String), TagPullStatistics>>>,
    manifests: Arc<RwLock<HashMap<(i64, OciDigest), ManifestPullStatistics>>>,
}

impl MemoryPullStatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PullStatisticsStore for MemoryPullStatisticsStore {
    async fn bulk_upsert_tag_statistics(&self, updates: &[TagPullUpdate]) -> Result<usize> {
        let mut tags = self.tags.write().await;
        for update in updates {
            tags.entry((update.repository_id, update.tag_name.clone()))
                .and_modify(|s| s.apply(update))
                .or_insert_with(|| TagPullStatistics::from(update));
        }
        Ok(updates.len())
    }

    async fn bulk_upsert_manifest_statistics(
        &self,
        updates: &[ManifestPullUpdate],
    ) -> Result<usize> {
        let mut manifests = self.manifests.write().await;
        for update in updates {
            manifests
                .entry((update.repository_id, update.manifest_digest.clone()))
                .and_modify(|s| s.apply(update))
                .or_insert_with(|| ManifestPullStatistics::from(update));
        }
        Ok(updates.len())
    }

    async fn tag_statistics(
        &self,
        repository_id: i64,
        tag_name: &str,
    ) -> Result<Option<TagPullStatistics>> {
        Ok(self
            .tags
            .read()
            .await
            .get(&(repository_id, tag_name.to_string()))
            .cloned())
    }

    async fn manifest_statistics(
        &self,
        repository_id: i64,
        digest: &OciDigest,
    ) -> Result<Option<ManifestPullStatistics>> {
        Ok(self
            .manifests
            .read()
            .await
            .get(&(repository_id, digest.clone()))
            .cloned())
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::prefix("pull_events:*", "pull_events:repo:1:digest:x", true)]
    #[case::other_prefix("pull_events:*", "tag_cache:1", false)]
    #[case::exact("pull_events:a", "pull_events:a", true)]
    #[case::exact_mismatch("pull_events:a", "pull_events:ab", false)]
    fn matches_glob(#[case] pattern: &str, #[case] key: &str, #[case] expected: bool) {
        assert_eq!(matches_pattern(pattern, key), expected);
    }

    #[tokio::test]
    async fn scan_walks_whole_keyspace() {
        let store = MemoryPullEventStore::new();
        for i in 0..7 {
            store
                .insert(format!("pull_events:{i}"), HashMap::new())
                .await;
        }
        store.insert("other:1", HashMap::new()).await;

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (next, keys) = store.scan(cursor, "pull_events:*", 3).await.unwrap();
            seen.extend(keys);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen.len(), 7);
        assert!(seen.iter().all(|k| k.starts_with("pull_events:")));
    }

    #[tokio::test]
    async fn record_increments_count() {
        let store = MemoryPullEventStore::new();
        let fields: HashMap<String, String> =
            [(String::from("tag_name"), String::from("latest"))].into();
        store.record("pull_events:k", fields.clone(), 1).await.unwrap();
        store.record("pull_events:k", fields, 2).await.unwrap();

        let stored = store.fields("pull_events:k").await.unwrap();
        assert_eq!(stored["pull_count"], "3");
        assert_eq!(stored["tag_name"], "latest");

        assert_eq!(
            store
                .delete(&[String::from("pull_events:k"), String::from("missing")])
                .await
                .unwrap(),
            1
        );
        assert!(store.fields("pull_events:k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_saturates_count() {
        let store = MemoryPullEventStore::new();
        store
            .record("pull_events:k", HashMap::new(), i64::MAX)
            .await
            .unwrap();
        store.record("pull_events:k", HashMap::new(), 1).await.unwrap();
        let stored = store.fields("pull_events:k").await.unwrap();
        assert_eq!(stored["pull_count"], i64::MAX.to_string());
    }
}
