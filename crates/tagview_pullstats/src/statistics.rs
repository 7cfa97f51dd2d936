use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tagview_core::OciDigest;

use crate::errors::Result;

/// Pulls of one tag accumulated since the last flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagPullUpdate {
    pub repository_id: i64,
    pub tag_name: String,
    pub manifest_digest: OciDigest,
    pub pull_count: i64,
    pub last_pull: Option<DateTime<Utc>>,
}

/// Pulls of one manifest (by tag or by digest) accumulated since the last flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestPullUpdate {
    pub repository_id: i64,
    pub manifest_digest: OciDigest,
    pub pull_count: i64,
    pub last_pull: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagPullStatistics {
    pub repository_id: i64,
    pub tag_name: String,
    pub tag_pull_count: i64,
    pub last_tag_pull_date: Option<DateTime<Utc>>,
    /// Manifest the tag pointed at when it was most recently pulled.
    pub current_manifest_digest: OciDigest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestPullStatistics {
    pub repository_id: i64,
    pub manifest_digest: OciDigest,
    pub manifest_pull_count: i64,
    pub last_manifest_pull_date: Option<DateTime<Utc>>,
}

/// Whether `candidate` is at least as recent as `current`. An unknown date never displaces a
/// known one.
fn is_newer(current: Option<DateTime<Utc>>, candidate: Option<DateTime<Utc>>) -> bool {
    match (current, candidate) {
        (_, None) => current.is_none(),
        (None, Some(_)) => true,
        (Some(cur), Some(cand)) => cand >= cur,
    }
}

impl From<&TagPullUpdate> for TagPullStatistics {
    fn from(u: &TagPullUpdate) -> Self {
        Self {
            repository_id: u.repository_id,
            tag_name: u.tag_name.clone(),
            tag_pull_count: u.pull_count,
            last_tag_pull_date: u.last_pull,
            current_manifest_digest: u.manifest_digest.clone(),
        }
    }
}

impl TagPullStatistics {
    /// Fold an update into existing statistics: counts add up (saturating at `i64::MAX`), the
    /// latest pull date is kept and the current manifest follows the most recent pull.
    pub fn apply(&mut self, update: &TagPullUpdate) {
        self.tag_pull_count = self.tag_pull_count.saturating_add(update.pull_count);
        if is_newer(self.last_tag_pull_date, update.last_pull) {
            self.current_manifest_digest = update.manifest_digest.clone();
            self.last_tag_pull_date = update.last_pull.or(self.last_tag_pull_date);
        }
    }
}

impl From<&ManifestPullUpdate> for ManifestPullStatistics {
    fn from(u: &ManifestPullUpdate) -> Self {
        Self {
            repository_id: u.repository_id,
            manifest_digest: u.manifest_digest.clone(),
            manifest_pull_count: u.pull_count,
            last_manifest_pull_date: u.last_pull,
        }
    }
}

impl ManifestPullStatistics {
    pub fn apply(&mut self, update: &ManifestPullUpdate) {
        self.manifest_pull_count = self
            .manifest_pull_count
            .saturating_add(update.pull_count);
        if is_newer(self.last_manifest_pull_date, update.last_pull) {
            self.last_manifest_pull_date = update.last_pull.or(self.last_manifest_pull_date);
        }
    }
}

/// Durable home of aggregated pull statistics.
#[async_trait]
pub trait PullStatisticsStore: Send + Sync + 'static {
    /// Insert or fold each update into the statistics of its tag, returning the number of rows
    /// written.
    async fn bulk_upsert_tag_statistics(&self, updates: &[TagPullUpdate]) -> Result<usize>;

    /// Insert or fold each update into the statistics of its manifest, returning the number of
    /// rows written.
    async fn bulk_upsert_manifest_statistics(&self, updates: &[ManifestPullUpdate])
        -> Result<usize>;

    async fn tag_statistics(
        &self,
        repository_id: i64,
        tag_name: &str,
    ) -> Result<Option<TagPullStatistics>>;

    async fn manifest_statistics(
        &self,
        repository_id: i64,
        digest: &OciDigest,
    ) -> Result<Option<ManifestPullStatistics>>;
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use rstest::*;

    use super::*;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }

    fn update(seed: &str, count: i64, last_pull: Option<DateTime<Utc>>) -> TagPullUpdate {
        TagPullUpdate {
            repository_id: 1,
            tag_name: String::from("latest"),
            manifest_digest: OciDigest::from(seed.as_bytes()),
            pull_count: count,
            last_pull,
        }
    }

    #[rstest]
    fn newer_pull_moves_current_manifest() {
        let mut stats = TagPullStatistics::from(&update("a", 2, at(100)));
        stats.apply(&update("b", 3, at(200)));
        assert_eq!(stats.tag_pull_count, 5);
        assert_eq!(stats.last_tag_pull_date, at(200));
        assert_eq!(stats.current_manifest_digest, OciDigest::from(b"b".as_slice()));
    }

    #[rstest]
    fn older_pull_only_adds_count() {
        let mut stats = TagPullStatistics::from(&update("a", 2, at(200)));
        stats.apply(&update("b", 1, at(100)));
        assert_eq!(stats.tag_pull_count, 3);
        assert_eq!(stats.last_tag_pull_date, at(200));
        assert_eq!(stats.current_manifest_digest, OciDigest::from(b"a".as_slice()));
    }

    #[rstest]
    #[case::known_then_unknown(at(100), None, at(100))]
    #[case::unknown_then_known(None, at(100), at(100))]
    #[case::both_unknown(None, None, None)]
    fn unknown_dates(
        #[case] first: Option<DateTime<Utc>>,
        #[case] second: Option<DateTime<Utc>>,
        #[case] expected: Option<DateTime<Utc>>,
    ) {
        let mut stats = ManifestPullStatistics::from(&ManifestPullUpdate {
            repository_id: 1,
            manifest_digest: OciDigest::from(b"a".as_slice()),
            pull_count: 1,
            last_pull: first,
        });
        stats.apply(&ManifestPullUpdate {
            repository_id: 1,
            manifest_digest: OciDigest::from(b"a".as_slice()),
            pull_count: 1,
            last_pull: second,
        });
        assert_eq!(stats.manifest_pull_count, 2);
        assert_eq!(stats.last_manifest_pull_date, expected);
    }

    #[rstest]
    fn counts_saturate() {
        let mut tag = TagPullStatistics::from(&update("a", i64::MAX, at(100)));
        tag.apply(&update("a", i64::MAX, at(200)));
        assert_eq!(tag.tag_pull_count, i64::MAX);
        assert_eq!(tag.last_tag_pull_date, at(200));

        let manifest_update = ManifestPullUpdate {
            repository_id: 1,
            manifest_digest: OciDigest::from(b"a".as_slice()),
            pull_count: i64::MAX,
            last_pull: at(100),
        };
        let mut manifest = ManifestPullStatistics::from(&manifest_update);
        manifest.apply(&manifest_update);
        assert_eq!(manifest.manifest_pull_count, i64::MAX);
    }
}
