use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tagview_core::OciDigest;

use crate::errors::Result;
use crate::events::{digest_pull_key, fields, tag_pull_key, PullEventStore, PullMethod};

/// Request-path side of pull accounting: bumps the counter of each pull in a [`PullEventStore`]
/// for the [`FlushWorker`](crate::FlushWorker) to pick up later.
#[derive(Clone)]
pub struct PullRecorder {
    events: Arc<dyn PullEventStore>,
}

impl PullRecorder {
    pub fn new(events: Arc<dyn PullEventStore>) -> Self {
        Self { events }
    }

    pub async fn record_tag_pull(
        &self,
        repository_id: i64,
        tag: &str,
        digest: &OciDigest,
    ) -> Result<()> {
        self.record_tag_pull_at(repository_id, tag, digest, Utc::now())
            .await
    }

    pub async fn record_digest_pull(&self, repository_id: i64, digest: &OciDigest) -> Result<()> {
        self.record_digest_pull_at(repository_id, digest, Utc::now())
            .await
    }

    pub async fn record_tag_pull_at(
        &self,
        repository_id: i64,
        tag: &str,
        digest: &OciDigest,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let key = tag_pull_key(repository_id, tag, digest);
        let values = event_values(repository_id, Some(tag), digest, PullMethod::Tag, at);
        tracing::trace!(%key, "recording tag pull");
        self.events.record(&key, values, 1).await
    }

    pub async fn record_digest_pull_at(
        &self,
        repository_id: i64,
        digest: &OciDigest,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let key = digest_pull_key(repository_id, digest);
        let values = event_values(repository_id, None, digest, PullMethod::Digest, at);
        tracing::trace!(%key, "recording digest pull");
        self.events.record(&key, values, 1).await
    }
}

fn event_values(
    repository_id: i64,
    tag: Option<&str>,
    digest: &OciDigest,
    method: PullMethod,
    at: DateTime<Utc>,
) -> HashMap<String, String> {
    let mut values = HashMap::from([
        (fields::REPOSITORY_ID.to_string(), repository_id.to_string()),
        (fields::MANIFEST_DIGEST.to_string(), digest.to_string()),
        (
            fields::LAST_PULL_TIMESTAMP.to_string(),
            at.timestamp().to_string(),
        ),
        (fields::PULL_METHOD.to_string(), method.as_str().to_string()),
    ]);
    if let Some(tag) = tag {
        values.insert(fields::TAG_NAME.to_string(), tag.to_string());
    }
    values
}
