use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::errors::Result;
use crate::events::{PullEvent, PullEventStore, PULL_EVENTS_PATTERN, PULL_EVENTS_PREFIX};
use crate::statistics::{ManifestPullUpdate, PullStatisticsStore, TagPullUpdate};

/// Keys deleted per store round trip.
const DELETE_BATCH_SIZE: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushConfig {
    /// Time between flushes.
    pub flush_interval: Duration,
    /// Maximum number of event keys accounted in one flush.
    pub batch_size: usize,
    /// Keys examined per scan call.
    pub scan_count: usize,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(300),
            batch_size: 1000,
            scan_count: 100,
        }
    }
}

/// Outcome of a single [`FlushWorker::flush`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Distinct event keys collected by the scan.
    pub scanned: usize,
    pub tag_updates: usize,
    pub manifest_updates: usize,
    /// Empty, invalid or zero-count keys discarded without accounting.
    pub discarded: usize,
    /// Keys deleted after their pulls were written to the statistics store.
    pub flushed: usize,
    /// Keys kept for the next flush because the statistics write failed.
    pub retained: usize,
}

#[derive(Debug, Default)]
struct Batch {
    tag_updates: Vec<TagPullUpdate>,
    manifest_updates: Vec<ManifestPullUpdate>,
    /// Safe to delete regardless of what happens to the statistics write.
    discardable: BTreeSet<String>,
    /// Only safe to delete once the statistics write succeeded.
    accounted: BTreeSet<String>,
}

/// Periodically moves pull event counters into pull statistics.
pub struct FlushWorker {
    events: Arc<dyn PullEventStore>,
    statistics: Arc<dyn PullStatisticsStore>,
    config: FlushConfig,
}

impl FlushWorker {
    pub fn new(
        events: Arc<dyn PullEventStore>,
        statistics: Arc<dyn PullStatisticsStore>,
        config: FlushConfig,
    ) -> Self {
        Self {
            events,
            statistics,
            config,
        }
    }

    pub fn config(&self) -> &FlushConfig {
        &self.config
    }

    /// Flush every `flush_interval` until `shutdown` carries `true` or its sender is dropped.
    /// Failed flushes are logged and retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.flush_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = period.as_secs(),
            batch_size = self.config.batch_size,
            "pull statistics flush worker started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.flush().await {
                        tracing::error!("error during pull metrics flush: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("pull statistics flush worker stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Run one flush. Only a failure to scan the event store is returned as an error; per-key and
    /// statistics store failures are logged and reflected in the [`FlushReport`].
    pub async fn flush(&self) -> Result<FlushReport> {
        let started = Instant::now();
        tracing::debug!("starting pull metrics flush");

        let keys = self.scan_keys().await?;
        if keys.is_empty() {
            tracing::debug!("no pull event keys found");
            return Ok(FlushReport::default());
        }
        tracing::info!("processing {} pull event keys", keys.len());

        let batch = self.process(&keys).await;
        let mut report = FlushReport {
            scanned: keys.len(),
            tag_updates: batch.tag_updates.len(),
            manifest_updates: batch.manifest_updates.len(),
            discarded: batch.discardable.len(),
            ..Default::default()
        };

        if !batch.discardable.is_empty() {
            self.delete_keys(&batch.discardable).await;
            tracing::debug!(
                "cleaned up {} empty or invalid keys",
                batch.discardable.len()
            );
        }

        if self
            .write_statistics(&batch.tag_updates, &batch.manifest_updates)
            .await
        {
            let failed = self.delete_keys(&batch.accounted).await;
            report.flushed = batch.accounted.len() - failed;
            tracing::info!(
                "processed {} keys ({} tag updates, {} manifest updates) in {:.2}s",
                report.discarded + report.flushed,
                report.tag_updates,
                report.manifest_updates,
                started.elapsed().as_secs_f64(),
            );
        } else {
            report.retained = batch.accounted.len();
            tracing::warn!(
                "statistics flush failed, keeping {} keys for retry",
                report.retained
            );
        }

        Ok(report)
    }

    /// Collect up to `batch_size` distinct event keys.
    async fn scan_keys(&self) -> Result<Vec<String>> {
        let limit = self.config.batch_size;
        let mut keys = BTreeSet::new();
        let mut cursor = 0;

        while keys.len() < limit {
            let (next, batch) = self
                .events
                .scan(cursor, PULL_EVENTS_PATTERN, self.config.scan_count)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys.into_iter().take(limit).collect())
    }

    async fn process(&self, keys: &[String]) -> Batch {
        let mut batch = Batch::default();

        for key in keys {
            if !key.starts_with(PULL_EVENTS_PREFIX) {
                continue;
            }

            let values = match self.events.fields(key).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!("error reading pull event key {key}: {e}");
                    continue;
                }
            };
            if values.is_empty() {
                batch.discardable.insert(key.clone());
                continue;
            }

            let event = match PullEvent::from_fields(&values) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!("discarding pull event key {key}: {e}");
                    batch.discardable.insert(key.clone());
                    continue;
                }
            };
            if event.pull_count == 0 {
                batch.discardable.insert(key.clone());
                continue;
            }

            batch.manifest_updates.push(event.manifest_update());
            if let Some(update) = event.tag_update() {
                batch.tag_updates.push(update);
            }
            batch.accounted.insert(key.clone());
        }

        batch
    }

    /// Write tag then manifest updates. Succeeds if any rows were written or there was nothing to
    /// write.
    async fn write_statistics(
        &self,
        tag_updates: &[TagPullUpdate],
        manifest_updates: &[ManifestPullUpdate],
    ) -> bool {
        let has_updates = !(tag_updates.is_empty() && manifest_updates.is_empty());
        let mut tag_count = 0;
        let mut manifest_count = 0;

        if !tag_updates.is_empty() {
            match self.statistics.bulk_upsert_tag_statistics(tag_updates).await {
                Ok(n) => {
                    tag_count = n;
                    tracing::info!("updated {n}/{} tag statistics", tag_updates.len());
                }
                Err(e) => {
                    tracing::error!("error writing tag statistics: {e}");
                    return false;
                }
            }
        }

        if !manifest_updates.is_empty() {
            match self
                .statistics
                .bulk_upsert_manifest_statistics(manifest_updates)
                .await
            {
                Ok(n) => {
                    manifest_count = n;
                    tracing::info!(
                        "updated {n}/{} manifest statistics",
                        manifest_updates.len()
                    );
                }
                Err(e) => {
                    tracing::error!("error writing manifest statistics: {e}");
                    return false;
                }
            }
        }

        tag_count > 0 || manifest_count > 0 || !has_updates
    }

    /// Delete `keys` in batches and return how many keys sat in batches that failed. A failing
    /// batch is logged and left for a later flush.
    async fn delete_keys(&self, keys: &BTreeSet<String>) -> usize {
        let keys: Vec<String> = keys.iter().cloned().collect();
        let mut failed = 0;

        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            match self.events.delete(chunk).await {
                Ok(n) if n != chunk.len() => {
                    // expired or removed by someone else in the meantime
                    tracing::debug!("expected to delete {} keys, deleted {n}", chunk.len());
                }
                Ok(n) => tracing::debug!("deleted {n} pull event keys"),
                Err(e) => {
                    tracing::warn!("failed to delete batch of pull event keys: {e}");
                    failed += chunk.len();
                }
            }
        }

        if failed > 0 {
            tracing::warn!("failed to delete {failed} pull event keys; they may be retried later");
        }
        failed
    }
}
