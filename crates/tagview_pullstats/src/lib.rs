//! # Pull Statistics
//!
//! Registry pulls are counted in two stages. On the request path a [`PullRecorder`] bumps a
//! per-repository, per-tag-or-digest counter in a [`PullEventStore`] (a Redis-like hash store).
//! Off the request path a [`FlushWorker`] periodically scans those counters, validates them,
//! aggregates them into [`TagPullStatistics`] and [`ManifestPullStatistics`] held by a
//! [`PullStatisticsStore`], and deletes the counters it has accounted for.
//!
//! Counters are only deleted after the statistics write succeeds, so a failing statistics store
//! delays pull accounting but never loses it. Empty, malformed and zero-count counters are
//! discarded immediately.
pub mod errors;
pub use errors::{Error, Result};

mod config;
pub use config::PullStatisticsConfig;

pub mod events;
pub use events::{InvalidEvent, PullEvent, PullEventStore, PullMethod};

mod recorder;
pub use recorder::PullRecorder;

pub mod statistics;
pub use statistics::{
    ManifestPullStatistics, ManifestPullUpdate, PullStatisticsStore, TagPullStatistics,
    TagPullUpdate,
};

pub mod memory;
pub use memory::{MemoryPullEventStore, MemoryPullStatisticsStore};

mod worker;
pub use worker::{FlushConfig, FlushReport, FlushWorker};
