//! Pull event counters as stored between the request path and the flush worker.
//!
//! Each counter is a hash stored under one of two keys:
//!
//! * `pull_events:repo:<repository_id>:tag:<tag_name>:<digest>` for pulls by tag
//! * `pull_events:repo:<repository_id>:digest:<digest>` for pulls by digest
//!
//! with the fields named in [`fields`].
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tagview_core::OciDigest;

use crate::errors::Result;
use crate::statistics::{ManifestPullUpdate, TagPullUpdate};

pub const PULL_EVENTS_PREFIX: &str = "pull_events:";
pub const PULL_EVENTS_PATTERN: &str = "pull_events:*";

/// Hash field names of a pull event counter.
pub mod fields {
    pub const REPOSITORY_ID: &str = "repository_id";
    pub const TAG_NAME: &str = "tag_name";
    pub const MANIFEST_DIGEST: &str = "manifest_digest";
    pub const PULL_COUNT: &str = "pull_count";
    pub const LAST_PULL_TIMESTAMP: &str = "last_pull_timestamp";
    pub const PULL_METHOD: &str = "pull_method";
}

pub fn tag_pull_key(repository_id: i64, tag: &str, digest: &OciDigest) -> String {
    format!("{PULL_EVENTS_PREFIX}repo:{repository_id}:tag:{tag}:{digest}")
}

pub fn digest_pull_key(repository_id: i64, digest: &OciDigest) -> String {
    format!("{PULL_EVENTS_PREFIX}repo:{repository_id}:digest:{digest}")
}

/// Storage for pull event counters, modelled on a Redis keyspace of hashes.
#[async_trait]
pub trait PullEventStore: Send + Sync + 'static {
    /// Examine up to `count` keys starting at `cursor` and return those matching `pattern`
    /// together with the cursor to continue from. A returned cursor of 0 means the scan is
    /// complete. Keys may be returned more than once across a full scan.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)>;

    /// All fields of the counter at `key`; empty if the key does not exist.
    async fn fields(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Delete `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// Add `increment` to the counter's `pull_count` and overwrite its other fields with
    /// `values`.
    async fn record(
        &self,
        key: &str,
        values: HashMap<String, String>,
        increment: i64,
    ) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullMethod {
    Tag,
    Digest,
}

impl PullMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullMethod::Tag => "tag",
            PullMethod::Digest => "digest",
        }
    }

    /// Anything other than `tag` counts as a pull by digest.
    fn from_field(s: Option<&str>) -> Self {
        match s {
            Some("tag") => PullMethod::Tag,
            _ => PullMethod::Digest,
        }
    }
}

/// Reasons a pull event counter is discarded without being accounted.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InvalidEvent {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("invalid repository_id: {0}")]
    RepositoryId(i64),
    #[error("invalid pull_count: {0}")]
    PullCount(i64),
    #[error("invalid timestamp: {0}")]
    Timestamp(i64),
    #[error("missing manifest_digest")]
    EmptyDigest,
    #[error("invalid manifest_digest: {0}")]
    Digest(String),
}

/// A validated pull event counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullEvent {
    pub repository_id: i64,
    pub tag_name: Option<String>,
    pub manifest_digest: OciDigest,
    pub pull_count: i64,
    /// `None` when the counter carries a zero timestamp.
    pub last_pull: Option<DateTime<Utc>>,
    pub method: PullMethod,
}

const REQUIRED_FIELDS: [&str; 4] = [
    fields::REPOSITORY_ID,
    fields::MANIFEST_DIGEST,
    fields::PULL_COUNT,
    fields::LAST_PULL_TIMESTAMP,
];

fn int_field(
    map: &HashMap<String, String>,
    field: &'static str,
) -> std::result::Result<i64, InvalidEvent> {
    let value = map.get(field).ok_or(InvalidEvent::MissingField(field))?;
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| InvalidEvent::NotAnInteger {
            field,
            value: value.clone(),
        })
}

impl PullEvent {
    /// Validate the raw hash fields of a counter.
    pub fn from_fields(map: &HashMap<String, String>) -> std::result::Result<Self, InvalidEvent> {
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !map.contains_key(**f)) {
            return Err(InvalidEvent::MissingField(*missing));
        }

        let repository_id = int_field(map, fields::REPOSITORY_ID)?;
        let pull_count = int_field(map, fields::PULL_COUNT)?;
        let timestamp = int_field(map, fields::LAST_PULL_TIMESTAMP)?;

        if repository_id <= 0 {
            return Err(InvalidEvent::RepositoryId(repository_id));
        }
        // zero is valid; such counters are discarded by the worker without accounting
        if pull_count < 0 {
            return Err(InvalidEvent::PullCount(pull_count));
        }
        let last_pull = match timestamp {
            0 => None,
            t if t < 0 => return Err(InvalidEvent::Timestamp(t)),
            t => Some(
                Utc.timestamp_opt(t, 0)
                    .single()
                    .ok_or(InvalidEvent::Timestamp(t))?,
            ),
        };

        let digest = map
            .get(fields::MANIFEST_DIGEST)
            .map(String::as_str)
            .unwrap_or_default();
        if digest.is_empty() {
            return Err(InvalidEvent::EmptyDigest);
        }
        let manifest_digest =
            OciDigest::try_from(digest).map_err(|_| InvalidEvent::Digest(digest.to_string()))?;

        let tag_name = map
            .get(fields::TAG_NAME)
            .filter(|t| !t.is_empty())
            .cloned();

        Ok(Self {
            repository_id,
            tag_name,
            manifest_digest,
            pull_count,
            last_pull,
            method: PullMethod::from_field(map.get(fields::PULL_METHOD).map(String::as_str)),
        })
    }

    /// Every accounted pull updates the statistics of the pulled manifest.
    pub fn manifest_update(&self) -> ManifestPullUpdate {
        ManifestPullUpdate {
            repository_id: self.repository_id,
            manifest_digest: self.manifest_digest.clone(),
            pull_count: self.pull_count,
            last_pull: self.last_pull,
        }
    }

    /// Pulls by tag additionally update the statistics of the tag.
    pub fn tag_update(&self) -> Option<TagPullUpdate> {
        match (&self.method, &self.tag_name) {
            (PullMethod::Tag, Some(tag_name)) => Some(TagPullUpdate {
                repository_id: self.repository_id,
                tag_name: tag_name.clone(),
                manifest_digest: self.manifest_digest.clone(),
                pull_count: self.pull_count,
                last_pull: self.last_pull,
            }),
            _ => None,
        }
    }
}
