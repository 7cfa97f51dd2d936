//! # Tag Sources
//!
//! [`TagSource`] is the upstream collaborator of a [`TagView`](crate::TagView): it supplies the
//! full, unfiltered tag list for a repository. Filtering never goes back to the source, so an
//! implementation only needs to answer listing and lookup queries.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::oci_digest::OciDigest;
use crate::tags::{Tag, TagKind};

/// Provides the tags of registry repositories.
#[async_trait]
pub trait TagSource: Send + Sync + 'static {
    /// Numeric identifier of the named repository, if it exists. Pull statistics are keyed on this
    /// identifier.
    async fn repository_id(&self, repository: &str) -> Result<Option<i64>>;

    /// Every tag of the repository in listing order. Returns [`Error::NameUnknown`] when the
    /// repository does not exist.
    async fn list_tags(&self, repository: &str) -> Result<Vec<Tag>>;

    /// Look up a single tag by name. The first tag with a matching name wins.
    async fn get_tag(&self, repository: &str, name: &str) -> Result<Option<Tag>> {
        Ok(self
            .list_tags(repository)
            .await?
            .into_iter()
            .find(|t| t.name() == name))
    }
}

/// Configuration struct defining a statically-declared repository and its tags.
#[derive(Clone, Debug, Deserialize)]
pub struct RepositoryDefinition {
    /// Name of the repository.
    pub name: String,
    /// Identifier used when recording pull statistics.
    pub id: i64,
    #[serde(default)]
    pub tags: Vec<TagDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TagDefinition {
    pub name: String,
    pub digest: String,
    /// Inferred from the tag name when absent.
    #[serde(default)]
    pub kind: Option<TagKind>,
}

impl TryFrom<TagDefinition> for Tag {
    type Error = Error;

    fn try_from(def: TagDefinition) -> Result<Tag> {
        let digest = OciDigest::try_from(def.digest.as_str())?;
        match def.kind {
            Some(kind) => Tag::with_kind(def.name, kind, digest),
            None => Tag::new(def.name, digest),
        }
    }
}

#[derive(Debug)]
struct StaticRepository {
    id: i64,
    tags: Vec<Tag>,
}

/// [`TagSource`] over repositories declared up front, typically in the configuration file.
#[derive(Clone, Debug, Default)]
pub struct StaticTagSource {
    repositories: Arc<HashMap<String, StaticRepository>>,
}

impl StaticTagSource {
    pub fn new(definitions: Vec<RepositoryDefinition>) -> Result<Self> {
        let mut repositories = HashMap::with_capacity(definitions.len());
        for def in definitions {
            let tags = def
                .tags
                .into_iter()
                .map(Tag::try_from)
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!(
                repository = %def.name,
                id = def.id,
                tags = tags.len(),
                "loaded static repository"
            );
            let repository = StaticRepository { id: def.id, tags };
            if repositories.insert(def.name.clone(), repository).is_some() {
                return Err(Error::DuplicateRepository(def.name));
            }
        }
        Ok(Self {
            repositories: Arc::new(repositories),
        })
    }

    fn repository(&self, name: &str) -> Result<&StaticRepository> {
        self.repositories
            .get(name)
            .ok_or_else(|| Error::NameUnknown(name.to_string()))
    }
}

#[async_trait]
impl TagSource for StaticTagSource {
    async fn repository_id(&self, repository: &str) -> Result<Option<i64>> {
        Ok(self.repositories.get(repository).map(|r| r.id))
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<Tag>> {
        Ok(self.repository(repository)?.tags.clone())
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;
    use crate::tags::test::SUBJECT;

    fn definitions() -> Vec<RepositoryDefinition> {
        let sig = format!(
            "{}.sig",
            OciDigest::try_from(SUBJECT).unwrap().tag_form()
        );
        vec![RepositoryDefinition {
            name: String::from("alpine"),
            id: 7,
            tags: vec![
                TagDefinition {
                    name: String::from("latest"),
                    digest: String::from(SUBJECT),
                    kind: None,
                },
                TagDefinition {
                    name: sig,
                    digest: OciDigest::from(b"sig".as_slice()).to_string(),
                    kind: None,
                },
                TagDefinition {
                    name: String::from("cosign-bundle"),
                    digest: OciDigest::from(b"bundle".as_slice()).to_string(),
                    kind: Some(TagKind::Attestation),
                },
                TagDefinition {
                    name: String::from("latest"),
                    digest: OciDigest::from(b"older".as_slice()).to_string(),
                    kind: None,
                },
            ],
        }]
    }

    #[tokio::test]
    async fn lists_in_declared_order() {
        let source = StaticTagSource::new(definitions()).unwrap();
        let tags = source.list_tags("alpine").await.unwrap();
        let kinds: Vec<TagKind> = tags.iter().map(|t| t.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                TagKind::Regular,
                TagKind::Signature,
                TagKind::Attestation,
                TagKind::Regular
            ]
        );
        assert_eq!(source.repository_id("alpine").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn get_tag_returns_first_match() {
        let source = StaticTagSource::new(definitions()).unwrap();
        let tag = source.get_tag("alpine", "latest").await.unwrap().unwrap();
        assert_eq!(tag.digest().to_string(), SUBJECT);
        assert!(source.get_tag("alpine", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_repository() {
        let source = StaticTagSource::new(definitions()).unwrap();
        assert!(matches!(
            source.list_tags("busybox").await,
            Err(Error::NameUnknown(_))
        ));
        assert_eq!(source.repository_id("busybox").await.unwrap(), None);
    }

    #[rstest]
    fn rejects_bad_definitions() {
        let mut defs = definitions();
        defs[0].tags[0].digest = String::from("sha256:nope");
        assert!(matches!(
            StaticTagSource::new(defs),
            Err(Error::InvalidDigest(_))
        ));

        let mut defs = definitions();
        let duplicate = defs[0].clone();
        defs.push(duplicate);
        assert!(matches!(
            StaticTagSource::new(defs),
            Err(Error::DuplicateRepository(_))
        ));
    }

    #[rstest]
    fn deserializes_yaml_style_definition() {
        let json = format!(
            r#"{{"name": "alpine", "id": 1, "tags": [{{"name": "v1", "digest": "{SUBJECT}", "kind": "sbom"}}]}}"#
        );
        let def: RepositoryDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def.tags[0].kind, Some(TagKind::Sbom));
    }
}
