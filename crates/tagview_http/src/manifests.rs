use std::collections::HashMap;

use axum::extract::{Extension, Path};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;

use tagview_core::{validate_tag_name, OciDigest, Tag};

use super::errors::{Error, Result};
use super::{RepositoryContext, Tagview};

pub fn router() -> Router {
    Router::new().route("/:reference", get(get_manifest).head(head_manifest))
}

/// `<reference>` portion of `/v2/<name>/manifests/<reference>`: either a digest or a tag.
#[derive(Debug)]
enum ManifestRef {
    Digest(OciDigest),
    Tag(String),
}

impl std::str::FromStr for ManifestRef {
    type Err = Error;

    /// Anything containing a `:` must be a digest, since `:` is not allowed in tags.
    fn from_str(s: &str) -> Result<Self> {
        if s.contains(':') {
            return Ok(Self::Digest(OciDigest::try_from(s)?));
        }
        validate_tag_name(s)?;
        Ok(Self::Tag(String::from(s)))
    }
}

#[derive(Debug, Serialize)]
struct ResolvedManifest {
    digest: OciDigest,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<Tag>,
}

async fn resolve(
    tagview: &Tagview,
    repository: &RepositoryContext,
    path_params: &HashMap<String, String>,
) -> Result<ResolvedManifest> {
    let reference: ManifestRef = path_params
        .get("reference")
        .ok_or(Error::MissingPathParameter("reference"))?
        .parse()?;

    match reference {
        ManifestRef::Tag(name) => {
            match tagview.source.get_tag(&repository.name, &name).await? {
                Some(tag) => Ok(ResolvedManifest {
                    digest: tag.digest().clone(),
                    tag: Some(tag),
                }),
                None => Err(Error::ManifestUnknown(name)),
            }
        }
        ManifestRef::Digest(digest) => {
            let known = tagview
                .source
                .list_tags(&repository.name)
                .await?
                .iter()
                .any(|t| t.digest() == &digest);
            if !known {
                return Err(Error::ManifestUnknown(digest.to_string()));
            }
            Ok(ResolvedManifest { digest, tag: None })
        }
    }
}

fn digest_headers(digest: &OciDigest) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_lowercase(b"docker-content-digest")?,
        HeaderValue::from_str(&digest.to_string())?,
    );
    Ok(headers)
}

async fn head_manifest(
    Extension(tagview): Extension<Tagview>,
    Extension(repository): Extension<RepositoryContext>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let resolved = resolve(&tagview, &repository, &path_params).await?;
    Ok((StatusCode::OK, digest_headers(&resolved.digest)?).into_response())
}

async fn get_manifest(
    Extension(tagview): Extension<Tagview>,
    Extension(repository): Extension<RepositoryContext>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let resolved = resolve(&tagview, &repository, &path_params).await?;

    if let Some(recorder) = &tagview.recorder {
        let recorded = match &resolved.tag {
            Some(tag) => {
                recorder
                    .record_tag_pull(repository.id, tag.name(), &resolved.digest)
                    .await
            }
            None => {
                recorder
                    .record_digest_pull(repository.id, &resolved.digest)
                    .await
            }
        };
        // losing a pull count is preferable to failing the pull
        if let Err(e) = recorded {
            tracing::warn!("failed to record pull of {}: {e}", resolved.digest);
        }
    }

    let headers = digest_headers(&resolved.digest)?;
    Ok((StatusCode::OK, headers, Json(resolved)).into_response())
}
