use axum::extract::{Extension, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use tagview_core::{SignatureVisibility, Tag, TagView};
use tagview_pullstats::TagPullStatistics;

use super::empty_string_as_none;
use super::errors::Result;
use super::{RepositoryContext, Tagview};

pub fn router() -> Router {
    Router::new()
        .route("/list", get(get_tags))
        .route("/view", get(get_tag_view))
}

#[derive(Debug, Deserialize)]
struct GetListParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    n: Option<usize>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    last: Option<String>,
}

#[derive(Debug, Serialize)]
struct TagList {
    name: String,
    tags: Vec<String>,
}

/// Lexically ordered, deduplicated tag names after `last`, at most `n` of them.
fn paginate(mut names: Vec<String>, n: Option<usize>, last: Option<&str>) -> Vec<String> {
    names.sort();
    names.dedup();
    let start = match last {
        Some(last) => names.partition_point(|name| name.as_str() <= last),
        None => 0,
    };
    let end = match n {
        Some(n) => start.saturating_add(n).min(names.len()),
        None => names.len(),
    };
    names.drain(start..end).collect()
}

async fn get_tags(
    Extension(tagview): Extension<Tagview>,
    Extension(repository): Extension<RepositoryContext>,
    Query(params): Query<GetListParams>,
) -> Result<Response> {
    let names = tagview
        .source
        .list_tags(&repository.name)
        .await?
        .into_iter()
        .map(|t| t.name().to_string())
        .collect();

    let tag_list = TagList {
        name: repository.name,
        tags: paginate(names, params.n, params.last.as_deref()),
    };

    Ok((StatusCode::OK, Json(tag_list)).into_response())
}

#[derive(Debug, Deserialize)]
struct GetViewParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    show_signatures: Option<bool>,
}

#[derive(Debug, Serialize)]
struct TagRow {
    #[serde(flatten)]
    tag: Tag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pulls: Option<TagPullStatistics>,
}

#[derive(Debug, Serialize)]
struct TagViewResponse {
    repository: String,
    visibility: SignatureVisibility,
    toggle_label: &'static str,
    hidden: usize,
    tags: Vec<TagRow>,
}

async fn get_tag_view(
    Extension(tagview): Extension<Tagview>,
    Extension(repository): Extension<RepositoryContext>,
    Query(params): Query<GetViewParams>,
) -> Result<Response> {
    let mut view = TagView::load(tagview.source.as_ref(), &repository.name).await?;
    // every request renders a fresh view, so the flag decides the toggle state outright
    if params.show_signatures.unwrap_or(false) {
        view.activate_toggle();
    }
    let snapshot = view.snapshot();

    let mut tags = Vec::with_capacity(snapshot.tags.len());
    for tag in snapshot.tags {
        let pulls = match &tagview.statistics {
            Some(statistics) => statistics.tag_statistics(repository.id, tag.name()).await?,
            None => None,
        };
        tags.push(TagRow { tag, pulls });
    }

    let response = TagViewResponse {
        repository: snapshot.repository,
        visibility: snapshot.visibility,
        toggle_label: snapshot.toggle_label,
        hidden: snapshot.hidden,
        tags,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
