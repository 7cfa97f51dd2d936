//! # Tagview HTTP
//!
//! `tagview_http` exposes the tags of registry repositories over HTTP, following the URL layout
//! of the [Distribution Spec](https://github.com/opencontainers/distribution-spec):
//!
//! * `GET /v2/<name>/tags/list` returns the plain, unfiltered tag list.
//! * `GET /v2/<name>/tags/view?show_signatures=<bool>` returns the rendered tag view: the tags to
//!   display, the show/hide toggle state and label, and pull statistics when available.
//! * `GET|HEAD /v2/<name>/manifests/<reference>` resolves a tag or digest. GET requests are
//!   counted as pulls.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tagview_core::StaticTagSource;
//! use tagview_http::Tagview;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = StaticTagSource::new(vec![])?;
//! let router = Tagview::new(Arc::new(source)).router()?;
//!
//! axum::Server::bind(&"0.0.0.0:13030".parse()?)
//!     .serve(router.into_make_service())
//!     .await?;
//! # Ok(())
//! # }
//! ```
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use serde::{de, Deserialize, Deserializer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{self, TraceLayer};

mod errors;
pub use errors::DistributionErrorCode;
pub(crate) use errors::{Error, Result};

mod manifests;
mod tags;

use tagview_core::{Error as CoreError, TagSource};
use tagview_pullstats::{PullRecorder, PullStatisticsStore};

/// Repository resolved from the `<name>` path segment, made available to route handlers as an
/// [`axum::Extension`] by [`add_repository_context`].
#[derive(Clone, Debug)]
pub struct RepositoryContext {
    pub name: String,
    pub id: i64,
}

/// Look up the repository named in the request path and insert a [`RepositoryContext`] into the
/// request extensions. Unknown repositories are rejected with `NAME_UNKNOWN`.
pub async fn add_repository_context<B>(
    State(tagview): State<Tagview>,
    Path(path_params): Path<HashMap<String, String>>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response> {
    let repo_name = match path_params.get("repository") {
        Some(s) => s,
        None => return Err(Error::MissingPathParameter("repository")),
    };

    let id = match tagview.source.repository_id(repo_name).await {
        Err(e) => {
            tracing::warn!("error retrieving repository: {e:?}");
            return Err(e.into());
        }
        Ok(Some(id)) => id,
        Ok(None) => return Err(CoreError::NameUnknown(repo_name.clone()).into()),
    };

    req.extensions_mut().insert(RepositoryContext {
        name: repo_name.clone(),
        id,
    });

    Ok(next.run(req).await)
}

/// Serde deserialization decorator to map empty Strings to None,
fn empty_string_as_none<'de, D, T>(de: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => FromStr::from_str(s).map_err(de::Error::custom).map(Some),
    }
}

async fn version() -> Result<Response> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str("application/json")?,
    );
    Ok((StatusCode::OK, headers, "{}").into_response())
}

/// Shared state of the HTTP service: where tags come from and, optionally, where pulls are
/// counted and pull statistics are read.
#[derive(Clone)]
pub struct Tagview {
    source: Arc<dyn TagSource>,
    recorder: Option<PullRecorder>,
    statistics: Option<Arc<dyn PullStatisticsStore>>,
}

impl Tagview {
    pub fn new(source: Arc<dyn TagSource>) -> Self {
        Self {
            source,
            recorder: None,
            statistics: None,
        }
    }

    /// Count manifest pulls with `recorder` and include `statistics` in tag views.
    pub fn with_pull_statistics(
        mut self,
        recorder: PullRecorder,
        statistics: Arc<dyn PullStatisticsStore>,
    ) -> Self {
        self.recorder = Some(recorder);
        self.statistics = Some(statistics);
        self
    }

    /// Return an [`axum::Router`] serving the tag endpoints.
    pub fn router(&self) -> Result<Router> {
        let repository = Router::new()
            .nest("/tags", tags::router())
            .nest("/manifests", manifests::router())
            .route_layer(middleware::from_fn_with_state(
                self.clone(),
                add_repository_context,
            ));

        let app = Router::new()
            .route("/v2/", get(version))
            .nest("/v2/:repository", repository)
            .layer(Extension(self.clone()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().include_headers(true))
                    .on_response(trace::DefaultOnResponse::new())
                    .on_request(trace::DefaultOnRequest::new()),
            )
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_str("docker-distribution-api-version")?,
                HeaderValue::from_str("registry/2.0")?,
            ));

        Ok(app)
    }
}
