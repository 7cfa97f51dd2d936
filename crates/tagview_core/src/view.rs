use serde::Serialize;

use crate::errors::Result;
use crate::source::TagSource;
use crate::tags::{filter_tags, Tag};
use crate::visibility::{SignatureToggle, SignatureVisibility};

/// One repository's tag listing as seen through a single view instance.
///
/// The view owns the tags it loaded and its [`SignatureToggle`]. Activating the toggle only
/// re-filters the loaded tags; it never goes back to the [`TagSource`]. A new view always starts
/// with signatures hidden.
#[derive(Clone, Debug)]
pub struct TagView {
    repository: String,
    tags: Vec<Tag>,
    toggle: SignatureToggle,
}

/// Serializable rendering input produced by [`TagView::snapshot`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TagViewSnapshot {
    pub repository: String,
    pub visibility: SignatureVisibility,
    pub toggle_label: &'static str,
    /// Number of signature artifact tags excluded from `tags`.
    pub hidden: usize,
    pub tags: Vec<Tag>,
}

impl TagView {
    pub fn new(repository: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self {
            repository: repository.into(),
            tags,
            toggle: SignatureToggle::new(),
        }
    }

    /// Fetch the repository's tags from `source` once and build a view over them.
    pub async fn load<S>(source: &S, repository: &str) -> Result<Self>
    where
        S: TagSource + ?Sized,
    {
        let tags = source.list_tags(repository).await?;
        tracing::debug!(repository, tags = tags.len(), "loaded tag view");
        Ok(Self::new(repository, tags))
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The full, unfiltered tag set in listing order.
    pub fn all_tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn visibility(&self) -> SignatureVisibility {
        self.toggle.state()
    }

    pub fn toggle_label(&self) -> &'static str {
        self.toggle.label()
    }

    pub fn visible_tags(&self) -> Vec<&Tag> {
        filter_tags(&self.tags, self.toggle.show_signatures())
    }

    pub fn hidden_count(&self) -> usize {
        self.tags.len() - self.visible_tags().len()
    }

    /// Flip the show/hide control and return the new state.
    pub fn activate_toggle(&mut self) -> SignatureVisibility {
        self.toggle.activate()
    }

    pub fn snapshot(&self) -> TagViewSnapshot {
        let tags: Vec<Tag> = self.visible_tags().into_iter().cloned().collect();
        TagViewSnapshot {
            repository: self.repository.clone(),
            visibility: self.visibility(),
            toggle_label: self.toggle_label(),
            hidden: self.tags.len() - tags.len(),
            tags,
        }
    }
}
