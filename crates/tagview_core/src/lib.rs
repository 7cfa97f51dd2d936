//! # Tagview Core
//!
//! Types and pure functions behind a registry's tag view: [`Tag`] records classified by
//! [`TagKind`], the [`filter_tags`] function that hides signature artifacts (cosign-style
//! signature, SBOM and attestation tags), and the [`SignatureToggle`] control that decides whether
//! they are shown.
//!
//! Tag data is supplied by a [`TagSource`]; [`TagView`] combines one repository's loaded tags with
//! the toggle state owned by a single view instance.
pub mod errors;
pub use errors::{Error, Result};

mod oci_digest;
pub use oci_digest::{DigestAlgorithm, OciDigest};

mod tags;
pub use tags::{filter_tags, validate_tag_name, Tag, TagKind};

mod visibility;
pub use visibility::{SignatureToggle, SignatureVisibility};

mod view;
pub use view::{TagView, TagViewSnapshot};

pub mod source;
pub use source::{RepositoryDefinition, StaticTagSource, TagDefinition, TagSource};
