use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::oci_digest::OciDigest;
use crate::{Error, Result};

/// Distribution spec tag grammar, anchored: `[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}`.
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").unwrap());

/// `<algorithm>-<hex>.<suffix>`, the naming convention for tags that carry signature artifacts
/// for the manifest identified by `<algorithm>:<hex>`.
static SIGNATURE_ARTIFACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<subject>(?:sha256|sha512)-[0-9a-f]+)\.(?P<suffix>sig|sbom|att)$").unwrap()
});

/// Check `name` against the distribution spec tag grammar.
pub fn validate_tag_name(name: &str) -> Result<()> {
    if TAG_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidTag(name.to_string()))
    }
}

/// Classification of a tag as either regular content or a signature artifact attached to another
/// manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    #[default]
    Regular,
    Signature,
    Sbom,
    Attestation,
}

impl TagKind {
    /// Infer the kind of a tag from its name. Anything not following the
    /// `<algorithm>-<hex>.sig|.sbom|.att` convention is [`TagKind::Regular`].
    pub fn infer(name: &str) -> TagKind {
        let caps = match SIGNATURE_ARTIFACT_RE.captures(name) {
            Some(c) => c,
            None => return TagKind::Regular,
        };
        match &caps["suffix"] {
            "sig" => TagKind::Signature,
            "sbom" => TagKind::Sbom,
            "att" => TagKind::Attestation,
            _ => TagKind::Regular,
        }
    }

    /// Tag name suffix for signature artifact kinds.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            TagKind::Regular => None,
            TagKind::Signature => Some(".sig"),
            TagKind::Sbom => Some(".sbom"),
            TagKind::Attestation => Some(".att"),
        }
    }

    #[inline]
    pub fn is_signature_artifact(&self) -> bool {
        !matches!(self, TagKind::Regular)
    }
}

/// A named reference to a manifest within a repository.
///
/// Tag names are not guaranteed unique across manifests; nothing here deduplicates them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tag {
    name: String,
    kind: TagKind,
    digest: OciDigest,
}

impl Tag {
    /// Create a tag pointing at `digest`, inferring its [`TagKind`] from the name.
    pub fn new(name: impl Into<String>, digest: OciDigest) -> Result<Self> {
        let name = name.into();
        let kind = TagKind::infer(&name);
        Tag::with_kind(name, kind, digest)
    }

    /// Create a tag with an explicitly assigned [`TagKind`].
    pub fn with_kind(name: impl Into<String>, kind: TagKind, digest: OciDigest) -> Result<Self> {
        let name = name.into();
        validate_tag_name(&name)?;
        Ok(Self { name, kind, digest })
    }

    /// Build the conventionally named signature artifact tag for `subject`, eg
    /// `sha256-<hex>.sig`, pointing at the artifact manifest `artifact_digest`.
    pub fn signature_artifact(
        subject: &OciDigest,
        kind: TagKind,
        artifact_digest: OciDigest,
    ) -> Result<Self> {
        let suffix = kind
            .suffix()
            .ok_or_else(|| Error::InvalidTag(format!("{kind:?} is not a signature artifact kind")))?;
        Tag::with_kind(
            format!("{}{}", subject.tag_form(), suffix),
            kind,
            artifact_digest,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn digest(&self) -> &OciDigest {
        &self.digest
    }

    #[inline]
    pub fn is_signature_artifact(&self) -> bool {
        self.kind.is_signature_artifact()
    }

    /// Digest of the manifest this signature artifact is attached to, recovered from the tag
    /// name. `None` for regular tags and for names that don't follow the convention.
    pub fn subject_digest(&self) -> Option<OciDigest> {
        if !self.is_signature_artifact() {
            return None;
        }
        let caps = SIGNATURE_ARTIFACT_RE.captures(&self.name)?;
        OciDigest::from_tag_form(&caps["subject"]).ok()
    }
}

/// Select the tags to render.
///
/// With `show_signatures` set every tag is returned; otherwise only [`TagKind::Regular`] tags are.
/// Relative order is preserved and the input is never modified.
pub fn filter_tags(tags: &[Tag], show_signatures: bool) -> Vec<&Tag> {
    tags.iter()
        .filter(|t| show_signatures || !t.is_signature_artifact())
        .collect()
}

#[cfg(test)]
pub(crate) mod test {
    use proptest::prelude::*;
    use rstest::*;

    use super::*;

    pub(crate) const SUBJECT: &str =
        "sha256:f54a58bc1aac5ea1a25d796ae155dc228b3f0e11d046ae276b39c4bf2f13d8c4";

    pub(crate) fn digest(seed: &str) -> OciDigest {
        OciDigest::from(seed.as_bytes())
    }

    /// `latest`, `manifestlist` and the signature, SBOM and attestation tags of one manifest.
    #[fixture]
    pub(crate) fn signed_repository() -> Vec<Tag> {
        let subject = OciDigest::try_from(SUBJECT).unwrap();
        vec![
            Tag::new("latest", subject.clone()).unwrap(),
            Tag::new("manifestlist", digest("manifestlist")).unwrap(),
            Tag::new(format!("{}.sig", subject.tag_form()), digest("sig")).unwrap(),
            Tag::new(format!("{}.sbom", subject.tag_form()), digest("sbom")).unwrap(),
            Tag::new(format!("{}.att", subject.tag_form()), digest("att")).unwrap(),
        ]
    }

    fn names<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> Vec<&'a str> {
        tags.into_iter().map(|t| t.name()).collect()
    }

    #[rstest]
    #[case::latest("latest", TagKind::Regular)]
    #[case::signature(
        "sha256-f54a58bc1aac5ea1a25d796ae155dc228b3f0e11d046ae276b39c4bf2f13d8c4.sig",
        TagKind::Signature
    )]
    #[case::sbom(
        "sha256-f54a58bc1aac5ea1a25d796ae155dc228b3f0e11d046ae276b39c4bf2f13d8c4.sbom",
        TagKind::Sbom
    )]
    #[case::attestation(
        "sha256-f54a58bc1aac5ea1a25d796ae155dc228b3f0e11d046ae276b39c4bf2f13d8c4.att",
        TagKind::Attestation
    )]
    #[case::plain_sig_suffix("release.sig", TagKind::Regular)]
    #[case::unknown_suffix("sha256-f54a58bc.pem", TagKind::Regular)]
    #[case::uppercase_hex("sha256-F54A.sig", TagKind::Regular)]
    fn infer_kind(#[case] name: &str, #[case] expected: TagKind) {
        assert_eq!(TagKind::infer(name), expected);
    }

    #[rstest]
    #[case::leading_dot(".hidden")]
    #[case::leading_dash("-latest")]
    #[case::empty("")]
    #[case::slash("v1/latest")]
    #[case::too_long(&"a".repeat(129))]
    fn rejects_invalid_names(#[case] name: &str) {
        assert!(matches!(
            Tag::new(name, digest("x")),
            Err(Error::InvalidTag(_))
        ));
    }

    #[rstest]
    fn signature_artifact_naming() {
        let subject = OciDigest::try_from(SUBJECT).unwrap();
        let tag = Tag::signature_artifact(&subject, TagKind::Sbom, digest("sbom")).unwrap();
        assert_eq!(
            tag.name(),
            "sha256-f54a58bc1aac5ea1a25d796ae155dc228b3f0e11d046ae276b39c4bf2f13d8c4.sbom"
        );
        assert_eq!(tag.kind(), TagKind::Sbom);
        assert_eq!(tag.subject_digest(), Some(subject.clone()));

        assert!(Tag::signature_artifact(&subject, TagKind::Regular, digest("x")).is_err());
    }

    #[rstest]
    fn explicit_kind_overrides_name() {
        let tag = Tag::with_kind("cosign", TagKind::Signature, digest("x")).unwrap();
        assert!(tag.is_signature_artifact());
        assert_eq!(tag.subject_digest(), None);
    }

    #[rstest]
    fn hides_signature_artifacts(signed_repository: Vec<Tag>) {
        assert_eq!(
            names(filter_tags(&signed_repository, false)),
            vec!["latest", "manifestlist"]
        );
    }

    #[rstest]
    fn shows_everything_in_order(signed_repository: Vec<Tag>) {
        let shown = filter_tags(&signed_repository, true);
        assert_eq!(shown.len(), 5);
        assert_eq!(names(shown), names(&signed_repository));
    }

    #[rstest]
    #[case::hidden(false)]
    #[case::shown(true)]
    fn empty_input(#[case] show_signatures: bool) {
        assert!(filter_tags(&[], show_signatures).is_empty());
    }

    fn arb_kind() -> impl Strategy<Value = TagKind> {
        prop_oneof![
            Just(TagKind::Regular),
            Just(TagKind::Signature),
            Just(TagKind::Sbom),
            Just(TagKind::Attestation),
        ]
    }

    fn arb_tags() -> impl Strategy<Value = Vec<Tag>> {
        prop::collection::vec(("[a-z0-9_][a-z0-9._-]{0,15}", arb_kind()), 0..32).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .map(|(name, kind)| {
                        let d = digest(&name);
                        Tag::with_kind(name, kind, d).unwrap()
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn hidden_keeps_exactly_regular_tags(tags in arb_tags()) {
            let expected: Vec<&Tag> = tags.iter().filter(|t| t.kind() == TagKind::Regular).collect();
            prop_assert_eq!(filter_tags(&tags, false), expected);
        }

        #[test]
        fn shown_is_identity(tags in arb_tags()) {
            let all: Vec<&Tag> = tags.iter().collect();
            prop_assert_eq!(filter_tags(&tags, true), all);
        }

        #[test]
        fn filtering_is_idempotent(tags in arb_tags(), show in any::<bool>()) {
            let once: Vec<Tag> = filter_tags(&tags, show).into_iter().cloned().collect();
            let twice: Vec<Tag> = filter_tags(&once, show).into_iter().cloned().collect();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(filter_tags(&tags, show), filter_tags(&tags, show));
        }
    }
}
