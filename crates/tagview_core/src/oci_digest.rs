use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// https://github.com/opencontainers/image-spec/blob/main/descriptor.md#digests
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OciDigest {
    algorithm: DigestAlgorithm,
    encoded: String,
}

impl TryFrom<&str> for OciDigest {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self> {
        let (algo, encoded) = match s.split_once(':') {
            Some((a, e)) if !a.is_empty() && !e.is_empty() => (a, e),
            _ => return Err(Error::InvalidDigest(s.to_string())),
        };
        let algorithm = DigestAlgorithm::try_from(algo)?;
        algorithm.validate_encoded(encoded, s)?;

        Ok(Self {
            algorithm,
            encoded: encoded.to_string(),
        })
    }
}

impl TryFrom<String> for OciDigest {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> {
        OciDigest::try_from(s.as_str())
    }
}

impl From<&[u8]> for OciDigest {
    fn from(bs: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bs);
        Self {
            algorithm: DigestAlgorithm::Sha256,
            encoded: format!("{:x}", hasher.finalize()),
        }
    }
}

impl From<OciDigest> for String {
    fn from(d: OciDigest) -> String {
        d.to_string()
    }
}

impl fmt::Display for OciDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded)
    }
}

impl OciDigest {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// The digest with its `:` separator replaced by `-`, as used in the names of signature,
    /// SBOM and attestation tags (eg `sha256-<hex>.sig`).
    pub fn tag_form(&self) -> String {
        format!("{}-{}", self.algorithm, self.encoded)
    }

    /// Inverse of [`OciDigest::tag_form`].
    pub fn from_tag_form(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((algo, encoded)) => OciDigest::try_from(format!("{algo}:{encoded}")),
            None => Err(Error::InvalidDigest(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Length of the lowercase hex encoding produced by this algorithm.
    pub fn encoded_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }

    fn validate_encoded(&self, encoded: &str, whole: &str) -> Result<()> {
        let is_lower_hex = encoded
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !is_lower_hex || encoded.len() != self.encoded_len() {
            return Err(Error::InvalidDigest(whole.to_string()));
        }
        Ok(())
    }
}

impl TryFrom<&str> for DigestAlgorithm {
    type Error = Error;

    fn try_from(a: &str) -> Result<Self> {
        match a {
            "sha512" => Ok(DigestAlgorithm::Sha512),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            s => Err(Error::UnsupportedDigestAlgorithm(String::from(s))),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha512 => f.write_str("sha512"),
            DigestAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    const SHA256_HEX: &str = "f54a58bc1aac5ea1a25d796ae155dc228b3f0e11d046ae276b39c4bf2f13d8c4";

    #[rstest]
    #[case::sha256(format!("sha256:{SHA256_HEX}"), Ok(OciDigest {
        algorithm: DigestAlgorithm::Sha256,
        encoded: String::from(SHA256_HEX),
    }))]
    #[case::sha512(format!("sha512:{}", "ab".repeat(64)), Ok(OciDigest {
        algorithm: DigestAlgorithm::Sha512,
        encoded: "ab".repeat(64),
    }))]
    #[case::unknown_algorithm(format!("sha666:{SHA256_HEX}"),
        Err(Error::UnsupportedDigestAlgorithm(String::from("sha666"))))]
    #[case::no_separator(String::from("sha256meow"),
        Err(Error::InvalidDigest(String::from("sha256meow"))))]
    #[case::empty_encoded(String::from("sha256:"),
        Err(Error::InvalidDigest(String::from("sha256:"))))]
    #[case::empty_algorithm(String::from(":meow"),
        Err(Error::InvalidDigest(String::from(":meow"))))]
    #[case::not_hex(String::from("sha256:meow"),
        Err(Error::InvalidDigest(String::from("sha256:meow"))))]
    #[case::uppercase(format!("sha256:{}", SHA256_HEX.to_uppercase()),
        Err(Error::InvalidDigest(format!("sha256:{}", SHA256_HEX.to_uppercase()))))]
    fn validate_try_from(#[case] input: String, #[case] expected: Result<OciDigest>) {
        let actual: Result<OciDigest> = input.as_str().try_into();
        match (expected, actual) {
            (Ok(exp), Ok(act)) => {
                assert_eq!(exp, act);
            }
            (Ok(s), Err(e)) => {
                panic!("expected Ok( {s:?} ) got Err( {e:?} )");
            }
            (Err(exp), Err(act)) => {
                let exp = format!("{exp}");
                let act = format!("{act}");
                assert_eq!(exp, act);
            }
            (Err(e), Ok(s)) => {
                panic!("expected Err( {e:?} ) got Ok( {s:?} )");
            }
        }
    }

    #[rstest]
    fn tag_form_reverses() {
        let digest = OciDigest::try_from(format!("sha256:{SHA256_HEX}")).unwrap();
        assert_eq!(digest.tag_form(), format!("sha256-{SHA256_HEX}"));
        assert_eq!(OciDigest::from_tag_form(&digest.tag_form()).unwrap(), digest);
        assert!(OciDigest::from_tag_form("latest").is_err());
    }

    #[rstest]
    fn content_digest() {
        let digest = OciDigest::from(b"".as_slice());
        assert_eq!(
            digest.to_string(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[rstest]
    fn serializes_as_string() {
        let s = format!("\"sha256:{SHA256_HEX}\"");
        let digest: OciDigest = serde_json::from_str(&s).unwrap();
        assert_eq!(serde_json::to_string(&digest).unwrap(), s);
        assert!(serde_json::from_str::<OciDigest>("\"sha256:nope\"").is_err());
    }
}
