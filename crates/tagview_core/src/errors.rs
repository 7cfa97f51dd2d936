use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("repository name unknown: {0}")]
    NameUnknown(String),

    #[error("duplicate repository definition: {0}")]
    DuplicateRepository(String),
}
