use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("pull event store error: {0}")]
    EventStore(String),

    #[error("pull statistics store error: {0}")]
    StatisticsStore(String),

    #[error("tagview error: {0}")]
    Core(#[from] tagview_core::Error),
}
