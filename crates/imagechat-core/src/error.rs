use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid rating {0}: expected +1 or -1")]
    InvalidRating(i64),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("No results available")]
    NoResultsAvailable,

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, Error>;
