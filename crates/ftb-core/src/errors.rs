/// Core error type for the bridge.
///
/// Adapter crates map their specific failures into this type so the pipeline
/// can handle them consistently (user-facing apology vs. silent drop).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
