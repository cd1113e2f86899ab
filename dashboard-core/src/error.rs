use thiserror::Error;

/// Error kinds produced by the coordination kernel.
///
/// These map onto the policy in the controller's error handling design:
/// transient DB failures are `Unavailable`, session problems are distinct
/// from auth problems, and `Busy`/`RegistrationConflict` carry enough
/// context for an operator-readable message.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("missing session credentials")]
    MissingSession,

    #[error("session token does not match registered worker")]
    SessionInvalid,

    #[error("worker '{0}' already has a live session")]
    RegistrationConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("a scan is already running")]
    Busy,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("external provider error: {0}")]
    ExternalProvider(String),

    #[error("fatal startup error: {0}")]
    Fatal(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".into()),
            other => CoreError::Unavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
