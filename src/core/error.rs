use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A precondition checkable without I/O was violated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A field has no coercion to or from the stored value kind.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A bounded retry budget or a request deadline was exhausted.
    #[error("Timeout: {message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<Box<StoreError>>,
    },

    /// The backing service rejected the request with a status code.
    #[error("Service error ({status}): {message}")]
    Service { status: StatusCode, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn service(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>, source: Option<StoreError>) -> Self {
        Self::Timeout {
            message: message.into(),
            source: source.map(Box::new),
        }
    }

    /// Status code carried by a service failure, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for 409 and 412, the two statuses a version-tag mismatch produces.
    pub fn is_concurrency_conflict(&self) -> bool {
        self.status().is_some_and(|status| {
            status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED
        })
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("malformed payload: {err}"))
    }
}
