use super::{StoreError, VersionTag};
use http::StatusCode;

/// Status-carrying result of a single table or metadata operation.
///
/// Only success, not-found and the two concurrency statuses are represented here;
/// every other failure is raised as a [`StoreError`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub status: StatusCode,
    pub data: Option<T>,
    /// Version tag of the row after a successful write, or of the row that was read.
    pub version: Option<VersionTag>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data: Some(data),
            version: None,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            data: None,
            version: None,
        }
    }

    pub fn not_found() -> Self {
        Self::status(StatusCode::NOT_FOUND)
    }

    pub fn with_version(mut self, version: Option<VersionTag>) -> Self {
        self.version = version;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// Returns `true` when the write lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT || self.status == StatusCode::PRECONDITION_FAILED
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            status: self.status,
            data: self.data.map(f),
            version: self.version,
        }
    }

    /// Converts a collaborator failure into an outcome when its status has a policy here.
    ///
    /// 404, 409 and 412 become outcomes; everything else is handed back unchanged.
    pub fn from_error(err: StoreError) -> std::result::Result<Self, StoreError> {
        match err.status() {
            Some(status)
                if status == StatusCode::NOT_FOUND
                    || status == StatusCode::CONFLICT
                    || status == StatusCode::PRECONDITION_FAILED =>
            {
                Ok(Self::status(status))
            }
            _ => Err(err),
        }
    }
}

impl Outcome<()> {
    pub fn success() -> Self {
        Self::ok(())
    }
}
