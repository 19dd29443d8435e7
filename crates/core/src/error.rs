use crate::store::StoreError;
use api_shared::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    /// Malformed, missing or out-of-policy input.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A uniqueness rule would be violated.
    #[error("{0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize: {0}")]
    Deserialization(serde_json::Error),
}

impl ClinicError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status code conventionally associated with this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ClinicError::Validation(_) | ClinicError::Deserialization(_) => 400,
            ClinicError::Auth(AuthError::Unauthenticated) => 401,
            ClinicError::Auth(AuthError::Forbidden) => 403,
            ClinicError::NotFound(_) => 404,
            ClinicError::Conflict(_) => 409,
            ClinicError::Store(_)
            | ClinicError::InvalidConfig(_)
            | ClinicError::FileRead(_)
            | ClinicError::Serialization(_) => 500,
        }
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
