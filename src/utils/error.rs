use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("KeyNotFound: key {key}, resource version {resource_version}")]
    KeyNotFound { key: String, resource_version: i64 },

    #[error("KeyExists: key {key}, resource version {resource_version}")]
    KeyExists { key: String, resource_version: i64 },

    #[error("ResourceVersionConflicts: key {key}, resource version {resource_version}")]
    ResourceVersionConflict { key: String, resource_version: i64 },

    #[error("InvalidObject: key {key}: {message}")]
    InvalidObject { key: String, message: String },

    #[error("ServerUnreachable: key {key}, resource version {resource_version}")]
    Unreachable { key: String, resource_version: i64 },

    #[error("BadRequest: {message}")]
    BadRequest { message: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error("Request timeout: {reason}")]
    Timeout { reason: String },

    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    KeyNotFound,
    KeyExists,
    ResourceVersionConflict,
    InvalidObject,
    Unreachable,
    BadRequest,
    Internal,
    Timeout,
    Cancelled,
}

/// External-facing rendering of an error for an HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: &'static str,
    pub detail: String,
}

impl StorageError {
    pub fn not_found(key: impl Into<String>, resource_version: i64) -> Self {
        Self::KeyNotFound {
            key: key.into(),
            resource_version,
        }
    }

    pub fn key_exists(key: impl Into<String>, resource_version: i64) -> Self {
        Self::KeyExists {
            key: key.into(),
            resource_version,
        }
    }

    pub fn conflict(key: impl Into<String>, resource_version: i64) -> Self {
        Self::ResourceVersionConflict {
            key: key.into(),
            resource_version,
        }
    }

    pub fn unreachable(key: impl Into<String>, resource_version: i64) -> Self {
        Self::Unreachable {
            key: key.into(),
            resource_version,
        }
    }

    pub fn invalid_object(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidObject {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::KeyExists { .. } => ErrorKind::KeyExists,
            Self::ResourceVersionConflict { .. } => ErrorKind::ResourceVersionConflict,
            Self::InvalidObject { .. } => ErrorKind::InvalidObject,
            Self::Unreachable { .. } => ErrorKind::Unreachable,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The key the error refers to, when it carries one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::KeyNotFound { key, .. }
            | Self::KeyExists { key, .. }
            | Self::ResourceVersionConflict { key, .. }
            | Self::InvalidObject { key, .. }
            | Self::Unreachable { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn resource_version(&self) -> Option<i64> {
        match self {
            Self::KeyNotFound {
                resource_version, ..
            }
            | Self::KeyExists {
                resource_version, ..
            }
            | Self::ResourceVersionConflict {
                resource_version, ..
            }
            | Self::Unreachable {
                resource_version, ..
            } => Some(*resource_version),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::KeyNotFound
    }

    pub fn is_key_exists(&self) -> bool {
        self.kind() == ErrorKind::KeyExists
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::ResourceVersionConflict
    }

    pub fn is_invalid_object(&self) -> bool {
        self.kind() == ErrorKind::InvalidObject
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind() == ErrorKind::Unreachable
    }

    pub fn is_bad_request(&self) -> bool {
        self.kind() == ErrorKind::BadRequest
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// 轉換為 HTTP 狀態碼、簡短訊息與詳細描述
    pub fn to_http_error(&self) -> HttpError {
        let (status, message) = match self.kind() {
            ErrorKind::KeyNotFound => (StatusCode::NOT_FOUND, "KeyNotFound"),
            ErrorKind::KeyExists => (StatusCode::CONFLICT, "KeyExists"),
            ErrorKind::ResourceVersionConflict => {
                (StatusCode::CONFLICT, "ResourceVersionConflicts")
            }
            ErrorKind::InvalidObject => (StatusCode::INTERNAL_SERVER_ERROR, "InvalidObject"),
            ErrorKind::Unreachable => (StatusCode::NOT_FOUND, "ServerUnreachable"),
            ErrorKind::BadRequest => (StatusCode::BAD_REQUEST, "BadRequest"),
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
            ErrorKind::Timeout => (StatusCode::INTERNAL_SERVER_ERROR, "request timeout"),
            ErrorKind::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "request cancelled"),
        };

        HttpError {
            status,
            message,
            detail: self.to_string(),
        }
    }
}

pub fn is_not_found(err: &StorageError) -> bool {
    err.is_not_found()
}

pub fn is_conflict(err: &StorageError) -> bool {
    err.is_conflict()
}

pub fn is_bad_request(err: &StorageError) -> bool {
    err.is_bad_request()
}

pub fn is_internal(err: &StorageError) -> bool {
    err.is_internal()
}

pub fn is_timeout(err: &StorageError) -> bool {
    err.is_timeout()
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                reason: err.to_string(),
            }
        } else if err.is_connect() {
            let key = err.url().map(|u| u.path().to_string()).unwrap_or_default();
            Self::unreachable(key, 0)
        } else {
            Self::internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_object("", err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidation { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_mapping_table() {
        let cases = vec![
            (StorageError::not_found("/a/b/c", 0), 404, "KeyNotFound"),
            (StorageError::key_exists("/a/b/c", 0), 409, "KeyExists"),
            (StorageError::conflict("/a/b/c", 3), 409, "ResourceVersionConflicts"),
            (StorageError::invalid_object("/a/b/c", "x"), 500, "InvalidObject"),
            (StorageError::unreachable("/a/b/c", 0), 404, "ServerUnreachable"),
            (StorageError::bad_request("bad key"), 400, "BadRequest"),
            (StorageError::internal("boom"), 500, "internal error"),
            (
                StorageError::Timeout {
                    reason: "deadline exceeded".to_string(),
                },
                500,
                "request timeout",
            ),
            (StorageError::Cancelled, 500, "request cancelled"),
        ];

        for (err, status, message) in cases {
            let http = err.to_http_error();
            assert_eq!(http.status.as_u16(), status, "status for {:?}", err);
            assert_eq!(http.message, message);
            assert_eq!(http.detail, err.to_string());
        }
    }

    #[test]
    fn test_predicates_follow_kind() {
        let err = StorageError::not_found("/users/admin/42", 7);
        assert!(err.is_not_found());
        assert!(is_not_found(&err));
        assert!(!err.is_conflict());
        assert_eq!(err.key(), Some("/users/admin/42"));
        assert_eq!(err.resource_version(), Some(7));

        let err = StorageError::bad_request("from+size");
        assert!(is_bad_request(&err));
        assert!(!is_internal(&err));
        assert_eq!(err.key(), None);

        assert!(is_timeout(&StorageError::Timeout {
            reason: String::new()
        }));
        assert!(is_conflict(&StorageError::conflict("/a/b/c", 1)));
    }

    #[test]
    fn test_serde_error_is_invalid_object() {
        let err: StorageError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(err.is_invalid_object());
    }
}
