//! Unified error model for the authorization external-state layer.
//! Every fallible operation returns `AuthzResult<T>`; storage-layer failures are
//! carried through the `Storage` variant verbatim.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthzError {
    #[error("user_not_found: {message}")]
    UserNotFound { message: String },
    #[error("role_not_found: {message}")]
    RoleNotFound { message: String },
    #[error("no_matching_document: {message}")]
    NoMatchingDocument { message: String },
    #[error("duplicate_key: {message}")]
    DuplicateKey { message: String },
    #[error("namespace_not_found: {message}")]
    NamespaceNotFound { message: String },
    #[error("namespace_exists: {message}")]
    NamespaceExists { message: String },
    #[error("failed_to_parse: {message}")]
    FailedToParse { message: String },
    #[error("bad_value: {message}")]
    BadValue { message: String },
    #[error("unsupported_format: {message}")]
    UnsupportedFormat { message: String },
    #[error("lock_busy: {message}")]
    LockBusy { message: String },
    #[error("storage_error: {message}")]
    Storage { message: String },
}

impl AuthzError {
    /// Stable numeric code, compatible with the codes the calling manager already knows.
    pub fn code(&self) -> i32 {
        match self {
            AuthzError::BadValue { .. } => 2,
            AuthzError::FailedToParse { .. } => 9,
            AuthzError::UserNotFound { .. } => 11,
            AuthzError::NamespaceNotFound { .. } => 26,
            AuthzError::RoleNotFound { .. } => 31,
            AuthzError::NoMatchingDocument { .. } => 47,
            AuthzError::NamespaceExists { .. } => 48,
            AuthzError::LockBusy { .. } => 46,
            AuthzError::UnsupportedFormat { .. } => 115,
            AuthzError::Storage { .. } => 1,
            AuthzError::DuplicateKey { .. } => 11000,
        }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            AuthzError::UserNotFound { .. } => "user_not_found",
            AuthzError::RoleNotFound { .. } => "role_not_found",
            AuthzError::NoMatchingDocument { .. } => "no_matching_document",
            AuthzError::DuplicateKey { .. } => "duplicate_key",
            AuthzError::NamespaceNotFound { .. } => "namespace_not_found",
            AuthzError::NamespaceExists { .. } => "namespace_exists",
            AuthzError::FailedToParse { .. } => "failed_to_parse",
            AuthzError::BadValue { .. } => "bad_value",
            AuthzError::UnsupportedFormat { .. } => "unsupported_format",
            AuthzError::LockBusy { .. } => "lock_busy",
            AuthzError::Storage { .. } => "storage_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthzError::UserNotFound { message }
            | AuthzError::RoleNotFound { message }
            | AuthzError::NoMatchingDocument { message }
            | AuthzError::DuplicateKey { message }
            | AuthzError::NamespaceNotFound { message }
            | AuthzError::NamespaceExists { message }
            | AuthzError::FailedToParse { message }
            | AuthzError::BadValue { message }
            | AuthzError::UnsupportedFormat { message }
            | AuthzError::LockBusy { message }
            | AuthzError::Storage { message } => message.as_str(),
        }
    }

    pub fn user_not_found<S: Into<String>>(msg: S) -> Self { AuthzError::UserNotFound { message: msg.into() } }
    pub fn role_not_found<S: Into<String>>(msg: S) -> Self { AuthzError::RoleNotFound { message: msg.into() } }
    pub fn no_match<S: Into<String>>(msg: S) -> Self { AuthzError::NoMatchingDocument { message: msg.into() } }
    pub fn duplicate_key<S: Into<String>>(msg: S) -> Self { AuthzError::DuplicateKey { message: msg.into() } }
    pub fn ns_not_found<S: Into<String>>(msg: S) -> Self { AuthzError::NamespaceNotFound { message: msg.into() } }
    pub fn ns_exists<S: Into<String>>(msg: S) -> Self { AuthzError::NamespaceExists { message: msg.into() } }
    pub fn parse<S: Into<String>>(msg: S) -> Self { AuthzError::FailedToParse { message: msg.into() } }
    pub fn bad_value<S: Into<String>>(msg: S) -> Self { AuthzError::BadValue { message: msg.into() } }
    pub fn unsupported<S: Into<String>>(msg: S) -> Self { AuthzError::UnsupportedFormat { message: msg.into() } }
    pub fn lock_busy<S: Into<String>>(msg: S) -> Self { AuthzError::LockBusy { message: msg.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { AuthzError::Storage { message: msg.into() } }

    /// True for the "principal or document absent" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AuthzError::UserNotFound { .. }
                | AuthzError::RoleNotFound { .. }
                | AuthzError::NoMatchingDocument { .. }
                | AuthzError::NamespaceNotFound { .. }
        )
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;

impl From<anyhow::Error> for AuthzError {
    fn from(err: anyhow::Error) -> Self {
        // Anything arriving untyped is a storage-layer failure; keep the text intact
        AuthzError::Storage { message: format!("{:#}", err) }
    }
}

impl From<std::io::Error> for AuthzError {
    fn from(err: std::io::Error) -> Self { AuthzError::Storage { message: err.to_string() } }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self { AuthzError::FailedToParse { message: err.to_string() } }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
