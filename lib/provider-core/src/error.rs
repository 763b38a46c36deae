use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// How a failure should be handled by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource does not exist (HTTP 404)
    NotFound,
    /// The caller may not access the resource (HTTP 403)
    Forbidden,
    /// Retry later (HTTP 5xx, 429, or a vendor "busy" answer)
    Transient,
    /// The request itself is wrong (other HTTP 4xx, bad configuration)
    Invalid,
    /// A waiter ran past its deadline
    Timeout,
    /// The host cancelled the operation
    Cancelled,
    /// Anything else
    Fatal,
}

/// Error body returned by the vendor API alongside a non-2xx status.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status} {error_type}: {message}")]
pub struct VendorError {
    pub status: u16,
    pub error_type: String,
    pub message: String,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
}

#[derive(Deserialize)]
struct VendorErrorBody {
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    resource_id: Option<String>,
}

impl VendorError {
    pub fn new(status: u16, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
            resource: None,
            resource_id: None,
        }
    }

    /// Decode a vendor error from a status code and raw response body.
    ///
    /// Bodies that are not the structured `{type, message}` object are kept
    /// verbatim as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<VendorErrorBody>(body) {
            Ok(parsed) => Self {
                status,
                error_type: parsed.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: parsed.message.unwrap_or_else(|| body.trim().to_string()),
                resource: parsed.resource,
                resource_id: parsed.resource_id,
            },
            Err(_) => Self::new(status, "unknown", body.trim()),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.status {
            404 => ErrorClass::NotFound,
            403 => ErrorClass::Forbidden,
            429 => ErrorClass::Transient,
            409 if self.is_busy() => ErrorClass::Transient,
            500..=599 => ErrorClass::Transient,
            400..=499 => ErrorClass::Invalid,
            _ => ErrorClass::Fatal,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self.error_type.as_str(), "transient_state" | "busy" | "locked")
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid ID format: {0:?}")]
    IdFormat(String),

    #[error("{attribute} references a resource in {referenced} but the resource is in {declared}")]
    LocalityMismatch {
        attribute: String,
        declared: String,
        referenced: String,
    },

    #[error("vendor API error: {0}")]
    Vendor(#[from] VendorError),

    #[error("timeout while waiting for {kind} {id}")]
    Timeout { kind: String, id: String },

    #[error("cancelled while waiting for {kind} {id}")]
    Cancelled { kind: String, id: String },

    #[error("pool {id} reached status {status} instead of ready")]
    PoolNotReady { id: String, status: String },

    #[error("{kind} {id} settled in status {status}, expected {expected}")]
    UnexpectedStatus {
        kind: String,
        id: String,
        status: String,
        expected: String,
    },

    #[error("version {0:?} is a minor version and requires auto_upgrade.0.enable = true")]
    VersionRequiresAutoUpgrade(String),

    #[error("auto_upgrade.0.enable = true requires a minor version (x.y), got {0:?}")]
    AutoUpgradeRequiresMinorVersion(String),

    #[error("no {kind} found with name {name:?}")]
    NotFoundByName { kind: String, name: String },

    #[error("{count} {kind}s found with the same name {name:?}")]
    AmbiguousName {
        kind: String,
        name: String,
        count: usize,
    },

    #[error("invalid value for {path}: {message}")]
    InvalidAttribute { path: String, message: String },

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    pub fn invalid_attribute(path: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::InvalidAttribute {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error for retry, drop-from-state, or surface decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Vendor(vendor) => vendor.class(),
            ProviderError::Timeout { .. } => ErrorClass::Timeout,
            ProviderError::Cancelled { .. } => ErrorClass::Cancelled,
            ProviderError::Transport(_) => ErrorClass::Transient,
            ProviderError::IdFormat(_)
            | ProviderError::LocalityMismatch { .. }
            | ProviderError::VersionRequiresAutoUpgrade(_)
            | ProviderError::AutoUpgradeRequiresMinorVersion(_)
            | ProviderError::InvalidAttribute { .. }
            | ProviderError::UnknownResourceType(_) => ErrorClass::Invalid,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    pub fn is_forbidden(&self) -> bool {
        self.class() == ErrorClass::Forbidden
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// The attribute this error is about, when known.
    pub fn attribute_path(&self) -> Option<&str> {
        match self {
            ProviderError::LocalityMismatch { attribute, .. } => Some(attribute),
            ProviderError::InvalidAttribute { path, .. } => Some(path),
            ProviderError::VersionRequiresAutoUpgrade(_)
            | ProviderError::AutoUpgradeRequiresMinorVersion(_) => Some("version"),
            _ => None,
        }
    }
}
