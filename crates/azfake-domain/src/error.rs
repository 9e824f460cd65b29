use thiserror::Error;

use crate::ids::ResourceKind;

/// Every failure a simulated control-plane operation can report.
///
/// Errors are cloneable so that call records can keep the exact outcome a
/// caller observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloudError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    #[error("malformed resource id '{id}': {reason}")]
    MalformedId { id: String, reason: String },

    #[error("agent pool '{pool}' is in {mode} mode; machine operations require Machines mode")]
    InvalidPoolMode { pool: String, mode: String },

    #[error("subnet '{subnet_id}' is full: all {capacity} usable addresses are allocated")]
    CapacityExhausted { subnet_id: String, capacity: u64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("precondition failed for '{id}': etag does not match")]
    PreconditionFailed { id: String },

    #[error("injected failure ({status} {code}): {message}")]
    Injected {
        status: u16,
        code: String,
        message: String,
    },
}

impl CloudError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        CloudError::NotFound { kind, id: id.into() }
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::MalformedId { id: id.into(), reason: reason.into() }
    }

    pub fn injected(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Injected {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// HTTP status the real service would answer with.
    pub fn status(&self) -> u16 {
        match self {
            CloudError::NotFound { .. } => 404,
            CloudError::MalformedId { .. } => 400,
            CloudError::InvalidPoolMode { .. } => 400,
            CloudError::CapacityExhausted { .. } => 409,
            CloudError::InvalidParameter(_) => 400,
            CloudError::PreconditionFailed { .. } => 412,
            CloudError::Injected { status, .. } => *status,
        }
    }

    /// ARM-style error code.
    pub fn code(&self) -> &str {
        match self {
            CloudError::NotFound { .. } => "ResourceNotFound",
            CloudError::MalformedId { .. } => "InvalidResourceId",
            CloudError::InvalidPoolMode { .. } => "OperationNotAllowed",
            CloudError::CapacityExhausted { .. } => "SubnetIsFull",
            CloudError::InvalidParameter(_) => "InvalidParameter",
            CloudError::PreconditionFailed { .. } => "PreconditionFailed",
            CloudError::Injected { code, .. } => code,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}
