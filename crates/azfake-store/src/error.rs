use azfake_domain::CloudError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("precondition failed for '{id}'")]
    PreconditionFailed { id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for CloudError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PreconditionFailed { id } => CloudError::PreconditionFailed { id },
            StoreError::Serialization(e) => CloudError::InvalidParameter(e.to_string()),
        }
    }
}
