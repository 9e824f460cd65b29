use std::time::Instant;

use uuid::Uuid;

/// Per-call metadata passed to every simulated operation.
///
/// The deadline is carried so callers can use the same signatures they would
/// against the real service, but no simulated operation ever returns early
/// because of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Token for a cross-tenant auxiliary subscription, if any.
    pub auxiliary_token: Option<String>,
    pub deadline: Option<Instant>,
    pub correlation_id: Uuid,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            auxiliary_token: None,
            deadline: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_auxiliary_token(mut self, token: impl Into<String>) -> Self {
        self.auxiliary_token = Some(token.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
