use serde::{Deserialize, Serialize};

pub const PROVISIONING_SUCCEEDED: &str = "Succeeded";

/// Reference to another resource by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubResource {
    pub id: Option<String>,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}
