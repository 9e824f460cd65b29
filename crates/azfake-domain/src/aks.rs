use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::Tags;

// ── Agent pools ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentPoolMode {
    System,
    #[default]
    User,
    Gateway,
    /// Nodes are individually managed through the machines API.
    Machines,
}

impl std::fmt::Display for AgentPoolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentPoolMode::System => write!(f, "System"),
            AgentPoolMode::User => write!(f, "User"),
            AgentPoolMode::Gateway => write!(f, "Gateway"),
            AgentPoolMode::Machines => write!(f, "Machines"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPool {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub properties: Option<AgentPoolProperties>,
}

impl AgentPool {
    pub fn with_mode(mode: AgentPoolMode) -> Self {
        Self {
            properties: Some(AgentPoolProperties {
                mode: Some(mode),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn mode(&self) -> AgentPoolMode {
        self.properties
            .as_ref()
            .and_then(|p| p.mode)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProperties {
    pub mode: Option<AgentPoolMode>,
    pub count: Option<i32>,
    pub vm_size: Option<String>,
    pub orchestrator_version: Option<String>,
    pub node_image_version: Option<String>,
    pub os_type: Option<String>,
    pub provisioning_state: Option<String>,
}

// ── Machines ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    pub properties: Option<MachineProperties>,
}

impl Machine {
    pub fn tags(&self) -> Option<&Tags> {
        self.properties.as_ref().map(|p| &p.tags)
    }

    pub fn status(&self) -> Option<&MachineStatus> {
        self.properties.as_ref()?.status.as_ref()
    }

    pub fn drift_action(&self) -> Option<DriftAction> {
        self.status()?.drift_action
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineProperties {
    pub hardware: Option<MachineHardwareProfile>,
    pub kubernetes: Option<MachineKubernetesProfile>,
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub provisioning_state: Option<String>,
    /// Id of the virtual machine backing this machine.
    pub resource_id: Option<String>,
    pub status: Option<MachineStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineHardwareProfile {
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineKubernetesProfile {
    pub orchestrator_version: Option<String>,
    pub node_image_version: Option<String>,
    #[serde(default)]
    pub node_labels: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub node_taints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftAction {
    Synced,
    Recreate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub drift_action: Option<DriftAction>,
    pub drift_reason: Option<String>,
}

/// Batch delete body for an agent pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineNames {
    pub machine_names: Vec<String>,
}
