use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CloudError;

pub type Tags = HashMap<String, String>;

// Azure tag keys cannot contain '/', so Kubernetes-style keys use '_'.
pub const CLUSTER_TAG: &str = "karpenter.azure.com_cluster";
pub const NODEPOOL_TAG: &str = "karpenter.sh_nodepool";
pub const AKS_MACHINE_CREATION_TIMESTAMP_TAG: &str = "karpenter.azure.com_aksmachine_creationtimestamp";
pub const AKS_MACHINE_NODECLAIM_TAG: &str = "karpenter.azure.com_aksmachine_nodeclaim";
/// Set by the service on every machine; names the owning agent pool.
pub const AKS_POOL_NAME_TAG: &str = "aks-managed-poolName";

/// Ownership information the controller encodes in resource tags.
///
/// Simulators store tags verbatim; this type is the single place where their
/// format is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipTags {
    pub cluster: Option<String>,
    pub node_pool: Option<String>,
    pub node_claim: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl OwnershipTags {
    /// Decode ownership tags. Absent keys are fine; present keys must have a
    /// non-empty value and the creation timestamp must be RFC 3339.
    pub fn decode(tags: &Tags) -> Result<Self, CloudError> {
        let created_at = non_empty(tags, AKS_MACHINE_CREATION_TIMESTAMP_TAG)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        CloudError::InvalidParameter(format!(
                            "tag {} has invalid timestamp '{}': {}",
                            AKS_MACHINE_CREATION_TIMESTAMP_TAG, raw, e
                        ))
                    })
            })
            .transpose()?;

        Ok(Self {
            cluster: non_empty(tags, CLUSTER_TAG)?.map(str::to_string),
            node_pool: non_empty(tags, NODEPOOL_TAG)?.map(str::to_string),
            node_claim: non_empty(tags, AKS_MACHINE_NODECLAIM_TAG)?.map(str::to_string),
            created_at,
        })
    }

    pub fn encode(&self) -> Tags {
        let mut tags = Tags::new();
        if let Some(cluster) = &self.cluster {
            tags.insert(CLUSTER_TAG.to_string(), cluster.clone());
        }
        if let Some(pool) = &self.node_pool {
            tags.insert(NODEPOOL_TAG.to_string(), pool.clone());
        }
        if let Some(claim) = &self.node_claim {
            tags.insert(AKS_MACHINE_NODECLAIM_TAG.to_string(), claim.clone());
        }
        if let Some(at) = &self.created_at {
            tags.insert(
                AKS_MACHINE_CREATION_TIMESTAMP_TAG.to_string(),
                at.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        tags
    }

    pub fn require_node_pool(&self) -> Result<&str, CloudError> {
        self.node_pool
            .as_deref()
            .ok_or_else(|| CloudError::InvalidParameter(format!("missing tag {}", NODEPOOL_TAG)))
    }
}

fn non_empty<'a>(tags: &'a Tags, key: &str) -> Result<Option<&'a str>, CloudError> {
    match tags.get(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => {
            Err(CloudError::InvalidParameter(format!("tag {} is present but empty", key)))
        }
        Some(v) => Ok(Some(v.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encode_decode() {
        let owner = OwnershipTags {
            cluster: Some("test-cluster".into()),
            node_pool: Some("default".into()),
            node_claim: Some("default-abcde".into()),
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        };
        let tags = owner.encode();
        assert_eq!(tags[AKS_MACHINE_CREATION_TIMESTAMP_TAG], "2024-05-01T12:00:00Z");
        assert_eq!(OwnershipTags::decode(&tags).unwrap(), owner);
    }

    #[test]
    fn missing_tags_decode_to_none() {
        let decoded = OwnershipTags::decode(&Tags::new()).unwrap();
        assert_eq!(decoded, OwnershipTags::default());
        assert!(decoded.require_node_pool().is_err());
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let mut tags = Tags::new();
        tags.insert(AKS_MACHINE_CREATION_TIMESTAMP_TAG.into(), "yesterday".into());
        let err = OwnershipTags::decode(&tags).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn empty_value_is_rejected() {
        let mut tags = Tags::new();
        tags.insert(NODEPOOL_TAG.into(), " ".into());
        assert!(OwnershipTags::decode(&tags).is_err());
    }
}
