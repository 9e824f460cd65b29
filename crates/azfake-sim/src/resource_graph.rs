//! Scan-based Resource Graph emulation over the VM and NIC tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{CloudError, ResourceId, ResourceKind, Tags};
use azfake_store::Stores;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::ResourceGraphApi;
use crate::context::CallContext;
use crate::operation::Operation;

/// One row of a Resource Graph result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub kind: Option<ResourceKind>,
    /// Lower-cased ARM type, as Resource Graph reports it.
    #[serde(rename = "type")]
    pub resource_type: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub location: Option<String>,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub tags: Tags,
}

impl ResourceSummary {
    fn new(kind: ResourceKind, id: &str, location: Option<String>, zones: Vec<String>, tags: Tags) -> Option<Self> {
        let parsed = match ResourceId::parse(id) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%kind, %id, error = %err, "store key is not a resource id; row skipped");
                return None;
            }
        };
        Some(Self {
            id: id.to_string(),
            name: parsed.name().to_string(),
            kind: Some(kind),
            resource_type: kind.arm_type().to_lowercase(),
            subscription_id: parsed.subscription_id,
            resource_group: parsed.resource_group.to_lowercase(),
            location,
            zones,
            tags,
        })
    }
}

/// Typed filters of a query; every set filter must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    /// Empty means every kind the graph indexes.
    #[serde(default)]
    pub kinds: Vec<ResourceKind>,
    pub resource_group: Option<String>,
    #[serde(default)]
    pub tag_equals: BTreeMap<String, String>,
    #[serde(default)]
    pub tag_exists: Vec<String>,
}

impl ResourceQuery {
    pub fn of_kind(kind: ResourceKind) -> Self {
        Self {
            kinds: vec![kind],
            ..Default::default()
        }
    }

    pub fn in_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    pub fn tag_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_equals.insert(key.into(), value.into());
        self
    }

    pub fn tag_exists(mut self, key: impl Into<String>) -> Self {
        self.tag_exists.push(key.into());
        self
    }

    pub fn matches(&self, row: &ResourceSummary) -> bool {
        let kind_ok = self.kinds.is_empty() || row.kind.is_some_and(|k| self.kinds.contains(&k));
        let group_ok = self
            .resource_group
            .as_deref()
            .map_or(true, |rg| rg.eq_ignore_ascii_case(&row.resource_group));
        let equals_ok = self
            .tag_equals
            .iter()
            .all(|(k, v)| row.tags.get(k) == Some(v));
        let exists_ok = self.tag_exists.iter().all(|k| row.tags.contains_key(k));
        kind_ok && group_ok && equals_ok && exists_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Empty means the environment's subscription.
    #[serde(default)]
    pub subscriptions: Vec<String>,
    pub query: ResourceQuery,
}

impl QueryRequest {
    pub fn new(query: ResourceQuery) -> Self {
        Self {
            subscriptions: Vec::new(),
            query,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub total_records: i64,
    pub count: i64,
    pub data: Vec<serde_json::Value>,
}

impl QueryResponse {
    /// Decode every row into `T`.
    pub fn rows<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.data.iter().cloned().map(serde_json::from_value).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceGraphSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub resources_behavior: Arc<Operation<QueryRequest, QueryResponse>>,
}

impl ResourceGraphSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            resources_behavior: Arc::new(Operation::new("resourceGraph.resources")),
        }
    }

    pub fn reset(&self) {
        self.resources_behavior.reset();
    }

    /// Every indexed resource accepted by `predicate`, read at call time.
    pub async fn query(&self, predicate: impl Fn(&ResourceSummary) -> bool) -> Vec<ResourceSummary> {
        let mut rows = Vec::new();
        for (id, vm) in self.stores.virtual_machines.snapshot().await {
            rows.extend(ResourceSummary::new(
                ResourceKind::VirtualMachine,
                &id,
                vm.location,
                vm.zones,
                vm.tags,
            ));
        }
        for (id, nic) in self.stores.network_interfaces.snapshot().await {
            rows.extend(ResourceSummary::new(
                ResourceKind::NetworkInterface,
                &id,
                nic.location,
                Vec::new(),
                nic.tags,
            ));
        }
        rows.retain(|row| predicate(row));
        rows
    }

    async fn run(&self, request: QueryRequest) -> Result<QueryResponse, CloudError> {
        let subscriptions = if request.subscriptions.is_empty() {
            vec![self.config.subscription_id.clone()]
        } else {
            request.subscriptions
        };
        let rows = self
            .query(|row| {
                subscriptions
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(&row.subscription_id))
                    && request.query.matches(row)
            })
            .await;

        let data = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CloudError::InvalidParameter(format!("unserializable row: {}", e)))?;
        debug!(rows = data.len(), "resource graph query");
        Ok(QueryResponse {
            total_records: data.len() as i64,
            count: data.len() as i64,
            data,
        })
    }
}

#[async_trait]
impl ResourceGraphApi for ResourceGraphSim {
    async fn resources(&self, ctx: &CallContext, request: QueryRequest) -> Result<QueryResponse, CloudError> {
        self.resources_behavior
            .invoke(ctx, request, |_, request| self.run(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use azfake_domain::tags::NODEPOOL_TAG;
    use azfake_domain::{make_id, NetworkInterface, VirtualMachine};

    use super::*;

    const SUB: &str = "12345678-1234-1234-1234-123456789012";

    async fn seeded() -> ResourceGraphSim {
        let graph = ResourceGraphSim::new(Arc::new(Stores::new()), Arc::new(EnvironmentConfig::default()));
        for (name, pool) in [("vm-a", Some("default")), ("vm-b", Some("spot")), ("vm-c", None)] {
            let mut vm = VirtualMachine {
                location: Some("southcentralus".into()),
                ..Default::default()
            };
            if let Some(pool) = pool {
                vm.tags.insert(NODEPOOL_TAG.into(), pool.into());
            }
            let id = make_id(SUB, "MC_rg", ResourceKind::VirtualMachine, &[name]);
            graph.stores.virtual_machines.store(id, vm).await;
        }
        let mut nic = NetworkInterface::default();
        nic.tags.insert(NODEPOOL_TAG.into(), "default".into());
        let id = make_id(SUB, "MC_rg", ResourceKind::NetworkInterface, &["nic-a"]);
        graph.stores.network_interfaces.store(id, nic).await;
        graph
    }

    #[tokio::test]
    async fn tag_filters() {
        let graph = seeded().await;
        let ctx = CallContext::new();

        let request = QueryRequest::new(
            ResourceQuery::of_kind(ResourceKind::VirtualMachine).tag_equals(NODEPOOL_TAG, "default"),
        );
        let response = graph.resources(&ctx, request).await.unwrap();
        assert_eq!(response.total_records, 1);
        let rows: Vec<ResourceSummary> = response.rows().unwrap();
        assert_eq!(rows[0].name, "vm-a");
        assert_eq!(rows[0].resource_type, "microsoft.compute/virtualmachines");
        assert_eq!(rows[0].resource_group, "mc_rg");

        let tagged = graph
            .resources(&ctx, QueryRequest::new(ResourceQuery::default().tag_exists(NODEPOOL_TAG)))
            .await
            .unwrap();
        assert_eq!(tagged.count, 3);
    }

    #[tokio::test]
    async fn foreign_subscription_sees_nothing() {
        let graph = seeded().await;
        let request = QueryRequest {
            subscriptions: vec!["00000000-0000-0000-0000-000000000000".into()],
            query: ResourceQuery::default(),
        };
        let response = graph.resources(&CallContext::new(), request).await.unwrap();
        assert_eq!(response.count, 0);
        assert!(response.data.is_empty());
    }

    #[tokio::test]
    async fn query_reads_current_state() {
        let graph = seeded().await;
        assert_eq!(graph.query(|_| true).await.len(), 4);
        graph.stores.virtual_machines.flush().await;
        let left = graph.query(|_| true).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, Some(ResourceKind::NetworkInterface));
    }

    #[tokio::test]
    async fn rows_with_unparseable_keys_are_skipped() {
        let graph = seeded().await;
        graph.stores.virtual_machines.store("vm-by-hand", VirtualMachine::default()).await;
        let rows = graph.query(|row| row.kind == Some(ResourceKind::VirtualMachine)).await;
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.id.starts_with("/subscriptions/")));
    }
}
