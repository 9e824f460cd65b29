use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::tags::AKS_POOL_NAME_TAG;
use azfake_domain::{
    AgentPool, CloudError, DriftAction, Machine, MachineStatus, OwnershipTags, ResourceId, ResourceKind,
    PROVISIONING_SUCCEEDED,
};
use azfake_store::Stores;
use chrono::Utc;
use tracing::debug;

use crate::agent_pools::require_machines_mode;
use crate::api::MachinesApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{ListScope, Lookup, Upsert};

/// AKS machines: single nodes of an agent pool in `Machines` mode.
///
/// Drift status is computed against the owning pool every time a machine is
/// read and is never written back.
#[derive(Debug, Clone)]
pub struct MachinesSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<Machine>, Machine>>,
    pub get_behavior: Arc<Operation<Lookup, Machine>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<Machine>>>,
}

impl MachinesSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("machines.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("machines.get")),
            delete_behavior: Arc::new(Operation::new("machines.delete")),
            list_behavior: Arc::new(Operation::new("machines.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.list_behavior.reset();
    }

    fn id(&self, target: &Lookup) -> Result<ResourceId, CloudError> {
        target.resource_id(&self.config.subscription_id, ResourceKind::Machine)
    }

    async fn pool_of(&self, machine_id: &ResourceId) -> Result<(String, Option<AgentPool>), CloudError> {
        let pool_id = machine_id
            .parent()
            .ok_or_else(|| CloudError::malformed(machine_id.to_string(), "machine id without an agent pool"))?;
        let key = pool_id.to_string();
        let pool = self.stores.agent_pools.load(&key).await;
        Ok((key, pool))
    }

    async fn put(&self, input: Upsert<Machine>) -> Result<Machine, CloudError> {
        let id = self.id(&input.target)?;
        let key = id.to_string();
        let (pool_key, pool) = self.pool_of(&id).await?;
        let pool = pool.ok_or_else(|| CloudError::not_found(ResourceKind::AgentPool, pool_key))?;
        let pool_name = input.target.parents.last().cloned().unwrap_or_default();
        require_machines_mode(&pool, &pool_name)?;

        let mut machine = input.resource;
        machine.id = Some(key.clone());
        machine.name = Some(id.name().to_string());
        machine.resource_type = Some(ResourceKind::Machine.arm_type());

        let props = machine.properties.get_or_insert_with(Default::default);
        let owner = OwnershipTags::decode(&props.tags)?;
        let tagged = props.tags.get(AKS_POOL_NAME_TAG).cloned();
        if let Some(tagged) = tagged.filter(|t| *t != pool_name) {
            return Err(CloudError::InvalidParameter(format!(
                "tag {} is '{}' but the machine is created in pool '{}'",
                AKS_POOL_NAME_TAG, tagged, pool_name
            )));
        }
        props.tags.insert(AKS_POOL_NAME_TAG.to_string(), pool_name.clone());
        props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
        if props.resource_id.is_none() {
            let vm_name = format!("aks-{}-{}-vm", pool_name, id.name());
            let vm_id = ResourceId::new(
                &self.config.subscription_id,
                &self.config.node_resource_group,
                ResourceKind::VirtualMachine,
                &[vm_name.as_str()],
            )?;
            props.resource_id = Some(vm_id.to_string());
        }

        let stored = self
            .stores
            .machines
            .with_entry(&key, |slot| {
                let existing = slot.as_ref().and_then(|m| m.status()).and_then(|s| s.creation_timestamp);
                if let Some(props) = machine.properties.as_mut() {
                    let status = props.status.get_or_insert_with(MachineStatus::default);
                    status.creation_timestamp = owner.created_at.or(existing).or(Some(Utc::now()));
                }
                *slot = Some(machine.clone());
                machine
            })
            .await;
        debug!(id = %key, pool = %pool_name, "machine stored");
        Ok(with_drift(stored, Some(&pool)))
    }

    async fn load(&self, target: Lookup) -> Result<Machine, CloudError> {
        let id = self.id(&target)?;
        let key = id.to_string();
        let machine = self
            .stores
            .machines
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::Machine, key))?;
        let (_, pool) = self.pool_of(&id).await?;
        Ok(with_drift(machine, pool.as_ref()))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let id = self.id(&target)?;
        let key = id.to_string();
        let (_, pool) = self.pool_of(&id).await?;
        if let Some(pool) = pool {
            let pool_name = target.parents.last().map(String::as_str).unwrap_or_default();
            require_machines_mode(&pool, pool_name)?;
        }
        if self.stores.machines.delete(&key).await.is_some() {
            debug!(id = %key, "machine deleted");
        }
        Ok(())
    }
}

/// Fill in the drift status of `machine` relative to its pool.
///
/// An explicitly stored drift action wins. Otherwise a machine whose node
/// image or Kubernetes version differs from the pool's must be recreated.
fn with_drift(mut machine: Machine, pool: Option<&AgentPool>) -> Machine {
    let Some(props) = machine.properties.as_mut() else {
        return machine;
    };
    let status = props.status.get_or_insert_with(MachineStatus::default);
    if status.drift_action.is_some() {
        return machine;
    }

    let wanted = pool.and_then(|p| p.properties.as_ref());
    let actual = props.kubernetes.as_ref();
    let differs = |want: Option<&String>, got: Option<&String>| matches!((want, got), (Some(w), Some(g)) if w != g);

    let reason = if differs(
        wanted.and_then(|w| w.node_image_version.as_ref()),
        actual.and_then(|a| a.node_image_version.as_ref()),
    ) {
        Some("NodeImageVersionDrift")
    } else if differs(
        wanted.and_then(|w| w.orchestrator_version.as_ref()),
        actual.and_then(|a| a.orchestrator_version.as_ref()),
    ) {
        Some("KubernetesVersionDrift")
    } else {
        None
    };

    match reason {
        Some(reason) => {
            status.drift_action = Some(DriftAction::Recreate);
            status.drift_reason = Some(reason.to_string());
        }
        None => status.drift_action = Some(DriftAction::Synced),
    }
    machine
}

#[async_trait]
impl MachinesApi for MachinesSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        name: &str,
        machine: Machine,
    ) -> Result<Machine, CloudError> {
        let input = Upsert::new(Lookup::nested(resource_group, &[cluster_name, pool_name], name), machine);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        name: &str,
    ) -> Result<Machine, CloudError> {
        let target = Lookup::nested(resource_group, &[cluster_name, pool_name], name);
        self.get_behavior
            .invoke(ctx, target, |_, target| self.load(target))
            .await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        name: &str,
    ) -> Result<(), CloudError> {
        let target = Lookup::nested(resource_group, &[cluster_name, pool_name], name);
        self.delete_behavior
            .invoke(ctx, target, |_, target| self.remove(target))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str, pool_name: &str) -> Pager<Machine> {
        let stores = self.stores.clone();
        let subscription = self.config.subscription_id.clone();
        Pager::through(
            self.config.page_size,
            self.list_behavior.clone(),
            ctx,
            ListScope::nested(resource_group, &[cluster_name, pool_name]),
            move |scope: ListScope| {
                let stores = stores.clone();
                let subscription = subscription.clone();
                async move {
                    let resource_group = scope.resource_group.clone().unwrap_or_default();
                    let parents: Vec<&str> = scope.parents.iter().map(String::as_str).collect();
                    let pool_id = ResourceId::new(&subscription, &resource_group, ResourceKind::AgentPool, &parents)?;
                    let pool = stores.agent_pools.load(&pool_id.to_string()).await;
                    let machines = scope.collect(&stores.machines, &subscription).await;
                    Ok::<_, CloudError>(machines.into_iter().map(|m| with_drift(m, pool.as_ref())).collect())
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use azfake_domain::tags::{AKS_MACHINE_CREATION_TIMESTAMP_TAG, NODEPOOL_TAG};
    use azfake_domain::{AgentPoolMode, AgentPoolProperties, MachineKubernetesProfile, MachineProperties};

    use super::*;

    fn sim() -> MachinesSim {
        MachinesSim::new(Arc::new(Stores::new()), Arc::new(EnvironmentConfig::default()))
    }

    async fn seed_pool(machines: &MachinesSim, name: &str, mode: AgentPoolMode, image: Option<&str>) {
        let sub = &machines.config.subscription_id;
        let id = ResourceId::new(sub, "rg", ResourceKind::AgentPool, &["cluster", name]).unwrap();
        let pool = AgentPool {
            properties: Some(AgentPoolProperties {
                mode: Some(mode),
                node_image_version: image.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        };
        machines.stores.agent_pools.store(id.to_string(), pool).await;
    }

    fn machine_with_image(image: &str) -> Machine {
        Machine {
            properties: Some(MachineProperties {
                kubernetes: Some(MachineKubernetesProfile {
                    node_image_version: Some(image.into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_pool_in_machines_mode() {
        let machines = sim();
        let ctx = CallContext::new();
        let missing = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", Machine::default())
            .await
            .unwrap_err();
        assert!(matches!(missing, CloudError::NotFound { kind: ResourceKind::AgentPool, .. }));

        seed_pool(&machines, "ap", AgentPoolMode::User, None).await;
        let wrong_mode = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", Machine::default())
            .await
            .unwrap_err();
        assert!(matches!(wrong_mode, CloudError::InvalidPoolMode { .. }));
        assert!(machines.stores.machines.is_empty().await);
    }

    #[tokio::test]
    async fn server_fields_are_filled() {
        let machines = sim();
        let ctx = CallContext::new();
        seed_pool(&machines, "ap", AgentPoolMode::Machines, None).await;

        let mut machine = Machine::default();
        let props = machine.properties.get_or_insert_with(Default::default);
        props.tags.insert(NODEPOOL_TAG.into(), "default".into());
        props.tags.insert(AKS_MACHINE_CREATION_TIMESTAMP_TAG.into(), "2024-05-01T12:00:00Z".into());

        let created = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", machine)
            .await
            .unwrap();
        let props = created.properties.as_ref().unwrap();
        assert_eq!(props.tags[AKS_POOL_NAME_TAG], "ap");
        assert!(props.resource_id.as_deref().unwrap().ends_with("/virtualMachines/aks-ap-m1-vm"));
        assert_eq!(
            created.status().unwrap().creation_timestamp.unwrap().to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );

        // A later update without the tag keeps the original timestamp.
        let again = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", Machine::default())
            .await
            .unwrap();
        assert_eq!(again.status().unwrap().creation_timestamp, created.status().unwrap().creation_timestamp);
    }

    #[tokio::test]
    async fn bad_tags_are_rejected() {
        let machines = sim();
        let ctx = CallContext::new();
        seed_pool(&machines, "ap", AgentPoolMode::Machines, None).await;

        let mut bad_time = Machine::default();
        bad_time
            .properties
            .get_or_insert_with(Default::default)
            .tags
            .insert(AKS_MACHINE_CREATION_TIMESTAMP_TAG.into(), "yesterday".into());
        let err = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", bad_time)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidParameter(_)));

        let mut other_pool = Machine::default();
        other_pool
            .properties
            .get_or_insert_with(Default::default)
            .tags
            .insert(AKS_POOL_NAME_TAG.into(), "someotherpool".into());
        let err = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", other_pool)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn drift_is_derived_from_the_pool() {
        let machines = sim();
        let ctx = CallContext::new();
        seed_pool(&machines, "ap", AgentPoolMode::Machines, Some("AKSUbuntu-2204-202405.01.0")).await;

        let synced = machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", machine_with_image("AKSUbuntu-2204-202405.01.0"))
            .await
            .unwrap();
        assert_eq!(synced.drift_action(), Some(DriftAction::Synced));

        machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m2", machine_with_image("AKSUbuntu-2204-202401.01.0"))
            .await
            .unwrap();
        let drifted = machines.get(&ctx, "rg", "cluster", "ap", "m2").await.unwrap();
        assert_eq!(drifted.drift_action(), Some(DriftAction::Recreate));
        assert_eq!(drifted.status().unwrap().drift_reason.as_deref(), Some("NodeImageVersionDrift"));

        // Derived status is not persisted.
        let stored = machines
            .stores
            .machines
            .load(drifted.id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.drift_action(), None);

        let listed = machines.list(&ctx, "rg", "cluster", "ap").collect_all().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|m| m.drift_action().is_some()));
    }

    #[tokio::test]
    async fn delete_is_mode_gated_and_idempotent() {
        let machines = sim();
        let ctx = CallContext::new();
        seed_pool(&machines, "ap", AgentPoolMode::Machines, None).await;
        machines
            .create_or_update(&ctx, "rg", "cluster", "ap", "m1", Machine::default())
            .await
            .unwrap();

        seed_pool(&machines, "ap", AgentPoolMode::System, None).await;
        let err = machines.delete(&ctx, "rg", "cluster", "ap", "m1").await.unwrap_err();
        assert!(matches!(err, CloudError::InvalidPoolMode { .. }));

        seed_pool(&machines, "ap", AgentPoolMode::Machines, None).await;
        machines.delete(&ctx, "rg", "cluster", "ap", "m1").await.unwrap();
        machines.delete(&ctx, "rg", "cluster", "ap", "m1").await.unwrap();
        machines.delete(&ctx, "rg", "cluster", "gone", "m1").await.unwrap();
        assert!(machines.get(&ctx, "rg", "cluster", "ap", "m1").await.unwrap_err().is_not_found());
    }
}
