use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{
    AgentPool, AgentPoolMode, CloudError, MachineNames, ResourceId, ResourceKind, PROVISIONING_SUCCEEDED,
};
use azfake_store::Stores;
use tracing::debug;

use crate::api::AgentPoolsApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{ListScope, Lookup, MachineBatch, Upsert};

#[derive(Debug, Clone)]
pub struct AgentPoolsSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<AgentPool>, AgentPool>>,
    pub get_behavior: Arc<Operation<Lookup, AgentPool>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub delete_machines_behavior: Arc<Operation<MachineBatch, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<AgentPool>>>,
}

impl AgentPoolsSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("agentPools.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("agentPools.get")),
            delete_behavior: Arc::new(Operation::new("agentPools.delete")),
            delete_machines_behavior: Arc::new(Operation::new("agentPools.deleteMachines")),
            list_behavior: Arc::new(Operation::new("agentPools.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.delete_machines_behavior.reset();
        self.list_behavior.reset();
    }

    fn id(&self, target: &Lookup) -> Result<ResourceId, CloudError> {
        target.resource_id(&self.config.subscription_id, ResourceKind::AgentPool)
    }

    async fn put(&self, input: Upsert<AgentPool>) -> Result<AgentPool, CloudError> {
        let id = self.id(&input.target)?;
        let key = id.to_string();
        let mut pool = input.resource;
        pool.id = Some(key.clone());
        pool.name = Some(id.name().to_string());
        pool.resource_type = Some(ResourceKind::AgentPool.arm_type());

        let props = pool.properties.get_or_insert_with(Default::default);
        let mode = *props.mode.get_or_insert(AgentPoolMode::User);
        props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());

        self.stores.agent_pools.store(key.clone(), pool.clone()).await;
        debug!(id = %key, %mode, "agent pool stored");
        Ok(pool)
    }

    async fn load(&self, target: Lookup) -> Result<AgentPool, CloudError> {
        let key = self.id(&target)?.to_string();
        self.stores
            .agent_pools
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::AgentPool, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let id = self.id(&target)?;
        let key = id.to_string();
        self.stores.agent_pools.delete(&key).await;

        let parents: Vec<&str> = id.names.iter().map(String::as_str).collect();
        let scope = ListScope::nested(&id.resource_group, &parents);
        let mut owned = Vec::new();
        self.stores
            .machines
            .range(|machine_id, _| {
                if scope.contains(&id.subscription_id, machine_id) {
                    owned.push(machine_id.to_string());
                }
                true
            })
            .await;
        for machine_id in &owned {
            self.stores.machines.delete(machine_id).await;
        }
        debug!(id = %key, machines = owned.len(), "agent pool deleted");
        Ok(())
    }

    async fn remove_machines(&self, batch: MachineBatch) -> Result<(), CloudError> {
        let pool_id = self.id(&batch.pool)?;
        let pool = self
            .stores
            .agent_pools
            .load(&pool_id.to_string())
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::AgentPool, pool_id.to_string()))?;
        require_machines_mode(&pool, pool_id.name())?;

        let mut parents: Vec<&str> = batch.pool.parents.iter().map(String::as_str).collect();
        parents.push(&batch.pool.name);
        let mut removed = 0;
        for name in &batch.machine_names {
            let machine_id = Lookup::nested(&batch.pool.resource_group, &parents, name)
                .resource_id(&self.config.subscription_id, ResourceKind::Machine)?;
            if self.stores.machines.delete(&machine_id.to_string()).await.is_some() {
                removed += 1;
            }
        }
        debug!(pool = %pool_id, requested = batch.machine_names.len(), removed, "machines deleted");
        Ok(())
    }
}

/// Machine operations are only allowed on pools in `Machines` mode.
pub(crate) fn require_machines_mode(pool: &AgentPool, pool_name: &str) -> Result<(), CloudError> {
    match pool.mode() {
        AgentPoolMode::Machines => Ok(()),
        mode => Err(CloudError::InvalidPoolMode {
            pool: pool_name.to_string(),
            mode: mode.to_string(),
        }),
    }
}

#[async_trait]
impl AgentPoolsApi for AgentPoolsSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        name: &str,
        pool: AgentPool,
    ) -> Result<AgentPool, CloudError> {
        let input = Upsert::new(Lookup::nested(resource_group, &[cluster_name], name), pool);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str, name: &str) -> Result<AgentPool, CloudError> {
        let target = Lookup::nested(resource_group, &[cluster_name], name);
        self.get_behavior
            .invoke(ctx, target, |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str, name: &str) -> Result<(), CloudError> {
        let target = Lookup::nested(resource_group, &[cluster_name], name);
        self.delete_behavior
            .invoke(ctx, target, |_, target| self.remove(target))
            .await
    }

    async fn delete_machines(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        name: &str,
        machines: MachineNames,
    ) -> Result<(), CloudError> {
        let batch = MachineBatch {
            pool: Lookup::nested(resource_group, &[cluster_name], name),
            machine_names: machines.machine_names,
        };
        self.delete_machines_behavior
            .invoke(ctx, batch, |_, batch| self.remove_machines(batch))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str) -> Pager<AgentPool> {
        let stores = self.stores.clone();
        let subscription = self.config.subscription_id.clone();
        Pager::through(
            self.config.page_size,
            self.list_behavior.clone(),
            ctx,
            ListScope::nested(resource_group, &[cluster_name]),
            move |scope: ListScope| {
                let stores = stores.clone();
                let subscription = subscription.clone();
                async move { Ok::<_, CloudError>(scope.collect(&stores.agent_pools, &subscription).await) }
            },
        )
    }
}
