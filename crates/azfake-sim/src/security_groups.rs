use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{CloudError, NetworkSecurityGroup, ResourceId, ResourceKind, PROVISIONING_SUCCEEDED};
use azfake_store::Stores;
use tracing::debug;

use crate::api::NetworkSecurityGroupsApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{ListScope, Lookup, Upsert};

#[derive(Debug, Clone)]
pub struct SecurityGroupsSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<NetworkSecurityGroup>, NetworkSecurityGroup>>,
    pub get_behavior: Arc<Operation<Lookup, NetworkSecurityGroup>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<NetworkSecurityGroup>>>,
}

impl SecurityGroupsSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("networkSecurityGroups.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("networkSecurityGroups.get")),
            delete_behavior: Arc::new(Operation::new("networkSecurityGroups.delete")),
            list_behavior: Arc::new(Operation::new("networkSecurityGroups.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.list_behavior.reset();
    }

    fn id(&self, target: &Lookup) -> Result<ResourceId, CloudError> {
        target.resource_id(&self.config.subscription_id, ResourceKind::NetworkSecurityGroup)
    }

    async fn put(&self, input: Upsert<NetworkSecurityGroup>) -> Result<NetworkSecurityGroup, CloudError> {
        let id = self.id(&input.target)?;
        let key = id.to_string();
        let mut nsg = input.resource;
        nsg.id = Some(key.clone());
        nsg.name = Some(id.name().to_string());
        nsg.resource_type = Some(ResourceKind::NetworkSecurityGroup.arm_type());
        if nsg.location.is_none() {
            nsg.location = Some(self.config.location.clone());
        }

        let props = nsg.properties.get_or_insert_with(Default::default);
        props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
        for rule in props.security_rules.iter_mut() {
            let rule_name = rule
                .name
                .as_deref()
                .ok_or_else(|| CloudError::InvalidParameter(format!("security rule of '{}' has no name", key)))?;
            let rule_id = ResourceId::new(
                &id.subscription_id,
                &id.resource_group,
                ResourceKind::SecurityRule,
                &[id.name(), rule_name],
            )?;
            rule.id = Some(rule_id.to_string());
        }

        self.stores.network_security_groups.store(key.clone(), nsg.clone()).await;
        debug!(id = %key, "network security group stored");
        Ok(nsg)
    }

    async fn load(&self, target: Lookup) -> Result<NetworkSecurityGroup, CloudError> {
        let key = self.id(&target)?.to_string();
        self.stores
            .network_security_groups
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::NetworkSecurityGroup, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let key = self.id(&target)?.to_string();
        self.stores.network_security_groups.delete(&key).await;
        Ok(())
    }
}

#[async_trait]
impl NetworkSecurityGroupsApi for SecurityGroupsSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        nsg: NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup, CloudError> {
        let input = Upsert::new(Lookup::new(resource_group, name), nsg);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<NetworkSecurityGroup, CloudError> {
        self.get_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError> {
        self.delete_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.remove(target))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<NetworkSecurityGroup> {
        let stores = self.stores.clone();
        let subscription = self.config.subscription_id.clone();
        Pager::through(
            self.config.page_size,
            self.list_behavior.clone(),
            ctx,
            ListScope::resource_group(resource_group),
            move |scope: ListScope| {
                let stores = stores.clone();
                let subscription = subscription.clone();
                async move {
                    Ok::<_, CloudError>(scope.collect(&stores.network_security_groups, &subscription).await)
                }
            },
        )
    }
}
