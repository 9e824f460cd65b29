use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{CloudError, LoadBalancer, ResourceId, ResourceKind, PROVISIONING_SUCCEEDED};
use azfake_store::Stores;
use tracing::debug;

use crate::api::LoadBalancersApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{ListScope, Lookup, Upsert};

#[derive(Debug, Clone)]
pub struct LoadBalancersSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<LoadBalancer>, LoadBalancer>>,
    pub get_behavior: Arc<Operation<Lookup, LoadBalancer>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<LoadBalancer>>>,
}

impl LoadBalancersSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("loadBalancers.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("loadBalancers.get")),
            delete_behavior: Arc::new(Operation::new("loadBalancers.delete")),
            list_behavior: Arc::new(Operation::new("loadBalancers.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.list_behavior.reset();
    }

    fn id(&self, target: &Lookup) -> Result<ResourceId, CloudError> {
        target.resource_id(&self.config.subscription_id, ResourceKind::LoadBalancer)
    }

    async fn put(&self, input: Upsert<LoadBalancer>) -> Result<LoadBalancer, CloudError> {
        let id = self.id(&input.target)?;
        let key = id.to_string();
        let mut lb = input.resource;
        lb.id = Some(key.clone());
        lb.name = Some(id.name().to_string());
        lb.resource_type = Some(ResourceKind::LoadBalancer.arm_type());
        if lb.location.is_none() {
            lb.location = Some(self.config.location.clone());
        }

        let props = lb.properties.get_or_insert_with(Default::default);
        props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
        for pool in props.backend_address_pools.iter_mut() {
            let pool_name = pool
                .name
                .as_deref()
                .ok_or_else(|| CloudError::InvalidParameter(format!("backend address pool of '{}' has no name", key)))?;
            let pool_id = ResourceId::new(
                &id.subscription_id,
                &id.resource_group,
                ResourceKind::BackendAddressPool,
                &[id.name(), pool_name],
            )?;
            pool.id = Some(pool_id.to_string());
        }

        self.stores.load_balancers.store(key.clone(), lb.clone()).await;
        debug!(id = %key, "load balancer stored");
        Ok(lb)
    }

    async fn load(&self, target: Lookup) -> Result<LoadBalancer, CloudError> {
        let key = self.id(&target)?.to_string();
        self.stores
            .load_balancers
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::LoadBalancer, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let key = self.id(&target)?.to_string();
        self.stores.load_balancers.delete(&key).await;
        Ok(())
    }
}

#[async_trait]
impl LoadBalancersApi for LoadBalancersSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        lb: LoadBalancer,
    ) -> Result<LoadBalancer, CloudError> {
        let input = Upsert::new(Lookup::new(resource_group, name), lb);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<LoadBalancer, CloudError> {
        self.get_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError> {
        self.delete_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.remove(target))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<LoadBalancer> {
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
                async move { Ok::<_, CloudError>(scope.collect(&stores.load_balancers, &subscription).await) }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use azfake_domain::{make_id, BackendAddressPool, LoadBalancerProperties};

    use super::*;

    fn sim() -> LoadBalancersSim {
        LoadBalancersSim::new(Arc::new(Stores::new()), Arc::new(EnvironmentConfig::default()))
    }

    #[tokio::test]
    async fn backend_pool_ids_are_derived() {
        let lbs = sim();
        let lb = lbs
            .create_or_update(
                &CallContext::new(),
                "node-rg",
                "kubernetes",
                LoadBalancer::standard(&["kubernetes", "aksOutboundBackendPool"]),
            )
            .await
            .unwrap();
        let sub = &EnvironmentConfig::default().subscription_id;
        assert_eq!(
            lb.backend_pool("aksOutboundBackendPool").unwrap().id.as_deref(),
            Some(
                make_id(
                    sub,
                    "node-rg",
                    ResourceKind::BackendAddressPool,
                    &["kubernetes", "aksOutboundBackendPool"]
                )
                .as_str()
            )
        );
    }

    #[tokio::test]
    async fn unnamed_pool_is_rejected() {
        let lbs = sim();
        let lb = LoadBalancer {
            properties: Some(LoadBalancerProperties {
                backend_address_pools: vec![BackendAddressPool::default()],
                provisioning_state: None,
            }),
            ..Default::default()
        };
        let err = lbs
            .create_or_update(&CallContext::new(), "rg", "lb", lb)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let lbs = sim();
        let ctx = CallContext::new();
        lbs.create_or_update(&ctx, "rg", "lb", LoadBalancer::standard(&["a"])).await.unwrap();
        lbs.delete(&ctx, "rg", "lb").await.unwrap();
        lbs.delete(&ctx, "rg", "lb").await.unwrap();
        assert!(lbs.get(&ctx, "rg", "lb").await.unwrap_err().is_not_found());
        assert!(lbs.list(&ctx, "rg").collect_all().await.unwrap().is_empty());
    }
}
