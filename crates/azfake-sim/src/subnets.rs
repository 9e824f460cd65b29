use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{CloudError, ResourceKind, SubResource, Subnet, PROVISIONING_SUCCEEDED};
use azfake_store::Stores;
use tracing::debug;

use crate::api::SubnetsApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{canonicalize_reference, ListScope, Lookup, Upsert};

#[derive(Debug, Clone)]
pub struct SubnetsSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<Subnet>, Subnet>>,
    pub get_behavior: Arc<Operation<Lookup, Subnet>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<Subnet>>>,
}

impl SubnetsSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("subnets.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("subnets.get")),
            delete_behavior: Arc::new(Operation::new("subnets.delete")),
            list_behavior: Arc::new(Operation::new("subnets.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.list_behavior.reset();
    }

    fn key(&self, target: &Lookup) -> Result<String, CloudError> {
        Ok(target
            .resource_id(&self.config.subscription_id, ResourceKind::Subnet)?
            .to_string())
    }

    async fn put(&self, input: Upsert<Subnet>) -> Result<Subnet, CloudError> {
        let key = self.key(&input.target)?;
        let mut subnet = input.resource;
        subnet.id = Some(key.clone());
        subnet.name = Some(input.target.name.clone());
        subnet.resource_type = Some(ResourceKind::Subnet.arm_type());

        let capacity = subnet.usable_address_count()?;
        if let Some(nsg) = subnet
            .properties
            .as_mut()
            .and_then(|p| p.network_security_group.as_mut())
        {
            canonicalize_reference(nsg, ResourceKind::NetworkSecurityGroup)?;
        }

        let stored = self
            .stores
            .subnets
            .with_entry(&key, |slot| -> Result<Subnet, CloudError> {
                // The set of attached IP configurations belongs to the service.
                let in_use = slot
                    .as_ref()
                    .and_then(|s| s.properties.as_ref())
                    .map(|p| p.ip_configurations.clone())
                    .unwrap_or_default();
                if let Some(capacity) = capacity {
                    if in_use.len() as u64 > capacity {
                        return Err(CloudError::InvalidParameter(format!(
                            "address prefix of subnet '{}' leaves {} usable addresses but {} are in use",
                            key,
                            capacity,
                            in_use.len()
                        )));
                    }
                }
                let props = subnet.properties.get_or_insert_with(Default::default);
                props.ip_configurations = in_use;
                props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
                *slot = Some(subnet.clone());
                Ok(subnet)
            })
            .await?;
        debug!(id = %key, capacity = ?capacity, "subnet stored");
        Ok(stored)
    }

    async fn load(&self, target: Lookup) -> Result<Subnet, CloudError> {
        let key = self.key(&target)?;
        self.stores
            .subnets
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::Subnet, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let key = self.key(&target)?;
        // Interfaces still pointing here keep their references; releasing
        // against a missing subnet is a no-op.
        if let Some(removed) = self.stores.subnets.delete(&key).await {
            debug!(id = %key, attached = removed.ip_configuration_count(), "subnet deleted");
        }
        Ok(())
    }
}

// ── Address accounting ────────────────────────────────────────────────────────

/// Attach `ip_configuration_id` to a stored subnet.
///
/// Returns `true` when a new address was taken, `false` when the configuration
/// already held one or the subnet is not in the store. Unknown subnets are not
/// an error; only subnets the test created are accounted.
pub(crate) async fn claim_address(stores: &Stores, subnet_id: &str, ip_configuration_id: &str) -> Result<bool, CloudError> {
    stores
        .subnets
        .update(subnet_id, |subnet| -> Result<bool, CloudError> {
            let held = subnet.properties.as_ref().is_some_and(|p| {
                p.ip_configurations
                    .iter()
                    .any(|r| r.id.as_deref() == Some(ip_configuration_id))
            });
            if held {
                return Ok(false);
            }
            if let Some(capacity) = subnet.usable_address_count()? {
                if subnet.ip_configuration_count() as u64 >= capacity {
                    return Err(CloudError::CapacityExhausted {
                        subnet_id: subnet_id.to_string(),
                        capacity,
                    });
                }
            }
            subnet
                .properties
                .get_or_insert_with(Default::default)
                .ip_configurations
                .push(SubResource::new(ip_configuration_id));
            Ok(true)
        })
        .await
        .unwrap_or(Ok(false))
}

pub(crate) async fn release_address(stores: &Stores, subnet_id: &str, ip_configuration_id: &str) {
    stores
        .subnets
        .update(subnet_id, |subnet| {
            if let Some(props) = subnet.properties.as_mut() {
                props
                    .ip_configurations
                    .retain(|r| r.id.as_deref() != Some(ip_configuration_id));
            }
        })
        .await;
}

#[async_trait]
impl SubnetsApi for SubnetsSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        vnet_name: &str,
        name: &str,
        subnet: Subnet,
    ) -> Result<Subnet, CloudError> {
        let input = Upsert::new(Lookup::nested(resource_group, &[vnet_name], name), subnet);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(&self, ctx: &CallContext, resource_group: &str, vnet_name: &str, name: &str) -> Result<Subnet, CloudError> {
        let target = Lookup::nested(resource_group, &[vnet_name], name);
        self.get_behavior
            .invoke(ctx, target, |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, vnet_name: &str, name: &str) -> Result<(), CloudError> {
        let target = Lookup::nested(resource_group, &[vnet_name], name);
        self.delete_behavior
            .invoke(ctx, target, |_, target| self.remove(target))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str, vnet_name: &str) -> Pager<Subnet> {
        let stores = self.stores.clone();
        let subscription = self.config.subscription_id.clone();
        Pager::through(
            self.config.page_size,
            self.list_behavior.clone(),
            ctx,
            ListScope::nested(resource_group, &[vnet_name]),
            move |scope: ListScope| {
                let stores = stores.clone();
                let subscription = subscription.clone();
                async move { Ok::<_, CloudError>(scope.collect(&stores.subnets, &subscription).await) }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> SubnetsSim {
        SubnetsSim::new(Arc::new(Stores::new()), Arc::new(EnvironmentConfig::default()))
    }

    #[tokio::test]
    async fn bad_prefix_is_rejected() {
        let subnets = sim();
        let err = subnets
            .create_or_update(&CallContext::new(), "rg", "vnet", "s1", Subnet::with_prefix("10.0.0.0/33"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn attached_configurations_survive_updates() {
        let subnets = sim();
        let ctx = CallContext::new();
        let subnet = subnets
            .create_or_update(&ctx, "rg", "vnet", "s1", Subnet::with_prefix("10.0.0.0/29"))
            .await
            .unwrap();
        let id = subnet.id.unwrap();
        assert!(claim_address(&subnets.stores, &id, "ipconfig-a").await.unwrap());
        assert!(!claim_address(&subnets.stores, &id, "ipconfig-a").await.unwrap());

        // Caller-supplied configurations are ignored.
        let mut update = Subnet::with_prefix("10.0.0.0/29");
        if let Some(props) = update.properties.as_mut() {
            props.ip_configurations = vec![SubResource::new("bogus")];
        }
        let updated = subnets.create_or_update(&ctx, "rg", "vnet", "s1", update).await.unwrap();
        assert_eq!(updated.ip_configuration_count(), 1);

        // Shrinking below the addresses in use is refused.
        claim_address(&subnets.stores, &id, "ipconfig-b").await.unwrap();
        let shrink = subnets
            .create_or_update(&ctx, "rg", "vnet", "s1", Subnet::with_prefix("10.0.0.0/30"))
            .await;
        assert!(matches!(shrink, Err(CloudError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn in_use_subnet_can_be_deleted() {
        let subnets = sim();
        let ctx = CallContext::new();
        let subnet = subnets
            .create_or_update(&ctx, "rg", "vnet", "s1", Subnet::with_prefix("10.0.0.0/24"))
            .await
            .unwrap();
        let id = subnet.id.unwrap();
        claim_address(&subnets.stores, &id, "ipconfig-a").await.unwrap();

        subnets.delete(&ctx, "rg", "vnet", "s1").await.unwrap();
        subnets.delete(&ctx, "rg", "vnet", "s1").await.unwrap();
        assert!(subnets.get(&ctx, "rg", "vnet", "s1").await.unwrap_err().is_not_found());
        release_address(&subnets.stores, &id, "ipconfig-a").await;
        assert!(subnets.stores.subnets.is_empty().await);
    }

    #[tokio::test]
    async fn claims_on_unknown_subnets_are_ignored() {
        let stores = Stores::new();
        assert!(!claim_address(&stores, "/not/stored", "ipconfig").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_scoped_to_vnet() {
        let subnets = sim();
        let ctx = CallContext::new();
        for (vnet, name) in [("vnet-a", "s1"), ("vnet-a", "s2"), ("vnet-b", "s1")] {
            subnets
                .create_or_update(&ctx, "rg", vnet, name, Subnet::with_prefix("10.0.0.0/24"))
                .await
                .unwrap();
        }
        assert_eq!(subnets.list(&ctx, "rg", "vnet-a").collect_all().await.unwrap().len(), 2);
    }
}
