use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{
    CloudError, IpAllocationMethod, NetworkInterface, ResourceId, ResourceKind, PROVISIONING_SUCCEEDED,
};
use azfake_store::Stores;
use tracing::debug;

use crate::api::NetworkInterfacesApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{canonicalize_reference, ListScope, Lookup, Upsert};
use crate::subnets::{claim_address, release_address};

#[derive(Debug, Clone)]
pub struct NetworkInterfacesSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<NetworkInterface>, NetworkInterface>>,
    pub get_behavior: Arc<Operation<Lookup, NetworkInterface>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<NetworkInterface>>>,
}

impl NetworkInterfacesSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("networkInterfaces.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("networkInterfaces.get")),
            delete_behavior: Arc::new(Operation::new("networkInterfaces.delete")),
            list_behavior: Arc::new(Operation::new("networkInterfaces.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.list_behavior.reset();
    }

    fn id(&self, target: &Lookup) -> Result<ResourceId, CloudError> {
        target.resource_id(&self.config.subscription_id, ResourceKind::NetworkInterface)
    }

    async fn put(&self, input: Upsert<NetworkInterface>) -> Result<NetworkInterface, CloudError> {
        let id = self.id(&input.target)?;
        let key = id.to_string();
        let mut nic = input.resource;
        nic.id = Some(key.clone());
        nic.name = Some(id.name().to_string());
        nic.resource_type = Some(ResourceKind::NetworkInterface.arm_type());
        if nic.location.is_none() {
            nic.location = Some(self.config.location.clone());
        }
        fill_ip_configurations(&mut nic, &id)?;

        let existing = self.stores.network_interfaces.load(&key).await;
        // The attached VM is owned by the virtual machine API.
        if let Some(props) = nic.properties.as_mut() {
            props.virtual_machine = existing
                .as_ref()
                .and_then(|old| old.properties.as_ref())
                .and_then(|p| p.virtual_machine.clone());
        }
        let claims = subnet_claims(&nic);
        let previous = existing.as_ref().map(subnet_claims).unwrap_or_default();

        let mut acquired: Vec<&(String, String)> = Vec::new();
        for claim in &claims {
            match claim_address(&self.stores, &claim.0, &claim.1).await {
                Ok(true) => acquired.push(claim),
                Ok(false) => {}
                Err(err) => {
                    for (subnet_id, config_id) in acquired {
                        release_address(&self.stores, subnet_id, config_id).await;
                    }
                    return Err(err);
                }
            }
        }
        for (subnet_id, config_id) in previous.iter().filter(|p| !claims.contains(p)) {
            release_address(&self.stores, subnet_id, config_id).await;
        }

        self.stores.network_interfaces.store(key.clone(), nic.clone()).await;
        debug!(id = %key, ip_configurations = claims.len(), "network interface stored");
        Ok(nic)
    }

    async fn load(&self, target: Lookup) -> Result<NetworkInterface, CloudError> {
        let key = self.id(&target)?.to_string();
        self.stores
            .network_interfaces
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::NetworkInterface, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let key = self.id(&target)?.to_string();
        if let Some(old) = self.stores.network_interfaces.delete(&key).await {
            for (subnet_id, config_id) in subnet_claims(&old) {
                release_address(&self.stores, &subnet_id, &config_id).await;
            }
            debug!(id = %key, "network interface deleted");
        }
        Ok(())
    }
}

/// Server-side defaults and reference validation for every IP configuration.
fn fill_ip_configurations(nic: &mut NetworkInterface, nic_id: &ResourceId) -> Result<(), CloudError> {
    let props = nic.properties.get_or_insert_with(Default::default);
    props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
    if let Some(nsg) = props.network_security_group.as_mut() {
        canonicalize_reference(nsg, ResourceKind::NetworkSecurityGroup)?;
    }

    let has_primary = props
        .ip_configurations
        .iter()
        .any(|c| c.properties.as_ref().and_then(|p| p.primary) == Some(true));

    for (index, config) in props.ip_configurations.iter_mut().enumerate() {
        let name = config
            .name
            .get_or_insert_with(|| format!("ipconfig{}", index + 1))
            .clone();
        let config_id = ResourceId::new(
            &nic_id.subscription_id,
            &nic_id.resource_group,
            ResourceKind::IpConfiguration,
            &[nic_id.name(), name.as_str()],
        )?;
        config.id = Some(config_id.to_string());

        let config_props = config.properties.get_or_insert_with(Default::default);
        config_props
            .private_ip_allocation_method
            .get_or_insert(IpAllocationMethod::Dynamic);
        if config_props.primary.is_none() {
            config_props.primary = Some(!has_primary && index == 0);
        }
        if let Some(subnet) = config_props.subnet.as_mut() {
            canonicalize_reference(subnet, ResourceKind::Subnet)?;
        }
        for pool in config_props.load_balancer_backend_address_pools.iter_mut() {
            canonicalize_reference(pool, ResourceKind::BackendAddressPool)?;
        }
    }
    Ok(())
}

/// `(subnet id, ip configuration id)` for every configuration placed in a subnet.
fn subnet_claims(nic: &NetworkInterface) -> Vec<(String, String)> {
    nic.ip_configurations()
        .iter()
        .filter_map(|c| Some((c.subnet_id()?.to_string(), c.id.clone()?)))
        .collect()
}

#[async_trait]
impl NetworkInterfacesApi for NetworkInterfacesSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        nic: NetworkInterface,
    ) -> Result<NetworkInterface, CloudError> {
        let input = Upsert::new(Lookup::new(resource_group, name), nic);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<NetworkInterface, CloudError> {
        self.get_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError> {
        self.delete_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.remove(target))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<NetworkInterface> {
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
                async move { Ok::<_, CloudError>(scope.collect(&stores.network_interfaces, &subscription).await) }
            },
        )
    }
}
