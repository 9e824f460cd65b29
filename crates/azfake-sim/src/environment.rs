use std::sync::Arc;

use azfake_config::{ConfigError, EnvironmentConfig};
use azfake_domain::{CloudError, ResourceId, ResourceKind, Subnet, PROVISIONING_SUCCEEDED};
use azfake_store::Stores;
use tracing::info;

use crate::agent_pools::AgentPoolsSim;
use crate::api::AzureClients;
use crate::load_balancers::LoadBalancersSim;
use crate::machines::MachinesSim;
use crate::network_interfaces::NetworkInterfacesSim;
use crate::pricing::PricingSim;
use crate::resource_graph::ResourceGraphSim;
use crate::security_groups::SecurityGroupsSim;
use crate::subnets::SubnetsSim;
use crate::subscriptions::SubscriptionsSim;
use crate::virtual_machines::{VirtualMachineExtensionsSim, VirtualMachinesSim};

/// One fake Azure control plane: the shared stores and every simulator over
/// them.
///
/// Nothing is global; tests that run in parallel each build their own
/// environment. Cloning is cheap and yields handles to the same state.
#[derive(Debug, Clone)]
pub struct Environment {
    pub config: Arc<EnvironmentConfig>,
    pub stores: Arc<Stores>,
    pub virtual_machines: VirtualMachinesSim,
    pub virtual_machine_extensions: VirtualMachineExtensionsSim,
    pub network_interfaces: NetworkInterfacesSim,
    pub load_balancers: LoadBalancersSim,
    pub network_security_groups: SecurityGroupsSim,
    pub subnets: SubnetsSim,
    pub agent_pools: AgentPoolsSim,
    pub machines: MachinesSim,
    pub resource_graph: ResourceGraphSim,
    pub pricing: PricingSim,
    pub subscriptions: SubscriptionsSim,
}

impl Environment {
    /// Build an environment over a validated configuration.
    pub fn new(config: EnvironmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EnvironmentConfig) -> Self {
        let config = Arc::new(config);
        let stores = Arc::new(Stores::new());
        info!(
            subscription = %config.subscription_id,
            location = %config.location,
            cluster = %config.cluster_name,
            "fake environment created"
        );
        Self {
            virtual_machines: VirtualMachinesSim::new(stores.clone(), config.clone()),
            virtual_machine_extensions: VirtualMachineExtensionsSim::new(stores.clone(), config.clone()),
            network_interfaces: NetworkInterfacesSim::new(stores.clone(), config.clone()),
            load_balancers: LoadBalancersSim::new(stores.clone(), config.clone()),
            network_security_groups: SecurityGroupsSim::new(stores.clone(), config.clone()),
            subnets: SubnetsSim::new(stores.clone(), config.clone()),
            agent_pools: AgentPoolsSim::new(stores.clone(), config.clone()),
            machines: MachinesSim::new(stores.clone(), config.clone()),
            resource_graph: ResourceGraphSim::new(stores.clone(), config.clone()),
            pricing: PricingSim::new(stores.clone(), config.clone()),
            subscriptions: SubscriptionsSim::new(stores.clone(), config.clone()),
            config,
            stores,
        }
    }

    /// Trait-object clients for the code under test.
    pub fn clients(&self) -> AzureClients {
        AzureClients {
            virtual_machines: Arc::new(self.virtual_machines.clone()),
            virtual_machine_extensions: Arc::new(self.virtual_machine_extensions.clone()),
            network_interfaces: Arc::new(self.network_interfaces.clone()),
            load_balancers: Arc::new(self.load_balancers.clone()),
            network_security_groups: Arc::new(self.network_security_groups.clone()),
            subnets: Arc::new(self.subnets.clone()),
            agent_pools: Arc::new(self.agent_pools.clone()),
            machines: Arc::new(self.machines.clone()),
            resource_graph: Arc::new(self.resource_graph.clone()),
            pricing: Arc::new(self.pricing.clone()),
            subscriptions: Arc::new(self.subscriptions.clone()),
        }
    }

    /// Empty every table, call record and behavior chain.
    ///
    /// Stores and simulators are cleared in place, so clients handed out
    /// before the reset keep working against the emptied state.
    pub async fn reset(&self) {
        self.stores.flush_all().await;
        self.virtual_machines.reset();
        self.virtual_machine_extensions.reset();
        self.network_interfaces.reset();
        self.load_balancers.reset();
        self.network_security_groups.reset();
        self.subnets.reset();
        self.agent_pools.reset();
        self.machines.reset();
        self.resource_graph.reset();
        self.pricing.reset();
        self.subscriptions.reset();
        info!("fake environment reset");
    }

    /// Id of the cluster subnet named by the configuration.
    pub fn subnet_id(&self) -> Result<ResourceId, CloudError> {
        ResourceId::new(
            &self.config.subscription_id,
            &self.config.node_resource_group,
            ResourceKind::Subnet,
            &[self.config.vnet_name.as_str(), self.config.subnet_name.as_str()],
        )
    }

    /// Store the cluster subnet and the configured location with its zones,
    /// bypassing behaviors and call records.
    pub async fn seed_defaults(&self) -> Result<(), CloudError> {
        let subnet_id = self.subnet_id()?;
        let mut subnet = Subnet::with_prefix(self.config.subnet_prefix.clone());
        subnet.id = Some(subnet_id.to_string());
        subnet.name = Some(subnet_id.name().to_string());
        subnet.resource_type = Some(ResourceKind::Subnet.arm_type());
        if let Some(props) = subnet.properties.as_mut() {
            props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
        }
        subnet.usable_address_count()?;
        self.stores.subnets.store(subnet_id.to_string(), subnet).await;

        self.subscriptions
            .add_location(self.subscriptions.default_location())
            .await?;
        info!(subnet = %subnet_id, "default resources seeded");
        Ok(())
    }
}

impl Default for Environment {
    /// The default configuration is always valid.
    fn default() -> Self {
        Self::build(EnvironmentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use azfake_domain::{AgentPool, VirtualMachine};

    use super::*;
    use crate::api::SubscriptionsApi;

    #[tokio::test]
    async fn clients_share_state_with_the_environment() {
        let env = Environment::default();
        let clients = env.clients();
        let ctx = crate::CallContext::new();
        clients
            .virtual_machines
            .create_or_update(&ctx, "rg", "vm-1", VirtualMachine::default())
            .await
            .unwrap();
        assert_eq!(env.stores.virtual_machines.len().await, 1);
        assert_eq!(env.virtual_machines.create_or_update_behavior.calls().len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EnvironmentConfig {
            subscription_id: "not a subscription".into(),
            ..Default::default()
        };
        let err = Environment::new(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "subscription_id", .. }));
        assert!(Environment::new(EnvironmentConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn reset_keeps_handles_valid() {
        let env = Environment::default();
        let clients = env.clients();
        let ctx = crate::CallContext::new();
        env.seed_defaults().await.unwrap();
        clients
            .agent_pools
            .create_or_update(&ctx, "rg", "cluster", "ap", AgentPool::default())
            .await
            .unwrap();

        env.reset().await;
        assert_eq!(env.stores.total_len().await, 0);
        assert!(env.agent_pools.create_or_update_behavior.calls().is_empty());

        clients
            .agent_pools
            .create_or_update(&ctx, "rg", "cluster", "ap", AgentPool::default())
            .await
            .unwrap();
        assert_eq!(env.stores.agent_pools.len().await, 1);
    }

    #[tokio::test]
    async fn seeded_defaults() {
        let env = Environment::default();
        env.seed_defaults().await.unwrap();
        let subnet = env.stores.subnets.load(&env.subnet_id().unwrap().to_string()).await.unwrap();
        assert_eq!(subnet.available_address_count().unwrap(), Some(65531));

        let sub = env.config.subscription_id.clone();
        let locations = env
            .subscriptions
            .list_locations(&crate::CallContext::new(), &sub)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(locations.len(), 1);
    }
}
