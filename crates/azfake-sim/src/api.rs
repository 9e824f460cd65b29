//! Client-facing traits, one per resource kind.
//!
//! Code under test depends on these traits only; the simulators in this crate
//! implement them against the shared stores.

use std::sync::Arc;

use async_trait::async_trait;
use azfake_domain::{
    AgentPool, CloudError, LoadBalancer, Location, Machine, MachineNames, NetworkInterface,
    NetworkSecurityGroup, PriceFilter, PriceItem, Subnet, VirtualMachine, VirtualMachineExtension,
    VirtualMachineUpdate,
};

use crate::context::CallContext;
use crate::pager::Pager;
use crate::resource_graph::{QueryRequest, QueryResponse};

#[async_trait]
pub trait VirtualMachinesApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        vm: VirtualMachine,
    ) -> Result<VirtualMachine, CloudError>;

    async fn update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        update: VirtualMachineUpdate,
    ) -> Result<VirtualMachine, CloudError>;

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<VirtualMachine, CloudError>;

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<VirtualMachine>;

    fn list_all(&self, ctx: &CallContext) -> Pager<VirtualMachine>;
}

#[async_trait]
pub trait VirtualMachineExtensionsApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        vm_name: &str,
        name: &str,
        extension: VirtualMachineExtension,
    ) -> Result<VirtualMachineExtension, CloudError>;

    async fn get(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        vm_name: &str,
        name: &str,
    ) -> Result<VirtualMachineExtension, CloudError>;

    async fn delete(&self, ctx: &CallContext, resource_group: &str, vm_name: &str, name: &str) -> Result<(), CloudError>;
}

#[async_trait]
pub trait NetworkInterfacesApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        nic: NetworkInterface,
    ) -> Result<NetworkInterface, CloudError>;

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<NetworkInterface, CloudError>;

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<NetworkInterface>;
}

#[async_trait]
pub trait LoadBalancersApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        lb: LoadBalancer,
    ) -> Result<LoadBalancer, CloudError>;

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<LoadBalancer, CloudError>;

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<LoadBalancer>;
}

#[async_trait]
pub trait NetworkSecurityGroupsApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        nsg: NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup, CloudError>;

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<NetworkSecurityGroup, CloudError>;

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<NetworkSecurityGroup>;
}

#[async_trait]
pub trait SubnetsApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        vnet_name: &str,
        name: &str,
        subnet: Subnet,
    ) -> Result<Subnet, CloudError>;

    async fn get(&self, ctx: &CallContext, resource_group: &str, vnet_name: &str, name: &str) -> Result<Subnet, CloudError>;

    async fn delete(&self, ctx: &CallContext, resource_group: &str, vnet_name: &str, name: &str) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str, vnet_name: &str) -> Pager<Subnet>;
}

#[async_trait]
pub trait AgentPoolsApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        name: &str,
        pool: AgentPool,
    ) -> Result<AgentPool, CloudError>;

    async fn get(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str, name: &str) -> Result<AgentPool, CloudError>;

    /// Deletes the pool and every machine in it.
    async fn delete(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str, name: &str) -> Result<(), CloudError>;

    /// Batch delete of machines; the pool must be in `Machines` mode.
    async fn delete_machines(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        name: &str,
        machines: MachineNames,
    ) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str) -> Pager<AgentPool>;
}

#[async_trait]
pub trait MachinesApi: Send + Sync {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        name: &str,
        machine: Machine,
    ) -> Result<Machine, CloudError>;

    async fn get(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        name: &str,
    ) -> Result<Machine, CloudError>;

    async fn delete(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        name: &str,
    ) -> Result<(), CloudError>;

    fn list(&self, ctx: &CallContext, resource_group: &str, cluster_name: &str, pool_name: &str) -> Pager<Machine>;
}

#[async_trait]
pub trait ResourceGraphApi: Send + Sync {
    async fn resources(&self, ctx: &CallContext, request: QueryRequest) -> Result<QueryResponse, CloudError>;
}

pub trait PricingApi: Send + Sync {
    fn list_prices(&self, ctx: &CallContext, filter: PriceFilter) -> Pager<PriceItem>;
}

pub trait SubscriptionsApi: Send + Sync {
    fn list_locations(&self, ctx: &CallContext, subscription_id: &str) -> Pager<Location>;
}

/// Every client the code under test needs, as trait objects.
#[derive(Clone)]
pub struct AzureClients {
    pub virtual_machines: Arc<dyn VirtualMachinesApi>,
    pub virtual_machine_extensions: Arc<dyn VirtualMachineExtensionsApi>,
    pub network_interfaces: Arc<dyn NetworkInterfacesApi>,
    pub load_balancers: Arc<dyn LoadBalancersApi>,
    pub network_security_groups: Arc<dyn NetworkSecurityGroupsApi>,
    pub subnets: Arc<dyn SubnetsApi>,
    pub agent_pools: Arc<dyn AgentPoolsApi>,
    pub machines: Arc<dyn MachinesApi>,
    pub resource_graph: Arc<dyn ResourceGraphApi>,
    pub pricing: Arc<dyn PricingApi>,
    pub subscriptions: Arc<dyn SubscriptionsApi>,
}
