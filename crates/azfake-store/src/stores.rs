use azfake_domain::{
    AgentPool, Location, LoadBalancer, Machine, NetworkInterface, NetworkSecurityGroup, PriceItem,
    Subnet, VirtualMachine,
};
use tracing::info;

use crate::table::ResourceTable;

/// Every table of one fake environment.
///
/// Simulators share a single `Arc<Stores>`, so a VM written through one
/// simulator is immediately visible to every other simulator and to tests.
/// Tables are locked independently; nothing here is atomic across tables.
#[derive(Debug)]
pub struct Stores {
    pub virtual_machines: ResourceTable<VirtualMachine>,
    pub network_interfaces: ResourceTable<NetworkInterface>,
    pub load_balancers: ResourceTable<LoadBalancer>,
    pub network_security_groups: ResourceTable<NetworkSecurityGroup>,
    pub subnets: ResourceTable<Subnet>,
    pub agent_pools: ResourceTable<AgentPool>,
    pub machines: ResourceTable<Machine>,
    /// Keyed by [`PriceItem::key`].
    pub prices: ResourceTable<PriceItem>,
    pub locations: ResourceTable<Location>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            virtual_machines: ResourceTable::new("virtual_machines"),
            network_interfaces: ResourceTable::new("network_interfaces"),
            load_balancers: ResourceTable::new("load_balancers"),
            network_security_groups: ResourceTable::new("network_security_groups"),
            subnets: ResourceTable::new("subnets"),
            agent_pools: ResourceTable::new("agent_pools"),
            machines: ResourceTable::new("machines"),
            prices: ResourceTable::new("prices"),
            locations: ResourceTable::new("locations"),
        }
    }

    pub async fn flush_all(&self) {
        self.virtual_machines.flush().await;
        self.network_interfaces.flush().await;
        self.load_balancers.flush().await;
        self.network_security_groups.flush().await;
        self.subnets.flush().await;
        self.agent_pools.flush().await;
        self.machines.flush().await;
        self.prices.flush().await;
        self.locations.flush().await;
        info!("flushed all resource tables");
    }

    /// Total entries across every table.
    pub async fn total_len(&self) -> usize {
        self.virtual_machines.len().await
            + self.network_interfaces.len().await
            + self.load_balancers.len().await
            + self.network_security_groups.len().await
            + self.subnets.len().await
            + self.agent_pools.len().await
            + self.machines.len().await
            + self.prices.len().await
            + self.locations.len().await
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}
