pub mod agent_pools;
pub mod api;
pub mod behavior;
pub mod context;
pub mod environment;
pub mod load_balancers;
pub mod machines;
pub mod network_interfaces;
pub mod operation;
pub mod pager;
pub mod pricing;
pub mod record;
pub mod request;
pub mod resource_graph;
pub mod security_groups;
pub mod subnets;
pub mod subscriptions;
pub mod virtual_machines;

pub use agent_pools::AgentPoolsSim;
pub use api::{
    AgentPoolsApi, AzureClients, LoadBalancersApi, MachinesApi, NetworkInterfacesApi,
    NetworkSecurityGroupsApi, PricingApi, ResourceGraphApi, SubnetsApi, SubscriptionsApi,
    VirtualMachineExtensionsApi, VirtualMachinesApi,
};
pub use behavior::{Behavior, Delay, InjectFault, MutateOutput, Next, RecordCalls, RequireAuxiliaryToken};
pub use context::CallContext;
pub use environment::Environment;
pub use load_balancers::LoadBalancersSim;
pub use machines::MachinesSim;
pub use network_interfaces::NetworkInterfacesSim;
pub use operation::Operation;
pub use pager::{Page, Pager};
pub use pricing::PricingSim;
pub use record::{CallRecord, RecordedCall};
pub use request::{ListScope, Lookup, MachineBatch, Upsert};
pub use resource_graph::{QueryRequest, QueryResponse, ResourceGraphSim, ResourceQuery, ResourceSummary};
pub use security_groups::SecurityGroupsSim;
pub use subnets::SubnetsSim;
pub use subscriptions::SubscriptionsSim;
pub use virtual_machines::{VirtualMachineExtensionsSim, VirtualMachinesSim};
