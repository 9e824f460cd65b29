//! Resource identifier codec.
//!
//! Grammar of a resource-group scoped identifier:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{childType}/{childName}]*
//! ```
//!
//! * Keywords (`subscriptions`, `resourceGroups`, `providers`, the namespace
//!   and every type segment) are matched case-insensitively when parsing and
//!   always emitted in the canonical case shown by [`ResourceKind::type_path`].
//! * Subscription, resource group and resource names are case-preserving and
//!   compared exactly; `rg` and `RG` address different resources.
//! * Subscription, resource group and resource names must be non-empty and
//!   consist only of ASCII letters, digits, `.`, `_`, `-`, `(` and `)`. In
//!   particular `/` is never allowed inside a name, so splitting on `/` is
//!   always unambiguous.
//!
//! Subscription-level locations use the shorter form
//! `/subscriptions/{sub}/locations/{name}` and are built by [`location_id`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CloudError;

/// Every resource type the fake control plane can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    VirtualMachine,
    VirtualMachineExtension,
    NetworkInterface,
    IpConfiguration,
    LoadBalancer,
    BackendAddressPool,
    NetworkSecurityGroup,
    SecurityRule,
    VirtualNetwork,
    Subnet,
    ManagedCluster,
    AgentPool,
    Machine,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::VirtualMachine,
        ResourceKind::VirtualMachineExtension,
        ResourceKind::NetworkInterface,
        ResourceKind::IpConfiguration,
        ResourceKind::LoadBalancer,
        ResourceKind::BackendAddressPool,
        ResourceKind::NetworkSecurityGroup,
        ResourceKind::SecurityRule,
        ResourceKind::VirtualNetwork,
        ResourceKind::Subnet,
        ResourceKind::ManagedCluster,
        ResourceKind::AgentPool,
        ResourceKind::Machine,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine | ResourceKind::VirtualMachineExtension => {
                "Microsoft.Compute"
            }
            ResourceKind::ManagedCluster | ResourceKind::AgentPool | ResourceKind::Machine => {
                "Microsoft.ContainerService"
            }
            _ => "Microsoft.Network",
        }
    }

    /// Type segments below the provider namespace, outermost first. One name
    /// follows each segment in an identifier.
    pub fn type_path(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::VirtualMachine => &["virtualMachines"],
            ResourceKind::VirtualMachineExtension => &["virtualMachines", "extensions"],
            ResourceKind::NetworkInterface => &["networkInterfaces"],
            ResourceKind::IpConfiguration => &["networkInterfaces", "ipConfigurations"],
            ResourceKind::LoadBalancer => &["loadBalancers"],
            ResourceKind::BackendAddressPool => &["loadBalancers", "backendAddressPools"],
            ResourceKind::NetworkSecurityGroup => &["networkSecurityGroups"],
            ResourceKind::SecurityRule => &["networkSecurityGroups", "securityRules"],
            ResourceKind::VirtualNetwork => &["virtualNetworks"],
            ResourceKind::Subnet => &["virtualNetworks", "subnets"],
            ResourceKind::ManagedCluster => &["managedClusters"],
            ResourceKind::AgentPool => &["managedClusters", "agentPools"],
            ResourceKind::Machine => &["managedClusters", "agentPools", "machines"],
        }
    }

    /// Number of names an identifier of this kind carries.
    pub fn depth(&self) -> usize {
        self.type_path().len()
    }

    /// The ARM `type` string, e.g. `Microsoft.Compute/virtualMachines`.
    pub fn arm_type(&self) -> String {
        format!("{}/{}", self.namespace(), self.type_path().join("/"))
    }

    pub fn parent(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::VirtualMachineExtension => Some(ResourceKind::VirtualMachine),
            ResourceKind::IpConfiguration => Some(ResourceKind::NetworkInterface),
            ResourceKind::BackendAddressPool => Some(ResourceKind::LoadBalancer),
            ResourceKind::SecurityRule => Some(ResourceKind::NetworkSecurityGroup),
            ResourceKind::Subnet => Some(ResourceKind::VirtualNetwork),
            ResourceKind::AgentPool => Some(ResourceKind::ManagedCluster),
            ResourceKind::Machine => Some(ResourceKind::AgentPool),
            _ => None,
        }
    }

    fn from_path(namespace: &str, types: &[&str]) -> Option<ResourceKind> {
        ResourceKind::ALL.into_iter().find(|kind| {
            kind.namespace().eq_ignore_ascii_case(namespace)
                && kind.depth() == types.len()
                && kind
                    .type_path()
                    .iter()
                    .zip(types)
                    .all(|(want, got)| want.eq_ignore_ascii_case(got))
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::VirtualMachine => "virtual machine",
            ResourceKind::VirtualMachineExtension => "virtual machine extension",
            ResourceKind::NetworkInterface => "network interface",
            ResourceKind::IpConfiguration => "ip configuration",
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::BackendAddressPool => "backend address pool",
            ResourceKind::NetworkSecurityGroup => "network security group",
            ResourceKind::SecurityRule => "security rule",
            ResourceKind::VirtualNetwork => "virtual network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::ManagedCluster => "managed cluster",
            ResourceKind::AgentPool => "agent pool",
            ResourceKind::Machine => "machine",
        };
        f.write_str(label)
    }
}

/// A parsed resource-group scoped identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub kind: ResourceKind,
    /// One name per segment of `kind.type_path()`, outermost first.
    pub names: Vec<String>,
}

impl ResourceId {
    /// Build a validated identifier.
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        kind: ResourceKind,
        names: &[&str],
    ) -> Result<Self, CloudError> {
        let candidate = make_id(subscription_id, resource_group, kind, names);
        if names.len() != kind.depth() {
            return Err(CloudError::malformed(
                candidate,
                format!("{} needs {} name(s), got {}", kind, kind.depth(), names.len()),
            ));
        }
        for segment in [subscription_id, resource_group].iter().chain(names) {
            check_name(&candidate, segment)?;
        }
        Ok(Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            kind,
            names: names.iter().map(|n| n.to_string()).collect(),
        })
    }

    /// Parse an identifier, accepting any keyword casing.
    pub fn parse(id: &str) -> Result<Self, CloudError> {
        let trimmed = id
            .strip_prefix('/')
            .ok_or_else(|| CloudError::malformed(id, "must start with '/'"))?;
        let segments: Vec<&str> = trimmed.split('/').collect();

        if segments.len() < 8 {
            return Err(CloudError::malformed(id, "too few segments"));
        }
        expect_keyword(id, segments[0], "subscriptions")?;
        expect_keyword(id, segments[2], "resourceGroups")?;
        expect_keyword(id, segments[4], "providers")?;

        let namespace = segments[5];
        let rest = &segments[6..];
        if rest.len() % 2 != 0 {
            return Err(CloudError::malformed(id, "type segment without a name"));
        }
        let types: Vec<&str> = rest.iter().step_by(2).copied().collect();
        let names: Vec<&str> = rest.iter().skip(1).step_by(2).copied().collect();

        let kind = ResourceKind::from_path(namespace, &types).ok_or_else(|| {
            CloudError::malformed(id, format!("unknown resource type {}/{}", namespace, types.join("/")))
        })?;

        for segment in [segments[1], segments[3]].iter().chain(&names) {
            check_name(id, segment)?;
        }

        Ok(Self {
            subscription_id: segments[1].to_string(),
            resource_group: segments[3].to_string(),
            kind,
            names: names.into_iter().map(str::to_string).collect(),
        })
    }

    /// Parse and require a specific kind.
    pub fn parse_kind(id: &str, kind: ResourceKind) -> Result<Self, CloudError> {
        let parsed = Self::parse(id)?;
        if parsed.kind != kind {
            return Err(CloudError::malformed(
                id,
                format!("expected a {} id, found a {} id", kind, parsed.kind),
            ));
        }
        Ok(parsed)
    }

    /// Innermost name.
    pub fn name(&self) -> &str {
        self.names.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<ResourceId> {
        let kind = self.kind.parent()?;
        Some(ResourceId {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            kind,
            names: self.names.get(..kind.depth())?.to_vec(),
        })
    }

    /// Same subscription and resource group. Names compare exactly, the same
    /// way store keys do.
    pub fn in_resource_group(&self, subscription_id: &str, resource_group: &str) -> bool {
        self.subscription_id == subscription_id && self.resource_group == resource_group
    }

    /// Whether the outer names of this id equal `parents`.
    pub fn has_parents(&self, parents: &[String]) -> bool {
        parents.len() < self.names.len() && self.names.iter().zip(parents).all(|(name, parent)| name == parent)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        f.write_str(&make_id(&self.subscription_id, &self.resource_group, self.kind, &names))
    }
}

impl FromStr for ResourceId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceId::parse(s)
    }
}

/// Format an identifier without validating the names.
///
/// Total for any input; round-trips through [`ResourceId::parse`] whenever the
/// names obey the module-level grammar.
pub fn make_id(subscription_id: &str, resource_group: &str, kind: ResourceKind, names: &[&str]) -> String {
    let mut id = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}",
        subscription_id,
        resource_group,
        kind.namespace()
    );
    for (segment, name) in kind.type_path().iter().zip(names) {
        id.push('/');
        id.push_str(segment);
        id.push('/');
        id.push_str(name);
    }
    id
}

pub fn location_id(subscription_id: &str, location: &str) -> String {
    format!("/subscriptions/{}/locations/{}", subscription_id, location)
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '(' | ')'))
}

fn check_name(id: &str, name: &str) -> Result<(), CloudError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(CloudError::malformed(id, format!("invalid name segment '{}'", name)))
    }
}

fn expect_keyword(id: &str, got: &str, want: &str) -> Result<(), CloudError> {
    if got.eq_ignore_ascii_case(want) {
        Ok(())
    } else {
        Err(CloudError::malformed(id, format!("expected '{}', found '{}'", want, got)))
    }
}
