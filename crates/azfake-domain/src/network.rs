use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::common::SubResource;
use crate::error::CloudError;
use crate::tags::Tags;

/// Addresses Azure keeps for itself in every subnet: network, broadcast and
/// three service addresses.
pub const RESERVED_ADDRESSES_PER_SUBNET: u64 = 5;

// ── Network interfaces ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub properties: Option<InterfaceProperties>,
}

impl NetworkInterface {
    pub fn ip_configurations(&self) -> &[InterfaceIpConfiguration] {
        self.properties
            .as_ref()
            .map(|p| p.ip_configurations.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceProperties {
    #[serde(default)]
    pub ip_configurations: Vec<InterfaceIpConfiguration>,
    pub network_security_group: Option<SubResource>,
    pub enable_accelerated_networking: Option<bool>,
    #[serde(rename = "enableIPForwarding")]
    pub enable_ip_forwarding: Option<bool>,
    pub primary: Option<bool>,
    pub provisioning_state: Option<String>,
    /// Set by the service when a VM references the interface.
    pub virtual_machine: Option<SubResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceIpConfiguration {
    pub id: Option<String>,
    pub name: Option<String>,
    pub properties: Option<IpConfigurationProperties>,
}

impl InterfaceIpConfiguration {
    pub fn subnet_id(&self) -> Option<&str> {
        self.properties.as_ref()?.subnet.as_ref()?.id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpAllocationMethod {
    Dynamic,
    Static,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    pub subnet: Option<SubResource>,
    #[serde(rename = "privateIPAllocationMethod")]
    pub private_ip_allocation_method: Option<IpAllocationMethod>,
    #[serde(rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    pub primary: Option<bool>,
    #[serde(default)]
    pub load_balancer_backend_address_pools: Vec<SubResource>,
}

// ── Load balancers ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub sku: Option<LoadBalancerSku>,
    pub properties: Option<LoadBalancerProperties>,
}

impl LoadBalancer {
    /// AKS-style standard load balancer with the given backend pools.
    pub fn standard(pool_names: &[&str]) -> Self {
        Self {
            sku: Some(LoadBalancerSku { name: Some("Standard".into()) }),
            properties: Some(LoadBalancerProperties {
                backend_address_pools: pool_names
                    .iter()
                    .map(|name| BackendAddressPool {
                        id: None,
                        name: Some(name.to_string()),
                    })
                    .collect(),
                provisioning_state: None,
            }),
            ..Default::default()
        }
    }

    pub fn backend_pool(&self, name: &str) -> Option<&BackendAddressPool> {
        self.properties
            .as_ref()?
            .backend_address_pools
            .iter()
            .find(|pool| pool.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSku {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProperties {
    #[serde(default)]
    pub backend_address_pools: Vec<BackendAddressPool>,
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAddressPool {
    pub id: Option<String>,
    pub name: Option<String>,
}

// ── Network security groups ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroup {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub properties: Option<SecurityGroupProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupProperties {
    #[serde(default)]
    pub security_rules: Vec<SecurityRule>,
    pub provisioning_state: Option<String>,
}

/// Rule body is kept as an opaque property bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub id: Option<String>,
    pub name: Option<String>,
    pub properties: Option<serde_json::Value>,
}

// ── Subnets ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub properties: Option<SubnetProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    pub address_prefix: Option<String>,
    #[serde(default)]
    pub address_prefixes: Vec<String>,
    pub network_security_group: Option<SubResource>,
    /// IP configurations currently drawing addresses from this subnet.
    /// Managed by the service; caller-supplied values are ignored.
    #[serde(default, rename = "ipConfigurations")]
    pub ip_configurations: Vec<SubResource>,
    pub provisioning_state: Option<String>,
}

impl Subnet {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            properties: Some(SubnetProperties {
                address_prefix: Some(prefix.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// `address_prefix`, falling back to the first of `address_prefixes`.
    pub fn prefix(&self) -> Option<&str> {
        let props = self.properties.as_ref()?;
        props
            .address_prefix
            .as_deref()
            .or_else(|| props.address_prefixes.first().map(String::as_str))
    }

    /// Usable addresses derived from the prefix; `None` when no prefix is set.
    pub fn usable_address_count(&self) -> Result<Option<u64>, CloudError> {
        self.prefix().map(usable_addresses).transpose()
    }

    pub fn ip_configuration_count(&self) -> usize {
        self.properties
            .as_ref()
            .map(|p| p.ip_configurations.len())
            .unwrap_or(0)
    }

    pub fn available_address_count(&self) -> Result<Option<u64>, CloudError> {
        let used = self.ip_configuration_count() as u64;
        Ok(self.usable_address_count()?.map(|usable| usable.saturating_sub(used)))
    }
}

/// Usable host addresses in an IPv4 CIDR block, after the Azure reservation.
pub fn usable_addresses(cidr: &str) -> Result<u64, CloudError> {
    let invalid = |why: &str| CloudError::InvalidParameter(format!("invalid address prefix '{}': {}", cidr, why));
    let (address, length) = cidr.split_once('/').ok_or_else(|| invalid("missing '/'"))?;
    address
        .parse::<Ipv4Addr>()
        .map_err(|_| invalid("not an IPv4 address"))?;
    let length: u32 = length.parse().map_err(|_| invalid("bad prefix length"))?;
    if length > 32 {
        return Err(invalid("prefix length above 32"));
    }
    Ok((1u64 << (32 - length)).saturating_sub(RESERVED_ADDRESSES_PER_SUBNET))
}
