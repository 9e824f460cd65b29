//! Inputs of simulated operations, as seen by behaviors and call records.

use azfake_domain::{CloudError, ResourceId, ResourceKind, SubResource};
use azfake_store::ResourceTable;

/// Address of one resource inside the environment's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub resource_group: String,
    /// Names of the enclosing resources, outermost first (a subnet's virtual
    /// network, a machine's cluster and agent pool).
    pub parents: Vec<String>,
    pub name: String,
}

impl Lookup {
    pub fn new(resource_group: &str, name: &str) -> Self {
        Self {
            resource_group: resource_group.to_string(),
            parents: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn nested(resource_group: &str, parents: &[&str], name: &str) -> Self {
        Self {
            resource_group: resource_group.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            name: name.to_string(),
        }
    }

    /// Validated identifier; `MalformedId` when a name breaks the grammar.
    pub fn resource_id(&self, subscription_id: &str, kind: ResourceKind) -> Result<ResourceId, CloudError> {
        let mut names: Vec<&str> = self.parents.iter().map(String::as_str).collect();
        names.push(&self.name);
        ResourceId::new(subscription_id, &self.resource_group, kind, &names)
    }
}

/// Create-or-update request: where to write and what.
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert<T> {
    pub target: Lookup,
    pub resource: T,
}

impl<T> Upsert<T> {
    pub fn new(target: Lookup, resource: T) -> Self {
        Self { target, resource }
    }
}

/// Which part of a table a list call covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    /// `None` lists the whole subscription.
    pub resource_group: Option<String>,
    pub parents: Vec<String>,
}

impl ListScope {
    pub fn subscription() -> Self {
        Self::default()
    }

    pub fn resource_group(resource_group: &str) -> Self {
        Self {
            resource_group: Some(resource_group.to_string()),
            parents: Vec::new(),
        }
    }

    pub fn nested(resource_group: &str, parents: &[&str]) -> Self {
        Self {
            resource_group: Some(resource_group.to_string()),
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn contains(&self, subscription_id: &str, id: &str) -> bool {
        let Ok(parsed) = ResourceId::parse(id) else {
            return false;
        };
        let in_scope = match &self.resource_group {
            Some(rg) => parsed.in_resource_group(subscription_id, rg),
            None => parsed.subscription_id == subscription_id,
        };
        in_scope && parsed.has_parents(&self.parents)
    }

    /// Values of every entry of `table` inside this scope.
    pub async fn collect<T>(&self, table: &ResourceTable<T>, subscription_id: &str) -> Vec<T>
    where
        T: Clone + Send + Sync,
    {
        table
            .snapshot()
            .await
            .into_iter()
            .filter(|(id, _)| self.contains(subscription_id, id))
            .map(|(_, value)| value)
            .collect()
    }
}

/// Batch delete of machines in one agent pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineBatch {
    pub pool: Lookup,
    pub machine_names: Vec<String>,
}

/// Validate a reference to another resource and rewrite it in canonical form.
pub(crate) fn canonicalize_reference(reference: &mut SubResource, kind: ResourceKind) -> Result<(), CloudError> {
    let id = reference
        .id
        .as_deref()
        .ok_or_else(|| CloudError::InvalidParameter(format!("{} reference without an id", kind)))?;
    let parsed = ResourceId::parse_kind(id, kind)?;
    reference.id = Some(parsed.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use azfake_domain::make_id;

    use super::*;

    const SUB: &str = "sub";

    #[test]
    fn lookup_builds_nested_ids() {
        let lookup = Lookup::nested("rg", &["cluster", "pool"], "m1");
        let id = lookup.resource_id(SUB, ResourceKind::Machine).unwrap();
        assert_eq!(id.to_string(), make_id(SUB, "rg", ResourceKind::Machine, &["cluster", "pool", "m1"]));

        let bad = Lookup::new("rg", "has/slash");
        assert!(matches!(
            bad.resource_id(SUB, ResourceKind::VirtualMachine),
            Err(CloudError::MalformedId { .. })
        ));
    }

    #[test]
    fn scope_matching() {
        let subnet = make_id(SUB, "rg", ResourceKind::Subnet, &["vnet", "s1"]);
        assert!(ListScope::subscription().contains(SUB, &subnet));
        assert!(ListScope::resource_group("rg").contains(SUB, &subnet));
        assert!(ListScope::nested("rg", &["vnet"]).contains(SUB, &subnet));
        assert!(!ListScope::resource_group("RG").contains(SUB, &subnet));
        assert!(!ListScope::nested("rg", &["VNET"]).contains(SUB, &subnet));
        assert!(!ListScope::nested("rg", &["other"]).contains(SUB, &subnet));
        assert!(!ListScope::resource_group("other").contains(SUB, &subnet));
        assert!(!ListScope::subscription().contains("other-sub", &subnet));
        assert!(!ListScope::subscription().contains(SUB, "not-an-id"));
    }

    #[test]
    fn references_are_canonicalized() {
        let mut subnet = SubResource::new(
            "/SUBSCRIPTIONS/sub/resourcegroups/rg/providers/microsoft.network/VIRTUALNETWORKS/vnet/subnets/s1",
        );
        canonicalize_reference(&mut subnet, ResourceKind::Subnet).unwrap();
        assert_eq!(
            subnet.id.as_deref(),
            Some(make_id(SUB, "rg", ResourceKind::Subnet, &["vnet", "s1"]).as_str())
        );

        let mut wrong_kind = SubResource::new(make_id(SUB, "rg", ResourceKind::LoadBalancer, &["lb"]));
        assert!(matches!(
            canonicalize_reference(&mut wrong_kind, ResourceKind::Subnet),
            Err(CloudError::MalformedId { .. })
        ));
        assert!(canonicalize_reference(&mut SubResource::default(), ResourceKind::Subnet).is_err());
    }
}
