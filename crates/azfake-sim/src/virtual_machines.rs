use std::sync::Arc;

use async_trait::async_trait;
use azfake_config::EnvironmentConfig;
use azfake_domain::{
    CloudError, ResourceId, ResourceKind, SubResource, VirtualMachine, VirtualMachineExtension,
    VirtualMachineUpdate, PROVISIONING_SUCCEEDED,
};
use azfake_store::Stores;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::api::{VirtualMachineExtensionsApi, VirtualMachinesApi};
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;
use crate::request::{ListScope, Lookup, Upsert};

// ── Virtual machines ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct VirtualMachinesSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<VirtualMachine>, VirtualMachine>>,
    pub update_behavior: Arc<Operation<Upsert<VirtualMachineUpdate>, VirtualMachine>>,
    pub get_behavior: Arc<Operation<Lookup, VirtualMachine>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
    pub list_behavior: Arc<Operation<ListScope, Vec<VirtualMachine>>>,
}

impl VirtualMachinesSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("virtualMachines.createOrUpdate")),
            update_behavior: Arc::new(Operation::new("virtualMachines.update")),
            get_behavior: Arc::new(Operation::new("virtualMachines.get")),
            delete_behavior: Arc::new(Operation::new("virtualMachines.delete")),
            list_behavior: Arc::new(Operation::new("virtualMachines.list")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
        self.list_behavior.reset();
    }

    fn key(&self, target: &Lookup) -> Result<String, CloudError> {
        Ok(target
            .resource_id(&self.config.subscription_id, ResourceKind::VirtualMachine)?
            .to_string())
    }

    async fn put(&self, input: Upsert<VirtualMachine>) -> Result<VirtualMachine, CloudError> {
        let key = self.key(&input.target)?;
        let mut vm = input.resource;
        canonicalize_interfaces(&mut vm)?;
        vm.id = Some(key.clone());
        vm.name = Some(input.target.name.clone());
        vm.resource_type = Some(ResourceKind::VirtualMachine.arm_type());
        if vm.location.is_none() {
            vm.location = Some(self.config.location.clone());
        }

        let (stored, previous) = self
            .stores
            .virtual_machines
            .with_entry(&key, |slot| {
                fill_server_fields(&mut vm, slot.as_ref());
                let previous = slot.replace(vm.clone());
                (vm, previous)
            })
            .await;

        let attached: Vec<&str> = stored.network_interface_ids();
        if let Some(previous) = &previous {
            for nic_id in previous.network_interface_ids() {
                if !attached.contains(&nic_id) {
                    self.detach_interface(nic_id, &key).await;
                }
            }
        }
        for nic_id in &attached {
            self.stores
                .network_interfaces
                .update(nic_id, |nic| {
                    let props = nic.properties.get_or_insert_with(Default::default);
                    props.virtual_machine = Some(SubResource::new(key.as_str()));
                })
                .await;
        }
        debug!(id = %key, interfaces = attached.len(), "virtual machine stored");
        Ok(stored)
    }

    /// Clear the interface's VM reference if it still points at `vm_id`.
    async fn detach_interface(&self, nic_id: &str, vm_id: &str) {
        self.stores
            .network_interfaces
            .update(nic_id, |nic| {
                if let Some(props) = nic.properties.as_mut() {
                    if props.virtual_machine.as_ref().and_then(|r| r.id.as_deref()) == Some(vm_id) {
                        props.virtual_machine = None;
                    }
                }
            })
            .await;
    }

    async fn patch(&self, input: Upsert<VirtualMachineUpdate>) -> Result<VirtualMachine, CloudError> {
        let key = self.key(&input.target)?;
        let patch = input.resource;
        self.stores
            .virtual_machines
            .update(&key, |vm| {
                if let Some(tags) = patch.tags {
                    vm.tags = tags;
                }
                let props = vm.properties.get_or_insert_with(Default::default);
                if let Some(hardware) = patch.hardware_profile {
                    props.hardware_profile = Some(hardware);
                }
                if let Some(security) = patch.security_profile {
                    props.security_profile = Some(security);
                }
                vm.clone()
            })
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::VirtualMachine, key.as_str()))
    }

    async fn load(&self, target: Lookup) -> Result<VirtualMachine, CloudError> {
        let key = self.key(&target)?;
        self.stores
            .virtual_machines
            .load(&key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::VirtualMachine, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let key = self.key(&target)?;
        // NICs and disks are separate resources and stay behind, detached.
        if let Some(old) = self.stores.virtual_machines.delete(&key).await {
            for nic_id in old.network_interface_ids() {
                self.detach_interface(nic_id, &key).await;
            }
            debug!(id = %key, "virtual machine deleted");
        }
        Ok(())
    }

    fn pager(&self, ctx: &CallContext, scope: ListScope) -> Pager<VirtualMachine> {
        let stores = self.stores.clone();
        let subscription = self.config.subscription_id.clone();
        Pager::through(
            self.config.page_size,
            self.list_behavior.clone(),
            ctx,
            scope,
            move |scope: ListScope| {
                let stores = stores.clone();
                let subscription = subscription.clone();
                async move { Ok::<_, CloudError>(scope.collect(&stores.virtual_machines, &subscription).await) }
            },
        )
    }
}

/// Rewrite network interface references in canonical form.
fn canonicalize_interfaces(vm: &mut VirtualMachine) -> Result<(), CloudError> {
    let Some(profile) = vm.properties.as_mut().and_then(|p| p.network_profile.as_mut()) else {
        return Ok(());
    };
    for reference in profile.network_interfaces.iter_mut() {
        let id = reference
            .id
            .as_deref()
            .ok_or_else(|| CloudError::InvalidParameter("network interface reference without an id".into()))?;
        reference.id = Some(ResourceId::parse_kind(id, ResourceKind::NetworkInterface)?.to_string());
    }
    Ok(())
}

/// Server-assigned values, kept stable across re-PUTs of the same machine.
fn fill_server_fields(vm: &mut VirtualMachine, existing: Option<&VirtualMachine>) {
    let previous = existing.and_then(|e| e.properties.as_ref());
    let name = vm.name.clone().unwrap_or_default();
    let props = vm.properties.get_or_insert_with(Default::default);

    if props.vm_id.is_none() {
        props.vm_id = Some(
            previous
                .and_then(|p| p.vm_id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        );
    }
    if props.time_created.is_none() {
        props.time_created = Some(previous.and_then(|p| p.time_created).unwrap_or_else(Utc::now));
    }
    props.provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());
    if let Some(disk) = props.storage_profile.as_mut().and_then(|s| s.os_disk.as_mut()) {
        disk.name.get_or_insert_with(|| format!("{}_OsDisk_1", name));
    }

    // Extensions are managed through their own API.
    if vm.resources.is_empty() {
        if let Some(existing) = existing {
            vm.resources = existing.resources.clone();
        }
    }
}

#[async_trait]
impl VirtualMachinesApi for VirtualMachinesSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        vm: VirtualMachine,
    ) -> Result<VirtualMachine, CloudError> {
        let input = Upsert::new(Lookup::new(resource_group, name), vm);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        name: &str,
        update: VirtualMachineUpdate,
    ) -> Result<VirtualMachine, CloudError> {
        let input = Upsert::new(Lookup::new(resource_group, name), update);
        self.update_behavior
            .invoke(ctx, input, |_, input| self.patch(input))
            .await
    }

    async fn get(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<VirtualMachine, CloudError> {
        self.get_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, name: &str) -> Result<(), CloudError> {
        self.delete_behavior
            .invoke(ctx, Lookup::new(resource_group, name), |_, target| self.remove(target))
            .await
    }

    fn list(&self, ctx: &CallContext, resource_group: &str) -> Pager<VirtualMachine> {
        self.pager(ctx, ListScope::resource_group(resource_group))
    }

    fn list_all(&self, ctx: &CallContext) -> Pager<VirtualMachine> {
        self.pager(ctx, ListScope::subscription())
    }
}

// ── Extensions ────────────────────────────────────────────────────────────────

/// Extensions live inside their virtual machine's `resources` list.
#[derive(Debug, Clone)]
pub struct VirtualMachineExtensionsSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub create_or_update_behavior: Arc<Operation<Upsert<VirtualMachineExtension>, VirtualMachineExtension>>,
    pub get_behavior: Arc<Operation<Lookup, VirtualMachineExtension>>,
    pub delete_behavior: Arc<Operation<Lookup, ()>>,
}

impl VirtualMachineExtensionsSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            create_or_update_behavior: Arc::new(Operation::new("virtualMachineExtensions.createOrUpdate")),
            get_behavior: Arc::new(Operation::new("virtualMachineExtensions.get")),
            delete_behavior: Arc::new(Operation::new("virtualMachineExtensions.delete")),
        }
    }

    pub fn reset(&self) {
        self.create_or_update_behavior.reset();
        self.get_behavior.reset();
        self.delete_behavior.reset();
    }

    /// Extension id and the id of the owning virtual machine.
    fn keys(&self, target: &Lookup) -> Result<(String, String), CloudError> {
        let id = target.resource_id(&self.config.subscription_id, ResourceKind::VirtualMachineExtension)?;
        let vm_id = id
            .parent()
            .ok_or_else(|| CloudError::malformed(id.to_string(), "extension without a virtual machine"))?;
        Ok((id.to_string(), vm_id.to_string()))
    }

    async fn put(&self, input: Upsert<VirtualMachineExtension>) -> Result<VirtualMachineExtension, CloudError> {
        let (key, vm_key) = self.keys(&input.target)?;
        let name = input.target.name.clone();
        let mut extension = input.resource;
        extension.id = Some(key.clone());
        extension.name = Some(name.clone());
        extension.resource_type = Some(ResourceKind::VirtualMachineExtension.arm_type());
        extension
            .properties
            .get_or_insert_with(Default::default)
            .provisioning_state = Some(PROVISIONING_SUCCEEDED.to_string());

        let stored = self
            .stores
            .virtual_machines
            .update(&vm_key, |vm| {
                if extension.location.is_none() {
                    extension.location = vm.location.clone();
                }
                vm.resources.retain(|e| !same_name(e, &name));
                vm.resources.push(extension.clone());
                extension
            })
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::VirtualMachine, vm_key.as_str()))?;
        debug!(id = %key, "extension stored");
        Ok(stored)
    }

    async fn load(&self, target: Lookup) -> Result<VirtualMachineExtension, CloudError> {
        let (key, vm_key) = self.keys(&target)?;
        let vm = self
            .stores
            .virtual_machines
            .load(&vm_key)
            .await
            .ok_or_else(|| CloudError::not_found(ResourceKind::VirtualMachine, vm_key.as_str()))?;
        vm.resources
            .into_iter()
            .find(|e| same_name(e, &target.name))
            .ok_or_else(|| CloudError::not_found(ResourceKind::VirtualMachineExtension, key))
    }

    async fn remove(&self, target: Lookup) -> Result<(), CloudError> {
        let (key, vm_key) = self.keys(&target)?;
        self.stores
            .virtual_machines
            .update(&vm_key, |vm| vm.resources.retain(|e| !same_name(e, &target.name)))
            .await;
        debug!(id = %key, "extension deleted");
        Ok(())
    }
}

fn same_name(extension: &VirtualMachineExtension, name: &str) -> bool {
    extension
        .name
        .as_deref()
        .is_some_and(|n| n == name)
}

#[async_trait]
impl VirtualMachineExtensionsApi for VirtualMachineExtensionsSim {
    async fn create_or_update(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        vm_name: &str,
        name: &str,
        extension: VirtualMachineExtension,
    ) -> Result<VirtualMachineExtension, CloudError> {
        let input = Upsert::new(Lookup::nested(resource_group, &[vm_name], name), extension);
        self.create_or_update_behavior
            .invoke(ctx, input, |_, input| self.put(input))
            .await
    }

    async fn get(
        &self,
        ctx: &CallContext,
        resource_group: &str,
        vm_name: &str,
        name: &str,
    ) -> Result<VirtualMachineExtension, CloudError> {
        let target = Lookup::nested(resource_group, &[vm_name], name);
        self.get_behavior
            .invoke(ctx, target, |_, target| self.load(target))
            .await
    }

    async fn delete(&self, ctx: &CallContext, resource_group: &str, vm_name: &str, name: &str) -> Result<(), CloudError> {
        let target = Lookup::nested(resource_group, &[vm_name], name);
        self.delete_behavior
            .invoke(ctx, target, |_, target| self.remove(target))
            .await
    }
}

#[cfg(test)]
mod tests {
    use azfake_domain::{HardwareProfile, OsDisk, StorageProfile, Tags, VirtualMachineProperties};

    use super::*;

    fn sims() -> (VirtualMachinesSim, VirtualMachineExtensionsSim) {
        let stores = Arc::new(Stores::new());
        let config = Arc::new(EnvironmentConfig::default());
        (
            VirtualMachinesSim::new(stores.clone(), config.clone()),
            VirtualMachineExtensionsSim::new(stores, config),
        )
    }

    fn vm_with_disk() -> VirtualMachine {
        VirtualMachine {
            properties: Some(VirtualMachineProperties {
                storage_profile: Some(StorageProfile {
                    os_disk: Some(OsDisk::default()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_fills_server_fields() {
        let (vms, _) = sims();
        let ctx = CallContext::new();
        let vm = vms.create_or_update(&ctx, "rg", "vm-1", vm_with_disk()).await.unwrap();

        assert_eq!(vm.name.as_deref(), Some("vm-1"));
        assert_eq!(vm.resource_type.as_deref(), Some("Microsoft.Compute/virtualMachines"));
        assert_eq!(vm.location.as_deref(), Some("southcentralus"));
        let props = vm.properties.as_ref().unwrap();
        assert!(props.vm_id.is_some());
        assert!(props.time_created.is_some());
        assert_eq!(props.provisioning_state.as_deref(), Some(PROVISIONING_SUCCEEDED));
        let disk = props.storage_profile.as_ref().unwrap().os_disk.as_ref().unwrap();
        assert_eq!(disk.name.as_deref(), Some("vm-1_OsDisk_1"));

        assert_eq!(vms.get(&ctx, "rg", "vm-1").await.unwrap(), vm);
    }

    #[tokio::test]
    async fn recreate_keeps_identity() {
        let (vms, _) = sims();
        let ctx = CallContext::new();
        let first = vms.create_or_update(&ctx, "rg", "vm-1", VirtualMachine::default()).await.unwrap();
        let second = vms.create_or_update(&ctx, "rg", "vm-1", VirtualMachine::default()).await.unwrap();
        assert_eq!(
            first.properties.unwrap().vm_id,
            second.properties.unwrap().vm_id
        );
    }

    #[tokio::test]
    async fn zones_are_taken_as_given() {
        let (vms, _) = sims();
        let vm = VirtualMachine {
            zones: vec!["westus2-1".into()],
            ..Default::default()
        };
        let stored = vms.create_or_update(&CallContext::new(), "rg", "vm-1", vm).await.unwrap();
        assert_eq!(stored.zones, vec!["westus2-1"]);
    }

    #[tokio::test]
    async fn update_replaces_tags_and_size() {
        let (vms, _) = sims();
        let ctx = CallContext::new();
        let missing = vms.update(&ctx, "rg", "nope", VirtualMachineUpdate::default()).await;
        assert!(missing.unwrap_err().is_not_found());

        let mut tags = Tags::new();
        tags.insert("a".into(), "1".into());
        vms.create_or_update(&ctx, "rg", "vm-1", VirtualMachine { tags, ..Default::default() })
            .await
            .unwrap();

        let mut replacement = Tags::new();
        replacement.insert("b".into(), "2".into());
        let updated = vms
            .update(
                &ctx,
                "rg",
                "vm-1",
                VirtualMachineUpdate {
                    tags: Some(replacement.clone()),
                    hardware_profile: Some(HardwareProfile {
                        vm_size: Some("Standard_D4s_v5".into()),
                    }),
                    security_profile: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tags, replacement);
        assert_eq!(updated.vm_size(), Some("Standard_D4s_v5"));
    }

    #[tokio::test]
    async fn list_is_scoped_to_resource_group() {
        let (vms, _) = sims();
        let ctx = CallContext::new();
        vms.create_or_update(&ctx, "rg-a", "vm-1", VirtualMachine::default()).await.unwrap();
        vms.create_or_update(&ctx, "rg-b", "vm-2", VirtualMachine::default()).await.unwrap();

        assert_eq!(vms.list(&ctx, "rg-a").collect_all().await.unwrap().len(), 1);
        assert_eq!(vms.list_all(&ctx).collect_all().await.unwrap().len(), 2);
        assert_eq!(vms.list_behavior.calls().len(), 2);
    }

    #[tokio::test]
    async fn extension_lifecycle() {
        let (vms, extensions) = sims();
        let ctx = CallContext::new();

        let orphan = extensions
            .create_or_update(&ctx, "rg", "vm-1", "cse", VirtualMachineExtension::default())
            .await;
        assert!(orphan.unwrap_err().is_not_found());

        vms.create_or_update(&ctx, "rg", "vm-1", VirtualMachine::default()).await.unwrap();
        let ext = extensions
            .create_or_update(&ctx, "rg", "vm-1", "cse", VirtualMachineExtension::default())
            .await
            .unwrap();
        assert_eq!(ext.location.as_deref(), Some("southcentralus"));
        assert_eq!(extensions.get(&ctx, "rg", "vm-1", "cse").await.unwrap(), ext);
        assert!(extensions.get(&ctx, "rg", "vm-1", "CSE").await.unwrap_err().is_not_found());

        // Re-PUT of the VM without extensions keeps them.
        let vm = vms.create_or_update(&ctx, "rg", "vm-1", VirtualMachine::default()).await.unwrap();
        assert_eq!(vm.resources.len(), 1);

        extensions.delete(&ctx, "rg", "vm-1", "cse").await.unwrap();
        extensions.delete(&ctx, "rg", "vm-1", "cse").await.unwrap();
        assert!(extensions.get(&ctx, "rg", "vm-1", "cse").await.unwrap_err().is_not_found());
    }
}
