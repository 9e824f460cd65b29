use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fixed identity of one fake Azure environment.
///
/// Every field has a default, so a YAML file only needs to name the values a
/// test suite cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub subscription_id: String,
    /// Resource group holding the managed cluster and its agent pools.
    pub resource_group: String,
    /// Resource group holding the node VMs, NICs and load balancers.
    pub node_resource_group: String,
    pub location: String,
    pub cluster_name: String,
    pub vnet_name: String,
    pub subnet_name: String,
    pub subnet_prefix: String,
    /// Logical availability zones offered in `location`.
    pub zones: Vec<String>,
    /// Items per page returned by list pagers.
    pub page_size: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            subscription_id: "12345678-1234-1234-1234-123456789012".into(),
            resource_group: "test-resourceGroup".into(),
            node_resource_group: "test-node-resourceGroup".into(),
            location: "southcentralus".into(),
            cluster_name: "test-cluster".into(),
            vnet_name: "aks-vnet-00000000".into(),
            subnet_name: "aks-subnet".into(),
            subnet_prefix: "10.224.0.0/16".into(),
            zones: vec!["1".into(), "2".into(), "3".into()],
            page_size: 100,
        }
    }
}

const ENV_PREFIX: &str = "AZFAKE_";

impl EnvironmentConfig {
    /// Apply `AZFAKE_*` process environment variables on top of `self`.
    ///
    /// `AZFAKE_ZONES` is a comma separated list; `AZFAKE_PAGE_SIZE` must be a
    /// positive integer.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an
    /// explicit lookup, so tests never touch the process environment.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let strings: [(&str, &mut String); 8] = [
            ("SUBSCRIPTION_ID", &mut self.subscription_id),
            ("RESOURCE_GROUP", &mut self.resource_group),
            ("NODE_RESOURCE_GROUP", &mut self.node_resource_group),
            ("LOCATION", &mut self.location),
            ("CLUSTER_NAME", &mut self.cluster_name),
            ("VNET_NAME", &mut self.vnet_name),
            ("SUBNET_NAME", &mut self.subnet_name),
            ("SUBNET_PREFIX", &mut self.subnet_prefix),
        ];
        for (name, field) in strings {
            if let Some(value) = var(name) {
                *field = value;
            }
        }

        if let Some(zones) = var("ZONES") {
            self.zones = zones
                .split(',')
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = var("PAGE_SIZE") {
            self.page_size = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "page_size",
                message: format!("'{}' is not a positive integer", raw),
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("node_resource_group", &self.node_resource_group),
            ("location", &self.location),
            ("cluster_name", &self.cluster_name),
            ("vnet_name", &self.vnet_name),
            ("subnet_name", &self.subnet_name),
        ];
        for (field, value) in names {
            if !azfake_domain::is_valid_name(value) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("'{}' is not a valid resource name", value),
                });
            }
        }

        azfake_domain::usable_addresses(&self.subnet_prefix).map_err(|e| ConfigError::Invalid {
            field: "subnet_prefix",
            message: e.to_string(),
        })?;

        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                message: "must be at least 1".into(),
            });
        }
        if self.zones.iter().any(|z| z.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "zones",
                message: "zone names must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        EnvironmentConfig::default().validate().unwrap();
    }

    #[test]
    fn overrides_replace_fields() {
        let cfg = EnvironmentConfig::default()
            .apply_overrides(lookup(&[
                ("AZFAKE_LOCATION", "westus2"),
                ("AZFAKE_ZONES", "1, 2"),
                ("AZFAKE_PAGE_SIZE", "7"),
            ]))
            .unwrap();
        assert_eq!(cfg.location, "westus2");
        assert_eq!(cfg.zones, vec!["1", "2"]);
        assert_eq!(cfg.page_size, 7);
        assert_eq!(cfg.cluster_name, "test-cluster");
    }

    #[test]
    fn bad_page_size_override() {
        let err = EnvironmentConfig::default()
            .apply_overrides(lookup(&[("AZFAKE_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "page_size", .. }));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = EnvironmentConfig {
            resource_group: "has/slash".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "resource_group", .. })));

        let cfg = EnvironmentConfig {
            subnet_prefix: "10.0.0.0".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "subnet_prefix", .. })));

        let cfg = EnvironmentConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
