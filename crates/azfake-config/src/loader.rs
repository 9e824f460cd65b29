use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::settings::EnvironmentConfig;

/// Read an [`EnvironmentConfig`] from a YAML file and validate it.
///
/// Missing keys keep their defaults. Environment overrides are not applied
/// here; chain [`EnvironmentConfig::with_env_overrides`] when wanted.
pub fn load_config(path: &Path) -> Result<EnvironmentConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: EnvironmentConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    config.validate()?;
    debug!(
        path = %path.display(),
        subscription = %config.subscription_id,
        location = %config.location,
        "loaded environment config"
    );
    Ok(config)
}
