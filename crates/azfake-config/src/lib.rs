mod loader;
mod settings;
pub mod error;

pub use error::ConfigError;
pub use loader::load_config;
pub use settings::EnvironmentConfig;
