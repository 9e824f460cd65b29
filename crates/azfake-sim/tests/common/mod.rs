#![allow(dead_code)]

use azfake_domain::{InterfaceIpConfiguration, InterfaceProperties, IpConfigurationProperties, NetworkInterface, SubResource};
use azfake_sim::Environment;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Fresh environment with the cluster subnet and location seeded.
pub async fn environment() -> Environment {
    init_tracing();
    let env = Environment::default();
    env.seed_defaults().await.expect("seed defaults");
    env
}

pub fn nic_in(subnet_id: &str) -> NetworkInterface {
    NetworkInterface {
        properties: Some(InterfaceProperties {
            ip_configurations: vec![InterfaceIpConfiguration {
                properties: Some(IpConfigurationProperties {
                    subnet: Some(SubResource::new(subnet_id)),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}
