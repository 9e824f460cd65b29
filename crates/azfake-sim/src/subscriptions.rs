use std::sync::Arc;

use azfake_config::EnvironmentConfig;
use azfake_domain::{location_id, AvailabilityZoneMapping, CloudError, Location};
use azfake_store::Stores;
use tracing::debug;

use crate::api::SubscriptionsApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;

#[derive(Debug, Clone)]
pub struct SubscriptionsSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub list_locations_behavior: Arc<Operation<String, Vec<Location>>>,
}

impl SubscriptionsSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            list_locations_behavior: Arc::new(Operation::new("subscriptions.listLocations")),
        }
    }

    pub fn reset(&self) {
        self.list_locations_behavior.reset();
    }

    /// Add or replace a location of the environment's subscription. The id is
    /// derived from the name.
    pub async fn add_location(&self, mut location: Location) -> Result<Location, CloudError> {
        let name = location
            .name
            .clone()
            .ok_or_else(|| CloudError::InvalidParameter("location without a name".into()))?;
        let id = location_id(&self.config.subscription_id, &name);
        location.id = Some(id.clone());
        if location.display_name.is_none() {
            location.display_name = Some(name);
        }
        self.stores.locations.store(id.clone(), location.clone()).await;
        debug!(id = %id, zones = location.availability_zone_mappings.len(), "location stored");
        Ok(location)
    }

    /// The configured location with one logical zone per configured zone.
    pub fn default_location(&self) -> Location {
        Location {
            id: None,
            name: Some(self.config.location.clone()),
            display_name: None,
            availability_zone_mappings: self
                .config
                .zones
                .iter()
                .map(|zone| AvailabilityZoneMapping {
                    logical_zone: Some(zone.clone()),
                    physical_zone: Some(format!("{}-az{}", self.config.location, zone)),
                })
                .collect(),
        }
    }
}

impl SubscriptionsApi for SubscriptionsSim {
    fn list_locations(&self, ctx: &CallContext, subscription_id: &str) -> Pager<Location> {
        let stores = self.stores.clone();
        let own = self.config.subscription_id.clone();
        Pager::through(
            self.config.page_size,
            self.list_locations_behavior.clone(),
            ctx,
            subscription_id.to_string(),
            move |subscription_id: String| {
                let stores = stores.clone();
                let own = own.clone();
                async move {
                    if !subscription_id.eq_ignore_ascii_case(&own) {
                        return Err(CloudError::InvalidParameter(format!(
                            "subscription '{}' is not known to this environment",
                            subscription_id
                        )));
                    }
                    Ok(stores.locations.values().await)
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn locations_are_listed_per_subscription() {
        let subs = SubscriptionsSim::new(Arc::new(Stores::new()), Arc::new(EnvironmentConfig::default()));
        let ctx = CallContext::new();
        let sub = EnvironmentConfig::default().subscription_id;
        assert!(subs.list_locations(&ctx, &sub).collect_all().await.unwrap().is_empty());

        let stored = subs.add_location(subs.default_location()).await.unwrap();
        assert_eq!(
            stored.id.as_deref(),
            Some(format!("/subscriptions/{}/locations/southcentralus", sub).as_str())
        );
        assert_eq!(stored.logical_zones(), vec!["1", "2", "3"]);

        let listed = subs.list_locations(&ctx, &sub).collect_all().await.unwrap();
        assert_eq!(listed, vec![stored]);

        let err = subs
            .list_locations(&ctx, "00000000-0000-0000-0000-000000000000")
            .collect_all()
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn unnamed_location_is_rejected() {
        let subs = SubscriptionsSim::new(Arc::new(Stores::new()), Arc::new(EnvironmentConfig::default()));
        assert!(subs.add_location(Location::default()).await.is_err());
    }
}
