use std::sync::Arc;

use azfake_config::EnvironmentConfig;
use azfake_domain::{CloudError, PriceFilter, PriceItem};
use azfake_store::Stores;
use tracing::debug;

use crate::api::PricingApi;
use crate::context::CallContext;
use crate::operation::Operation;
use crate::pager::Pager;

/// Retail price sheet. Empty until a test seeds it.
#[derive(Debug, Clone)]
pub struct PricingSim {
    stores: Arc<Stores>,
    config: Arc<EnvironmentConfig>,
    pub list_prices_behavior: Arc<Operation<PriceFilter, Vec<PriceItem>>>,
}

impl PricingSim {
    pub fn new(stores: Arc<Stores>, config: Arc<EnvironmentConfig>) -> Self {
        Self {
            stores,
            config,
            list_prices_behavior: Arc::new(Operation::new("prices.list")),
        }
    }

    pub fn reset(&self) {
        self.list_prices_behavior.reset();
    }

    /// Add or replace rows of the price sheet.
    pub async fn add_prices(&self, items: impl IntoIterator<Item = PriceItem>) {
        let mut added = 0usize;
        for item in items {
            self.stores.prices.store(item.key(), item).await;
            added += 1;
        }
        debug!(added, "price sheet updated");
    }
}

impl PricingApi for PricingSim {
    fn list_prices(&self, ctx: &CallContext, filter: PriceFilter) -> Pager<PriceItem> {
        let stores = self.stores.clone();
        Pager::through(
            self.config.page_size,
            self.list_prices_behavior.clone(),
            ctx,
            filter,
            move |filter: PriceFilter| {
                let stores = stores.clone();
                async move {
                    let mut items: Vec<PriceItem> = stores
                        .prices
                        .values()
                        .await
                        .into_iter()
                        .filter(|item| filter.matches(item))
                        .collect();
                    items.sort_by_key(|item| item.key());
                    Ok::<_, CloudError>(items)
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(region: &str, sku: &str, retail: f64) -> PriceItem {
        PriceItem {
            currency_code: "USD".into(),
            retail_price: retail,
            unit_price: retail,
            arm_region_name: region.into(),
            location: region.into(),
            meter_id: format!("{}-{}", region, sku),
            meter_name: sku.replace("Standard_", ""),
            product_name: "Virtual Machines Dv2 Series".into(),
            sku_name: sku.replace("Standard_", ""),
            arm_sku_name: sku.into(),
            service_name: "Virtual Machines".into(),
            price_type: "Consumption".into(),
            unit_of_measure: "1 Hour".into(),
            is_primary_meter_region: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn filters_and_pages() {
        let config = EnvironmentConfig {
            page_size: 2,
            ..Default::default()
        };
        let pricing = PricingSim::new(Arc::new(Stores::new()), Arc::new(config));
        pricing
            .add_prices([
                price("southcentralus", "Standard_D2_v2", 0.146),
                price("southcentralus", "Standard_D3_v2", 0.293),
                price("southcentralus", "Standard_D4_v2", 0.585),
                price("westus2", "Standard_D2_v2", 0.133),
            ])
            .await;

        let ctx = CallContext::new();
        let filter = PriceFilter {
            arm_region_name: Some("SouthCentralUS".into()),
            ..Default::default()
        };
        let mut pager = pricing.list_prices(&ctx, filter);
        let first = pager.next_page().await.unwrap().unwrap();
        assert_eq!(first.value.len(), 2);
        assert!(first.next_link.is_some());
        let second = pager.next_page().await.unwrap().unwrap();
        assert_eq!(second.value.len(), 1);
        assert!(pager.next_page().await.unwrap().is_none());

        let one = PriceFilter {
            arm_sku_name: Some("Standard_D2_v2".into()),
            arm_region_name: Some("westus2".into()),
            ..Default::default()
        };
        let found = pricing.list_prices(&ctx, one).collect_all().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].retail_price, 0.133);
        assert!(!found[0].is_spot());
        assert_eq!(pricing.list_prices_behavior.calls().len(), 2);
    }
}
