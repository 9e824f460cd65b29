use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Retail prices ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceItem {
    pub currency_code: String,
    pub retail_price: f64,
    pub unit_price: f64,
    pub arm_region_name: String,
    pub location: String,
    pub effective_start_date: Option<DateTime<Utc>>,
    pub meter_id: String,
    pub meter_name: String,
    pub product_name: String,
    pub sku_name: String,
    pub arm_sku_name: String,
    pub service_name: String,
    /// `Consumption`, `Reservation` or `DevTestConsumption`.
    #[serde(rename = "type")]
    pub price_type: String,
    pub unit_of_measure: String,
    pub is_primary_meter_region: bool,
}

impl PriceItem {
    /// Store key; one row per meter, region and price type.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.arm_region_name, self.meter_id, self.price_type)
    }

    /// Spot meters are published as separate SKUs named `... Spot`.
    pub fn is_spot(&self) -> bool {
        self.sku_name.ends_with(" Spot") || self.meter_name.ends_with(" Spot")
    }
}

/// Equality filters over the price sheet; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFilter {
    pub arm_region_name: Option<String>,
    pub arm_sku_name: Option<String>,
    pub service_name: Option<String>,
    pub price_type: Option<String>,
}

impl PriceFilter {
    pub fn matches(&self, item: &PriceItem) -> bool {
        fn eq(want: &Option<String>, got: &str) -> bool {
            want.as_deref().map_or(true, |w| w.eq_ignore_ascii_case(got))
        }
        eq(&self.arm_region_name, &item.arm_region_name)
            && eq(&self.arm_sku_name, &item.arm_sku_name)
            && eq(&self.service_name, &item.service_name)
            && eq(&self.price_type, &item.price_type)
    }
}

// ── Subscription locations ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub availability_zone_mappings: Vec<AvailabilityZoneMapping>,
}

impl Location {
    pub fn logical_zones(&self) -> Vec<&str> {
        self.availability_zone_mappings
            .iter()
            .filter_map(|m| m.logical_zone.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityZoneMapping {
    pub logical_zone: Option<String>,
    pub physical_zone: Option<String>,
}
