pub mod aks;
pub mod catalog;
pub mod common;
pub mod compute;
pub mod error;
pub mod ids;
pub mod network;
pub mod tags;

pub use aks::*;
pub use catalog::*;
pub use common::{SubResource, PROVISIONING_SUCCEEDED};
pub use compute::*;
pub use error::CloudError;
pub use ids::{is_valid_name, location_id, make_id, ResourceId, ResourceKind};
pub use network::*;
pub use tags::{OwnershipTags, Tags};
