pub mod error;
pub mod etag;
pub mod stores;
pub mod table;

pub use error::StoreError;
pub use etag::{compute_etag, EtagTable, Tagged};
pub use stores::Stores;
pub use table::ResourceTable;
