pub mod chunks;
pub mod connection;
pub mod schema;

pub use chunks::delete_stale_generation_predicate;
pub use connection::{Store, StoreError};
pub use connection::Result as StoreResult;
