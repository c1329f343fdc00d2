//! Store interface and the embedded local store.

mod config;
mod error;
mod key;
mod local;
mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use local::LocalStore;
pub use store::{
    BatchGetOutput, BatchGetRequest, Item, ReadOutput, ReadRequest, ReadSelect, Store,
    DEFAULT_MAX_BATCH_GET_KEYS,
};
