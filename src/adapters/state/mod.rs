//! Remote state service adapter implementing the subscription store port.

mod http_store;

pub use http_store::{HttpSubscriptionStore, StateStoreConfig};
