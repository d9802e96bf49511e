//! Adapters - Implementations of ports against external systems.

pub mod http;
pub mod identity;
pub mod state;
pub mod stripe;
