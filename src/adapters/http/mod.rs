//! HTTP adapters - REST API implementations.

pub mod subscription;
