//! Application command and query handlers.

pub mod subscription;
pub mod webhook;
