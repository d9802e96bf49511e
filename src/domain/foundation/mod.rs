//! Foundation module - Shared domain primitives.
//!
//! Contains the value objects, identifiers, and error types that form the
//! vocabulary of the subscription domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{PaymentId, SubscriptionId, UserId};
pub use timestamp::Timestamp;
