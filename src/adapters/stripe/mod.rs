//! Stripe adapter implementing the payment gateway port.

mod gateway;
mod webhook_types;

pub use gateway::{StripeGateway, StripeGatewayConfig};
pub use webhook_types::{SignatureHeader, SignatureParseError};
