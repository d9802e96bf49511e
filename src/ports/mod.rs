//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.

mod identity_notifier;
mod payment_gateway;
mod subscription_store;

pub use identity_notifier::{IdentityNotifier, NotifyError, SubscriptionUpdate};
pub use payment_gateway::{
    CreateCustomerRequest, CreateSubscriptionRequest, GatewayCustomer, GatewayError, GatewayEvent,
    GatewayEventData, GatewayEventKind, GatewaySubscription, PaymentGateway,
};
pub use subscription_store::{StoreError, SubscriptionStore};
