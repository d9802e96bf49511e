//! Subscription domain: plans, statuses, lifecycle rules, payment history.

mod errors;
mod payment;
mod plan;
mod record;
mod status;

pub use errors::SubscriptionError;
pub use payment::{InvoiceDetails, PaymentMethodKind, PaymentRecord};
pub use plan::SubscriptionPlan;
pub use record::{PlanPricing, StatusSummary, SubscriptionRecord, TRIAL_DAYS};
pub use status::{PaymentStatus, SubscriptionStatus};
