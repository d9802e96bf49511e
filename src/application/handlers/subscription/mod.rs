//! Subscription lifecycle command and query handlers.

mod activate_subscription;
mod cancel_subscription;
mod change_plan;
mod create_subscription;
mod get_status;
mod get_subscription;

pub use activate_subscription::{ActivateSubscriptionCommand, ActivateSubscriptionHandler};
pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use change_plan::{ChangePlanCommand, ChangePlanHandler};
pub use create_subscription::{CreateSubscriptionCommand, CreateSubscriptionHandler};
pub use get_status::{GetStatusHandler, GetStatusQuery};
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery};
