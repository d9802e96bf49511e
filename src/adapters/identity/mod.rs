//! Identity service adapter implementing the notifier port.

mod http_notifier;

pub use http_notifier::{HttpIdentityNotifier, IdentityNotifierConfig};
