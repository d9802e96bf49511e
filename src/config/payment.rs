//! Payment processor configuration (Stripe)

use serde::Deserialize;

use crate::domain::subscription::PlanPricing;

use super::error::ValidationError;

/// Payment configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Stripe price ID for the monthly plan
    pub stripe_monthly_price_id: String,

    /// Stripe price ID for the yearly plan
    pub stripe_yearly_price_id: String,

    /// Monthly plan amount in minor units, for record metadata
    pub monthly_price_minor: Option<i64>,

    /// Yearly plan amount in minor units, for record metadata
    pub yearly_price_minor: Option<i64>,

    /// Currency code for the plan amounts
    pub currency: Option<String>,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Plan pricing metadata stamped onto new subscription records.
    pub fn plan_pricing(&self) -> PlanPricing {
        PlanPricing {
            monthly_price_minor: self.monthly_price_minor,
            yearly_price_minor: self.yearly_price_minor,
            currency: self.currency.clone(),
        }
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if self.stripe_monthly_price_id.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_MONTHLY_PRICE_ID"));
        }
        if self.stripe_yearly_price_id.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_YEARLY_PRICE_ID"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        Ok(())
    }
}
