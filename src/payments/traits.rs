//! Payment acquirer trait definitions
//!
//! Defines the interface the transaction processor relies on when handling
//! outbound forms and inbound gateway notifications.

use crate::error::AppResult;
use crate::payments::notification::PayfastNotification;
use crate::payments::types::{FeatureSupport, PayfastFormValues, TransactionValues};
use async_trait::async_trait;

/// Trait for payment acquirer implementations
#[async_trait]
pub trait PaymentAcquirer: Send + Sync {
    /// Technical provider name stored on transactions
    fn provider(&self) -> &'static str;

    /// Optional features this acquirer supports
    fn feature_support(&self) -> FeatureSupport;

    /// Merchant id the gateway must echo back in notifications
    fn merchant_id(&self) -> &str;

    /// Compute the fees charged for a payment
    ///
    /// # Arguments
    /// * `amount` - Amount to pay
    /// * `country` - Customer country code, compared to the company country
    ///
    /// # Returns
    /// * `f64` - Fee amount, `0.0` when fee computation is disabled
    fn compute_fees(&self, amount: f64, country: Option<&str>) -> f64;

    /// Build the values posted by the customer's browser to the gateway
    fn form_generate_values(&self, values: &TransactionValues) -> PayfastFormValues;

    /// URL the payment form is posted to
    fn form_action_url(&self) -> &str;

    /// Verify the signature carried by a notification
    ///
    /// # Returns
    /// * `bool` - True if the signature matches the posted data, or if
    ///   signature verification is disabled for this acquirer
    fn verify_notification_signature(&self, notification: &PayfastNotification) -> bool;

    /// Ask the gateway to confirm a notification it sent
    ///
    /// # Returns
    /// * `bool` - True if the gateway confirmed the data as valid, or if
    ///   confirmation is disabled for this acquirer
    async fn confirm_notification(&self, notification: &PayfastNotification) -> AppResult<bool>;
}
