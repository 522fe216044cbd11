//! Payment acquirer types and data structures
//!
//! Typed records for transactions, outbound form values and the state
//! machine applied by gateway notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a payment transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Created by checkout, no notification received yet
    Draft,
    /// Gateway reported the payment as pending or expired
    Pending,
    /// Payment completed
    Done,
    /// Payment cancelled or failed
    Cancelled,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// Done and cancelled transactions never change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown transaction state '{}'", other)),
        }
    }
}

/// Payment transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    /// Merchant reference, sent to the gateway as `m_payment_id`
    pub reference: String,
    /// Provider name of the acquirer handling this transaction
    pub acquirer: String,
    pub amount: f64,
    pub currency: String,
    pub state: TransactionState,
    pub state_message: Option<String>,
    /// Gateway payment id (`pf_payment_id`)
    pub acquirer_reference: Option<String>,
    /// Validation date reported by the gateway
    pub date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// New draft transaction, as the checkout flow would create it
    pub fn draft(
        reference: impl Into<String>,
        acquirer: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            reference: reference.into(),
            acquirer: acquirer.into(),
            amount,
            currency: currency.into(),
            state: TransactionState::Draft,
            state_message: None,
            acquirer_reference: None,
            date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an update in place; absent fields keep their current value
    pub fn apply(&mut self, update: &TransactionUpdate) {
        self.state = update.state;
        if let Some(message) = &update.state_message {
            self.state_message = Some(message.clone());
        }
        if let Some(reference) = &update.acquirer_reference {
            self.acquirer_reference = Some(reference.clone());
        }
        if let Some(date) = update.date {
            self.date = Some(date);
        }
        self.updated_at = Utc::now();
    }
}

/// Fields written to a transaction by a single notification
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub state: TransactionState,
    pub state_message: Option<String>,
    pub acquirer_reference: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Status reported by the gateway in `payment_status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// `COMPLETE` or `Processed`
    Complete,
    /// `Pending` or `Expired`
    Pending,
    /// Anything else, including a missing status
    Unrecognized(Option<String>),
}

impl GatewayStatus {
    pub fn parse(status: Option<&str>) -> Self {
        match status {
            Some("COMPLETE") | Some("Processed") => Self::Complete,
            Some("Pending") | Some("Expired") => Self::Pending,
            other => Self::Unrecognized(other.map(str::to_string)),
        }
    }

    /// State a transaction moves to for this status
    pub fn target_state(&self) -> TransactionState {
        match self {
            Self::Complete => TransactionState::Done,
            Self::Pending => TransactionState::Pending,
            Self::Unrecognized(_) => TransactionState::Cancelled,
        }
    }
}

/// Customer state or province
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerState {
    pub code: Option<String>,
    pub name: String,
}

/// Values handed over by checkout when rendering the payment form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionValues {
    pub reference: String,
    pub amount: f64,
    /// ISO currency code
    pub currency: Option<String>,
    pub partner_address: Option<String>,
    pub partner_city: Option<String>,
    /// ISO country code
    pub partner_country: Option<String>,
    pub partner_state: Option<PartnerState>,
    pub partner_email: Option<String>,
    pub partner_zip: Option<String>,
    pub partner_first_name: Option<String>,
    pub partner_last_name: Option<String>,
    /// Passthrough values copied onto the form unchanged
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Form posted by the customer's browser to the PayFast process URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayfastFormValues {
    pub m_payment_id: String,
    pub merchant_id: String,
    pub merchant_key: String,
    pub item_name: String,
    pub item_number: String,
    pub amount: String,
    pub currency_code: String,
    pub address1: String,
    pub city: String,
    pub country: String,
    pub state: String,
    pub email: String,
    pub zip_code: String,
    pub first_name: String,
    pub last_name: String,
    pub return_url: String,
    pub notify_url: String,
    pub cancel_url: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Optional acquirer capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureSupport {
    pub fees: bool,
    pub authorize: bool,
    pub tokenize: bool,
}
