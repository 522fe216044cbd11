//! PayFast payment acquirer implementation
//!
//! This module holds the merchant configuration for PayFast (South Africa,
//! ZAR), builds the redirect form posted to PayFast and checks the
//! notifications PayFast sends back to the notify URL.

use crate::error::{AppError, AppErrorKind, AppResult, ExternalError, InfrastructureError};
use crate::payments::notification::PayfastNotification;
use crate::payments::signature;
use crate::payments::traits::PaymentAcquirer;
use crate::payments::types::{FeatureSupport, PayfastFormValues, TransactionValues};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

pub const PROVIDER_NAME: &str = "payfast";

pub const NOTIFY_PATH: &str = "/notify_url";
pub const RETURN_PATH: &str = "/return_url";
pub const CANCEL_PATH: &str = "/cancel_url";

/// PayFast account environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayfastEnvironment {
    Test,
    Prod,
}

impl PayfastEnvironment {
    fn host(&self) -> &'static str {
        match self {
            Self::Test => "https://sandbox.payfast.co.za",
            Self::Prod => "https://www.payfast.co.za",
        }
    }

    /// Default form action URL
    pub fn process_url(&self) -> String {
        format!("{}/eng/process", self.host())
    }

    /// Server-side notification confirmation endpoint
    pub fn validate_url(&self) -> String {
        format!("{}/eng/query/validate", self.host())
    }
}

impl fmt::Display for PayfastEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => f.write_str("test"),
            Self::Prod => f.write_str("prod"),
        }
    }
}

impl FromStr for PayfastEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "sandbox" => Ok(Self::Test),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(format!(
                "PAYFAST_ENVIRONMENT must be 'test' or 'prod', got {}",
                other
            )),
        }
    }
}

/// Fee computation parameters; `*_var` values are percentages
#[derive(Debug, Clone, PartialEq)]
pub struct FeeConfig {
    pub active: bool,
    pub dom_fixed: f64,
    pub dom_var: f64,
    pub int_fixed: f64,
    pub int_var: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            active: false,
            dom_fixed: 0.35,
            dom_var: 3.4,
            int_fixed: 0.35,
            int_var: 3.9,
        }
    }
}

/// PayFast acquirer configuration
#[derive(Debug, Clone)]
pub struct PayfastConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    /// Form action URL; the environment's process URL when unset
    pub merchant_url: Option<String>,
    /// Notification confirmation endpoint; the environment's when unset
    pub validate_url: Option<String>,
    pub passphrase: Option<String>,
    pub environment: PayfastEnvironment,
    /// Public base URL the callback paths are joined onto
    pub base_url: Url,
    pub company_name: String,
    /// Company country code, compared to the customer's for fees
    pub company_country: Option<String>,
    pub fees: FeeConfig,
    pub verify_signature: bool,
    pub confirm_with_gateway: bool,
    /// Gateway confirmation timeout in seconds
    pub timeout_secs: u64,
}

fn configuration_error(message: impl Into<String>) -> AppError {
    AppError::new(AppErrorKind::Infrastructure(
        InfrastructureError::Configuration {
            message: message.into(),
        },
    ))
}

fn required_var(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| configuration_error(format!("{} environment variable is required", name)))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| configuration_error(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(default),
    }
}

fn flag_var(name: &str, default: bool) -> Result<bool, AppError> {
    match optional_var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(configuration_error(format!(
                "{} must be a boolean, got {}",
                name, raw
            ))),
        },
        None => Ok(default),
    }
}

impl PayfastConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        let merchant_id = required_var("PAYFAST_MERCHANT_ID")?;
        let merchant_key = required_var("PAYFAST_MERCHANT_KEY")?;

        let base_url = required_var("WEB_BASE_URL")?;
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| configuration_error(format!("WEB_BASE_URL is not a valid URL: {}", e)))?;

        let environment = optional_var("PAYFAST_ENVIRONMENT")
            .map(|raw| raw.parse::<PayfastEnvironment>())
            .transpose()
            .map_err(configuration_error)?
            .unwrap_or(PayfastEnvironment::Test);

        let defaults = FeeConfig::default();
        let fees = FeeConfig {
            active: flag_var("PAYFAST_FEES_ACTIVE", defaults.active)?,
            dom_fixed: parse_var("PAYFAST_FEES_DOM_FIXED", defaults.dom_fixed)?,
            dom_var: parse_var("PAYFAST_FEES_DOM_VAR", defaults.dom_var)?,
            int_fixed: parse_var("PAYFAST_FEES_INT_FIXED", defaults.int_fixed)?,
            int_var: parse_var("PAYFAST_FEES_INT_VAR", defaults.int_var)?,
        };

        let config = Self {
            merchant_id,
            merchant_key,
            merchant_url: optional_var("PAYFAST_MERCHANT_URL"),
            validate_url: optional_var("PAYFAST_VALIDATE_URL"),
            passphrase: optional_var("PAYFAST_PASSPHRASE"),
            environment,
            base_url,
            company_name: required_var("COMPANY_NAME")?,
            company_country: optional_var("COMPANY_COUNTRY"),
            fees,
            verify_signature: flag_var("PAYFAST_VERIFY_SIGNATURE", true)?,
            confirm_with_gateway: flag_var("PAYFAST_CONFIRM_WITH_GATEWAY", false)?,
            timeout_secs: parse_var("PAYFAST_TIMEOUT_SECS", 30)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.merchant_id.trim().is_empty() || self.merchant_key.trim().is_empty() {
            return Err(configuration_error("PayFast merchant id and key cannot be empty"));
        }

        if self.base_url.cannot_be_a_base() {
            return Err(configuration_error(format!(
                "WEB_BASE_URL must be an absolute http(s) URL, got {}",
                self.base_url
            )));
        }

        for (name, value) in [
            ("PAYFAST_FEES_DOM_VAR", self.fees.dom_var),
            ("PAYFAST_FEES_INT_VAR", self.fees.int_var),
        ] {
            if !(0.0..100.0).contains(&value) {
                return Err(configuration_error(format!(
                    "{} must be a percentage in [0, 100), got {}",
                    name, value
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(configuration_error("PAYFAST_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }
}

/// PayFast payment acquirer
pub struct PayfastProvider {
    config: PayfastConfig,
    client: Client,
    action_url: String,
    validate_url: String,
}

impl PayfastProvider {
    /// Create a new PayFast provider instance
    pub fn new(config: PayfastConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| configuration_error(format!("Failed to create HTTP client: {}", e)))?;

        let action_url = config
            .merchant_url
            .clone()
            .unwrap_or_else(|| config.environment.process_url());
        let validate_url = config
            .validate_url
            .clone()
            .unwrap_or_else(|| config.environment.validate_url());

        Ok(Self {
            config,
            client,
            action_url,
            validate_url,
        })
    }

    fn callback_url(&self, path: &str) -> String {
        match self.config.base_url.join(path) {
            Ok(url) => url.to_string(),
            Err(_) => format!(
                "{}{}",
                self.config.base_url.as_str().trim_end_matches('/'),
                path
            ),
        }
    }

    fn provider_error(message: String, is_retryable: bool) -> AppError {
        AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: "PayFast".to_string(),
            message,
            is_retryable,
        }))
    }
}

#[async_trait]
impl PaymentAcquirer for PayfastProvider {
    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn feature_support(&self) -> FeatureSupport {
        FeatureSupport {
            fees: true,
            authorize: false,
            tokenize: false,
        }
    }

    fn merchant_id(&self) -> &str {
        &self.config.merchant_id
    }

    fn compute_fees(&self, amount: f64, country: Option<&str>) -> f64 {
        let fees = &self.config.fees;
        if !fees.active {
            return 0.0;
        }

        let domestic = matches!(
            (country, self.config.company_country.as_deref()),
            (Some(customer), Some(company)) if customer == company
        );
        let (percentage, fixed) = if domestic {
            (fees.dom_var, fees.dom_fixed)
        } else {
            (fees.int_var, fees.int_fixed)
        };

        (percentage / 100.0 * amount + fixed) / (1.0 - percentage / 100.0)
    }

    fn form_generate_values(&self, values: &TransactionValues) -> PayfastFormValues {
        let state = values
            .partner_state
            .as_ref()
            .map(|state| state.code.clone().unwrap_or_else(|| state.name.clone()))
            .unwrap_or_default();

        PayfastFormValues {
            m_payment_id: values.reference.clone(),
            merchant_id: self.config.merchant_id.clone(),
            merchant_key: self.config.merchant_key.clone(),
            item_name: format!("{}: {}", self.config.company_name, values.reference),
            item_number: values.reference.clone(),
            amount: format!("{:.2}", values.amount),
            currency_code: values.currency.clone().unwrap_or_default(),
            address1: values.partner_address.clone().unwrap_or_default(),
            city: values.partner_city.clone().unwrap_or_default(),
            country: values.partner_country.clone().unwrap_or_default(),
            state,
            email: values.partner_email.clone().unwrap_or_default(),
            zip_code: values.partner_zip.clone().unwrap_or_default(),
            first_name: values.partner_first_name.clone().unwrap_or_default(),
            last_name: values.partner_last_name.clone().unwrap_or_default(),
            return_url: self.callback_url(RETURN_PATH),
            notify_url: self.callback_url(NOTIFY_PATH),
            cancel_url: self.callback_url(CANCEL_PATH),
            extra: values.extra.clone(),
        }
    }

    fn form_action_url(&self) -> &str {
        &self.action_url
    }

    fn verify_notification_signature(&self, notification: &PayfastNotification) -> bool {
        if !self.config.verify_signature {
            debug!("PayFast signature verification disabled");
            return true;
        }
        signature::verify_signature(notification, self.config.passphrase.as_deref())
    }

    async fn confirm_notification(&self, notification: &PayfastNotification) -> AppResult<bool> {
        if !self.config.confirm_with_gateway {
            return Ok(true);
        }

        info!("Confirming PayFast notification with gateway: {}", self.validate_url);

        let response = self
            .client
            .post(&self.validate_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(signature::notification_param_string(notification))
            .send()
            .await
            .map_err(|e| {
                error!("PayFast confirmation request failed: {}", e);
                Self::provider_error(format!("Confirmation request failed: {}", e), true)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read PayFast confirmation response: {}", e);
            Self::provider_error(format!("Failed to read confirmation response: {}", e), true)
        })?;
        if !status.is_success() {
            warn!("PayFast confirmation returned HTTP {}", status);
            return Err(Self::provider_error(
                format!("HTTP {}: {}", status, body),
                status.is_server_error(),
            ));
        }

        Ok(body.trim() == "VALID")
    }
}
