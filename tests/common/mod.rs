#![allow(dead_code)]

use payfast_gateway::api::{self, AppState};
use payfast_gateway::database::{InMemoryTransactionStore, TransactionStore};
use payfast_gateway::payments::providers::payfast::{FeeConfig, PayfastEnvironment};
use payfast_gateway::payments::providers::{PayfastConfig, PayfastProvider};
use payfast_gateway::payments::types::PaymentTransaction;
use payfast_gateway::payments::TransactionProcessor;
use axum::Router;
use std::sync::Arc;
use url::Url;

pub const MERCHANT_ID: &str = "10000100";
pub const PASSPHRASE: &str = "jt7NOE43FZPn";

pub fn payfast_config(verify_signature: bool) -> PayfastConfig {
    PayfastConfig {
        merchant_id: MERCHANT_ID.to_string(),
        merchant_key: "46f0cd694581a".to_string(),
        merchant_url: None,
        validate_url: None,
        passphrase: Some(PASSPHRASE.to_string()),
        environment: PayfastEnvironment::Test,
        base_url: Url::parse("https://shop.example.com").unwrap(),
        company_name: "YourCompany".to_string(),
        company_country: Some("ZA".to_string()),
        fees: FeeConfig::default(),
        verify_signature,
        confirm_with_gateway: false,
        timeout_secs: 5,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryTransactionStore,
}

pub fn test_app(verify_signature: bool) -> TestApp {
    test_app_with(payfast_config(verify_signature))
}

pub fn test_app_with(config: PayfastConfig) -> TestApp {
    let store = InMemoryTransactionStore::new();
    let provider = PayfastProvider::new(config).unwrap();
    let processor = TransactionProcessor::new(Arc::new(provider), Arc::new(store.clone()));
    let router = api::router(AppState {
        environment: "development".to_string(),
        processor: Arc::new(processor),
    });
    TestApp { router, store }
}

pub async fn seed(store: &InMemoryTransactionStore, reference: &str, amount: f64) -> PaymentTransaction {
    store
        .insert(&PaymentTransaction::draft(reference, "payfast", amount, "ZAR"))
        .await
        .unwrap()
}
