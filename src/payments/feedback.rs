//! Gateway notification processing
//!
//! Applies PayFast notifications to stored transactions: find the single
//! transaction matching the merchant reference, check the posted
//! parameters, then map the gateway status onto the transaction state.

use crate::database::repository::TransactionStore;
use crate::error::{AppResult, InvalidParameter, ValidationError};
use crate::payments::notification::PayfastNotification;
use crate::payments::traits::PaymentAcquirer;
use crate::payments::types::{GatewayStatus, PaymentTransaction, TransactionUpdate};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// South African Standard Time, used for naive gateway timestamps
const SAST_OFFSET_SECS: i32 = 2 * 3600;

/// Processes gateway notifications against the transaction store
pub struct TransactionProcessor {
    acquirer: Arc<dyn PaymentAcquirer>,
    store: Arc<dyn TransactionStore>,
}

impl TransactionProcessor {
    pub fn new(acquirer: Arc<dyn PaymentAcquirer>, store: Arc<dyn TransactionStore>) -> Self {
        Self { acquirer, store }
    }

    pub fn acquirer(&self) -> &dyn PaymentAcquirer {
        self.acquirer.as_ref()
    }

    pub fn store(&self) -> &dyn TransactionStore {
        self.store.as_ref()
    }

    /// Validate a notification and apply it to the matching transaction
    pub async fn form_feedback(&self, data: &PayfastNotification) -> AppResult<PaymentTransaction> {
        if !self.acquirer.verify_notification_signature(data) {
            let reference = data.m_payment_id().unwrap_or_default().to_string();
            warn!("PayFast: signature mismatch for reference {}", reference);
            return Err(ValidationError::InvalidSignature { reference }.into());
        }

        let tx = self.get_tx_from_data(data).await?;

        let invalid_parameters = self.get_invalid_parameters(&tx, data);
        if !invalid_parameters.is_empty() {
            let error = ValidationError::InvalidParameters {
                reference: tx.reference.clone(),
                parameters: invalid_parameters,
            };
            info!("{}", error);
            return Err(error.into());
        }

        if !self.acquirer.confirm_notification(data).await? {
            let error = ValidationError::GatewayRejected {
                reference: tx.reference.clone(),
            };
            warn!("{}", error);
            return Err(error.into());
        }

        self.form_validate(tx, data).await
    }

    /// Find the single transaction the notification refers to
    pub async fn get_tx_from_data(
        &self,
        data: &PayfastNotification,
    ) -> AppResult<PaymentTransaction> {
        let (reference, txn_id) = (data.m_payment_id(), data.txn_id());
        let reference = match (reference, txn_id) {
            (Some(reference), Some(_)) => reference,
            _ => {
                let error = ValidationError::MissingReferenceOrTransactionId {
                    reference: reference.map(str::to_string),
                    txn_id: txn_id.map(str::to_string),
                };
                info!("{}", error);
                return Err(error.into());
            }
        };

        let mut txs = self.store.search_by_reference(reference).await?;
        match txs.len() {
            1 => Ok(txs.remove(0)),
            0 => {
                let error = ValidationError::ReferenceNotFound {
                    reference: reference.to_string(),
                };
                info!("{}", error);
                Err(error.into())
            }
            count => {
                let error = ValidationError::MultipleReferencesFound {
                    reference: reference.to_string(),
                    count,
                };
                info!("{}", error);
                Err(error.into())
            }
        }
    }

    /// Posted values that contradict the acquirer or the transaction
    pub fn get_invalid_parameters(
        &self,
        tx: &PaymentTransaction,
        data: &PayfastNotification,
    ) -> Vec<InvalidParameter> {
        let mut invalid_parameters = Vec::new();
        info!(
            "Received a notification from PayFast with ITN version {}",
            data.notify_version().unwrap_or("None")
        );
        if data.is_test() {
            warn!("Received a notification from PayFast using sandbox");
        }

        if let Some(merchant_id) = data.merchant_id() {
            if merchant_id != self.acquirer.merchant_id() {
                invalid_parameters.push(InvalidParameter {
                    name: "merchant_id".to_string(),
                    received: merchant_id.to_string(),
                    expected: self.acquirer.merchant_id().to_string(),
                });
            }
        }

        if let Some(amount_gross) = data.amount_gross() {
            let matches = amount_gross
                .trim()
                .parse::<f64>()
                .map(|received| same_amount(received, tx.amount))
                .unwrap_or(false);
            if !matches {
                invalid_parameters.push(InvalidParameter {
                    name: "amount_gross".to_string(),
                    received: amount_gross.to_string(),
                    expected: format!("{:.2}", tx.amount),
                });
            }
        }

        invalid_parameters
    }

    /// Map the gateway status onto the transaction and persist it
    pub async fn form_validate(
        &self,
        tx: PaymentTransaction,
        data: &PayfastNotification,
    ) -> AppResult<PaymentTransaction> {
        if tx.state.is_terminal() {
            warn!(
                "PayFast notification for tx {} ignored: already {}",
                tx.reference, tx.state
            );
            return Ok(tx);
        }

        let status = GatewayStatus::parse(data.payment_status());
        let acquirer_reference = data.pf_payment_id().map(str::to_string);

        let update = match &status {
            GatewayStatus::Complete => {
                info!("Validated PayFast payment for tx {}: set as done", tx.reference);
                let date = data
                    .payment_date()
                    .and_then(parse_payment_date)
                    .unwrap_or_else(Utc::now);
                TransactionUpdate {
                    state: status.target_state(),
                    state_message: None,
                    acquirer_reference,
                    date: Some(date),
                }
            }
            GatewayStatus::Pending => {
                info!(
                    "Received notification for PayFast payment {}: set as pending",
                    tx.reference
                );
                TransactionUpdate {
                    state: status.target_state(),
                    state_message: Some(data.pending_reason().unwrap_or_default().to_string()),
                    acquirer_reference,
                    date: None,
                }
            }
            GatewayStatus::Unrecognized(raw) => {
                let error = format!(
                    "Received unrecognized status for PayFast payment {}: {}, set as error",
                    tx.reference,
                    raw.as_deref().unwrap_or("None")
                );
                info!("{}", error);
                TransactionUpdate {
                    state: status.target_state(),
                    state_message: Some(error),
                    acquirer_reference,
                    date: None,
                }
            }
        };

        Ok(self.store.write(&tx.id, &update).await?)
    }
}

/// Amounts are equal when they round to the same cent
fn same_amount(a: f64, b: f64) -> bool {
    (a * 100.0).round() == (b * 100.0).round()
}

/// Parse the gateway's `payment_date`, normalised to UTC
pub fn parse_payment_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }

    let sast = FixedOffset::east_opt(SAST_OFFSET_SECS)?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return sast
            .from_local_datetime(&naive)
            .single()
            .map(|d| d.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return sast
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single()
            .map(|d| d.with_timezone(&Utc));
    }

    // "HH:MM:SS Mon DD, YYYY PST"; chrono does not parse zone abbreviations
    let (naive, zone) = raw.rsplit_once(' ')?;
    let offset = match zone {
        "PST" => FixedOffset::west_opt(8 * 3600)?,
        "PDT" => FixedOffset::west_opt(7 * 3600)?,
        _ => return None,
    };
    let naive = NaiveDateTime::parse_from_str(naive, "%H:%M:%S %b %d, %Y").ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryTransactionStore;
    use crate::error::AppErrorKind;
    use crate::payments::providers::payfast::tests::test_config;
    use crate::payments::providers::payfast::{PayfastConfig, PayfastProvider};
    use crate::payments::signature;
    use crate::payments::types::TransactionState;

    struct Fixture {
        store: InMemoryTransactionStore,
        processor: TransactionProcessor,
    }

    fn fixture_with(config: PayfastConfig) -> Fixture {
        let store = InMemoryTransactionStore::new();
        let provider = PayfastProvider::new(config).unwrap();
        let processor = TransactionProcessor::new(Arc::new(provider), Arc::new(store.clone()));
        Fixture { store, processor }
    }

    fn fixture() -> Fixture {
        fixture_with(test_config())
    }

    async fn seed(store: &InMemoryTransactionStore, reference: &str) -> PaymentTransaction {
        store
            .insert(&PaymentTransaction::draft(reference, "payfast", 51201.95, "ZAR"))
            .await
            .unwrap()
    }

    fn notification(pairs: &[(&str, &str)]) -> PayfastNotification {
        PayfastNotification::from_pairs(pairs.iter().copied())
    }

    fn validation_error(result: AppResult<PaymentTransaction>) -> ValidationError {
        match result.unwrap_err().kind {
            AppErrorKind::Validation(e) => e,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_sets_done_with_acquirer_reference() {
        let f = fixture();
        let tx = seed(&f.store, "SO036-8").await;

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO036-8"),
                ("pf_payment_id", "708444"),
                ("payment_status", "COMPLETE"),
                ("payment_date", "2024-03-05 14:30:00"),
            ]))
            .await
            .unwrap();

        assert_eq!(updated.id, tx.id);
        assert_eq!(updated.state, TransactionState::Done);
        assert_eq!(updated.acquirer_reference.as_deref(), Some("708444"));
        assert_eq!(
            updated.date,
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_processed_with_bad_date_falls_back_to_now() {
        let f = fixture();
        seed(&f.store, "SO001").await;
        let before = Utc::now();

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO001"),
                ("pf_payment_id", "1"),
                ("payment_status", "Processed"),
                ("payment_date", "not a date"),
            ]))
            .await
            .unwrap();

        assert_eq!(updated.state, TransactionState::Done);
        let date = updated.date.unwrap();
        assert!(date >= before && date <= Utc::now());
    }

    #[tokio::test]
    async fn test_pending_records_reason() {
        let f = fixture();
        seed(&f.store, "SO002").await;

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO002"),
                ("pf_payment_id", "708445"),
                ("payment_status", "Pending"),
                ("pending_reason", "awaiting EFT clearance"),
            ]))
            .await
            .unwrap();

        assert_eq!(updated.state, TransactionState::Pending);
        assert_eq!(updated.state_message.as_deref(), Some("awaiting EFT clearance"));
        assert_eq!(updated.acquirer_reference.as_deref(), Some("708445"));
    }

    #[tokio::test]
    async fn test_expired_without_reason_sets_empty_message() {
        let f = fixture();
        seed(&f.store, "SO003").await;

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO003"),
                ("pf_payment_id", "9"),
                ("payment_status", "Expired"),
            ]))
            .await
            .unwrap();

        assert_eq!(updated.state, TransactionState::Pending);
        assert_eq!(updated.state_message.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unrecognized_status_cancels_with_message() {
        let f = fixture();
        seed(&f.store, "SO004").await;

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO004"),
                ("pf_payment_id", "10"),
                ("payment_status", "FAILED"),
            ]))
            .await
            .unwrap();

        assert_eq!(updated.state, TransactionState::Cancelled);
        let message = updated.state_message.unwrap();
        assert!(message.contains("SO004"));
        assert!(message.contains("FAILED"));
    }

    #[tokio::test]
    async fn test_missing_status_cancels() {
        let f = fixture();
        seed(&f.store, "SO005").await;

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO005"),
                ("pf_payment_id", "11"),
            ]))
            .await
            .unwrap();

        assert_eq!(updated.state, TransactionState::Cancelled);
        assert!(!updated.state_message.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_reference_is_rejected() {
        let f = fixture();
        let error = validation_error(
            f.processor
                .form_feedback(&notification(&[
                    ("pf_payment_id", "708444"),
                    ("payment_status", "COMPLETE"),
                ]))
                .await,
        );
        assert!(matches!(
            error,
            ValidationError::MissingReferenceOrTransactionId { reference: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_transaction_id_is_rejected() {
        let f = fixture();
        let tx = seed(&f.store, "SO006").await;

        let error = validation_error(
            f.processor
                .form_feedback(&notification(&[
                    ("m_payment_id", "SO006"),
                    ("payment_status", "COMPLETE"),
                ]))
                .await,
        );
        assert!(matches!(
            error,
            ValidationError::MissingReferenceOrTransactionId { txn_id: None, .. }
        ));
        assert_eq!(f.store.find_by_id(&tx.id).await.unwrap().unwrap(), tx);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_rejected() {
        let f = fixture();
        let tx = seed(&f.store, "SO007").await;

        let error = validation_error(
            f.processor
                .form_feedback(&notification(&[
                    ("m_payment_id", "SO999"),
                    ("pf_payment_id", "1"),
                    ("payment_status", "COMPLETE"),
                ]))
                .await,
        );
        assert_eq!(
            error,
            ValidationError::ReferenceNotFound {
                reference: "SO999".to_string()
            }
        );
        assert_eq!(f.store.find_by_id(&tx.id).await.unwrap().unwrap(), tx);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_rejected_without_mutation() {
        let f = fixture();
        let first = seed(&f.store, "SO008").await;
        let second = seed(&f.store, "SO008").await;

        let error = validation_error(
            f.processor
                .form_feedback(&notification(&[
                    ("m_payment_id", "SO008"),
                    ("pf_payment_id", "1"),
                    ("payment_status", "COMPLETE"),
                ]))
                .await,
        );
        assert_eq!(
            error,
            ValidationError::MultipleReferencesFound {
                reference: "SO008".to_string(),
                count: 2
            }
        );
        assert_eq!(f.store.find_by_id(&first.id).await.unwrap().unwrap(), first);
        assert_eq!(f.store.find_by_id(&second.id).await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn test_terminal_transaction_is_not_mutated() {
        let f = fixture();
        seed(&f.store, "SO009").await;
        let data = notification(&[
            ("m_payment_id", "SO009"),
            ("pf_payment_id", "1"),
            ("payment_status", "COMPLETE"),
        ]);
        let done = f.processor.form_feedback(&data).await.unwrap();

        let cancel = notification(&[
            ("m_payment_id", "SO009"),
            ("pf_payment_id", "2"),
            ("payment_status", "CANCELLED"),
        ]);
        let after = f.processor.form_feedback(&cancel).await.unwrap();

        assert_eq!(after, done);
        assert_eq!(after.state, TransactionState::Done);
        assert_eq!(after.acquirer_reference.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_concurrent_notification_cannot_reopen_terminal_transaction() {
        let f = fixture();
        seed(&f.store, "SO013").await;
        let cancel = notification(&[
            ("m_payment_id", "SO013"),
            ("pf_payment_id", "2"),
            ("payment_status", "CANCELLED"),
        ]);
        // looked up while still draft
        let stale = f.processor.get_tx_from_data(&cancel).await.unwrap();

        let done = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO013"),
                ("pf_payment_id", "1"),
                ("payment_status", "COMPLETE"),
            ]))
            .await
            .unwrap();

        let after = f.processor.form_validate(stale, &cancel).await.unwrap();
        assert_eq!(after, done);
        assert_eq!(after.state, TransactionState::Done);
    }

    #[tokio::test]
    async fn test_merchant_id_mismatch_is_invalid() {
        let f = fixture();
        let tx = seed(&f.store, "SO010").await;

        let error = validation_error(
            f.processor
                .form_feedback(&notification(&[
                    ("m_payment_id", "SO010"),
                    ("pf_payment_id", "1"),
                    ("payment_status", "COMPLETE"),
                    ("merchant_id", "99999999"),
                ]))
                .await,
        );
        match error {
            ValidationError::InvalidParameters { parameters, .. } => {
                assert_eq!(parameters.len(), 1);
                assert_eq!(parameters[0].name, "merchant_id");
                assert_eq!(parameters[0].expected, "10000100");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(f.store.find_by_id(&tx.id).await.unwrap().unwrap(), tx);
    }

    #[tokio::test]
    async fn test_amount_gross_checked_to_the_cent() {
        let f = fixture();
        let tx = seed(&f.store, "SO011").await;

        let error = validation_error(
            f.processor
                .form_feedback(&notification(&[
                    ("m_payment_id", "SO011"),
                    ("pf_payment_id", "1"),
                    ("payment_status", "COMPLETE"),
                    ("amount_gross", "51201.90"),
                ]))
                .await,
        );
        assert!(matches!(error, ValidationError::InvalidParameters { .. }));
        assert_eq!(f.store.find_by_id(&tx.id).await.unwrap().unwrap(), tx);

        let updated = f
            .processor
            .form_feedback(&notification(&[
                ("m_payment_id", "SO011"),
                ("pf_payment_id", "1"),
                ("payment_status", "COMPLETE"),
                ("merchant_id", "10000100"),
                ("amount_gross", "51201.95"),
            ]))
            .await
            .unwrap();
        assert_eq!(updated.state, TransactionState::Done);
    }

    #[tokio::test]
    async fn test_signature_required_when_enabled() {
        let mut config = test_config();
        config.verify_signature = true;
        config.passphrase = Some("jt7NOE43FZPn".to_string());
        let f = fixture_with(config);
        let tx = seed(&f.store, "SO012").await;

        let unsigned = notification(&[
            ("m_payment_id", "SO012"),
            ("pf_payment_id", "1"),
            ("payment_status", "COMPLETE"),
        ]);
        let error = validation_error(f.processor.form_feedback(&unsigned).await);
        assert!(matches!(error, ValidationError::InvalidSignature { .. }));
        assert_eq!(f.store.find_by_id(&tx.id).await.unwrap().unwrap(), tx);

        let mut fields = unsigned.fields().to_vec();
        fields.push((
            "signature".to_string(),
            signature::generate_signature(&unsigned, Some("jt7NOE43FZPn")),
        ));
        let signed = PayfastNotification::from_pairs(fields);
        let updated = f.processor.form_feedback(&signed).await.unwrap();
        assert_eq!(updated.state, TransactionState::Done);
    }

    #[test]
    fn test_parse_payment_date_formats() {
        assert_eq!(
            parse_payment_date("2024-03-05T14:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap())
        );
        assert_eq!(
            parse_payment_date("Tue, 05 Mar 2024 14:30:00 +0000"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap())
        );
        assert_eq!(
            parse_payment_date("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 22, 0, 0).unwrap())
        );
        assert_eq!(
            parse_payment_date("09:15:30 Jan 15, 2024 PST"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 17, 15, 30).unwrap())
        );
        assert_eq!(
            parse_payment_date("09:15:30 Jul 15, 2024 PDT"),
            Some(Utc.with_ymd_and_hms(2024, 7, 15, 16, 15, 30).unwrap())
        );
        assert_eq!(parse_payment_date("09:15:30 Jan 15, 2024 CET"), None);
        assert_eq!(parse_payment_date("yesterday"), None);
    }

    #[test]
    fn test_same_amount_rounds_to_cents() {
        assert!(same_amount(10.004, 10.0));
        assert!(!same_amount(10.01, 10.0));
    }
}
