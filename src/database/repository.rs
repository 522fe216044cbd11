use crate::database::error::DbResult;
use crate::payments::types::{PaymentTransaction, TransactionUpdate};
use async_trait::async_trait;

/// Storage for payment transactions
/// Both the Postgres repository and the in-memory store implement this trait
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Short name of the backend, reported by the health check
    fn backend(&self) -> &'static str;

    /// Find a transaction by its ID
    async fn find_by_id(&self, id: &str) -> DbResult<Option<PaymentTransaction>>;

    /// Find every transaction carrying the given reference
    ///
    /// Callers treat anything but exactly one match as an error, so
    /// implementations return all matches rather than the first.
    async fn search_by_reference(&self, reference: &str) -> DbResult<Vec<PaymentTransaction>>;

    /// Insert a new transaction
    async fn insert(&self, transaction: &PaymentTransaction) -> DbResult<PaymentTransaction>;

    /// Write the fields of a notification onto a transaction
    ///
    /// A transaction already in a terminal state is returned unchanged.
    async fn write(&self, id: &str, update: &TransactionUpdate) -> DbResult<PaymentTransaction>;

    /// Check if a transaction exists by ID
    async fn exists(&self, id: &str) -> DbResult<bool> {
        match self.find_by_id(id).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
