use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::repository::TransactionStore;
use crate::payments::types::{PaymentTransaction, TransactionUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory transaction store.
///
/// Used when no database is configured, and by tests.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<String, PaymentTransaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions
    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_by_id(&self, id: &str) -> DbResult<Option<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(id).cloned())
    }

    async fn search_by_reference(&self, reference: &str) -> DbResult<Vec<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        let mut matches: Vec<PaymentTransaction> = transactions
            .values()
            .filter(|tx| tx.reference == reference)
            .cloned()
            .collect();
        matches.sort_by_key(|tx| tx.created_at);
        Ok(matches)
    }

    async fn insert(&self, transaction: &PaymentTransaction) -> DbResult<PaymentTransaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.id) {
            return Err(DatabaseError::new(
                DatabaseErrorKind::UniqueConstraintViolation {
                    column: "id".to_string(),
                    value: transaction.id.clone(),
                },
            ));
        }
        transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(transaction.clone())
    }

    async fn write(&self, id: &str, update: &TransactionUpdate) -> DbResult<PaymentTransaction> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(id)
            .ok_or_else(|| DatabaseError::not_found("PaymentTransaction", id))?;
        if !transaction.state.is_terminal() {
            transaction.apply(update);
        }
        Ok(transaction.clone())
    }
}
