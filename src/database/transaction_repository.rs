use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::repository::TransactionStore;
use crate::payments::types::{PaymentTransaction, TransactionState, TransactionUpdate};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::debug;

const COLUMNS: &str = "id, reference, acquirer, amount, currency, state, state_message, \
                       acquirer_reference, date, created_at, updated_at";

/// Row of the `payment_transactions` table
#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    id: String,
    reference: String,
    acquirer: String,
    amount: f64,
    currency: String,
    state: String,
    state_message: Option<String>,
    acquirer_reference: Option<String>,
    date: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let state = row.state.parse::<TransactionState>().map_err(|message| {
            DatabaseError::new(DatabaseErrorKind::InvalidRecord { message })
                .with_context(format!("transaction {}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            reference: row.reference,
            acquirer: row.acquirer,
            amount: row.amount,
            currency: row.currency,
            state,
            state_message: row.state_message,
            acquirer_reference: row.acquirer_reference,
            date: row.date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed transaction store
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_by_id(&self, id: &str) -> DbResult<Option<PaymentTransaction>> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .map(PaymentTransaction::try_from)
        .transpose()
    }

    async fn search_by_reference(&self, reference: &str) -> DbResult<Vec<PaymentTransaction>> {
        debug!("Searching payment transactions by reference {}", reference);

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions WHERE reference = $1 ORDER BY created_at ASC",
            COLUMNS
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(PaymentTransaction::try_from).collect()
    }

    async fn insert(&self, transaction: &PaymentTransaction) -> DbResult<PaymentTransaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO payment_transactions ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {}",
            COLUMNS, COLUMNS
        ))
        .bind(&transaction.id)
        .bind(&transaction.reference)
        .bind(&transaction.acquirer)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.state.as_str())
        .bind(&transaction.state_message)
        .bind(&transaction.acquirer_reference)
        .bind(transaction.date)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        PaymentTransaction::try_from(row)
    }

    async fn write(&self, id: &str, update: &TransactionUpdate) -> DbResult<PaymentTransaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE payment_transactions \
             SET state = $2, \
                 state_message = COALESCE($3, state_message), \
                 acquirer_reference = COALESCE($4, acquirer_reference), \
                 date = COALESCE($5, date), \
                 updated_at = NOW() \
             WHERE id = $1 AND state NOT IN ('done', 'cancelled') \
             RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(update.state.as_str())
        .bind(&update.state_message)
        .bind(&update.acquirer_reference)
        .bind(update.date)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => PaymentTransaction::try_from(row),
            // missing, or already terminal
            None => {
                let current = self
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| DatabaseError::not_found("PaymentTransaction", id))?;
                debug!(
                    "Payment transaction {} already {}; update skipped",
                    current.reference, current.state
                );
                Ok(current)
            }
        }
    }
}
