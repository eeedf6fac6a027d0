use chrono::{DateTime, Utc};
use common::{EventId, Money, Status, TransactionId, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Row, Transaction as PgTx};
use uuid::Uuid;

use crate::model::{Event, Transaction};
use crate::store::{CheckoutUnit, Decision, TicketStore};
use crate::{Result, StoreError, inventory, rewards};

use async_trait::async_trait;

/// PostgreSQL-backed ticket store.
///
/// Each trait method that mutates state runs as one database transaction;
/// all guards are expressed in `WHERE` clauses so the row-level writer that
/// commits first wins and the loser observes zero affected rows.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the given database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Closes the connection pool. Called once at process shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        Ok(Event {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            organizer_id: UserId::from_uuid(row.try_get::<Uuid, _>("organizer_id")?),
            name: row.try_get("name")?,
            price: Money::from_minor(row.try_get("price")?),
            total_seats: row.try_get("total_seats")?,
            available_seats: row.try_get("available_seats")?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
        })
    }

    fn row_to_transaction(row: PgRow) -> Result<Transaction> {
        let status: Status = row.try_get::<String, _>("status")?.parse()?;

        Ok(Transaction {
            id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            total_price: Money::from_minor(row.try_get("total_price")?),
            status,
            expires_at: row.try_get("expires_at")?,
            payment_proof_url: row.try_get("payment_proof_url")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Conditional status transition: `WHERE` carries the expected current
    /// status plus any extra guard, so only one competing writer can match.
    async fn guarded_transition(
        tx: &mut PgTx<'_, sqlx::Postgres>,
        id: TransactionId,
        from: Status,
        to: Status,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, customer_id, event_id, total_price, status,
                      expires_at, payment_proof_url, created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }
}

#[async_trait]
impl TicketStore for PostgresStore {
    async fn find_event(&self, id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(
            r#"
            SELECT id, organizer_id, name, price, total_seats, available_seats,
                   starts_at, ends_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, event_id, total_price, status,
                   expires_at, payment_proof_url, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn transactions_for_customer(&self, customer_id: UserId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, event_id, total_price, status,
                   expires_at, payment_proof_url, created_at
            FROM transactions
            WHERE customer_id = $1
            ORDER BY expires_at DESC
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn pending_confirmations(&self, event_id: EventId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, event_id, total_price, status,
                   expires_at, payment_proof_url, created_at
            FROM transactions
            WHERE event_id = $1 AND status = 'WAITING_CONFIRMATION'
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn checkout(&self, unit: CheckoutUnit) -> Result<Transaction> {
        let mut tx = self.pool.begin().await?;

        // Seat first: sold-out checkouts must fail before any redemption.
        let price = inventory::reserve(&mut tx, unit.event_id)
            .await?
            .ok_or(StoreError::InsufficientInventory {
                event_id: unit.event_id,
            })?;

        let mut discount = Money::zero();

        if unit.use_points {
            discount = discount.add(rewards::redeem_points(&mut tx, unit.customer_id, unit.now).await?);
        }

        if let Some(coupon_id) = unit.coupon_id {
            let percent = rewards::redeem_coupon(&mut tx, unit.customer_id, coupon_id, unit.now)
                .await?
                .ok_or(StoreError::RedemptionFailed { coupon_id })?;
            discount = discount.add(price.percent(percent.into()));
        }

        let transaction = Transaction {
            id: TransactionId::new(),
            customer_id: unit.customer_id,
            event_id: unit.event_id,
            total_price: price.saturating_sub(discount),
            status: Status::WaitingPayment,
            expires_at: unit.expires_at,
            payment_proof_url: None,
            created_at: unit.now,
        };

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, customer_id, event_id, total_price, status, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.customer_id.as_uuid())
        .bind(transaction.event_id.as_uuid())
        .bind(transaction.total_price.minor())
        .bind(transaction.status.as_str())
        .bind(transaction.expires_at)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn submit_proof(
        &self,
        id: TransactionId,
        customer_id: UserId,
        proof_url: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'WAITING_CONFIRMATION', payment_proof_url = $3
            WHERE id = $1 AND customer_id = $2 AND status = 'WAITING_PAYMENT'
            RETURNING id, customer_id, event_id, total_price, status,
                      expires_at, payment_proof_url, created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(proof_url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn settle(
        &self,
        id: TransactionId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let mut tx = self.pool.begin().await?;

        let settled = match decision {
            Decision::Approve => {
                let settled =
                    Self::guarded_transition(&mut tx, id, Status::WaitingConfirmation, Status::Done)
                        .await?;

                if let Some(ref txn) = settled
                    && let Some(referrer) = rewards::referred_by(&mut tx, txn.customer_id).await?
                    && !rewards::has_completed_purchase(&mut tx, txn.customer_id, txn.id).await?
                {
                    rewards::grant_referral_bonus(&mut tx, referrer, now).await?;
                    tracing::debug!(%referrer, customer = %txn.customer_id, "referral bonus granted");
                }

                settled
            }
            Decision::Reject => {
                let settled = Self::guarded_transition(
                    &mut tx,
                    id,
                    Status::WaitingConfirmation,
                    Status::Rejected,
                )
                .await?;

                if let Some(ref txn) = settled {
                    inventory::release(&mut tx, txn.event_id).await?;
                }

                settled
            }
        };

        tx.commit().await?;
        Ok(settled)
    }

    async fn cancel(
        &self,
        id: TransactionId,
        customer_id: UserId,
    ) -> Result<Option<Transaction>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'CANCELED'
            WHERE id = $1 AND customer_id = $2 AND status = 'WAITING_PAYMENT'
            RETURNING id, customer_id, event_id, total_price, status,
                      expires_at, payment_proof_url, created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let canceled = row.map(Self::row_to_transaction).transpose()?;

        if let Some(ref txn) = canceled {
            inventory::release(&mut tx, txn.event_id).await?;
        }

        tx.commit().await?;
        Ok(canceled)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<TransactionId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM transactions
            WHERE status = 'WAITING_PAYMENT' AND expires_at < $1
            ORDER BY expires_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(TransactionId::from_uuid).collect())
    }

    async fn expire(&self, id: TransactionId, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let event_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE transactions
            SET status = 'EXPIRED'
            WHERE id = $1 AND status = 'WAITING_PAYMENT' AND expires_at < $2
            RETURNING event_id
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(event_id) = event_id else {
            // Lost the race to a cancel/proof upload, or already expired.
            return Ok(false);
        };

        inventory::release(&mut tx, EventId::from_uuid(event_id)).await?;
        tx.commit().await?;
        Ok(true)
    }
}
