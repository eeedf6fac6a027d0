use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CouponId, EventId, TransactionId, UserId};

use crate::Result;
use crate::model::{Event, Transaction};

/// Input for the checkout unit of work.
///
/// The engine computes the hold horizon (`expires_at`) and passes the clock
/// (`now`) explicitly so expiry predicates on points and coupons use one
/// consistent timestamp per unit.
#[derive(Debug, Clone)]
pub struct CheckoutUnit {
    pub customer_id: UserId,
    pub event_id: EventId,
    /// Redeem the customer's entire unused, unexpired point balance.
    pub use_points: bool,
    /// A specific coupon to redeem, if any.
    pub coupon_id: Option<CouponId>,
    pub now: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An organizer's decision on a reservation awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Payment accepted; the reservation settles as `DONE`.
    Approve,
    /// Payment refused; the reservation becomes `REJECTED` and the seat is
    /// returned to inventory.
    Reject,
}

/// Core trait for ticket store backends.
///
/// Every mutating method is one atomic unit of work guarded by conditional
/// updates: either all its effects commit or none do, and a competing writer
/// that wins the same transition makes the method report "no row matched"
/// (`None`/`false`) instead of applying effects twice. Callers must not hold
/// in-process locks across these calls.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Loads an event by id.
    async fn find_event(&self, id: EventId) -> Result<Option<Event>>;

    /// Loads a transaction by id, with no ownership filter. Callers are
    /// responsible for access checks.
    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Loads all transactions belonging to a customer, newest hold first.
    async fn transactions_for_customer(&self, customer_id: UserId) -> Result<Vec<Transaction>>;

    /// Loads reservations awaiting confirmation for one event (the
    /// organizer's approval inbox), oldest first.
    async fn pending_confirmations(&self, event_id: EventId) -> Result<Vec<Transaction>>;

    /// Runs the checkout unit: conditionally takes one seat, redeems points
    /// and/or a coupon, and inserts the reservation row in `WAITING_PAYMENT`.
    ///
    /// Fails with [`StoreError::InsufficientInventory`] if no seat was left
    /// and [`StoreError::RedemptionFailed`] if a named coupon could not be
    /// redeemed; in both cases nothing is applied.
    ///
    /// [`StoreError::InsufficientInventory`]: crate::StoreError::InsufficientInventory
    /// [`StoreError::RedemptionFailed`]: crate::StoreError::RedemptionFailed
    async fn checkout(&self, unit: CheckoutUnit) -> Result<Transaction>;

    /// Attaches a payment proof and moves the reservation to
    /// `WAITING_CONFIRMATION`, guarded on ownership and current status.
    /// Returns `None` if no row matched the guard.
    async fn submit_proof(
        &self,
        id: TransactionId,
        customer_id: UserId,
        proof_url: &str,
    ) -> Result<Option<Transaction>>;

    /// Applies an organizer decision to a reservation in
    /// `WAITING_CONFIRMATION`. Approval settles the row as `DONE` and, when
    /// this is the customer's first completed purchase and the customer was
    /// referred, grants the referrer's bonus in the same unit. Rejection
    /// returns the seat to inventory in the same unit.
    ///
    /// Returns `None` if the status guard did not match (a competing writer
    /// already moved the row).
    async fn settle(
        &self,
        id: TransactionId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>>;

    /// Customer-initiated cancellation, guarded on ownership and
    /// `WAITING_PAYMENT`. Returns the seat to inventory in the same unit.
    /// Returns `None` if no row matched.
    async fn cancel(&self, id: TransactionId, customer_id: UserId)
    -> Result<Option<Transaction>>;

    /// Lists reservations still in `WAITING_PAYMENT` whose hold lapsed
    /// before `now`, oldest first.
    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<TransactionId>>;

    /// Expires one overdue reservation and returns its seat, guarded on
    /// `WAITING_PAYMENT` and a lapsed hold. Returns `false` if the guard did
    /// not match, which makes repeated sweeps idempotent.
    async fn expire(&self, id: TransactionId, now: DateTime<Utc>) -> Result<bool>;
}
