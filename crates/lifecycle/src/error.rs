//! Lifecycle error taxonomy.

use common::{CouponId, EventId, Status, TransactionId};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The entity does not exist or the caller does not own it. The two are
    /// deliberately conflated so callers cannot probe for other users'
    /// transactions.
    #[error("not found")]
    NotFound,

    /// The event sold out before this checkout could take a seat.
    #[error("event {event_id} has no seats left")]
    InsufficientInventory { event_id: EventId },

    /// The coupon named at checkout could not be redeemed; nothing was
    /// charged or consumed.
    #[error("coupon {coupon_id} is missing, expired, or already used")]
    RedemptionFailed { coupon_id: CouponId },

    /// The event's registration window has closed.
    #[error("event {event_id} has already ended")]
    EventEnded { event_id: EventId },

    /// The transaction exists but is not in the state the operation
    /// requires (usually because a competing writer got there first).
    #[error("transaction {id} is in state {found}, expected {expected}")]
    InvalidState {
        id: TransactionId,
        found: Status,
        expected: Status,
    },

    /// An error occurred in the storage layer.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientInventory { event_id } => {
                LifecycleError::InsufficientInventory { event_id }
            }
            StoreError::RedemptionFailed { coupon_id } => {
                LifecycleError::RedemptionFailed { coupon_id }
            }
            other => LifecycleError::Store(other),
        }
    }
}
