use common::{CouponId, EventId, ParseStatusError};
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The event had no seats left when the checkout unit ran.
    #[error("no seats available for event {event_id}")]
    InsufficientInventory { event_id: EventId },

    /// The coupon named at checkout was missing, expired, or already used.
    /// The whole checkout unit rolls back; a named coupon never silently
    /// goes unredeemed.
    #[error("coupon {coupon_id} is missing, expired, or already used")]
    RedemptionFailed { coupon_id: CouponId },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted status string did not parse; the row is corrupt.
    #[error("corrupt transaction row: {0}")]
    CorruptStatus(#[from] ParseStatusError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
