//! Shared types for the ticket reservation core.
//!
//! Identifier newtypes, money in integer minor units, and the canonical
//! transaction status enum used by every other crate in the workspace.

pub mod status;
pub mod types;

pub use status::{ParseStatusError, Status};
pub use types::{CouponId, EventId, Money, TransactionId, UserId};
