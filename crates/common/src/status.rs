//! Transaction status state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of a transaction (reservation) in its lifecycle.
///
/// Transitions:
/// ```text
/// (checkout) ──► WaitingPayment ──► WaitingConfirmation ──► Done
///                     │    │                  │
///                     │    └──► Canceled      └──► Rejected
///                     └──► Expired
/// ```
///
/// The graph is acyclic: every terminal status is final and no status is
/// ever revisited. Transitions are enforced twice, here for callers and in
/// the store as conditional updates keyed on the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Seat is held, awaiting the customer's payment proof.
    WaitingPayment,

    /// Proof uploaded, awaiting the organizer's decision.
    WaitingConfirmation,

    /// Organizer approved the payment (terminal state).
    Done,

    /// Organizer rejected the payment, seat returned (terminal state).
    Rejected,

    /// Customer canceled before paying, seat returned (terminal state).
    Canceled,

    /// Payment window lapsed, seat reclaimed by the sweeper (terminal state).
    Expired,
}

impl Status {
    /// Returns true if a payment proof can be attached in this status.
    pub fn can_upload_proof(&self) -> bool {
        matches!(self, Status::WaitingPayment)
    }

    /// Returns true if the customer can cancel in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Status::WaitingPayment)
    }

    /// Returns true if the sweeper may expire the reservation in this status.
    pub fn can_expire(&self) -> bool {
        matches!(self, Status::WaitingPayment)
    }

    /// Returns true if an organizer decision (approve/reject) is valid in
    /// this status.
    pub fn can_decide(&self) -> bool {
        matches!(self, Status::WaitingConfirmation)
    }

    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Done | Status::Rejected | Status::Canceled | Status::Expired
        )
    }

    /// Returns the status as its canonical wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::WaitingPayment => "WAITING_PAYMENT",
            Status::WaitingConfirmation => "WAITING_CONFIRMATION",
            Status::Done => "DONE",
            Status::Rejected => "REJECTED",
            Status::Canceled => "CANCELED",
            Status::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized transaction status: {0:?}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING_PAYMENT" => Ok(Status::WaitingPayment),
            "WAITING_CONFIRMATION" => Ok(Status::WaitingConfirmation),
            "DONE" => Ok(Status::Done),
            "REJECTED" => Ok(Status::Rejected),
            "CANCELED" => Ok(Status::Canceled),
            "EXPIRED" => Ok(Status::Expired),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
