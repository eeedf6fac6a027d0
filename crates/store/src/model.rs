//! Row models for the relational store.

use chrono::{DateTime, Utc};
use common::{CouponId, EventId, Money, Status, TransactionId, UserId};
use serde::Serialize;
use uuid::Uuid;

/// A ticketed event with its seat inventory.
///
/// `available_seats` is the only field the core mutates, always by ±1 per
/// reservation transition, and always through a conditional update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: EventId,
    pub organizer_id: UserId,
    pub name: String,
    pub price: Money,
    pub total_seats: i32,
    pub available_seats: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl Event {
    /// Returns true if the registration window is still open at `now`.
    /// Policy: a seat can be bought until the event ends.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at > now
    }
}

/// A transaction: one held seat moving through the reservation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: UserId,
    pub event_id: EventId,
    pub total_price: Money,
    pub status: Status,
    pub expires_at: DateTime<Utc>,
    pub payment_proof_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user the core needs: the referral link. Credentials and
/// profile data are owned by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub referral_code: Option<String>,
    pub referred_by: Option<UserId>,
}

/// A point grant. `is_used` is monotonic: once true, never reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPoint {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: Money,
    pub is_used: bool,
    pub expired_at: DateTime<Utc>,
}

impl UserPoint {
    /// Returns true if the points can still be redeemed at `now`.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expired_at > now
    }
}

/// A percentage-discount coupon. `is_used` is monotonic like a point's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCoupon {
    pub id: CouponId,
    pub user_id: UserId,
    pub discount_val: i32,
    pub is_used: bool,
    pub expired_at: DateTime<Utc>,
}

impl UserCoupon {
    /// Returns true if the coupon can still be redeemed at `now`.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expired_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event_at(ends_in: Duration) -> Event {
        let now = Utc::now();
        Event {
            id: EventId::new(),
            organizer_id: UserId::new(),
            name: "Concert".to_string(),
            price: Money::from_minor(100_000),
            total_seats: 10,
            available_seats: 10,
            starts_at: now - Duration::hours(1),
            ends_at: now + ends_in,
        }
    }

    #[test]
    fn event_open_until_it_ends() {
        let now = Utc::now();
        assert!(event_at(Duration::hours(1)).is_open_at(now));
        assert!(!event_at(Duration::hours(-1)).is_open_at(now));
    }

    #[test]
    fn point_redeemable_only_when_unused_and_unexpired() {
        let now = Utc::now();
        let mut point = UserPoint {
            id: Uuid::new_v4(),
            user_id: UserId::new(),
            amount: Money::from_minor(10_000),
            is_used: false,
            expired_at: now + Duration::days(90),
        };
        assert!(point.is_redeemable_at(now));

        point.is_used = true;
        assert!(!point.is_redeemable_at(now));

        point.is_used = false;
        point.expired_at = now - Duration::days(1);
        assert!(!point.is_redeemable_at(now));
    }
}
