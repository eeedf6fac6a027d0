use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{EventId, Money, Status, TransactionId, UserId};
use tokio::sync::RwLock;

use crate::model::{Event, Transaction, User, UserCoupon, UserPoint};
use crate::rewards::{REFERRAL_BONUS, REFERRAL_BONUS_VALIDITY_DAYS};
use crate::store::{CheckoutUnit, Decision, TicketStore};
use crate::{Result, StoreError};

#[derive(Debug, Default)]
struct Inner {
    events: HashMap<EventId, Event>,
    transactions: HashMap<TransactionId, Transaction>,
    users: HashMap<UserId, User>,
    points: Vec<UserPoint>,
    coupons: Vec<UserCoupon>,
}

impl Inner {
    fn release_seat(&mut self, event_id: EventId) {
        if let Some(event) = self.events.get_mut(&event_id) {
            event.available_seats = (event.available_seats + 1).min(event.total_seats);
        }
    }
}

/// In-memory ticket store for testing.
///
/// Every operation takes a single write lock over the whole state, which
/// makes each unit of work atomic under concurrent callers with the same
/// observable semantics as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an event.
    pub async fn insert_event(&self, event: Event) {
        self.inner.write().await.events.insert(event.id, event);
    }

    /// Seeds a user with an optional referral link.
    pub async fn insert_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Seeds a point grant.
    pub async fn insert_point(&self, point: UserPoint) {
        self.inner.write().await.points.push(point);
    }

    /// Seeds a coupon.
    pub async fn insert_coupon(&self, coupon: UserCoupon) {
        self.inner.write().await.coupons.push(coupon);
    }

    /// Returns the live seat count of an event.
    pub async fn available_seats(&self, event_id: EventId) -> Option<i32> {
        self.inner
            .read()
            .await
            .events
            .get(&event_id)
            .map(|e| e.available_seats)
    }

    /// Returns all point rows for a user, used and unused.
    pub async fn points_for(&self, user_id: UserId) -> Vec<UserPoint> {
        self.inner
            .read()
            .await
            .points
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Returns all coupon rows for a user.
    pub async fn coupons_for(&self, user_id: UserId) -> Vec<UserCoupon> {
        self.inner
            .read()
            .await
            .coupons
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn find_event(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(&id).cloned())
    }

    async fn transactions_for_customer(&self, customer_id: UserId) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut txns: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect();
        txns.sort_by(|a, b| b.expires_at.cmp(&a.expires_at));
        Ok(txns)
    }

    async fn pending_confirmations(&self, event_id: EventId) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut txns: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.event_id == event_id && t.status == Status::WaitingConfirmation)
            .cloned()
            .collect();
        txns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(txns)
    }

    async fn checkout(&self, unit: CheckoutUnit) -> Result<Transaction> {
        let mut inner = self.inner.write().await;

        // Validate the whole unit before mutating anything, so a failure
        // leaves no partial effects (the rollback the real store gets for
        // free from its database transaction).
        let price = match inner.events.get(&unit.event_id) {
            Some(event) if event.available_seats > 0 => event.price,
            _ => {
                return Err(StoreError::InsufficientInventory {
                    event_id: unit.event_id,
                });
            }
        };

        let coupon_idx = match unit.coupon_id {
            Some(coupon_id) => {
                let idx = inner.coupons.iter().position(|c| {
                    c.id == coupon_id
                        && c.user_id == unit.customer_id
                        && c.is_redeemable_at(unit.now)
                });
                match idx {
                    Some(idx) => Some(idx),
                    None => return Err(StoreError::RedemptionFailed { coupon_id }),
                }
            }
            None => None,
        };

        let mut discount = Money::zero();

        if unit.use_points {
            for point in inner
                .points
                .iter_mut()
                .filter(|p| p.user_id == unit.customer_id && p.is_redeemable_at(unit.now))
            {
                discount = discount.add(point.amount);
                point.is_used = true;
            }
        }

        if let Some(idx) = coupon_idx {
            let coupon = &mut inner.coupons[idx];
            coupon.is_used = true;
            discount = discount.add(price.percent(coupon.discount_val.into()));
        }

        if let Some(event) = inner.events.get_mut(&unit.event_id) {
            event.available_seats -= 1;
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

        inner.transactions.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn submit_proof(
        &self,
        id: TransactionId,
        customer_id: UserId,
        proof_url: &str,
    ) -> Result<Option<Transaction>> {
        let mut inner = self.inner.write().await;

        let Some(txn) = inner.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if txn.customer_id != customer_id || !txn.status.can_upload_proof() {
            return Ok(None);
        }

        txn.status = Status::WaitingConfirmation;
        txn.payment_proof_url = Some(proof_url.to_string());
        Ok(Some(txn.clone()))
    }

    async fn settle(
        &self,
        id: TransactionId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let mut inner = self.inner.write().await;

        let Some(txn) = inner.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if !txn.status.can_decide() {
            return Ok(None);
        }

        match decision {
            Decision::Approve => {
                txn.status = Status::Done;
                let settled = txn.clone();

                let referrer = inner
                    .users
                    .get(&settled.customer_id)
                    .and_then(|u| u.referred_by);
                let already_completed = inner.transactions.values().any(|t| {
                    t.customer_id == settled.customer_id
                        && t.status == Status::Done
                        && t.id != settled.id
                });

                if let Some(referrer) = referrer
                    && !already_completed
                {
                    inner.points.push(UserPoint {
                        id: uuid::Uuid::new_v4(),
                        user_id: referrer,
                        amount: REFERRAL_BONUS,
                        is_used: false,
                        expired_at: now + Duration::days(REFERRAL_BONUS_VALIDITY_DAYS),
                    });
                }

                Ok(Some(settled))
            }
            Decision::Reject => {
                txn.status = Status::Rejected;
                let settled = txn.clone();
                inner.release_seat(settled.event_id);
                Ok(Some(settled))
            }
        }
    }

    async fn cancel(
        &self,
        id: TransactionId,
        customer_id: UserId,
    ) -> Result<Option<Transaction>> {
        let mut inner = self.inner.write().await;

        let Some(txn) = inner.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if txn.customer_id != customer_id || !txn.status.can_cancel() {
            return Ok(None);
        }

        txn.status = Status::Canceled;
        let canceled = txn.clone();
        inner.release_seat(canceled.event_id);
        Ok(Some(canceled))
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<TransactionId>> {
        let inner = self.inner.read().await;
        let mut overdue: Vec<&Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.status.can_expire() && t.expires_at < now)
            .collect();
        overdue.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        Ok(overdue.into_iter().map(|t| t.id).collect())
    }

    async fn expire(&self, id: TransactionId, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;

        let Some(txn) = inner.transactions.get_mut(&id) else {
            return Ok(false);
        };
        if !txn.status.can_expire() || txn.expires_at >= now {
            return Ok(false);
        }

        txn.status = Status::Expired;
        let event_id = txn.event_id;
        inner.release_seat(event_id);
        Ok(true)
    }
}
