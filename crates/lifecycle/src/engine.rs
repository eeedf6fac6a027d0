//! The lifecycle engine: every state transition enters through here.

use chrono::{Duration, Utc};
use common::{CouponId, EventId, Status, TransactionId, UserId};
use store::{CheckoutUnit, Decision, TicketStore, Transaction};

use crate::error::LifecycleError;

/// How long a reservation holds its seat before the sweeper may reclaim it.
pub const RESERVATION_HOLD_HOURS: i64 = 2;

/// A customer's checkout request.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: UserId,
    pub event_id: EventId,
    /// Redeem the customer's entire unused, unexpired point balance.
    pub use_points: bool,
    /// A specific coupon to redeem, if any.
    pub coupon_id: Option<CouponId>,
}

/// Orchestrates the reservation state machine over a ticket store.
///
/// The engine performs precondition and ownership checks, delegates each
/// transition to the store as one atomic unit, and translates store
/// outcomes into the user-facing error taxonomy. It holds no state of its
/// own and no lock across store I/O; cloning it is cheap when the store is.
pub struct LifecycleEngine<S: TicketStore> {
    store: S,
}

impl<S: TicketStore + Clone> Clone for LifecycleEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: TicketStore> LifecycleEngine<S> {
    /// Creates a new engine over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserves one seat: checks the registration window, then runs the
    /// atomic checkout unit (seat decrement, redemptions, reservation row).
    /// The created transaction starts in `WAITING_PAYMENT` with a
    /// two-hour hold.
    #[tracing::instrument(skip(self, req), fields(customer = %req.customer_id, event = %req.event_id))]
    pub async fn checkout(&self, req: CheckoutRequest) -> Result<Transaction, LifecycleError> {
        metrics::counter!("checkout_attempts_total").increment(1);

        let event = self
            .store
            .find_event(req.event_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        let now = Utc::now();
        if !event.is_open_at(now) {
            return Err(LifecycleError::EventEnded {
                event_id: req.event_id,
            });
        }

        let result = self
            .store
            .checkout(CheckoutUnit {
                customer_id: req.customer_id,
                event_id: req.event_id,
                use_points: req.use_points,
                coupon_id: req.coupon_id,
                now,
                expires_at: now + Duration::hours(RESERVATION_HOLD_HOURS),
            })
            .await;

        match result {
            Ok(txn) => {
                metrics::counter!("reservations_created_total").increment(1);
                tracing::info!(transaction = %txn.id, price = %txn.total_price, "seat reserved");
                Ok(txn)
            }
            Err(err) => {
                if matches!(err, store::StoreError::InsufficientInventory { .. }) {
                    metrics::counter!("checkout_sold_out_total").increment(1);
                }
                Err(err.into())
            }
        }
    }

    /// Attaches a payment proof reference and moves the reservation to
    /// `WAITING_CONFIRMATION`. Ownership and wrong-state failures are both
    /// reported as `NotFound` so the existence of other customers'
    /// transactions does not leak.
    #[tracing::instrument(skip(self, proof_ref))]
    pub async fn upload_proof(
        &self,
        id: TransactionId,
        customer_id: UserId,
        proof_ref: &str,
    ) -> Result<Transaction, LifecycleError> {
        let txn = self
            .store
            .submit_proof(id, customer_id, proof_ref)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        tracing::info!(transaction = %txn.id, "payment proof submitted");
        Ok(txn)
    }

    /// Applies an organizer's decision to a reservation awaiting
    /// confirmation. The caller must own the event; approval may grant the
    /// referral bonus, rejection returns the seat, both inside the store's
    /// atomic unit.
    #[tracing::instrument(skip(self))]
    pub async fn decide(
        &self,
        id: TransactionId,
        organizer_id: UserId,
        decision: Decision,
    ) -> Result<Transaction, LifecycleError> {
        let txn = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        let event = self
            .store
            .find_event(txn.event_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        if event.organizer_id != organizer_id {
            return Err(LifecycleError::NotFound);
        }

        if !txn.status.can_decide() {
            return Err(LifecycleError::InvalidState {
                id,
                found: txn.status,
                expected: Status::WaitingConfirmation,
            });
        }

        let Some(settled) = self.store.settle(id, decision, Utc::now()).await? else {
            // A competing writer moved the row between our read and the
            // guarded update. Report what it is now.
            let found = self
                .store
                .find_transaction(id)
                .await?
                .ok_or(LifecycleError::NotFound)?
                .status;
            return Err(LifecycleError::InvalidState {
                id,
                found,
                expected: Status::WaitingConfirmation,
            });
        };

        match decision {
            Decision::Approve => {
                metrics::counter!("transactions_approved_total").increment(1);
            }
            Decision::Reject => {
                metrics::counter!("transactions_rejected_total").increment(1);
            }
        }
        tracing::info!(transaction = %settled.id, status = %settled.status, "decision applied");
        Ok(settled)
    }

    /// Customer-initiated cancellation of an unpaid reservation. Returns the
    /// seat to inventory. `NotFound` covers missing, foreign, and
    /// already-progressed transactions alike.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: TransactionId,
        customer_id: UserId,
    ) -> Result<Transaction, LifecycleError> {
        let txn = self
            .store
            .cancel(id, customer_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        metrics::counter!("transactions_canceled_total").increment(1);
        tracing::info!(transaction = %txn.id, "reservation canceled");
        Ok(txn)
    }

    /// Expires every overdue reservation, releasing its seat. Failures on
    /// one row are logged and skipped; the row stays eligible for the next
    /// sweep. Returns the number of reservations expired.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<usize, LifecycleError> {
        let now = Utc::now();
        let overdue = self.store.find_overdue(now).await?;

        let mut expired = 0;
        for id in overdue {
            match self.store.expire(id, now).await {
                Ok(true) => {
                    expired += 1;
                    metrics::counter!("transactions_expired_total").increment(1);
                    tracing::info!(transaction = %id, "reservation expired, seat restored");
                }
                Ok(false) => {
                    // Lost the race to a cancel or proof upload; nothing to do.
                    tracing::debug!(transaction = %id, "reservation no longer eligible for expiry");
                }
                Err(err) => {
                    tracing::warn!(transaction = %id, error = %err, "failed to expire reservation, will retry next sweep");
                }
            }
        }

        Ok(expired)
    }

    /// Loads one of the caller's transactions.
    #[tracing::instrument(skip(self))]
    pub async fn transaction_for(
        &self,
        id: TransactionId,
        customer_id: UserId,
    ) -> Result<Transaction, LifecycleError> {
        match self.store.find_transaction(id).await? {
            Some(txn) if txn.customer_id == customer_id => Ok(txn),
            _ => Err(LifecycleError::NotFound),
        }
    }

    /// Lists the caller's transactions, newest hold first.
    #[tracing::instrument(skip(self))]
    pub async fn my_transactions(
        &self,
        customer_id: UserId,
    ) -> Result<Vec<Transaction>, LifecycleError> {
        Ok(self.store.transactions_for_customer(customer_id).await?)
    }

    /// Lists reservations awaiting the organizer's decision for one of
    /// their events.
    #[tracing::instrument(skip(self))]
    pub async fn approvals(
        &self,
        event_id: EventId,
        organizer_id: UserId,
    ) -> Result<Vec<Transaction>, LifecycleError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        if event.organizer_id != organizer_id {
            return Err(LifecycleError::NotFound);
        }

        Ok(self.store.pending_confirmations(event_id).await?)
    }
}
