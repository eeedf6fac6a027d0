//! Storage layer for the ticket reservation core.
//!
//! The [`TicketStore`] trait exposes one method per lifecycle transition;
//! each method is a single atomic unit of work. [`PostgresStore`] implements
//! the units as database transactions built from conditional updates with
//! affected-row feedback, so correctness under concurrent callers is
//! delegated to the store rather than to in-process locks. [`MemoryStore`]
//! mirrors the same semantics for tests.
//!
//! The inventory ledger ([`inventory`]) and reward ledger ([`rewards`]) are
//! connection-scoped modules so every transition composes them inside its
//! own transaction.

pub mod error;
pub mod inventory;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod rewards;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use model::{Event, Transaction, User, UserCoupon, UserPoint};
pub use postgres::PostgresStore;
pub use store::{CheckoutUnit, Decision, TicketStore};
