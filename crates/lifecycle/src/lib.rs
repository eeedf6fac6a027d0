//! Transaction lifecycle engine.
//!
//! Orchestrates the reservation state machine over a [`TicketStore`]:
//! checkout, payment-proof upload, organizer decisions, customer
//! cancellation, and the expiry path driven by the sweeper. The engine
//! validates preconditions and maps store outcomes to the user-facing error
//! taxonomy; atomicity of each transition is the store's contract.
//!
//! [`TicketStore`]: store::TicketStore

pub mod engine;
pub mod error;

pub use engine::{CheckoutRequest, LifecycleEngine, RESERVATION_HOLD_HOURS};
pub use error::LifecycleError;
pub use store::Decision;
