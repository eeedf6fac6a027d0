//! Background expiry sweeper.
//!
//! Periodically asks the lifecycle engine to expire overdue reservations
//! so abandoned holds return their seats to inventory. The sweeper runs as
//! a spawned task and stops cleanly when the process shuts down.

pub mod sweeper;

pub use sweeper::{DEFAULT_SWEEP_INTERVAL, ExpirySweeper, SweeperHandle};
