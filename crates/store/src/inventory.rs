//! Inventory ledger: the authoritative seat count per event.
//!
//! Both operations are single conditional statements with affected-row
//! feedback, never read-then-write, so the race window between checking and
//! mutating `available_seats` does not exist. They take `&mut PgConnection`
//! and run inside the caller's transaction alongside the status change they
//! belong to.

use common::{EventId, Money};
use sqlx::PgConnection;

use crate::Result;

/// Atomically takes one seat from the event if any remains.
///
/// Returns the event's price when a seat was taken, `None` when the event
/// was sold out (or does not exist). The price rides along in `RETURNING`
/// so checkout pricing reads the same row version the guard saw.
pub async fn reserve(conn: &mut PgConnection, event_id: EventId) -> Result<Option<Money>> {
    let price: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE events
        SET available_seats = available_seats - 1
        WHERE id = $1 AND available_seats > 0
        RETURNING price
        "#,
    )
    .bind(event_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(price.map(Money::from_minor))
}

/// Atomically returns one seat to the event, capped at `total_seats`.
///
/// The cap never binds when transitions are well-formed; it protects the
/// `available_seats <= total_seats` invariant against a double-release bug.
pub async fn release(conn: &mut PgConnection, event_id: EventId) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE events
        SET available_seats = LEAST(total_seats, available_seats + 1)
        WHERE id = $1
        "#,
    )
    .bind(event_id.as_uuid())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
