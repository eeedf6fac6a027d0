//! Reward ledger: point grants, point/coupon redemption, referral bonuses.
//!
//! Like the inventory ledger, every mutation is a conditional statement with
//! the `is_used = FALSE` (or status) predicate folded into the `WHERE`
//! clause, so a row can only ever be consumed once. Functions take
//! `&mut PgConnection` and run inside the caller's transaction.

use chrono::{DateTime, Duration, Utc};
use common::{CouponId, Money, TransactionId, UserId};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::Result;

/// Points granted to a referrer when the referred customer completes their
/// first purchase.
pub const REFERRAL_BONUS: Money = Money::from_minor(10_000);

/// Validity window of a referral bonus grant.
pub const REFERRAL_BONUS_VALIDITY_DAYS: i64 = 90;

/// Redeems the customer's entire unused, unexpired point balance and
/// returns the sum. All-or-nothing: partial redemption is not a thing.
///
/// Marking and reading are one statement, so two concurrent redemptions for
/// the same customer cannot both collect the same rows; the second caller
/// matches nothing and gets zero.
pub async fn redeem_points(
    conn: &mut PgConnection,
    customer_id: UserId,
    now: DateTime<Utc>,
) -> Result<Money> {
    let amounts: Vec<i64> = sqlx::query_scalar(
        r#"
        UPDATE user_points
        SET is_used = TRUE
        WHERE user_id = $1 AND is_used = FALSE AND expired_at > $2
        RETURNING amount
        "#,
    )
    .bind(customer_id.as_uuid())
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    Ok(amounts.into_iter().map(Money::from_minor).sum())
}

/// Redeems one coupon owned by the customer and returns its discount
/// percentage, or `None` if the coupon is missing, foreign, expired, or
/// already used.
pub async fn redeem_coupon(
    conn: &mut PgConnection,
    customer_id: UserId,
    coupon_id: CouponId,
    now: DateTime<Utc>,
) -> Result<Option<i32>> {
    let discount: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE user_coupons
        SET is_used = TRUE
        WHERE id = $1 AND user_id = $2 AND is_used = FALSE AND expired_at > $3
        RETURNING discount_val
        "#,
    )
    .bind(coupon_id.as_uuid())
    .bind(customer_id.as_uuid())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(discount)
}

/// Grants the fixed referral bonus to a referrer as a fresh unused point row.
pub async fn grant_referral_bonus(
    conn: &mut PgConnection,
    referrer_id: UserId,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_points (id, user_id, amount, is_used, expired_at)
        VALUES ($1, $2, $3, FALSE, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(referrer_id.as_uuid())
    .bind(REFERRAL_BONUS.minor())
    .bind(now + Duration::days(REFERRAL_BONUS_VALIDITY_DAYS))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returns the customer's referrer, if they registered with a referral code.
pub async fn referred_by(conn: &mut PgConnection, customer_id: UserId) -> Result<Option<UserId>> {
    let referrer: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT referred_by FROM users WHERE id = $1")
            .bind(customer_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

    Ok(referrer.flatten().map(UserId::from_uuid))
}

/// Returns true if the customer already has a `DONE` transaction other than
/// `excluding`. Gates the one-per-lifetime referral payout on approval.
pub async fn has_completed_purchase(
    conn: &mut PgConnection,
    customer_id: UserId,
    excluding: TransactionId,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM transactions
        WHERE customer_id = $1 AND status = 'DONE' AND id <> $2
        "#,
    )
    .bind(customer_id.as_uuid())
    .bind(excluding.as_uuid())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}
