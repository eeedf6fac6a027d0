use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a user (customer or organizer).
    ///
    /// Wraps a UUID to prevent mixing user ids with other UUID-based
    /// identifiers at compile time.
    UserId
}

uuid_id! {
    /// Unique identifier for a ticketed event.
    EventId
}

uuid_id! {
    /// Unique identifier for a transaction (one held seat).
    TransactionId
}

uuid_id! {
    /// Unique identifier for a user-owned discount coupon.
    CouponId
}

/// Money amount represented in integer minor units to avoid floating
/// point issues (e.g., 100_000 = Rp100.000 / $1,000.00 depending on
/// currency convention; the core never converts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a money amount from minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts.
    pub fn add(&self, other: Money) -> Money {
        Money(self.0 + other.0)
    }

    /// Subtracts `other`, clamping at zero. A discount can never push a
    /// price negative.
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Returns `percent` percent of this amount, truncating toward zero.
    pub fn percent(&self, percent: i64) -> Money {
        Money(self.0 * percent / 100)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(EventId::new(), EventId::new());
        assert_ne!(TransactionId::new(), TransactionId::new());
    }

    #[test]
    fn id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = TransactionId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn id_serialization_roundtrip() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn money_saturating_sub_clamps_at_zero() {
        let price = Money::from_minor(50_000);
        let discount = Money::from_minor(80_000);
        assert_eq!(price.saturating_sub(discount), Money::zero());
    }

    #[test]
    fn money_percent_truncates() {
        let price = Money::from_minor(100_000);
        assert_eq!(price.percent(15), Money::from_minor(15_000));
        assert_eq!(Money::from_minor(99).percent(50), Money::from_minor(49));
    }

    #[test]
    fn money_sum() {
        let total: Money = [10_000, 5_000, 2_500]
            .into_iter()
            .map(Money::from_minor)
            .sum();
        assert_eq!(total, Money::from_minor(17_500));
    }
}
