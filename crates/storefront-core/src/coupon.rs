//! # Coupon Evaluator
//!
//! A standalone discount-rule evaluator. Given its own fields and an
//! amount, a coupon answers two questions with no side effects:
//!
//! 1. `is_valid(now)` - can this coupon be used at all right now?
//! 2. `calculate_discount(amount)` - how much does it take off?
//!
//! Incrementing `used_count` is the caller's responsibility; the
//! repository does it as a single conditional increment so two checkouts
//! cannot over-redeem a coupon near its usage limit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Discount Type
// =============================================================================

/// How the discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is basis points of the order amount (1000 = 10%).
    Percentage,
    /// `discount_value` is a fixed amount in minor units.
    Fixed,
}

// =============================================================================
// Coupon
// =============================================================================

/// A discount coupon.
///
/// ## Validity Invariant
/// A coupon is valid iff it is active, `now` lies within
/// `[valid_from, valid_until]`, and the usage limit (if any) is not
/// exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: String,
    /// Unique redemption code.
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage coupons, minor units for fixed ones.
    pub discount_value: i64,
    /// Orders below this amount get no discount.
    pub minimum_amount_minor: i64,
    /// Optional cap on the computed discount, in minor units.
    pub maximum_discount_minor: Option<i64>,
    /// Optional total redemption limit.
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Checks whether the coupon can be used at `now`.
    ///
    /// Pure function of the active flag, validity window and usage count.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && now <= self.valid_until
            && self
                .usage_limit
                .map_or(true, |limit| self.used_count < limit)
    }

    /// Computes the discount this coupon grants on `amount`.
    ///
    /// ## Rules
    /// - invalid coupon, or amount below the minimum ⇒ zero
    /// - percentage ⇒ `amount × value / 10000` (half-up rounding)
    /// - fixed ⇒ the configured value
    /// - result is capped at `maximum_discount` if set, and never
    ///   exceeds `amount` - the discount is always in `[0, amount]`
    pub fn calculate_discount(&self, amount: Money, now: DateTime<Utc>) -> Money {
        if !self.is_valid(now) || amount < Money::from_minor(self.minimum_amount_minor) {
            return Money::zero();
        }

        let base = match self.discount_type {
            // Basis points are clamped to [0, 100%] so a mis-entered
            // value can neither truncate nor exceed the amount.
            DiscountType::Percentage => {
                amount.percentage(self.discount_value.clamp(0, crate::MAX_DISCOUNT_BPS) as u32)
            }
            DiscountType::Fixed => Money::from_minor(self.discount_value),
        };

        let capped = match self.maximum_discount_minor {
            Some(cap) => base.min(Money::from_minor(cap)),
            None => base,
        };

        capped.clamp(Money::zero(), amount)
    }

    /// Whether any redemptions remain.
    pub fn has_remaining_uses(&self) -> bool {
        self.usage_limit.map_or(true, |limit| self.used_count < limit)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount_type: DiscountType, value: i64) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: "c1".to_string(),
            code: "SAVE10".to_string(),
            description: "Test coupon".to_string(),
            discount_type,
            discount_value: value,
            minimum_amount_minor: 0,
            maximum_discount_minor: None,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            created_at: now,
        }
    }

    #[test]
    fn test_percentage_discount() {
        // 10% of 200.00 = 20.00
        let c = coupon(DiscountType::Percentage, 1000);
        let discount = c.calculate_discount(Money::from_minor(20000), Utc::now());
        assert_eq!(discount, Money::from_minor(2000));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_amount() {
        let c = coupon(DiscountType::Fixed, 5000); // 50.00 off
        let discount = c.calculate_discount(Money::from_minor(3000), Utc::now());
        assert_eq!(discount, Money::from_minor(3000)); // clamped to amount
    }

    #[test]
    fn test_minimum_amount_gate() {
        let mut c = coupon(DiscountType::Percentage, 1000);
        c.minimum_amount_minor = 5000; // min 50.00
        assert_eq!(
            c.calculate_discount(Money::from_minor(4999), Utc::now()),
            Money::zero()
        );
        assert_eq!(
            c.calculate_discount(Money::from_minor(5000), Utc::now()),
            Money::from_minor(500)
        );
    }

    #[test]
    fn test_maximum_discount_cap() {
        let mut c = coupon(DiscountType::Percentage, 5000); // 50%
        c.maximum_discount_minor = Some(1000); // cap at 10.00
        let discount = c.calculate_discount(Money::from_minor(20000), Utc::now());
        assert_eq!(discount, Money::from_minor(1000));
    }

    #[test]
    fn test_inactive_coupon_gives_zero() {
        let mut c = coupon(DiscountType::Fixed, 500);
        c.is_active = false;
        assert_eq!(
            c.calculate_discount(Money::from_minor(10000), Utc::now()),
            Money::zero()
        );
    }

    #[test]
    fn test_validity_window() {
        let c = coupon(DiscountType::Fixed, 500);
        let before = c.valid_from - Duration::hours(1);
        let after = c.valid_until + Duration::hours(1);

        assert!(!c.is_valid(before));
        assert!(c.is_valid(Utc::now()));
        assert!(!c.is_valid(after));
    }

    #[test]
    fn test_usage_limit() {
        let mut c = coupon(DiscountType::Fixed, 500);
        c.usage_limit = Some(3);
        c.used_count = 2;
        assert!(c.is_valid(Utc::now()));
        assert!(c.has_remaining_uses());

        c.used_count = 3;
        assert!(!c.is_valid(Utc::now()));
        assert!(!c.has_remaining_uses());
        assert_eq!(
            c.calculate_discount(Money::from_minor(10000), Utc::now()),
            Money::zero()
        );
    }

    #[test]
    fn test_out_of_range_basis_points_clamped() {
        // Above 100% acts as 100%, never truncates.
        let over = coupon(DiscountType::Percentage, 25_000);
        assert_eq!(
            over.calculate_discount(Money::from_minor(10000), Utc::now()),
            Money::from_minor(10000)
        );

        // A value past u32::MAX must not wrap into a small percentage.
        let huge = coupon(DiscountType::Percentage, u32::MAX as i64 + 1000);
        assert_eq!(
            huge.calculate_discount(Money::from_minor(10000), Utc::now()),
            Money::from_minor(10000)
        );

        let negative = coupon(DiscountType::Percentage, -500);
        assert_eq!(
            negative.calculate_discount(Money::from_minor(10000), Utc::now()),
            Money::zero()
        );
    }

    #[test]
    fn test_discount_always_within_amount() {
        // Exhaustive-ish sweep over configurations: result must stay in
        // [0, amount] regardless of type, cap or value.
        let amounts = [0i64, 1, 4999, 5000, 20000];
        let values = [0i64, 500, 1000, 10000, 50000];
        let caps = [None, Some(0i64), Some(100), Some(100000)];

        for &amount in &amounts {
            for &value in &values {
                for &cap in &caps {
                    for dt in [DiscountType::Percentage, DiscountType::Fixed] {
                        let mut c = coupon(dt, value);
                        c.maximum_discount_minor = cap;
                        let d = c.calculate_discount(Money::from_minor(amount), Utc::now());
                        assert!(d >= Money::zero());
                        assert!(d <= Money::from_minor(amount));
                    }
                }
            }
        }
    }
}
