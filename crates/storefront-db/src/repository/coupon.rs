//! # Coupon Repository
//!
//! Coupon lookup and redemption.
//!
//! ## Conditional Redemption
//! Redeeming must never push `used_count` past `usage_limit`, even when
//! two checkouts race on the last use. The increment is therefore one
//! conditional statement; whoever matches zero rows lost the race:
//!
//! ```text
//! UPDATE coupons SET used_count = used_count + 1
//! WHERE id = ? AND (usage_limit IS NULL OR used_count < usage_limit)
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Coupon;

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Looks a coupon up by its redemption code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, code, description, discount_type, discount_value,
                   minimum_amount_minor, maximum_discount_minor,
                   usage_limit, used_count, is_active,
                   valid_from, valid_until, created_at
            FROM coupons
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Inserts a coupon.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(code = %coupon.code, "Inserting coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, description, discount_type, discount_value,
                                 minimum_amount_minor, maximum_discount_minor,
                                 usage_limit, used_count, is_active,
                                 valid_from, valid_until, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.minimum_amount_minor)
        .bind(coupon.maximum_discount_minor)
        .bind(coupon.usage_limit)
        .bind(coupon.used_count)
        .bind(coupon.is_active)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Redeems one use of the coupon.
    ///
    /// Single conditional increment: succeeds iff uses remain. Returns
    /// `false` when the limit is already exhausted (the caller decides
    /// whether that is a rejected checkout or a stale coupon).
    pub async fn redeem(&self, coupon_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1
            WHERE id = ?1
              AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(coupon_id)
        .execute(&self.pool)
        .await?;

        let redeemed = result.rows_affected() > 0;
        debug!(coupon_id = %coupon_id, redeemed, "Coupon redemption attempt");
        Ok(redeemed)
    }

    /// Releases one use, undoing a redemption whose checkout failed
    /// afterwards. Never drops below zero.
    pub async fn release(&self, coupon_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count - 1 WHERE id = ?1 AND used_count > 0",
        )
        .bind(coupon_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", coupon_id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use storefront_core::DiscountType;
    use uuid::Uuid;

    fn coupon(code: &str, usage_limit: Option<i64>) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            description: "test".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 1000,
            minimum_amount_minor: 5000,
            maximum_discount_minor: None,
            usage_limit,
            used_count: 0,
            is_active: true,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();

        repo.insert(&coupon("SAVE10", None)).await.unwrap();

        let found = repo.get_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(found.discount_type, DiscountType::Percentage);
        assert_eq!(found.discount_value, 1000);
        assert!(repo.get_by_code("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();

        repo.insert(&coupon("ONCE", None)).await.unwrap();
        let err = repo.insert(&coupon("ONCE", None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_redeem_respects_usage_limit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();

        let c = coupon("LIMIT2", Some(2));
        repo.insert(&c).await.unwrap();

        assert!(repo.redeem(&c.id).await.unwrap());
        assert!(repo.redeem(&c.id).await.unwrap());
        // Third redemption must fail: the conditional update matches nothing.
        assert!(!repo.redeem(&c.id).await.unwrap());

        let found = repo.get_by_code("LIMIT2").await.unwrap().unwrap();
        assert_eq!(found.used_count, 2);
    }

    #[tokio::test]
    async fn test_unlimited_coupon_redeems_freely() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();

        let c = coupon("FREE", None);
        repo.insert(&c).await.unwrap();

        for _ in 0..5 {
            assert!(repo.redeem(&c.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_release_undoes_redemption() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();

        let c = coupon("UNDO", Some(1));
        repo.insert(&c).await.unwrap();

        assert!(repo.redeem(&c.id).await.unwrap());
        repo.release(&c.id).await.unwrap();
        // The use is available again.
        assert!(repo.redeem(&c.id).await.unwrap());
    }
}
