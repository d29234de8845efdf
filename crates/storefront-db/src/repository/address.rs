//! # Address Repository
//!
//! Customer addresses with the exclusive default-flag rule.
//!
//! ## Atomic Exclusive Flag
//! "At most one default per (user, kind)" used to be enforced as two
//! separate writes, which lets two concurrent saves leave two defaults.
//! Here the sibling unset and the save happen in one transaction, so
//! exactly one default survives any interleaving.
//!
//! ## Protected Deletion
//! Orders reference addresses with `ON DELETE RESTRICT`; deleting an
//! address an order still points at surfaces as a foreign-key error.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Address, AddressKind};

/// Repository for address database operations.
#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    /// Gets an address by id, scoped to its owner.
    pub async fn get_for_user(&self, id: &str, user_id: &str) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, kind, first_name, last_name, company,
                   address1, address2, city, state, postal_code, country,
                   phone, is_default, created_at, updated_at
            FROM addresses
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    /// Lists a user's addresses, defaults first, newest next.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Address>> {
        let addresses = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, kind, first_name, last_name, company,
                   address1, address2, city, state, postal_code, country,
                   phone, is_default, created_at, updated_at
            FROM addresses
            WHERE user_id = ?1
            ORDER BY is_default DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }

    /// Saves (inserts) an address.
    ///
    /// When `is_default` is set, all sibling defaults of the same
    /// (user, kind) are unset in the same transaction, leaving exactly
    /// one default.
    pub async fn insert(&self, address: &Address) -> DbResult<()> {
        debug!(id = %address.id, user_id = %address.user_id, "Inserting address");

        let mut tx = self.pool.begin().await?;

        if address.is_default {
            sqlx::query(
                "UPDATE addresses SET is_default = 0 WHERE user_id = ?1 AND kind = ?2 AND id != ?3",
            )
            .bind(&address.user_id)
            .bind(address.kind)
            .bind(&address.id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, kind, first_name, last_name, company,
                                   address1, address2, city, state, postal_code, country,
                                   phone, is_default, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(address.kind)
        .bind(&address.first_name)
        .bind(&address.last_name)
        .bind(&address.company)
        .bind(&address.address1)
        .bind(&address.address2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(&address.phone)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Marks an existing address as the default for its (user, kind),
    /// unsetting all siblings in the same transaction.
    pub async fn set_default(&self, id: &str, user_id: &str, kind: AddressKind) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE addresses SET is_default = 0 WHERE user_id = ?1 AND kind = ?2")
            .bind(user_id)
            .bind(kind)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE addresses SET is_default = 1, updated_at = ?4
            WHERE id = ?1 AND user_id = ?2 AND kind = ?3
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(kind)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Rolls back the sibling unset too.
            return Err(DbError::not_found("Address", id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes an address. Fails with a foreign-key violation while any
    /// order still references it.
    pub async fn delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", id));
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
    use uuid::Uuid;

    fn address(user_id: &str, kind: AddressKind, is_default: bool) -> Address {
        let now = Utc::now();
        Address {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            first_name: "Olena".to_string(),
            last_name: "Kovalenko".to_string(),
            company: None,
            address1: "вул. Хрещатик, 1".to_string(),
            address2: None,
            city: "Київ".to_string(),
            state: None,
            postal_code: "01001".to_string(),
            country: "Україна".to_string(),
            phone: Some("+380501234567".to_string()),
            is_default,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_default_unsets_siblings() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.addresses();

        let first = address("u1", AddressKind::Shipping, true);
        let second = address("u1", AddressKind::Shipping, true);
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let all = repo.list_for_user("u1").await.unwrap();
        let defaults: Vec<_> = all.iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);
    }

    #[tokio::test]
    async fn test_default_scoped_per_kind() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.addresses();

        let shipping = address("u1", AddressKind::Shipping, true);
        let billing = address("u1", AddressKind::Billing, true);
        repo.insert(&shipping).await.unwrap();
        repo.insert(&billing).await.unwrap();

        // One default per kind may coexist.
        let all = repo.list_for_user("u1").await.unwrap();
        assert_eq!(all.iter().filter(|a| a.is_default).count(), 2);
    }

    #[tokio::test]
    async fn test_set_default_moves_flag() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.addresses();

        let a = address("u1", AddressKind::Shipping, true);
        let b = address("u1", AddressKind::Shipping, false);
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();

        repo.set_default(&b.id, "u1", AddressKind::Shipping)
            .await
            .unwrap();

        let all = repo.list_for_user("u1").await.unwrap();
        let defaults: Vec<_> = all.iter().filter(|x| x.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, b.id);
    }

    #[tokio::test]
    async fn test_set_default_unknown_address_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.addresses();

        let a = address("u1", AddressKind::Shipping, true);
        repo.insert(&a).await.unwrap();

        let err = repo
            .set_default("ghost", "u1", AddressKind::Shipping)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // The existing default must have survived the rollback.
        let all = repo.list_for_user("u1").await.unwrap();
        assert!(all[0].is_default);
    }

    #[tokio::test]
    async fn test_ownership_scoping() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.addresses();

        let a = address("u1", AddressKind::Shipping, false);
        repo.insert(&a).await.unwrap();

        assert!(repo.get_for_user(&a.id, "u2").await.unwrap().is_none());
        assert!(repo.delete(&a.id, "u2").await.is_err());
    }
}
