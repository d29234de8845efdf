//! # Product Repository
//!
//! Read-model access to the catalog. The catalog is owned externally;
//! carts and orders consume products by reference (id, price, stock),
//! so this repository is deliberately small: lookup, substring search,
//! and the inserts the test and seed paths need.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Product;

/// Repository for catalog read operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets an active product by ID. Inactive products are invisible to
    /// the cart and checkout.
    pub async fn get_active_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, price_minor, stock,
                   track_stock, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Substring search over name, description and SKU.
    ///
    /// This is the storefront's whole search story: a LIKE filter, no
    /// indexing design. Matches are ordered by name.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query);

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, price_minor, stock,
                   track_stock, is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
              AND (name LIKE ?1 OR description LIKE ?1 OR sku LIKE ?1)
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a product. Used by seeding and tests; the catalog is
    /// otherwise maintained elsewhere.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, description, price_minor, stock,
                                  track_stock, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_minor)
        .bind(product.stock)
        .bind(product.track_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates the listed price. Carts holding this product reprice on
    /// their next read; placed orders keep their snapshot.
    pub async fn update_price(&self, id: &str, price_minor: i64) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET price_minor = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price_minor)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
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

    fn test_product(name: &str, price_minor: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            sku: format!("SKU-{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            price_minor,
            stock: 100,
            track_stock: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = test_product("Coffee Grinder", 149900);
        repo.insert(&product).await.unwrap();

        let found = repo.get_active_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Coffee Grinder");
        assert_eq!(found.price_minor, 149900);
    }

    #[tokio::test]
    async fn test_search_matches_name_and_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&test_product("Espresso Machine", 500000))
            .await
            .unwrap();
        repo.insert(&test_product("French Press", 80000))
            .await
            .unwrap();

        let hits = repo.search("espresso", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Espresso Machine");

        let all = repo.search("description", 20).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut a = test_product("One", 100);
        let mut b = test_product("Two", 200);
        a.sku = "SAME".to_string();
        b.sku = "SAME".to_string();

        repo.insert(&a).await.unwrap();
        let err = repo.insert(&b).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = test_product("Kettle", 120000);
        repo.insert(&product).await.unwrap();

        repo.update_price(&product.id, 99900).await.unwrap();
        let found = repo.get_active_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.price_minor, 99900);

        assert!(repo.update_price("ghost", 1).await.is_err());
    }
}
