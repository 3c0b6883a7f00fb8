//! # Product Repository
//!
//! Catalog operations: CRUD, category views, name search, low-stock
//! alerts.
//!
//! Stock is edited manually by staff; nothing here decrements it as a
//! side effect of a sale.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use comanda_core::validation::{validate_name, validate_non_negative_amount};
use comanda_core::{Product, ProductCategory};

/// Input for creating a catalog product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: ProductCategory,
    pub price_cents: i64,
    pub stock: i64,
    pub image_path: Option<String>,
    pub description: Option<String>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product.
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        validate_name("name", &new.name)?;
        validate_non_negative_amount("price", new.price_cents)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            category: new.category,
            price_cents: new.price_cents,
            stock: new.stock,
            image_path: new.image_path,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price_cents, stock,
                image_path, description, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.image_path)
        .bind(&product.description)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price_cents, stock,
                   image_path, description, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Updates a product's editable fields (name, category, price,
    /// stock, image, description).
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_name("name", &product.name)?;
        validate_non_negative_amount("price", product.price_cents)?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                category = ?3,
                price_cents = ?4,
                stock = ?5,
                image_path = ?6,
                description = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.image_path)
        .bind(&product.description)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Sets the stock level directly (manual staff edit).
    pub async fn set_stock(&self, id: &str, stock: i64) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists the whole menu, ordered by category then name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price_cents, stock,
                   image_path, description, created_at, updated_at
            FROM products
            ORDER BY category, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists products in one category (direct enum comparison).
    pub async fn list_by_category(&self, category: ProductCategory) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price_cents, stock,
                   image_path, description, created_at, updated_at
            FROM products
            WHERE category = ?1
            ORDER BY name
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Case-insensitive name search.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list().await;
        }

        let pattern = format!("%{}%", query);
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price_cents, stock,
                   image_path, description, created_at, updated_at
            FROM products
            WHERE name LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Number of products in the catalog.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Stock-tracked products (drinks and extras) below the threshold,
    /// lowest stock first. Kitchen dishes never appear here.
    pub async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price_cents, stock,
                   image_path, description, created_at, updated_at
            FROM products
            WHERE category IN ('drink', 'extra')
              AND stock < ?1
            ORDER BY stock
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
