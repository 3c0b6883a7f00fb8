//! # Table Repository
//!
//! Dining-table registry: numbers, floors, capacity, and the
//! percentage coordinates the floor-plan layout tool edits in place.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use comanda_core::validation::validate_position;
use comanda_core::{DiningTable, Floor, TableShape};

/// Input for registering a table.
#[derive(Debug, Clone)]
pub struct NewTable {
    pub number: i64,
    pub floor: Floor,
    pub capacity: i64,
    pub shape: TableShape,
    pub pos_x: i64,
    pub pos_y: i64,
}

/// Repository for dining-table database operations.
#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
}

impl TableRepository {
    /// Creates a new TableRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TableRepository { pool }
    }

    /// Registers a table. The table number must be unique.
    pub async fn create(&self, new: NewTable) -> DbResult<DiningTable> {
        validate_position("pos_x", new.pos_x)?;
        validate_position("pos_y", new.pos_y)?;

        let table = DiningTable {
            id: Uuid::new_v4().to_string(),
            number: new.number,
            floor: new.floor,
            capacity: new.capacity,
            shape: new.shape,
            pos_x: new.pos_x,
            pos_y: new.pos_y,
        };

        debug!(id = %table.id, number = table.number, "Registering table");

        sqlx::query(
            r#"
            INSERT INTO dining_tables (id, number, floor, capacity, shape, pos_x, pos_y)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&table.id)
        .bind(table.number)
        .bind(table.floor)
        .bind(table.capacity)
        .bind(table.shape)
        .bind(table.pos_x)
        .bind(table.pos_y)
        .execute(&self.pool)
        .await?;

        Ok(table)
    }

    /// Gets a table by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DiningTable>> {
        let table = sqlx::query_as::<_, DiningTable>(
            "SELECT id, number, floor, capacity, shape, pos_x, pos_y FROM dining_tables WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(table)
    }

    /// Updates a table in place (floor, capacity, shape, position).
    pub async fn update(&self, table: &DiningTable) -> DbResult<()> {
        validate_position("pos_x", table.pos_x)?;
        validate_position("pos_y", table.pos_y)?;

        let result = sqlx::query(
            r#"
            UPDATE dining_tables SET
                number = ?2, floor = ?3, capacity = ?4,
                shape = ?5, pos_x = ?6, pos_y = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&table.id)
        .bind(table.number)
        .bind(table.floor)
        .bind(table.capacity)
        .bind(table.shape)
        .bind(table.pos_x)
        .bind(table.pos_y)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Table", &table.id));
        }

        Ok(())
    }

    /// Lists all tables, ordered by floor then number.
    pub async fn list(&self) -> DbResult<Vec<DiningTable>> {
        let tables = sqlx::query_as::<_, DiningTable>(
            "SELECT id, number, floor, capacity, shape, pos_x, pos_y FROM dining_tables ORDER BY floor, number",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }

    /// Lists the tables of one floor for the floor-plan map.
    pub async fn list_by_floor(&self, floor: Floor) -> DbResult<Vec<DiningTable>> {
        let tables = sqlx::query_as::<_, DiningTable>(
            "SELECT id, number, floor, capacity, shape, pos_x, pos_y FROM dining_tables WHERE floor = ?1 ORDER BY number",
        )
        .bind(floor)
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn new_table(number: i64, floor: Floor) -> NewTable {
        NewTable {
            number,
            floor,
            capacity: 4,
            shape: TableShape::Square,
            pos_x: 10,
            pos_y: 10,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_by_floor() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tables();

        repo.create(new_table(1, Floor::Ground)).await.unwrap();
        repo.create(new_table(2, Floor::Ground)).await.unwrap();
        repo.create(new_table(10, Floor::Terrace)).await.unwrap();

        let ground = repo.list_by_floor(Floor::Ground).await.unwrap();
        assert_eq!(ground.len(), 2);
        let terrace = repo.list_by_floor(Floor::Terrace).await.unwrap();
        assert_eq!(terrace.len(), 1);
        assert_eq!(terrace[0].number, 10);
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tables();

        repo.create(new_table(1, Floor::Ground)).await.unwrap();
        let err = repo.create(new_table(1, Floor::Terrace)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_position_and_shape() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tables();

        let mut table = repo.create(new_table(3, Floor::Ground)).await.unwrap();
        table.pos_x = 55;
        table.pos_y = 40;
        table.shape = TableShape::Round;
        repo.update(&table).await.unwrap();

        let fetched = repo.get_by_id(&table.id).await.unwrap().unwrap();
        assert_eq!(fetched.pos_x, 55);
        assert_eq!(fetched.shape, TableShape::Round);
    }

    #[tokio::test]
    async fn test_position_out_of_range_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tables();

        let mut bad = new_table(4, Floor::Ground);
        bad.pos_x = 95;
        assert!(repo.create(bad).await.is_err());
    }
}
