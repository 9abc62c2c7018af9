use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        // マイグレーションファイルのリスト
        let migrations = vec![
            include_str!("../../migrations/001_create_inventory_sources_table.sql"),
            include_str!("../../migrations/002_create_source_stock_table.sql"),
            include_str!("../../migrations/003_create_allocated_lines_table.sql"),
        ];

        // 各マイグレーションを順番に実行
        for (index, migration_sql) in migrations.iter().enumerate() {
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DatabaseError::MigrationError(format!("Migration {} failed: {}", index + 1, e))
                })?;
        }

        Ok(())
    }
}
