use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{InventorySource, OrderId, OrderLine, Sku, SourceRef};
use crate::domain::port::{RepositoryError, SourceRepository, TransactionScope, UnitOfWork};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

// MySQL関連のインポート
use sqlx::{MySql, Pool, Row, Transaction};

/// MySQL作業単位
/// 接続プールからトランザクションを開き、束縛されたスコープを返す
pub struct MySqlUnitOfWork {
    pool: Pool<MySql>,
}

impl MySqlUnitOfWork {
    /// 新しいMySQL作業単位を作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for MySqlUnitOfWork {
    type Scope = MySqlTransaction;

    async fn begin(&self) -> Result<MySqlTransaction, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| {
                DatabaseError::ConnectionError(format!("トランザクション開始に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        Ok(MySqlTransaction {
            tx,
            read_versions: HashMap::new(),
        })
    }
}

/// MySQLトランザクションスコープ
/// すべてのクエリは束縛されたトランザクション上で実行される
/// commit せずにドロップされた場合、sqlxのトランザクションは
/// 自動的にロールバックされる
///
/// 楽観ロック: 読み取った行のバージョンを記録し、更新時に
/// `WHERE version = ?` で照合する。読み取りコミット分離で十分
pub struct MySqlTransaction {
    tx: Transaction<'static, MySql>,
    read_versions: HashMap<SourceRef, u64>,
}

impl MySqlTransaction {
    /// 取得済みの行データから在庫ソース集約を再構築する
    fn assemble_source(
        reference_str: &str,
        eta: Option<NaiveDate>,
        stock_rows: &[(String, u32)],
        line_rows: &[(String, String, u32)],
    ) -> Result<InventorySource, RepositoryError> {
        let reference = SourceRef::new(reference_str).map_err(|e| {
            RepositoryError::FetchFailed(format!("ソース参照の解析に失敗しました: {}", e))
        })?;

        let mut purchased = HashMap::new();
        for (sku_str, quantity) in stock_rows {
            let sku = Sku::new(sku_str.clone()).map_err(|e| {
                RepositoryError::FetchFailed(format!("SKUの解析に失敗しました: {}", e))
            })?;
            purchased.insert(sku, *quantity);
        }

        let mut allocations = HashSet::new();
        for (order_id_str, sku_str, quantity) in line_rows {
            let order_id = OrderId::new(order_id_str.clone()).map_err(|e| {
                RepositoryError::FetchFailed(format!("注文IDの解析に失敗しました: {}", e))
            })?;
            let sku = Sku::new(sku_str.clone()).map_err(|e| {
                RepositoryError::FetchFailed(format!("SKUの解析に失敗しました: {}", e))
            })?;
            let line = OrderLine::new(order_id, sku, *quantity).map_err(|e| {
                RepositoryError::FetchFailed(format!("注文明細の構築に失敗しました: {}", e))
            })?;
            allocations.insert(line);
        }

        Ok(InventorySource::reconstruct(
            reference,
            eta,
            purchased,
            allocations,
        ))
    }
}

#[async_trait]
impl SourceRepository for MySqlTransaction {
    async fn save(&mut self, source: &InventorySource) -> Result<(), RepositoryError> {
        let reference = source.reference().to_string();

        match self.read_versions.get(source.reference()).copied() {
            Some(version) => {
                // 既知の行はバージョンを照合して更新する
                let result = sqlx::query(
                    r#"
                    UPDATE inventory_sources
                    SET eta = ?, version = version + 1
                    WHERE reference = ? AND version = ?
                    "#,
                )
                .bind(source.eta())
                .bind(&reference)
                .bind(version)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    DatabaseError::QueryError(format!("在庫ソースの更新に失敗しました: {}", e))
                })
                .map_err(RepositoryError::from)?;

                if result.rows_affected() == 0 {
                    return Err(RepositoryError::Conflict(format!(
                        "在庫ソース {} は他のトランザクションに更新されました",
                        reference
                    )));
                }
                self.read_versions
                    .insert(source.reference().clone(), version + 1);
            }
            None => {
                sqlx::query(
                    "INSERT INTO inventory_sources (reference, eta, version) VALUES (?, ?, 0)",
                )
                .bind(&reference)
                .bind(source.eta())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    let unique_violation = e
                        .as_database_error()
                        .map(|db| db.is_unique_violation())
                        .unwrap_or(false);
                    if unique_violation {
                        RepositoryError::Conflict(format!(
                            "在庫ソース {} は既に登録されています",
                            reference
                        ))
                    } else {
                        RepositoryError::from(DatabaseError::QueryError(format!(
                            "在庫ソースの保存に失敗しました: {}",
                            e
                        )))
                    }
                })?;
                self.read_versions.insert(source.reference().clone(), 0);
            }
        }

        // 子行は削除して入れ直す
        sqlx::query("DELETE FROM source_stock WHERE source_reference = ?")
            .bind(&reference)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("仕入行の削除に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        for (sku, quantity) in source.stock() {
            sqlx::query(
                r#"
                INSERT INTO source_stock (source_reference, sku, purchased_quantity)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&reference)
            .bind(sku.as_str())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("仕入行の保存に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;
        }

        sqlx::query("DELETE FROM allocated_lines WHERE source_reference = ?")
            .bind(&reference)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("割当行の削除に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        for line in source.allocations() {
            sqlx::query(
                r#"
                INSERT INTO allocated_lines (source_reference, order_id, sku, quantity)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&reference)
            .bind(line.order_id().as_str())
            .bind(line.sku().as_str())
            .bind(line.quantity())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("割当行の保存に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;
        }

        Ok(())
    }

    async fn get(&mut self, reference: &SourceRef) -> Result<InventorySource, RepositoryError> {
        let row = sqlx::query(
            "SELECT reference, eta, version FROM inventory_sources WHERE reference = ?",
        )
        .bind(reference.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("在庫ソースの取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        let row = row.ok_or_else(|| {
            RepositoryError::NotFound(format!("在庫ソースが見つかりません: {}", reference))
        })?;

        let stock_rows: Vec<(String, u32)> = sqlx::query(
            "SELECT sku, purchased_quantity FROM source_stock WHERE source_reference = ?",
        )
        .bind(reference.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("仕入行の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?
        .iter()
        .map(|r| (r.get("sku"), r.get("purchased_quantity")))
        .collect();

        let line_rows: Vec<(String, String, u32)> = sqlx::query(
            "SELECT order_id, sku, quantity FROM allocated_lines WHERE source_reference = ?",
        )
        .bind(reference.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("割当行の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?
        .iter()
        .map(|r| (r.get("order_id"), r.get("sku"), r.get("quantity")))
        .collect();

        let source = Self::assemble_source(
            row.get("reference"),
            row.get::<Option<NaiveDate>, _>("eta"),
            &stock_rows,
            &line_rows,
        )?;
        self.read_versions
            .insert(source.reference().clone(), row.get::<u64, _>("version"));
        Ok(source)
    }

    async fn list(&mut self) -> Result<Vec<InventorySource>, RepositoryError> {
        let source_rows =
            sqlx::query("SELECT reference, eta, version FROM inventory_sources")
                .fetch_all(&mut *self.tx)
                .await
                .map_err(|e| {
                    DatabaseError::QueryError(format!("在庫ソース一覧の取得に失敗しました: {}", e))
                })
                .map_err(RepositoryError::from)?;

        let stock_rows = sqlx::query(
            "SELECT source_reference, sku, purchased_quantity FROM source_stock",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("仕入行の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        let line_rows = sqlx::query(
            "SELECT source_reference, order_id, sku, quantity FROM allocated_lines",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("割当行の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        // 参照ごとに子行をグループ化してから集約を再構築する
        let mut stock_by_reference: HashMap<String, Vec<(String, u32)>> = HashMap::new();
        for row in &stock_rows {
            stock_by_reference
                .entry(row.get("source_reference"))
                .or_default()
                .push((row.get("sku"), row.get("purchased_quantity")));
        }

        let mut lines_by_reference: HashMap<String, Vec<(String, String, u32)>> = HashMap::new();
        for row in &line_rows {
            lines_by_reference
                .entry(row.get("source_reference"))
                .or_default()
                .push((row.get("order_id"), row.get("sku"), row.get("quantity")));
        }

        let mut sources = Vec::new();
        for row in source_rows {
            let reference_str: String = row.get("reference");
            let source = Self::assemble_source(
                &reference_str,
                row.get::<Option<NaiveDate>, _>("eta"),
                stock_by_reference
                    .get(&reference_str)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
                lines_by_reference
                    .get(&reference_str)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
            )?;
            self.read_versions
                .insert(source.reference().clone(), row.get::<u64, _>("version"));
            sources.push(source);
        }

        Ok(sources)
    }
}

#[async_trait]
impl TransactionScope for MySqlTransaction {
    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx
            .commit()
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!(
                    "トランザクションのコミットに失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!(
                    "トランザクションのロールバックに失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)
    }
}
