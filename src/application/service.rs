use crate::application::ApplicationError;
use crate::domain::model::{Allocation, InventorySource, OrderId, OrderLine, Sku, SourceRef};
use crate::domain::port::{Logger, RepositoryError, SourceRepository, TransactionScope, UnitOfWork};
use crate::domain::service;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// 割当アプリケーションサービス
/// 1メソッドが1ユースケースを編成する: 作業単位のスコープを開き、
/// リポジトリ経由でデータを読み込み、エンジンを呼び出し、コミットする
/// スコープは各操作で唯一のトランザクション境界であり、
/// commit 前にエラーで抜けた場合は自動ロールバックされる
pub struct AllocationService<U>
where
    U: UnitOfWork,
{
    uow: U,
    logger: Arc<dyn Logger>,
}

/// SKUがいずれかのソースで扱われているかチェック
fn is_valid_sku(sku: &Sku, sources: &[InventorySource]) -> bool {
    sources.iter().any(|source| source.carries(sku))
}

impl<U> AllocationService<U>
where
    U: UnitOfWork,
{
    /// 新しい割当サービスを作成
    ///
    /// # Arguments
    /// * `uow` - 作業単位
    /// * `logger` - ロガー
    pub fn new(uow: U, logger: Arc<dyn Logger>) -> Self {
        Self { uow, logger }
    }

    /// 在庫を登録する
    /// 同じ参照のソースが既にあればそのソースに数量を追加し、
    /// なければ新しいソースを作成する
    ///
    /// # Arguments
    /// * `reference` - ソース参照
    /// * `sku` - SKU
    /// * `quantity` - 仕入数量
    /// * `eta` - 到着予定日（Noneなら手持ち在庫）
    ///
    /// # Returns
    /// * `Ok(())` - 登録成功
    /// * `Err(ApplicationError)` - 登録失敗（コミット失敗経路のみ）
    pub async fn add_inventory(
        &self,
        reference: SourceRef,
        sku: Sku,
        quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Result<(), ApplicationError> {
        let correlation_id = Uuid::new_v4();
        let mut scope = self.uow.begin().await?;

        let source = match scope.get(&reference).await {
            Ok(mut existing) => {
                existing.add_stock(sku.clone(), quantity);
                existing
            }
            Err(RepositoryError::NotFound(_)) => {
                InventorySource::new(reference.clone(), sku.clone(), quantity, eta)
            }
            Err(err) => return Err(err.into()),
        };

        scope.save(&source).await?;
        scope.commit().await?;

        self.logger.info(
            "AllocationService",
            &format!("在庫を登録しました: {} {} x{}", reference, sku, quantity),
            Some(correlation_id),
            None,
        );
        Ok(())
    }

    /// 単一の注文明細を割り当てる
    /// 優先順（手持ち在庫、次にeta昇順）で最初に割当可能なソースに
    /// 引き当て、その参照を返す
    ///
    /// # Arguments
    /// * `order_id` - 注文ID
    /// * `sku` - SKU
    /// * `quantity` - 数量
    ///
    /// # Returns
    /// * `Ok(SourceRef)` - 引き当てたソースの参照
    /// * `Err(ApplicationError::InvalidSku)` - どのソースも扱っていないSKU
    /// * `Err(ApplicationError::DomainError(OutOfStock))` - 数量を満たせない
    pub async fn allocate(
        &self,
        order_id: OrderId,
        sku: Sku,
        quantity: u32,
    ) -> Result<SourceRef, ApplicationError> {
        let correlation_id = Uuid::new_v4();
        let line = OrderLine::new(order_id, sku, quantity)?;

        let mut scope = self.uow.begin().await?;
        let mut sources = scope.list().await?;

        // SKUの検証はエンジンではなくサービス層の責務
        // ここで抜けるとスコープが破棄され自動ロールバックされる
        if !is_valid_sku(line.sku(), &sources) {
            return Err(ApplicationError::InvalidSku(line.sku().to_string()));
        }

        let chosen = service::allocate_one(&line, &mut sources)?;
        let allocated = sources
            .iter()
            .find(|source| source.reference() == &chosen)
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("在庫ソースが見つかりません: {}", chosen))
            })?;
        scope.save(allocated).await?;
        scope.commit().await?;

        let mut context = HashMap::new();
        context.insert("order_id".to_string(), line.order_id().to_string());
        self.logger.info(
            "AllocationService",
            &format!("注文明細を割り当てました: {} x{} -> {}", line.sku(), quantity, chosen),
            Some(correlation_id),
            Some(context),
        );
        Ok(chosen)
    }

    /// 複数明細の注文をまとめて割り当てる
    /// 単一ソースの完全割当を優先し、なければ分割割当を確定する
    /// どの組み合わせでも全SKUをカバーできない場合、確定された割当の
    /// is_complete は false になる（呼び出し側が判定する）
    ///
    /// # Arguments
    /// * `lines` - 注文明細の集合
    ///
    /// # Returns
    /// * `Ok(Allocation)` - 確定された割当
    /// * `Err(ApplicationError::InvalidSku)` - どのソースも扱っていないSKUを含む
    pub async fn allocate_order(
        &self,
        lines: Vec<OrderLine>,
    ) -> Result<Allocation, ApplicationError> {
        let correlation_id = Uuid::new_v4();
        let mut scope = self.uow.begin().await?;
        let mut sources = scope.list().await?;

        for line in &lines {
            if !is_valid_sku(line.sku(), &sources) {
                return Err(ApplicationError::InvalidSku(line.sku().to_string()));
            }
        }

        // 探索は読み取り専用。確定（apply）は探索完了後にのみ行う
        let allocation = service::allocate_order(&lines, &sources);
        allocation.apply(&mut sources);

        // 割当が参照したソースだけを書き戻す
        let touched: HashSet<&SourceRef> =
            allocation.lines().iter().map(|l| l.source()).collect();
        for source in sources
            .iter()
            .filter(|source| touched.contains(source.reference()))
        {
            scope.save(source).await?;
        }
        scope.commit().await?;

        if allocation.is_complete() {
            self.logger.info(
                "AllocationService",
                &format!("注文を割り当てました: {}件の明細", allocation.lines().len()),
                Some(correlation_id),
                None,
            );
        } else {
            self.logger.warn(
                "AllocationService",
                "一部のSKUを割り当てできませんでした",
                Some(correlation_id),
                None,
            );
        }
        Ok(allocation)
    }

    /// 注文明細の割当を解除する
    ///
    /// # Arguments
    /// * `order_id` - 注文ID
    /// * `sku` - SKU
    /// * `quantity` - 数量
    /// * `reference` - 割当先のソース参照
    ///
    /// # Returns
    /// * `Ok(())` - 解除成功
    /// * `Err(ApplicationError::RepositoryError(NotFound))` - 参照が存在しない
    /// * `Err(ApplicationError::DomainError(LineNotAllocated))` - 該当する割当がない
    pub async fn deallocate(
        &self,
        order_id: OrderId,
        sku: Sku,
        quantity: u32,
        reference: SourceRef,
    ) -> Result<(), ApplicationError> {
        let correlation_id = Uuid::new_v4();
        let line = OrderLine::new(order_id, sku, quantity)?;

        let mut scope = self.uow.begin().await?;
        let mut source = scope.get(&reference).await?;
        source.deallocate(&line)?;
        scope.save(&source).await?;
        scope.commit().await?;

        self.logger.info(
            "AllocationService",
            &format!("割当を解除しました: {} x{} <- {}", line.sku(), quantity, reference),
            Some(correlation_id),
            None,
        );
        Ok(())
    }
}
