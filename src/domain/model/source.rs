use crate::domain::error::DomainError;
use crate::domain::model::{OrderLine, Sku, SourceRef};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// 在庫ソース集約
/// 手持ち在庫（etaなし）または入荷予定（etaあり）を表し、
/// SKUごとの仕入数量と割当済みの注文明細を管理する
///
/// 不変条件: すべてのSKUについて available_quantity >= 0
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySource {
    reference: SourceRef,
    eta: Option<NaiveDate>,
    purchased: HashMap<Sku, u32>,
    allocations: HashSet<OrderLine>,
}

impl InventorySource {
    /// 新しい在庫ソースを作成
    ///
    /// # Arguments
    /// * `reference` - ソース参照
    /// * `sku` - 仕入対象のSKU
    /// * `quantity` - 仕入数量
    /// * `eta` - 到着予定日（Noneなら手持ち在庫）
    pub fn new(reference: SourceRef, sku: Sku, quantity: u32, eta: Option<NaiveDate>) -> Self {
        let mut purchased = HashMap::new();
        purchased.insert(sku, quantity);
        Self {
            reference,
            eta,
            purchased,
            allocations: HashSet::new(),
        }
    }

    /// 永続化された行から在庫ソースを再構築
    ///
    /// # Arguments
    /// * `reference` - ソース参照
    /// * `eta` - 到着予定日
    /// * `purchased` - SKUごとの仕入数量
    /// * `allocations` - 割当済みの注文明細
    pub fn reconstruct(
        reference: SourceRef,
        eta: Option<NaiveDate>,
        purchased: HashMap<Sku, u32>,
        allocations: HashSet<OrderLine>,
    ) -> Self {
        Self {
            reference,
            eta,
            purchased,
            allocations,
        }
    }

    /// ソース参照を取得
    pub fn reference(&self) -> &SourceRef {
        &self.reference
    }

    /// 到着予定日を取得（Noneなら手持ち在庫）
    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    /// 手持ち在庫かどうか
    pub fn is_on_hand(&self) -> bool {
        self.eta.is_none()
    }

    /// SKUごとの仕入数量を取得
    pub fn stock(&self) -> &HashMap<Sku, u32> {
        &self.purchased
    }

    /// 割当済みの注文明細を取得
    pub fn allocations(&self) -> &HashSet<OrderLine> {
        &self.allocations
    }

    /// このソースが指定SKUを扱っているか
    pub fn carries(&self, sku: &Sku) -> bool {
        self.purchased.contains_key(sku)
    }

    /// 指定SKUの仕入数量を追加する
    /// 既存の参照に在庫を追加登録する場合に使用する
    pub fn add_stock(&mut self, sku: Sku, quantity: u32) {
        *self.purchased.entry(sku).or_insert(0) += quantity;
    }

    /// 指定SKUの仕入数量を取得
    pub fn purchased_quantity(&self, sku: &Sku) -> u32 {
        self.purchased.get(sku).copied().unwrap_or(0)
    }

    /// 指定SKUの割当済み数量を取得
    /// 割当済みの注文明細の数量の合計
    pub fn allocated_quantity(&self, sku: &Sku) -> u32 {
        self.allocations
            .iter()
            .filter(|line| line.sku() == sku)
            .map(|line| line.quantity())
            .sum()
    }

    /// 指定SKUの利用可能数量を取得
    /// 仕入数量から割当済み数量を引いた値
    pub fn available_quantity(&self, sku: &Sku) -> u32 {
        self.purchased_quantity(sku)
            .saturating_sub(self.allocated_quantity(sku))
    }

    /// 注文明細を割当可能かチェック
    /// SKUを扱っており、利用可能数量が要求数量以上であること
    /// （ちょうど等しい場合も割当可能）
    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.carries(line.sku()) && self.available_quantity(line.sku()) >= line.quantity()
    }

    /// 注文明細を割り当てる
    /// 割当不能な場合は何もしない（呼び出し側は事前に can_allocate で
    /// 確認するか、エンジンの結果を参照する）
    /// 同じ明細の再割当はセットの性質により二重計上されない
    pub fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) {
            self.allocations.insert(line);
        }
    }

    /// 注文明細の割当を解除する
    ///
    /// # Returns
    /// * `Ok(())` - 解除成功
    /// * `Err(DomainError::LineNotAllocated)` - 該当する割当が存在しない
    pub fn deallocate(&mut self, line: &OrderLine) -> Result<(), DomainError> {
        if self.allocations.remove(line) {
            Ok(())
        } else {
            Err(DomainError::LineNotAllocated(self.reference.to_string()))
        }
    }

    /// 候補ソースの優先順位を比較する
    /// 手持ち在庫（etaなし）は常にどの入荷予定よりも先、
    /// 入荷予定同士はetaの昇順、同着は参照の昇順で決定的に並ぶ
    pub fn cmp_priority(&self, other: &Self) -> Ordering {
        // Option<NaiveDate> の順序は None < Some
        self.eta
            .cmp(&other.eta)
            .then_with(|| self.reference.cmp(&other.reference))
    }
}
