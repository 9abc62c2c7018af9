use crate::domain::model::{InventorySource, OrderLine, Sku, SourceRef};
use std::collections::{HashMap, HashSet};

/// 割当明細
/// 注文明細とそれを引き当てたソースの対応を記録する値オブジェクト
/// 割当エンジンのみが生成する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationLine {
    line: OrderLine,
    source: SourceRef,
}

impl AllocationLine {
    pub(crate) fn new(line: OrderLine, source: SourceRef) -> Self {
        Self { line, source }
    }

    /// SKUを取得
    pub fn sku(&self) -> &Sku {
        self.line.sku()
    }

    /// 数量を取得
    pub fn quantity(&self) -> u32 {
        self.line.quantity()
    }

    /// 元の注文明細を取得
    pub fn order_line(&self) -> &OrderLine {
        &self.line
    }

    /// 引当元のソース参照を取得
    pub fn source(&self) -> &SourceRef {
        &self.source
    }
}

/// 1回の割当要求に対する結果
/// カバーされたSKUの集合が要求されたSKUの集合と一致すれば完全割当
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    requested_skus: HashSet<Sku>,
    lines: Vec<AllocationLine>,
}

impl Allocation {
    pub(crate) fn new(requested_skus: HashSet<Sku>) -> Self {
        Self {
            requested_skus,
            lines: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, line: AllocationLine) {
        self.lines.push(line);
    }

    /// 割当明細を取得
    pub fn lines(&self) -> &[AllocationLine] {
        &self.lines
    }

    /// 要求されたSKUの集合を取得
    pub fn requested_skus(&self) -> &HashSet<Sku> {
        &self.requested_skus
    }

    /// カバーされたSKUの集合を取得
    pub fn skus(&self) -> HashSet<Sku> {
        self.lines.iter().map(|line| line.sku().clone()).collect()
    }

    /// SKUごとの引当元ソースを取得
    pub fn sources(&self) -> HashMap<Sku, SourceRef> {
        self.lines
            .iter()
            .map(|line| (line.sku().clone(), line.source().clone()))
            .collect()
    }

    /// 完全割当かどうか
    /// カバーされたSKUの集合が要求されたSKUの集合と一致すること
    pub fn is_complete(&self) -> bool {
        self.skus() == self.requested_skus
    }

    fn covers(&self, sku: &Sku) -> bool {
        self.lines.iter().any(|line| line.sku() == sku)
    }

    /// 別の割当で未カバーのSKUを補完する
    /// 既にカバー済みのSKUは上書きしない（先に見つかった
    /// 優先度の高いソースが勝つ）
    pub(crate) fn supplement_with(&mut self, other: Allocation) {
        for line in other.lines {
            if !self.covers(line.sku()) {
                self.lines.push(line);
            }
        }
    }

    /// 割当を確定する
    /// 各割当明細について引当元ソースの allocate を呼び出す
    /// 探索が完了した後にのみ呼び出すこと（探索自体はソースを変更しない）
    pub fn apply(&self, sources: &mut [InventorySource]) {
        for allocation_line in &self.lines {
            if let Some(source) = sources
                .iter_mut()
                .find(|s| s.reference() == allocation_line.source())
            {
                source.allocate(allocation_line.order_line().clone());
            }
        }
    }
}
