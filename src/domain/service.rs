// ドメインサービス
// 注文明細と候補ソース群から割当を決定する純粋なアルゴリズム
// I/Oを行わず、探索中は候補ソースを変更しない

use crate::domain::error::DomainError;
use crate::domain::model::{Allocation, AllocationLine, InventorySource, OrderLine, Sku, SourceRef};
use std::collections::HashSet;

/// 複数明細の注文を候補ソース群に割り当てる
///
/// 候補ソースを優先順（手持ち在庫、次にeta昇順）に走査し、
/// 単一のソースで全SKUをカバーできればそれを即座に返す
/// （分割割当より単一ソースの完全割当を優先する）。
/// できなければ未カバーのSKUを順に補完した分割割当を返す。
/// どの組み合わせでも全SKUをカバーできない場合、返される割当の
/// is_complete は false になる
///
/// # Arguments
/// * `requested` - 注文明細の集合
/// * `sources` - 候補ソース群
pub fn allocate_order(requested: &[OrderLine], sources: &[InventorySource]) -> Allocation {
    let requested_skus: HashSet<_> = requested.iter().map(|line| line.sku().clone()).collect();

    let mut ranked: Vec<&InventorySource> = sources.iter().collect();
    ranked.sort_by(|a, b| a.cmp_priority(b));

    let mut split = Allocation::new(requested_skus.clone());
    for source in ranked {
        let candidate = allocation_for_source(requested, &requested_skus, source);
        if candidate.is_complete() {
            return candidate;
        }
        split.supplement_with(candidate);
    }
    split
}

/// 単一のソースだけで満たせる明細の部分集合を求める
fn allocation_for_source(
    requested: &[OrderLine],
    requested_skus: &HashSet<Sku>,
    source: &InventorySource,
) -> Allocation {
    let mut allocation = Allocation::new(requested_skus.clone());
    for line in requested {
        if source.can_allocate(line) {
            allocation.push(AllocationLine::new(
                line.clone(),
                source.reference().clone(),
            ));
        }
    }
    allocation
}

/// 単一明細の簡易形
/// 優先順で最初に割当可能なソースに明細を割り当て、その参照を返す
///
/// # Arguments
/// * `line` - 注文明細
/// * `sources` - 候補ソース群（優先順に並べ替えられる）
///
/// # Returns
/// * `Ok(SourceRef)` - 引き当てたソースの参照
/// * `Err(DomainError::OutOfStock)` - どのソースも数量を満たせない
pub fn allocate_one(
    line: &OrderLine,
    sources: &mut [InventorySource],
) -> Result<SourceRef, DomainError> {
    sources.sort_by(|a, b| a.cmp_priority(b));
    for source in sources.iter_mut() {
        if source.can_allocate(line) {
            source.allocate(line.clone());
            return Ok(source.reference().clone());
        }
    }
    Err(DomainError::OutOfStock(line.sku().to_string()))
}
