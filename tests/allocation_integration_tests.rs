// サービス層と作業単位を組み合わせた統合テスト
// インメモリ作業単位を永続ストアの代役として使用する
// （MySQL実装は同じ契約テストを #[ignore] 付きで実行できる）

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use warehouse_allocation::adapter::driven::{
    ConsoleLogger, InMemorySourceStore, InMemoryUnitOfWork, MySqlUnitOfWork,
};
use warehouse_allocation::adapter::{DatabaseConfig, DatabaseMigration};
use warehouse_allocation::application::service::AllocationService;
use warehouse_allocation::application::ApplicationError;
use warehouse_allocation::domain::error::DomainError;
use warehouse_allocation::domain::model::{InventorySource, OrderId, OrderLine, Sku, SourceRef};
use warehouse_allocation::domain::port::{
    Logger, RepositoryError, SourceRepository, TransactionScope, UnitOfWork,
};

fn sku(value: &str) -> Sku {
    Sku::new(value).unwrap()
}

fn sref(value: &str) -> SourceRef {
    SourceRef::new(value).unwrap()
}

fn oid(value: &str) -> OrderId {
    OrderId::new(value).unwrap()
}

fn line(order_id: &str, sku_value: &str, quantity: u32) -> OrderLine {
    OrderLine::new(oid(order_id), sku(sku_value), quantity).unwrap()
}

fn on_hand(reference: &str, sku_value: &str, quantity: u32) -> InventorySource {
    InventorySource::new(sref(reference), sku(sku_value), quantity, None)
}

fn shipment(reference: &str, sku_value: &str, quantity: u32, eta_day: u32) -> InventorySource {
    InventorySource::new(
        sref(reference),
        sku(sku_value),
        quantity,
        Some(day(eta_day)),
    )
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn make_service() -> (AllocationService<InMemoryUnitOfWork>, InMemorySourceStore) {
    let store = InMemorySourceStore::new();
    let service = AllocationService::new(
        InMemoryUnitOfWork::with_store(store.clone()),
        Arc::new(ConsoleLogger::new()),
    );
    (service, store)
}

async fn available(store: &InMemorySourceStore, reference: &str, sku_value: &str) -> u32 {
    let uow = InMemoryUnitOfWork::with_store(store.clone());
    let mut scope = uow.begin().await.unwrap();
    let source = scope.get(&sref(reference)).await.unwrap();
    source.available_quantity(&sku(sku_value))
}

// ---- サービス層のユースケース ----

#[tokio::test]
async fn test_allocation_end_to_end() {
    let (service, store) = make_service();
    service
        .add_inventory(sref("warehouse"), sku("SMALL-TABLE"), 20, None)
        .await
        .unwrap();
    service
        .add_inventory(sref("shipment-a"), sku("SMALL-TABLE"), 15, Some(day(1)))
        .await
        .unwrap();

    // 手持ち在庫で満たせる限り入荷予定は選ばれない
    let first = service
        .allocate(oid("o1"), sku("SMALL-TABLE"), 10)
        .await
        .unwrap();
    assert_eq!(first, sref("warehouse"));

    // 残り10では足りないため、次は入荷予定に割り当てられる
    let second = service
        .allocate(oid("o2"), sku("SMALL-TABLE"), 15)
        .await
        .unwrap();
    assert_eq!(second, sref("shipment-a"));

    // 解除で元の数量に戻る
    service
        .deallocate(oid("o1"), sku("SMALL-TABLE"), 10, first)
        .await
        .unwrap();
    assert_eq!(available(&store, "warehouse", "SMALL-TABLE").await, 20);
    assert_eq!(available(&store, "shipment-a", "SMALL-TABLE").await, 0);
}

#[tokio::test]
async fn test_prefers_earliest_shipment_when_stock_cannot_satisfy() {
    let (service, _store) = make_service();
    service
        .add_inventory(sref("shipment-b"), sku("MINIMALIST-SPOON"), 100, Some(day(10)))
        .await
        .unwrap();
    service
        .add_inventory(sref("shipment-a"), sku("MINIMALIST-SPOON"), 5, Some(day(1)))
        .await
        .unwrap();

    let chosen = service
        .allocate(oid("o1"), sku("MINIMALIST-SPOON"), 5)
        .await
        .unwrap();
    assert_eq!(chosen, sref("shipment-a"));
}

#[tokio::test]
async fn test_split_allocation_covers_all_skus() {
    let (service, _store) = make_service();
    service
        .add_inventory(sref("warehouse"), sku("TABLE"), 10, None)
        .await
        .unwrap();
    service
        .add_inventory(sref("shipment-a"), sku("CHAIR"), 10, Some(day(3)))
        .await
        .unwrap();

    let allocation = service
        .allocate_order(vec![line("o1", "TABLE", 2), line("o1", "CHAIR", 4)])
        .await
        .unwrap();

    assert!(allocation.is_complete());
    let chosen = allocation.sources();
    assert_eq!(chosen.get(&sku("TABLE")), Some(&sref("warehouse")));
    assert_eq!(chosen.get(&sku("CHAIR")), Some(&sref("shipment-a")));
}

#[tokio::test]
async fn test_out_of_stock_when_no_source_can_satisfy() {
    let (service, store) = make_service();
    service
        .add_inventory(sref("warehouse"), sku("CLOCK"), 10, None)
        .await
        .unwrap();

    let result = service.allocate(oid("o1"), sku("CLOCK"), 50).await;
    assert_eq!(
        result.unwrap_err(),
        ApplicationError::DomainError(DomainError::OutOfStock("CLOCK".to_string()))
    );
    // 失敗したユースケースは永続状態を変えない
    assert_eq!(available(&store, "warehouse", "CLOCK").await, 10);
}

#[tokio::test]
async fn test_invalid_sku_is_rejected_before_search() {
    let (service, _store) = make_service();
    service
        .add_inventory(sref("warehouse"), sku("AREALSKU"), 100, None)
        .await
        .unwrap();

    let result = service.allocate(oid("o1"), sku("NONEXISTENTSKU"), 10).await;
    assert_eq!(
        result.unwrap_err(),
        ApplicationError::InvalidSku("NONEXISTENTSKU".to_string())
    );
}

#[tokio::test]
async fn test_deallocate_line_never_allocated_fails() {
    let (service, _store) = make_service();
    service
        .add_inventory(sref("b1"), sku("RED-LAMP"), 100, None)
        .await
        .unwrap();

    let result = service
        .deallocate(oid("o1"), sku("RED-LAMP"), 10, sref("b1"))
        .await;
    assert_eq!(
        result.unwrap_err(),
        ApplicationError::DomainError(DomainError::LineNotAllocated("b1".to_string()))
    );
}

#[tokio::test]
async fn test_add_inventory_commits_before_returning() {
    let (service, store) = make_service();
    service
        .add_inventory(sref("b1"), sku("CLOCK"), 10, None)
        .await
        .unwrap();

    // 別の作業単位から登録済みの在庫が見える
    let uow = InMemoryUnitOfWork::with_store(store);
    let mut scope = uow.begin().await.unwrap();
    assert_eq!(scope.list().await.unwrap().len(), 1);
}

// ---- 作業単位の原子性と競合 ----

#[tokio::test]
async fn test_uncommitted_changes_are_invisible_to_fresh_scope() {
    let store = InMemorySourceStore::new();
    let uow = InMemoryUnitOfWork::with_store(store.clone());

    {
        let mut scope = uow.begin().await.unwrap();
        scope.save(&on_hand("b1", "CLOCK", 10)).await.unwrap();
        // commit 前にエラーで抜けた経路を想定してスコープを破棄する
    }

    let mut fresh = uow.begin().await.unwrap();
    assert!(fresh.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_conflict_is_surfaced_as_retryable() {
    let store = InMemorySourceStore::new();
    let uow = InMemoryUnitOfWork::with_store(store.clone());

    let mut setup = uow.begin().await.unwrap();
    setup.save(&on_hand("b1", "CLOCK", 10)).await.unwrap();
    setup.commit().await.unwrap();

    // 2つのスコープが同じソースへの割当を同時にコミットしようとする
    let mut first = uow.begin().await.unwrap();
    let mut second = uow.begin().await.unwrap();

    let mut source = first.get(&sref("b1")).await.unwrap();
    source.allocate(line("o1", "CLOCK", 6));
    first.save(&source).await.unwrap();
    first.commit().await.unwrap();

    let mut source = second.get(&sref("b1")).await.unwrap();
    source.allocate(line("o2", "CLOCK", 6));
    second.save(&source).await.unwrap();
    let err = second.commit().await.unwrap_err();

    assert!(matches!(err, RepositoryError::Conflict(_)));
    let app_err = ApplicationError::from(err);
    assert!(app_err.is_retryable());

    // ユースケースを新しいスコープで再実行すると、確定済みの割当を
    // 踏まえた判断になり、合計が仕入数量を超えることはない
    let service = AllocationService::new(
        InMemoryUnitOfWork::with_store(store.clone()),
        Arc::new(NopLogger),
    );
    let result = service.allocate(oid("o2"), sku("CLOCK"), 6).await;
    assert!(matches!(
        result.unwrap_err(),
        ApplicationError::DomainError(DomainError::OutOfStock(_))
    ));
    assert_eq!(available(&store, "b1", "CLOCK").await, 4);
}

// ---- リポジトリ契約テスト ----
// どの実装も同じ add/get/list の操作列に対して同じ結果を返すこと

async fn repository_contract<S>(mut scope: S)
where
    S: TransactionScope,
{
    scope.save(&on_hand("b1", "CLOCK", 10)).await.unwrap();
    scope.save(&shipment("b2", "CLOCK", 5, 1)).await.unwrap();

    let loaded = scope.get(&sref("b1")).await.unwrap();
    assert_eq!(loaded, on_hand("b1", "CLOCK", 10));

    assert!(matches!(
        scope.get(&sref("missing")).await,
        Err(RepositoryError::NotFound(_))
    ));

    let mut listed = scope.list().await.unwrap();
    listed.sort_by(|a, b| a.reference().cmp(b.reference()));
    assert_eq!(listed, vec![on_hand("b1", "CLOCK", 10), shipment("b2", "CLOCK", 5, 1)]);

    // 割当状態を含めて保存と再取得が往復すること
    let mut source = scope.get(&sref("b1")).await.unwrap();
    source.allocate(line("o1", "CLOCK", 4));
    scope.save(&source).await.unwrap();
    let reloaded = scope.get(&sref("b1")).await.unwrap();
    assert_eq!(reloaded.available_quantity(&sku("CLOCK")), 6);
    assert_eq!(reloaded.allocations().len(), 1);

    // 契約テスト自体は永続状態を残さない
    scope.rollback().await.unwrap();
}

#[tokio::test]
async fn test_in_memory_repository_satisfies_contract() {
    let uow = InMemoryUnitOfWork::new();
    repository_contract(uow.begin().await.unwrap()).await;
}

#[tokio::test]
#[ignore = "MySQLデータベースが必要"]
async fn test_mysql_repository_satisfies_contract() {
    let config = DatabaseConfig::from_env().unwrap();
    let pool = sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await
        .unwrap();
    DatabaseMigration::new(pool.clone()).run().await.unwrap();

    let uow = MySqlUnitOfWork::new(pool);
    repository_contract(uow.begin().await.unwrap()).await;
}

// テスト用の何もしないロガー
struct NopLogger;

impl Logger for NopLogger {
    fn debug(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
    fn info(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
    fn warn(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
    fn error(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
}
