use chrono::NaiveDate;
use proptest::prelude::*;
use warehouse_allocation::domain::model::{InventorySource, OrderId, OrderLine, Sku, SourceRef};
use warehouse_allocation::domain::service::{allocate_one, allocate_order};

fn sku(value: &str) -> Sku {
    Sku::new(value).unwrap()
}

fn sref(value: &str) -> SourceRef {
    SourceRef::new(value).unwrap()
}

fn line(order_id: &str, sku_value: &str, quantity: u32) -> OrderLine {
    OrderLine::new(OrderId::new(order_id).unwrap(), sku(sku_value), quantity).unwrap()
}

fn source(
    reference: &str,
    sku_value: &str,
    quantity: u32,
    eta: Option<NaiveDate>,
) -> InventorySource {
    InventorySource::new(sref(reference), sku(sku_value), quantity, eta)
}

fn on_hand(reference: &str, sku_value: &str, quantity: u32) -> InventorySource {
    source(reference, sku_value, quantity, None)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

// 在庫ソースのプロパティベーステスト
proptest! {
    /// 割当と解除は可逆的である（往復法則）
    #[test]
    fn test_allocate_deallocate_round_trip(
        (purchased, quantity) in (1u32..1000).prop_flat_map(|p| (Just(p), 1..=p)),
    ) {
        let mut source = on_hand("batch-001", "CLOCK", purchased);
        let order_line = line("order-001", "CLOCK", quantity);

        source.allocate(order_line.clone());
        prop_assert_eq!(source.available_quantity(&sku("CLOCK")), purchased - quantity);

        source.deallocate(&order_line).unwrap();
        prop_assert_eq!(source.available_quantity(&sku("CLOCK")), purchased);
    }

    /// can_allocate は利用可能数量との比較と正確に一致する
    /// （等しい場合は真、超える場合は偽）
    #[test]
    fn test_can_allocate_accuracy(
        purchased in 0u32..1000,
        requested in 1u32..2000,
    ) {
        let source = on_hand("batch-001", "CLOCK", purchased);
        let order_line = line("order-001", "CLOCK", requested);
        prop_assert_eq!(source.can_allocate(&order_line), requested <= purchased);
    }

    /// 同じ明細の再割当は二重計上されない
    #[test]
    fn test_allocate_same_line_twice_counts_once(
        (purchased, quantity) in (1u32..1000).prop_flat_map(|p| (Just(p), 1..=p)),
    ) {
        let mut source = on_hand("batch-001", "CLOCK", purchased);
        let order_line = line("order-001", "CLOCK", quantity);

        source.allocate(order_line.clone());
        source.allocate(order_line);
        prop_assert_eq!(source.available_quantity(&sku("CLOCK")), purchased - quantity);
    }
}

// 割当エンジンのプロパティベーステスト
proptest! {
    /// エンジンは仕入数量を超えて割り当てない
    /// （apply 後もすべてのソースで available_quantity >= 0）
    #[test]
    fn test_engine_never_over_allocates(
        line_quantities in prop::collection::vec(1u32..50, 1..6),
        source_specs in prop::collection::vec((1u32..100, prop::option::of(1u32..28)), 1..6),
    ) {
        let lines: Vec<OrderLine> = line_quantities
            .iter()
            .enumerate()
            .map(|(i, quantity)| line(&format!("order-{:03}", i), "CLOCK", *quantity))
            .collect();
        let mut sources: Vec<InventorySource> = source_specs
            .iter()
            .enumerate()
            .map(|(i, (quantity, eta))| {
                source(&format!("batch-{:03}", i), "CLOCK", *quantity, eta.map(day))
            })
            .collect();

        let allocation = allocate_order(&lines, &sources);
        allocation.apply(&mut sources);

        for s in &sources {
            prop_assert!(
                s.allocated_quantity(&sku("CLOCK")) <= s.purchased_quantity(&sku("CLOCK"))
            );
        }
    }

    /// 手持ち在庫が単独で満たせる場合、入荷予定のetaに関わらず
    /// 必ず手持ち在庫が選ばれる
    #[test]
    fn test_on_hand_wins_when_it_can_satisfy(
        (quantity, stock_extra) in (1u32..100).prop_flat_map(|q| (Just(q), 0u32..100)),
        shipment_specs in prop::collection::vec((1u32..200, 1u32..28), 0..5),
    ) {
        let mut sources = vec![on_hand("warehouse", "CLOCK", quantity + stock_extra)];
        for (i, (shipment_quantity, eta_day)) in shipment_specs.iter().enumerate() {
            sources.push(source(
                &format!("shipment-{:03}", i),
                "CLOCK",
                *shipment_quantity,
                Some(day(*eta_day)),
            ));
        }

        let chosen = allocate_one(&line("order-001", "CLOCK", quantity), &mut sources).unwrap();
        prop_assert_eq!(chosen, sref("warehouse"));
    }

    /// エンジンの探索は読み取り専用であり、apply するまで
    /// どのソースも変化しない
    #[test]
    fn test_search_leaves_sources_untouched(
        line_quantities in prop::collection::vec(1u32..50, 1..4),
        source_specs in prop::collection::vec((1u32..100, prop::option::of(1u32..28)), 1..4),
    ) {
        let lines: Vec<OrderLine> = line_quantities
            .iter()
            .enumerate()
            .map(|(i, quantity)| line(&format!("order-{:03}", i), "CLOCK", *quantity))
            .collect();
        let sources: Vec<InventorySource> = source_specs
            .iter()
            .enumerate()
            .map(|(i, (quantity, eta))| {
                source(&format!("batch-{:03}", i), "CLOCK", *quantity, eta.map(day))
            })
            .collect();
        let before = sources.clone();

        let _allocation = allocate_order(&lines, &sources);

        prop_assert_eq!(sources, before);
    }
}
