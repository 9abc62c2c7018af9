// ドメインモデル（エンティティと値オブジェクト）

mod allocation;
mod source;
mod value_objects;

pub use value_objects::{OrderId, OrderLine, Sku, SourceRef};

pub use allocation::{Allocation, AllocationLine};
pub use source::InventorySource;
