// 駆動される側アダプター（作業単位・リポジトリ・ロガーの実装）

mod console_logger;
mod in_memory_unit_of_work;
mod mysql_unit_of_work;

pub use console_logger::ConsoleLogger;
pub use in_memory_unit_of_work::{InMemorySourceStore, InMemoryTransaction, InMemoryUnitOfWork};
pub use mysql_unit_of_work::{MySqlTransaction, MySqlUnitOfWork};
