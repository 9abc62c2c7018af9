// 在庫割当サービス
// 注文明細を手持ち在庫と入荷予定に割り当てるドメインを
// ヘキサゴナルアーキテクチャで実装する
// HTTPなどのトランスポート層は外部コラボレーターとして
// application::service の操作を呼び出す

pub mod adapter;
pub mod application;
pub mod domain;
