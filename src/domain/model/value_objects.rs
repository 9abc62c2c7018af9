use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

use std::fmt;

/// SKU（品目識別子）
/// 外部システムが採番する空でない文字列
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    /// 文字列からSkuを作成
    /// 空文字列は無効
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidValue("SKUは空にできません".to_string()));
        }
        Ok(Self(value))
    }

    /// 内部の文字列を取得
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 在庫ソースの一意識別子
/// 手持ち在庫・入荷予定のどちらも参照できる
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef(String);

impl SourceRef {
    /// 文字列からSourceRefを作成
    /// 空文字列は無効
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "ソース参照は空にできません".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 内部の文字列を取得
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 注文の一意識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// 文字列からOrderIdを作成
    /// 空文字列は無効
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "注文IDは空にできません".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 内部の文字列を取得
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 注文明細を表す値オブジェクト
/// 同じフィールドを持つ2つの明細は交換可能（値として等価）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    order_id: OrderId,
    sku: Sku,
    quantity: u32,
}

impl OrderLine {
    /// 新しい注文明細を作成
    /// 数量は1以上である必要がある
    pub fn new(order_id: OrderId, sku: Sku, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        Ok(Self {
            order_id,
            sku,
            quantity,
        })
    }

    /// 注文IDを取得
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// SKUを取得
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// 数量を取得
    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}
