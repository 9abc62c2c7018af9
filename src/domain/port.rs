// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{InventorySource, SourceRef};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// リポジトリエラー型
/// リポジトリ・作業単位の操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// データベース接続に失敗
    ConnectionFailed(String),
    /// 操作に失敗
    OperationFailed(String),
    /// データの取得に失敗
    FetchFailed(String),
    /// 指定された参照が存在しない
    NotFound(String),
    /// コミット時の競合（楽観ロック失敗）
    /// 呼び出し側は新しいスコープでユースケースを再実行できる
    Conflict(String),
}

impl RepositoryError {
    /// 新しいスコープで再実行すれば成功しうるエラーかどうか
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            RepositoryError::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
            RepositoryError::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
            RepositoryError::NotFound(msg) => write!(f, "Not found: {}", msg),
            RepositoryError::Conflict(msg) => write!(f, "Commit conflict: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// 在庫ソースリポジトリトレイト
/// 在庫ソース集約の永続化を抽象化する
/// 作業単位のスコープに束縛された状態で使用される
#[async_trait]
pub trait SourceRepository: Send {
    /// 在庫ソースを保存する（UPSERT）
    /// 同一スコープ内の後続の get / list から直ちに見える
    ///
    /// # Arguments
    /// * `source` - 保存する在庫ソース
    ///
    /// # Returns
    /// * `Ok(())` - 保存成功
    /// * `Err(RepositoryError)` - 保存失敗
    async fn save(&mut self, source: &InventorySource) -> Result<(), RepositoryError>;

    /// ソース参照で在庫ソースを取得する
    ///
    /// # Arguments
    /// * `reference` - 検索するソース参照
    ///
    /// # Returns
    /// * `Ok(InventorySource)` - 在庫ソースが見つかった
    /// * `Err(RepositoryError::NotFound)` - 参照が存在しない
    /// * `Err(RepositoryError)` - 取得失敗
    async fn get(&mut self, reference: &SourceRef) -> Result<InventorySource, RepositoryError>;

    /// すべての在庫ソースを取得する
    /// 順序は保証されない（割当のための順序付けはエンジンの責務）
    ///
    /// # Returns
    /// * `Ok(Vec<InventorySource>)` - 在庫ソースのリスト
    /// * `Err(RepositoryError)` - 取得失敗
    async fn list(&mut self) -> Result<Vec<InventorySource>, RepositoryError>;
}

/// 作業単位トレイト
/// トランザクション境界を抽象化する
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// このトランザクションに束縛されたスコープ型
    type Scope: TransactionScope;

    /// 新しいトランザクションを開き、リポジトリを束縛したスコープを返す
    ///
    /// # Returns
    /// * `Ok(Scope)` - 開始成功
    /// * `Err(RepositoryError)` - 開始失敗
    async fn begin(&self) -> Result<Self::Scope, RepositoryError>;
}

/// トランザクションスコープ
/// スコープ自体が束縛されたリポジトリとして振る舞う
///
/// commit / rollback は値を消費するため、終了後のスコープは
/// 型システム上使用できない。commit せずにスコープをドロップした
/// 場合、積まれた変更はすべて破棄される（自動ロールバック）—
/// エラーや早期リターンを含むあらゆる経路で永続状態は変化しない
#[async_trait]
pub trait TransactionScope: SourceRepository + Send {
    /// スコープ内の変更を永続化する
    ///
    /// # Returns
    /// * `Ok(())` - コミット成功
    /// * `Err(RepositoryError::Conflict)` - 競合（再実行可能）
    /// * `Err(RepositoryError)` - コミット失敗
    async fn commit(self) -> Result<(), RepositoryError>;

    /// スコープ内の変更を破棄する
    async fn rollback(self) -> Result<(), RepositoryError>;
}
