use crate::domain::error::DomainError;
use crate::domain::port::RepositoryError;

/// アプリケーション層のエラー型
/// ドメインエラーとリポジトリエラーをラップする
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationError {
    /// ドメインエラー（ビジネスルール違反）
    DomainError(DomainError),
    /// リポジトリ・作業単位のエラー（永続化の失敗、競合）
    RepositoryError(RepositoryError),
    /// どのソースも扱っていないSKUが要求された
    /// リクエスト形状のエラーであり、自動再試行の対象にはならない
    InvalidSku(String),
    /// エンティティが見つからない
    NotFound(String),
}

impl ApplicationError {
    /// 新しい作業単位スコープでユースケースを再実行すれば
    /// 成功しうるエラーかどうか（コミット競合のみ）
    pub fn is_retryable(&self) -> bool {
        match self {
            ApplicationError::RepositoryError(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl std::fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationError::DomainError(err) => write!(f, "Domain error: {}", err),
            ApplicationError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            ApplicationError::InvalidSku(sku) => write!(f, "Invalid sku {}", sku),
            ApplicationError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for ApplicationError {}

// From実装でエラー変換を簡潔に
impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        ApplicationError::DomainError(err)
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        ApplicationError::RepositoryError(err)
    }
}
