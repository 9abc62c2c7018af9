use crate::domain::model::{InventorySource, SourceRef};
use crate::domain::port::{RepositoryError, SourceRepository, TransactionScope, UnitOfWork};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// 参照ごとの在庫ソースと楽観ロック用のバージョン
type VersionedSources = HashMap<SourceRef, (InventorySource, u64)>;

/// 複数の作業単位で共有されるインメモリストア
#[derive(Clone, Default)]
pub struct InMemorySourceStore {
    inner: Arc<Mutex<VersionedSources>>,
}

impl InMemorySourceStore {
    /// 新しい空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }
}

/// インメモリ作業単位
/// テスト用のリファレンス実装。MySQL実装と同じ契約を満たす:
/// begin でストアのスナップショットを取り、スコープ内の変更は
/// 作業コピーに積まれ、commit 時にバージョンを照合して書き戻す
pub struct InMemoryUnitOfWork {
    store: InMemorySourceStore,
}

impl InMemoryUnitOfWork {
    /// 専用ストアを持つ作業単位を作成
    pub fn new() -> Self {
        Self {
            store: InMemorySourceStore::new(),
        }
    }

    /// 既存のストアを共有する作業単位を作成
    /// 複数の作業単位から同じ永続状態を観測する場合に使用する
    pub fn with_store(store: InMemorySourceStore) -> Self {
        Self { store }
    }

    /// 共有ストアへのハンドルを取得
    pub fn store(&self) -> InMemorySourceStore {
        self.store.clone()
    }
}

impl Default for InMemoryUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    type Scope = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, RepositoryError> {
        let guard = self
            .store
            .inner
            .lock()
            .map_err(|_| RepositoryError::OperationFailed("ストアのロックに失敗しました".to_string()))?;

        let mut working = HashMap::new();
        let mut base_versions = HashMap::new();
        for (reference, (source, version)) in guard.iter() {
            working.insert(reference.clone(), source.clone());
            base_versions.insert(reference.clone(), *version);
        }

        Ok(InMemoryTransaction {
            store: self.store.clone(),
            working,
            base_versions,
            dirty: HashSet::new(),
        })
    }
}

/// インメモリトランザクション
/// commit せずにドロップされた場合、作業コピーごと変更が破棄される
pub struct InMemoryTransaction {
    store: InMemorySourceStore,
    working: HashMap<SourceRef, InventorySource>,
    base_versions: HashMap<SourceRef, u64>,
    dirty: HashSet<SourceRef>,
}

#[async_trait]
impl SourceRepository for InMemoryTransaction {
    async fn save(&mut self, source: &InventorySource) -> Result<(), RepositoryError> {
        self.working
            .insert(source.reference().clone(), source.clone());
        self.dirty.insert(source.reference().clone());
        Ok(())
    }

    async fn get(&mut self, reference: &SourceRef) -> Result<InventorySource, RepositoryError> {
        self.working.get(reference).cloned().ok_or_else(|| {
            RepositoryError::NotFound(format!("在庫ソースが見つかりません: {}", reference))
        })
    }

    async fn list(&mut self) -> Result<Vec<InventorySource>, RepositoryError> {
        Ok(self.working.values().cloned().collect())
    }
}

#[async_trait]
impl TransactionScope for InMemoryTransaction {
    async fn commit(self) -> Result<(), RepositoryError> {
        let mut guard = self
            .store
            .inner
            .lock()
            .map_err(|_| RepositoryError::OperationFailed("ストアのロックに失敗しました".to_string()))?;

        // 書き戻す前に全行のバージョンを照合する（楽観ロック）
        for reference in &self.dirty {
            let base = self.base_versions.get(reference);
            let current = guard.get(reference).map(|(_, version)| version);
            match (base, current) {
                (None, None) => {}
                (Some(base), Some(current)) if base == current => {}
                _ => {
                    return Err(RepositoryError::Conflict(format!(
                        "在庫ソース {} は他のトランザクションに更新されました",
                        reference
                    )));
                }
            }
        }

        for reference in &self.dirty {
            if let Some(source) = self.working.get(reference) {
                let next_version = self
                    .base_versions
                    .get(reference)
                    .map(|version| version + 1)
                    .unwrap_or(0);
                guard.insert(reference.clone(), (source.clone(), next_version));
            }
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        // 作業コピーを破棄するだけ
        Ok(())
    }
}
