use crate::context::{MemoryContext, QueryParams};
use crate::local::LocalStorage;
use async_trait::async_trait;
use macae_core::{DataType, MacaeError, MacaeResult, StoredItem};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Name of the document file inside the data directory.
pub const DOCUMENTS_FILE: &str = "documents.jsonl";

/// Durable document store persisted as JSON lines.
///
/// Loads every document into memory on first use, appends on insert and
/// rewrites the file on update or delete. Every disk operation runs under
/// the configured timeout.
pub struct FileStore {
    data_dir: PathBuf,
    path: PathBuf,
    timeout: Duration,
    docs: LocalStorage,
    loaded: OnceCell<()>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// A store rooted at `data_dir`; nothing is read until first use.
    pub fn new(data_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let data_dir = data_dir.into();
        let path = data_dir.join(DOCUMENTS_FILE);
        Self {
            data_dir,
            path,
            timeout,
            docs: LocalStorage::new(),
            loaded: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document file has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Load the document file. Runs once; a failed load is retried by the
    /// next caller.
    pub async fn load(&self) -> MacaeResult<()> {
        self.loaded
            .get_or_try_init(|| self.with_timeout("load", self.read_documents()))
            .await?;
        Ok(())
    }

    async fn read_documents(&self) -> MacaeResult<()> {
        tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            MacaeError::Store(format!(
                "Failed to create data dir {}: {e}",
                self.data_dir.display()
            ))
        })?;

        if !tokio::fs::try_exists(&self.path).await? {
            info!(path = %self.path.display(), "Starting new document store");
            return Ok(());
        }

        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| MacaeError::Store(format!("Failed to read document store: {e}")))?;
        let mut loaded = 0usize;
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let item: StoredItem = serde_json::from_str(line).map_err(|e| {
                MacaeError::Store(format!("Invalid document on line {}: {e}", lineno + 1))
            })?;
            if self.docs.upsert(item).await {
                loaded += 1;
            } else {
                warn!(line = lineno + 1, "Skipping unsupported document");
            }
        }
        info!(path = %self.path.display(), loaded, "Document store loaded");
        Ok(())
    }

    async fn with_timeout<T, F>(&self, operation: &str, fut: F) -> MacaeResult<T>
    where
        F: Future<Output = MacaeResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MacaeError::Timeout {
                operation: operation.to_string(),
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn append(&self, item: &StoredItem) -> MacaeResult<()> {
        let mut line = serde_json::to_string(item)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MacaeError::Store(format!("Failed to open document store: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MacaeError::Store(format!("Failed to write document: {e}")))?;
        file.flush().await?;
        Ok(())
    }

    async fn rewrite(&self, items: &[StoredItem]) -> MacaeResult<()> {
        let mut data = String::new();
        for item in items {
            data.push_str(&serde_json::to_string(item)?);
            data.push('\n');
        }
        tokio::fs::write(&self.path, data.as_bytes())
            .await
            .map_err(|e| MacaeError::Store(format!("Failed to rewrite document store: {e}")))
    }

    /// Rewrite the file from `snapshot`; the in-memory copy is only touched
    /// by `apply` once the file holds the new contents.
    async fn commit<T, F>(
        &self,
        operation: &str,
        snapshot: Vec<StoredItem>,
        apply: F,
    ) -> MacaeResult<T>
    where
        F: Future<Output = T>,
    {
        self.with_timeout(operation, self.rewrite(&snapshot)).await?;
        Ok(apply.await)
    }

    /// Append a new document. Returns `false` for unsupported items.
    pub async fn insert(&self, item: StoredItem) -> MacaeResult<bool> {
        if item.data_type().is_none() {
            return Ok(false);
        }
        self.load().await?;
        let _guard = self.write_lock.lock().await;
        self.with_timeout("add_item", self.append(&item)).await?;
        Ok(self.docs.insert(item).await)
    }

    /// Replace a document by id, or add it. Returns `false` for unsupported items.
    pub async fn upsert(&self, item: StoredItem) -> MacaeResult<bool> {
        let (Some(data_type), Some(id)) = (item.data_type(), item.id().map(str::to_owned)) else {
            return Ok(false);
        };
        self.load().await?;
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.docs.all().await;
        match snapshot
            .iter_mut()
            .find(|doc| doc.data_type() == Some(data_type) && doc.id() == Some(id.as_str()))
        {
            Some(slot) => *slot = item.clone(),
            None => snapshot.push(item.clone()),
        }
        self.commit("update_item", snapshot, self.docs.upsert(item))
            .await
    }

    /// Delete a document. Returns whether it existed.
    pub async fn remove(&self, id: &str, data_type: DataType) -> MacaeResult<bool> {
        self.load().await?;
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.docs.all().await;
        let before = snapshot.len();
        snapshot.retain(|doc| !(doc.data_type() == Some(data_type) && doc.id() == Some(id)));
        if snapshot.len() == before {
            return Ok(false);
        }
        self.commit("delete_item", snapshot, self.docs.remove(id, data_type))
            .await
    }

    /// Delete every document of a type. Returns how many were removed.
    pub async fn clear(&self, data_type: DataType) -> MacaeResult<usize> {
        self.load().await?;
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.docs.all().await;
        let before = snapshot.len();
        snapshot.retain(|doc| doc.data_type() != Some(data_type));
        if snapshot.len() == before {
            return Ok(0);
        }
        self.commit("delete_all_items", snapshot, self.docs.clear(data_type))
            .await
    }

    /// Documents of a type that pass `params`.
    pub async fn list(
        &self,
        data_type: DataType,
        params: &QueryParams,
    ) -> MacaeResult<Vec<StoredItem>> {
        self.load().await?;
        Ok(self.docs.list(data_type, params).await)
    }

    /// Every document.
    pub async fn all(&self) -> MacaeResult<Vec<StoredItem>> {
        self.load().await?;
        Ok(self.docs.all().await)
    }
}

/// Durable [`MemoryContext`]: a session-scoped handle over a [`FileStore`].
pub struct FileMemoryContext {
    session_id: String,
    user_id: String,
    store: Arc<FileStore>,
}

impl FileMemoryContext {
    /// A handle over a shared store.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        store: Arc<FileStore>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            store,
        }
    }

    /// A handle over a store of its own rooted at `data_dir`.
    pub fn open(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self::new(session_id, user_id, Arc::new(FileStore::new(data_dir, timeout)))
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }
}

#[async_trait]
impl MemoryContext for FileMemoryContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn backend(&self) -> &'static str {
        "file"
    }

    fn is_initialized(&self) -> bool {
        self.store.is_loaded()
    }

    async fn initialize(&self) -> MacaeResult<()> {
        self.store.load().await
    }

    async fn add_item(&self, item: StoredItem) -> MacaeResult<()> {
        if !self.store.insert(item).await? {
            warn!(session_id = %self.session_id, "Ignoring unsupported item on add");
        }
        Ok(())
    }

    async fn update_item(&self, item: StoredItem) -> MacaeResult<()> {
        if !self.store.upsert(item).await? {
            warn!(session_id = %self.session_id, "Ignoring unsupported item on update");
        }
        Ok(())
    }

    async fn delete_item(&self, id: &str, data_type: DataType) -> MacaeResult<()> {
        if !self.store.remove(id, data_type).await? {
            debug!(id, data_type = %data_type, "Nothing to delete");
        }
        Ok(())
    }

    async fn delete_all_items(&self, data_type: DataType) -> MacaeResult<()> {
        let removed = self.store.clear(data_type).await?;
        info!(data_type = %data_type, removed, "Deleted all stored items");
        Ok(())
    }

    async fn query_items(
        &self,
        query: &str,
        params: &QueryParams,
        data_type: DataType,
    ) -> MacaeResult<Vec<StoredItem>> {
        debug!(query, data_type = %data_type, "File store query");
        self.store.list(data_type, params).await
    }

    async fn get_all_items(&self) -> MacaeResult<Vec<StoredItem>> {
        self.store.all().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::MemoryContextExt;
    use macae_core::{AgentType, Plan, Session, Step};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let plan = Plan::new("s1", "u1", "Plan a product launch", AgentType::Planner);
        let step = Step::new(&plan, 1, AgentType::Marketing, "Draft the press release");

        {
            let ctx = FileMemoryContext::open("s1", "u1", tmp.path(), TIMEOUT);
            ctx.initialize().await.unwrap();
            ctx.add(Session::new("s1", "u1")).await.unwrap();
            ctx.add(plan.clone()).await.unwrap();
            ctx.add(step.clone()).await.unwrap();
        }

        let reopened = FileMemoryContext::open("s1", "u1", tmp.path(), TIMEOUT);
        reopened.initialize().await.unwrap();
        assert_eq!(reopened.get_plan(&plan.id).await.unwrap(), Some(plan.clone()));
        assert_eq!(reopened.get_steps_by_plan(&plan.id).await.unwrap(), vec![step]);
        assert!(reopened.get_session("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_and_delete_rewrite_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = FileMemoryContext::open("s1", "u1", tmp.path(), TIMEOUT);
        let mut plan = Plan::new("s1", "u1", "goal", AgentType::Planner);
        ctx.add(plan.clone()).await.unwrap();

        plan.summary = Some("updated".into());
        ctx.upsert(plan.clone()).await.unwrap();
        let contents = tokio::fs::read_to_string(ctx.store().path()).await.unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("updated"));

        ctx.delete_item(&plan.id, DataType::Plan).await.unwrap();
        let contents = tokio::fs::read_to_string(ctx.store().path()).await.unwrap();
        assert!(contents.trim().is_empty());
    }

    #[tokio::test]
    async fn test_failed_rewrite_leaves_documents_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = FileMemoryContext::open("s1", "u1", tmp.path(), TIMEOUT);
        let mut plan = Plan::new("s1", "u1", "goal", AgentType::Planner);
        ctx.add(plan.clone()).await.unwrap();
        let original = plan.clone();

        let path = ctx.store().path().to_path_buf();
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        plan.summary = Some("unpersisted".into());
        let err = ctx.upsert(plan.clone()).await.unwrap_err();
        assert!(matches!(err, MacaeError::Store(_)));
        assert_eq!(ctx.get_plan(&plan.id).await.unwrap(), Some(original.clone()));

        assert!(ctx.delete_item(&plan.id, DataType::Plan).await.is_err());
        assert!(ctx.delete_all_items(DataType::Plan).await.is_err());
        assert_eq!(ctx.get_plan(&plan.id).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_unknown_documents_are_skipped_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let plan = Plan::new("s1", "u1", "goal", AgentType::Planner);
        let mut data = serde_json::to_string(&StoredItem::from(plan.clone())).unwrap();
        data.push('\n');
        data.push_str(r#"{"data_type":"invoice","id":"inv-1"}"#);
        data.push('\n');
        tokio::fs::write(tmp.path().join(DOCUMENTS_FILE), data)
            .await
            .unwrap();

        let ctx = FileMemoryContext::open("s1", "u1", tmp.path(), TIMEOUT);
        ctx.initialize().await.unwrap();
        assert_eq!(ctx.get_all_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_initialize() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join(DOCUMENTS_FILE), "not json\n")
            .await
            .unwrap();
        let ctx = FileMemoryContext::open("s1", "u1", tmp.path(), TIMEOUT);
        let err = ctx.initialize().await.unwrap_err();
        assert!(matches!(err, MacaeError::Store(_)));
        assert!(!ctx.is_initialized());
    }

    #[tokio::test]
    async fn test_operation_timeout_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = FileMemoryContext::open("s1", "u1", tmp.path(), Duration::ZERO);
        let err = ctx.initialize().await.unwrap_err();
        assert!(matches!(err, MacaeError::Timeout { ref operation, .. } if operation == "load"));
    }
}
