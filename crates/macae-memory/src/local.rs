use crate::context::{MemoryContext, QueryParams};
use async_trait::async_trait;
use macae_core::{DataType, MacaeResult, StoredItem};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Process-local document buckets, one per [`DataType`].
///
/// Shared by every [`LocalMemoryContext`] so handles for different sessions
/// observe the same data. Insertion order is preserved within a bucket.
#[derive(Default)]
pub struct LocalStorage {
    buckets: RwLock<HashMap<DataType, Vec<StoredItem>>>,
}

impl LocalStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Returns `false` for unsupported items.
    pub async fn insert(&self, item: StoredItem) -> bool {
        let Some(data_type) = item.data_type() else {
            return false;
        };
        let mut buckets = self.buckets.write().await;
        buckets.entry(data_type).or_default().push(item);
        true
    }

    /// Replace in place by id, or append. Returns `false` for unsupported
    /// items.
    pub async fn upsert(&self, item: StoredItem) -> bool {
        let (Some(data_type), Some(id)) = (item.data_type(), item.id().map(str::to_owned)) else {
            return false;
        };
        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(data_type).or_default();
        match bucket.iter_mut().find(|existing| existing.id() == Some(id.as_str())) {
            Some(slot) => *slot = item,
            None => bucket.push(item),
        }
        true
    }

    /// Remove by id. Returns whether anything was removed.
    pub async fn remove(&self, id: &str, data_type: DataType) -> bool {
        let mut buckets = self.buckets.write().await;
        let Some(bucket) = buckets.get_mut(&data_type) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|item| item.id() != Some(id));
        bucket.len() < before
    }

    /// Drop a whole bucket. Returns how many items were removed.
    pub async fn clear(&self, data_type: DataType) -> usize {
        let mut buckets = self.buckets.write().await;
        buckets.remove(&data_type).map_or(0, |bucket| bucket.len())
    }

    /// Items of a type that pass `params`, in insertion order.
    pub async fn list(&self, data_type: DataType, params: &QueryParams) -> Vec<StoredItem> {
        let buckets = self.buckets.read().await;
        buckets
            .get(&data_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|item| params.matches(item))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every item, bucket by bucket in [`DataType::ALL`] order.
    pub async fn all(&self) -> Vec<StoredItem> {
        let buckets = self.buckets.read().await;
        DataType::ALL
            .iter()
            .filter_map(|t| buckets.get(t))
            .flat_map(|bucket| bucket.iter().cloned())
            .collect()
    }

    /// Total number of items.
    pub async fn len(&self) -> usize {
        let buckets = self.buckets.read().await;
        buckets.values().map(Vec::len).sum()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory [`MemoryContext`] used when the durable store is disabled or
/// unavailable.
pub struct LocalMemoryContext {
    session_id: String,
    user_id: String,
    storage: Arc<LocalStorage>,
    initialized: OnceCell<()>,
}

impl LocalMemoryContext {
    /// A handle over a private, empty storage.
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::with_storage(session_id, user_id, Arc::new(LocalStorage::new()))
    }

    /// A handle over shared storage.
    pub fn with_storage(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        storage: Arc<LocalStorage>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            storage,
            initialized: OnceCell::new(),
        }
    }

    /// The shared storage behind this handle.
    pub fn storage(&self) -> &Arc<LocalStorage> {
        &self.storage
    }
}

#[async_trait]
impl MemoryContext for LocalMemoryContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn backend(&self) -> &'static str {
        "local"
    }

    fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    async fn initialize(&self) -> MacaeResult<()> {
        self.initialized
            .get_or_init(|| async {
                info!(
                    session_id = %self.session_id,
                    user_id = %self.user_id,
                    "Local memory context initialized"
                );
            })
            .await;
        Ok(())
    }

    async fn add_item(&self, item: StoredItem) -> MacaeResult<()> {
        if !self.storage.insert(item).await {
            warn!(session_id = %self.session_id, "Ignoring unsupported item on add");
        }
        Ok(())
    }

    async fn update_item(&self, item: StoredItem) -> MacaeResult<()> {
        if !self.storage.upsert(item).await {
            warn!(session_id = %self.session_id, "Ignoring unsupported item on update");
        }
        Ok(())
    }

    async fn delete_item(&self, id: &str, data_type: DataType) -> MacaeResult<()> {
        if !self.storage.remove(id, data_type).await {
            debug!(id, data_type = %data_type, "Nothing to delete");
        }
        Ok(())
    }

    async fn delete_all_items(&self, data_type: DataType) -> MacaeResult<()> {
        let removed = self.storage.clear(data_type).await;
        info!(data_type = %data_type, removed, "Deleted all local items");
        Ok(())
    }

    async fn query_items(
        &self,
        query: &str,
        params: &QueryParams,
        data_type: DataType,
    ) -> MacaeResult<Vec<StoredItem>> {
        debug!(query, data_type = %data_type, "Local query");
        Ok(self.storage.list(data_type, params).await)
    }

    async fn get_all_items(&self) -> MacaeResult<Vec<StoredItem>> {
        Ok(self.storage.all().await)
    }
}
