use crate::config::MemoryConfig;
use crate::context::MemoryContext;
use crate::file::{FileMemoryContext, FileStore};
use crate::local::{LocalMemoryContext, LocalStorage};
use macae_core::{MacaeError, MacaeResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Backend every context of a provider is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    File,
    Local,
}

/// Hands out the Memory Context for a session and owns the fallback policy.
///
/// The durable store is tried first unless local storage is configured; if
/// it cannot be initialized the provider silently switches to local storage.
/// The choice is made once, on first use, and every context the provider
/// hands out shares it, so user-wide reads see what session writes stored.
/// Contexts are cached per `(session_id, user_id)`.
pub struct MemoryProvider {
    config: MemoryConfig,
    local: Arc<LocalStorage>,
    durable: Arc<FileStore>,
    backend: OnceCell<Backend>,
    contexts: RwLock<HashMap<(String, String), Arc<dyn MemoryContext>>>,
}

impl MemoryProvider {
    /// A provider for `config`. No store is touched until the first context
    /// is requested.
    pub fn new(config: MemoryConfig) -> Self {
        let durable = Arc::new(FileStore::new(
            config.data_dir.clone(),
            config.operation_timeout(),
        ));
        Self {
            config,
            local: Arc::new(LocalStorage::new()),
            durable,
            backend: OnceCell::new(),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// The configuration this provider was built with.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Storage shared by every local context this provider hands out.
    pub fn local_storage(&self) -> &Arc<LocalStorage> {
        &self.local
    }

    /// The initialized Memory Context for a session.
    pub async fn context_for(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> MacaeResult<Arc<dyn MemoryContext>> {
        if user_id.trim().is_empty() {
            return Err(MacaeError::Validation("user_id is required".into()));
        }
        let key = (session_id.to_string(), user_id.to_string());
        let cached = self.contexts.read().get(&key).cloned();
        if let Some(ctx) = cached {
            return Ok(ctx);
        }

        let ctx = self.build(session_id, user_id).await?;

        let mut contexts = self.contexts.write();
        Ok(Arc::clone(contexts.entry(key).or_insert(ctx)))
    }

    async fn backend(&self) -> Backend {
        *self
            .backend
            .get_or_init(|| async {
                if self.config.use_local_storage {
                    return Backend::Local;
                }
                match self.durable.load().await {
                    Ok(()) => Backend::File,
                    Err(e) => {
                        error!(
                            error = %e,
                            "Durable store unavailable, falling back to local storage"
                        );
                        Backend::Local
                    }
                }
            })
            .await
    }

    /// Name of the backend in use, once one has been chosen.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.get().map(|b| match b {
            Backend::File => "file",
            Backend::Local => "local",
        })
    }

    async fn build(&self, session_id: &str, user_id: &str) -> MacaeResult<Arc<dyn MemoryContext>> {
        let ctx: Arc<dyn MemoryContext> = match self.backend().await {
            Backend::File => Arc::new(FileMemoryContext::new(
                session_id,
                user_id,
                Arc::clone(&self.durable),
            )),
            Backend::Local => Arc::new(LocalMemoryContext::with_storage(
                session_id,
                user_id,
                Arc::clone(&self.local),
            )),
        };
        ctx.initialize().await?;
        info!(session_id, backend = ctx.backend(), "Memory context ready");
        Ok(ctx)
    }

    /// Number of cached contexts.
    pub fn cached(&self) -> usize {
        self.contexts.read().len()
    }

    /// Drop the cached contexts of one session.
    pub fn forget_session(&self, session_id: &str) {
        self.contexts.write().retain(|(sid, _), _| sid != session_id);
    }

    /// Drop every cached context. Stored data is kept.
    pub fn clear(&self) {
        self.contexts.write().clear();
    }
}
