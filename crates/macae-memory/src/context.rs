use async_trait::async_trait;
use macae_core::{
    AgentMessage, DataType, Item, MacaeResult, Plan, Session, Step, StoredItem,
};

/// Structural filters for [`MemoryContext::query_items`].
///
/// Every field that is set must match; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Plan id; for plans this is the plan's own id.
    pub plan_id: Option<String>,
    /// Session id; for sessions this is the session's own id.
    pub session_id: Option<String>,
    /// Owning user.
    pub user_id: Option<String>,
}

impl QueryParams {
    /// Restrict to one plan.
    pub fn by_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Restrict to one session.
    pub fn by_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Restrict to one user.
    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether `item` passes every set filter.
    pub fn matches(&self, item: &StoredItem) -> bool {
        fn field_ok(want: &Option<String>, have: Option<&str>) -> bool {
            match want.as_deref() {
                Some(w) => have == Some(w),
                None => true,
            }
        }
        field_ok(&self.plan_id, item.plan_id())
            && field_ok(&self.session_id, item.session_id())
            && field_ok(&self.user_id, item.user_id())
    }
}

/// Session-scoped persistence handle used by every agent.
///
/// Implementations must treat [`StoredItem::Unsupported`] as a logged no-op,
/// and `initialize` must be idempotent under concurrent callers.
#[async_trait]
pub trait MemoryContext: Send + Sync {
    /// Session this handle was created for.
    fn session_id(&self) -> &str;

    /// User this handle was created for.
    fn user_id(&self) -> &str;

    /// Short backend name (`local`, `file`), used in logs and tests.
    fn backend(&self) -> &'static str;

    /// Whether `initialize` has completed successfully.
    fn is_initialized(&self) -> bool;

    /// Prepare the backing store. Safe to call any number of times.
    async fn initialize(&self) -> MacaeResult<()>;

    /// Insert a new document.
    async fn add_item(&self, item: StoredItem) -> MacaeResult<()>;

    /// Replace the document with the same id, or insert it.
    async fn update_item(&self, item: StoredItem) -> MacaeResult<()>;

    /// Remove one document. Missing ids are ignored.
    async fn delete_item(&self, id: &str, data_type: DataType) -> MacaeResult<()>;

    /// Remove every document of one type.
    async fn delete_all_items(&self, data_type: DataType) -> MacaeResult<()>;

    /// Documents of `data_type` matching `params`. The `query` text is
    /// descriptive only.
    async fn query_items(
        &self,
        query: &str,
        params: &QueryParams,
        data_type: DataType,
    ) -> MacaeResult<Vec<StoredItem>>;

    /// Every stored document, grouped by type.
    async fn get_all_items(&self) -> MacaeResult<Vec<StoredItem>>;

    /// Every document of one type.
    async fn get_data_by_type(&self, data_type: DataType) -> MacaeResult<Vec<StoredItem>> {
        self.query_items("all by type", &QueryParams::default(), data_type)
            .await
    }

    /// The session record, if stored.
    async fn get_session(&self, session_id: &str) -> MacaeResult<Option<Session>> {
        let params = QueryParams::default().by_session(session_id);
        let items = self
            .query_items("session by id", &params, DataType::Session)
            .await?;
        Ok(typed::<Session>(items).into_iter().next())
    }

    /// The plan created for a session, if any.
    async fn get_plan_by_session(&self, session_id: &str) -> MacaeResult<Option<Plan>> {
        let params = QueryParams::default().by_session(session_id);
        let items = self
            .query_items("plan by session", &params, DataType::Plan)
            .await?;
        Ok(typed::<Plan>(items).into_iter().next())
    }

    /// A plan by id.
    async fn get_plan(&self, plan_id: &str) -> MacaeResult<Option<Plan>> {
        let params = QueryParams::default().by_plan(plan_id);
        let items = self
            .query_items("plan by id", &params, DataType::Plan)
            .await?;
        Ok(typed::<Plan>(items).into_iter().next())
    }

    /// A step by id.
    async fn get_step(&self, step_id: &str) -> MacaeResult<Option<Step>> {
        let items = self.get_data_by_type(DataType::Step).await?;
        Ok(typed::<Step>(items).into_iter().find(|s| s.id == step_id))
    }

    /// Steps of a plan ordered by `sequence`.
    async fn get_steps_by_plan(&self, plan_id: &str) -> MacaeResult<Vec<Step>> {
        let params = QueryParams::default().by_plan(plan_id);
        let items = self
            .query_items("steps by plan", &params, DataType::Step)
            .await?;
        let mut steps = typed::<Step>(items);
        steps.sort_by_key(|s| s.sequence);
        Ok(steps)
    }

    /// Plans owned by this handle's user.
    async fn get_all_plans(&self) -> MacaeResult<Vec<Plan>> {
        let params = QueryParams::default().by_user(self.user_id());
        let items = self
            .query_items("plans by user", &params, DataType::Plan)
            .await?;
        Ok(typed::<Plan>(items))
    }

    /// Agent messages of a session, oldest first.
    async fn get_agent_messages(&self, session_id: &str) -> MacaeResult<Vec<AgentMessage>> {
        let params = QueryParams::default().by_session(session_id);
        let items = self
            .query_items("agent messages by session", &params, DataType::AgentMessage)
            .await?;
        let mut messages = typed::<AgentMessage>(items);
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

/// Typed helpers over any [`MemoryContext`].
#[async_trait]
pub trait MemoryContextExt: MemoryContext {
    /// Query and decode documents of `T`'s type.
    async fn query_typed<T>(&self, params: &QueryParams) -> MacaeResult<Vec<T>>
    where
        T: Item + Send + 'static,
    {
        let items = self
            .query_items(T::DATA_TYPE.as_str(), params, T::DATA_TYPE)
            .await?;
        Ok(typed::<T>(items))
    }

    /// Insert a new record.
    async fn add<T>(&self, item: T) -> MacaeResult<()>
    where
        T: Item + Send + 'static,
    {
        self.add_item(item.into_stored()).await
    }

    /// Insert or replace a record by id.
    async fn upsert<T>(&self, item: T) -> MacaeResult<()>
    where
        T: Item + Send + 'static,
    {
        self.update_item(item.into_stored()).await
    }
}

impl<C: MemoryContext + ?Sized> MemoryContextExt for C {}

/// Keep only documents that decode as `T`.
pub fn typed<T: Item>(items: Vec<StoredItem>) -> Vec<T> {
    items.into_iter().filter_map(T::from_stored).collect()
}
