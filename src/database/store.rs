/// Per-user last-known state storage
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;

use crate::error::ProcessError;
use crate::models::UserState;

/// Key-value store holding the last state seen for each user
///
/// `put` is an unconditional upsert. A `get` following a `put` for the same
/// key from the same caller must observe the written value; concurrent
/// writers to one key are last-write-wins.
pub trait StateStore {
    fn get(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserState>, ProcessError>> + Send;

    fn put(
        &self,
        user_id: &str,
        state: UserState,
    ) -> impl Future<Output = Result<(), ProcessError>> + Send;
}

/// In-process store used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, UserState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserState>, ProcessError> {
        Ok(self.states.read().await.get(user_id).copied())
    }

    async fn put(&self, user_id: &str, state: UserState) -> Result<(), ProcessError> {
        self.states.write().await.insert(user_id.to_string(), state);
        Ok(())
    }
}
