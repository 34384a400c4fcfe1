//! Durable chat transcript storage.
//!
//! One operation: upsert keyed by chat id. Concurrent writes to the same id
//! are last-write-wins; serialization, if any, happens at the storage layer,
//! not here.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::chat::ChatRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Inserts the record, replacing any existing record with the same id.
    async fn upsert(&self, record: &ChatRecord) -> Result<(), StoreError>;
}

/// Store backed by a PostgREST-style endpoint, writing to the `chats` table.
pub struct RestChatStore {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestChatStore {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            service_key: service_key.into(),
        }
    }
}

#[async_trait]
impl ChatStore for RestChatStore {
    async fn upsert(&self, record: &ChatRecord) -> Result<(), StoreError> {
        let response = self
            .http
            .post(format!("{}/rest/v1/chats?on_conflict=id", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected(format!("{status}: {detail}")));
        }

        Ok(())
    }
}

/// In-memory store. Used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryChatStore {
    chats: DashMap<String, ChatRecord>,
}

impl MemoryChatStore {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ChatRecord> {
        self.chats.get(id).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.chats.iter().map(|entry| entry.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn upsert(&self, record: &ChatRecord) -> Result<(), StoreError> {
        self.chats.insert(record.id.clone(), record.clone());
        Ok(())
    }
}
