//! Storage contract behind state partitions

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::DialogResult;

/// Key/value storage used by bot state partitions
///
/// Writes are last-writer-wins; any stronger guarantee belongs to the
/// implementation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the given keys; missing keys are simply absent from the result
    async fn read(&self, keys: &[String]) -> DialogResult<HashMap<String, Value>>;

    /// Write every item in `changes`
    async fn write(&self, changes: HashMap<String, Value>) -> DialogResult<()>;

    /// Remove the given keys
    async fn delete(&self, keys: &[String]) -> DialogResult<()>;
}

/// In-memory implementation of `Storage`
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Raw stored value for a key
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.items.read().await.get(key).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> DialogResult<HashMap<String, Value>> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn write(&self, changes: HashMap<String, Value>) -> DialogResult<()> {
        let mut items = self.items.write().await;
        items.extend(changes);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> DialogResult<()> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}
