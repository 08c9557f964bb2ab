//! Ephemeral storage area

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Error, Result, StorageArea};

/// In-memory storage area, lost with the process
///
/// An optional quota limits the total size of stored keys and values in bytes. Writes going over
/// it are rejected with `QuotaExceeded`.
#[derive(Debug, Default)]
pub struct MemoryArea {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an area refusing to hold more than `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota: Some(quota),
        }
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;

        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(stored, _)| stored.as_str() != key)
                .map(|(stored, value)| stored.len() + value.len())
                .sum();

            if used + key.len() + value.len() > quota {
                return Err(Error::QuotaExceeded {
                    key: key.to_owned(),
                });
            }
        }

        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_counts_replaced_values_once() {
        let area = MemoryArea::with_quota(10);

        area.set("key", "12345").await.unwrap();
        area.set("key", "1234567").await.unwrap();
        let _ = area.set("other", "1").await.unwrap_err();

        assert_eq!(area.get("key").await.unwrap().as_deref(), Some("1234567"));
        assert_eq!(area.get("other").await.unwrap(), None);
    }
}
