use anyhow::Result;
use async_trait::async_trait;

/// Revisioned key/value backend. Every mutation bumps a store-wide revision.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64>;
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>, u64)>>;
}
