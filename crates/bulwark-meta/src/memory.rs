use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use tokio::sync::RwLock;

use crate::types::MetaStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryMetaStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    revision: u64,
    kv: BTreeMap<String, (Vec<u8>, u64)>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(inner: &mut Inner) -> u64 {
        inner.revision = inner.revision.saturating_add(1);
        inner.revision
    }
}

#[async_trait::async_trait]
impl MetaStore for MemoryMetaStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let rev = Self::next_revision(&mut inner);
        inner.kv.insert(key.to_string(), (value, rev));
        Ok(rev)
    }

    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>> {
        let inner = self.inner.read().await;
        Ok(inner.kv.get(key).map(|(v, rev)| (v.clone(), *rev)))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.kv.remove(key).is_some();
        if existed {
            Self::next_revision(&mut inner);
        }
        Ok(existed)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>, u64)>> {
        let inner = self.inner.read().await;
        Ok(inner
            .kv
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, (v, rev))| (k.clone(), v.clone(), *rev))
            .collect())
    }
}
