use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use crate::types::MetaStore;

/// JSON records of one kind kept under a fixed key prefix.
///
/// Ids may contain `/` to group records (e.g. `"{organization_id}/{license_id}"`),
/// which makes [`RecordStore::list`] usable as a secondary lookup.
pub struct RecordStore<T> {
    store: Arc<dyn MetaStore>,
    prefix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            prefix: self.prefix.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for RecordStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn MetaStore>, prefix: &str) -> Self {
        let prefix = format!("/{}/", prefix.trim_matches('/'));
        Self {
            store,
            prefix,
            _marker: PhantomData,
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    pub async fn find(&self, id: &str) -> Result<Option<T>> {
        let key = self.key(id);
        let Some((bytes, _rev)) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt record at {key}"))?;
        Ok(Some(record))
    }

    pub async fn save(&self, id: &str, record: &T) -> Result<u64> {
        let bytes = serde_json::to_vec(record)?;
        self.store.put(&self.key(id), bytes).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(&self.key(id)).await
    }

    /// All records whose id starts with `id_prefix`. Undecodable entries are skipped.
    pub async fn list(&self, id_prefix: &str) -> Result<Vec<T>> {
        let items = self.store.list_prefix(&self.key(id_prefix)).await?;
        let mut out = Vec::with_capacity(items.len());
        for (k, v, _rev) in items {
            match serde_json::from_slice::<T>(&v) {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(key=%k, error=%e, "skipping undecodable record"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryMetaStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        size: u32,
    }

    fn widgets() -> RecordStore<Widget> {
        RecordStore::new(Arc::new(MemoryMetaStore::new()), "widgets")
    }

    #[tokio::test]
    async fn test_find_save_delete() {
        let store = widgets();
        assert!(store.find("w1").await.unwrap().is_none());

        let w = Widget { id: "w1".into(), size: 3 };
        store.save("w1", &w).await.unwrap();
        assert_eq!(store.find("w1").await.unwrap(), Some(w));

        assert!(store.delete("w1").await.unwrap());
        assert!(store.find("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_group() {
        let store = widgets();
        for (group, id) in [("g1", "a"), ("g1", "b"), ("g2", "c")] {
            let w = Widget { id: id.into(), size: 1 };
            store.save(&format!("{group}/{id}"), &w).await.unwrap();
        }

        let g1: Vec<String> = store.list("g1/").await.unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(g1, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }
}
