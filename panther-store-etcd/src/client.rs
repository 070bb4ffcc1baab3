//! The [`StorageBackend`] implementation over an etcd v3 cluster.
use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, GetOptions, Txn, TxnOp};
use panther_core::{StorageBackend, StoreError, Watcher};
use tokio::sync::Mutex;

use crate::watcher::EtcdWatcher;

/// A [`StorageBackend`] backed by a namespaced etcd v3 key-value store.
///
/// `prefix` is applied to every key so the rest of the system never sees it;
/// mirrors the original's use of etcd's client-side namespacing layer.
pub struct EtcdBackend {
    client: Mutex<Client>,
    prefix: String,
}

impl EtcdBackend {
    pub(crate) fn new(client: Client, prefix: String) -> Self {
        EtcdBackend {
            client: Mutex::new(client),
            prefix,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl StorageBackend for EtcdBackend {
    async fn close(&self) -> Result<(), StoreError> {
        // etcd_client::Client has no explicit close; dropping the handle tears
        // down its channels. Nothing to do but keep the method for symmetry
        // with other backends and callers that always call `Store::close`.
        Ok(())
    }

    async fn create_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let key = self.namespaced(key);
        let txn = Txn::new()
            .when(vec![Compare::create_revision(key.clone(), CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(key.clone(), value, None)]);
        let mut client = self.client.lock().await;
        let resp = client
            .txn(txn)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        if !resp.succeeded() {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let key = self.namespaced(key);
        let mut client = self.client.lock().await;
        let resp = client
            .get(key, None)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        match resp.kvs().first() {
            Some(kv) => Ok(kv.value().to_vec()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn update_raw(
        &self,
        key: &str,
        mutate: Box<dyn FnOnce(Option<&[u8]>) -> Result<Vec<u8>, StoreError> + Send>,
    ) -> Result<Vec<u8>, StoreError> {
        let namespaced = self.namespaced(key);
        let mut client = self.client.lock().await;
        let current = client
            .get(namespaced.clone(), None)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        let (current_value, mod_revision) = match current.kvs().first() {
            Some(kv) => (Some(kv.value().to_vec()), kv.mod_revision()),
            None => (None, 0),
        };

        let updated = mutate(current_value.as_deref())?;

        let txn = Txn::new()
            .when(vec![Compare::mod_revision(
                namespaced.clone(),
                CompareOp::Equal,
                mod_revision,
            )])
            .and_then(vec![TxnOp::put(namespaced.clone(), updated.clone(), None)]);
        let resp = client
            .txn(txn)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        if !resp.succeeded() {
            return Err(StoreError::Conflict);
        }
        Ok(updated)
    }

    async fn delete_raw(&self, key: &str) -> Result<(), StoreError> {
        let key = self.namespaced(key);
        let mut client = self.client.lock().await;
        let resp = client
            .delete(key, None)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        if resp.deleted() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let prefix = self.namespaced(prefix);
        let mut client = self.client.lock().await;
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        Ok(resp.kvs().iter().map(|kv| kv.value().to_vec()).collect())
    }

    async fn watch_raw(&self, prefix_or_key: &str, is_prefix: bool) -> Result<Box<dyn Watcher>, StoreError> {
        let key = self.namespaced(prefix_or_key);
        let client = self.client.lock().await.clone();
        let watcher = EtcdWatcher::open(client, key, self.prefix.clone(), is_prefix)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!(e)))?;
        Ok(Box::new(watcher))
    }
}
