//! The storage abstraction: a revisioned, namespaced key-value contract with
//! optimistic compare-and-swap updates and prefix-scoped watches.
//!
//! [`StorageBackend`] is the thin, object-safe layer a concrete backend (for
//! instance `panther-store-etcd`) implements over raw bytes. [`Store<T>`] is
//! the ergonomic, type-safe handle application code actually uses, in the
//! same spirit as `kube::Api<K>` wrapping a transport-level `Client`.
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::metadata::{Object, ObjectExt, ObjectList};

/// Default bounded capacity of a watcher's output channel.
pub const DEFAULT_WATCH_CHAN_SIZE: usize = 100;

/// Default upper bound on a single CAS/Get/Delete/List round-trip. Does not
/// apply to `watch`, which is long-lived by design.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(3);

async fn with_timeout<T>(fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
    match tokio::time::timeout(DEFAULT_CALL_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Internal(anyhow::anyhow!("store operation timed out"))),
    }
}

/// The classification of a single watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    /// The key did not exist before this write.
    Create,
    /// The key already existed before this write.
    Update,
    /// The key was removed.
    Delete,
    /// The stream has failed and will emit no further events.
    Error,
}

/// A single change observed on a watched prefix or key.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// The kind of change.
    pub event_type: WatchEventType,
    /// The full storage key this event concerns.
    pub key: String,
    /// The value after the change (or, for deletes, the value beforehand).
    /// Empty for [`WatchEventType::Error`].
    pub value: Vec<u8>,
}

/// Which keys a [`Store::watch`] call should observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchOption {
    /// Every object of the kind, across all namespaces.
    #[default]
    OnKind,
    /// Every object of the kind within one namespace. Degrades to
    /// [`WatchOption::OnKind`] for kinds that aren't namespace-sensitive.
    OnNamespace,
    /// A single object, addressed by name (and namespace, if applicable).
    OnName,
}

/// A live subscription to raw storage change events.
///
/// Object-safe so a concrete backend can hand back `Box<dyn Watcher>`
/// regardless of which typed [`Store<T>`] opened it.
#[async_trait]
pub trait Watcher: Send {
    /// Await the next event, or `None` once the stream has been closed.
    async fn recv(&mut self) -> Option<WatchEvent>;
    /// Close the underlying subscription. Idempotent.
    async fn close(&mut self);
}

/// The object-safe transport layer a concrete backend implements.
///
/// Operates on raw keys and bytes; [`Store<T>`] is responsible for all
/// kind-aware key building and (de)serialization.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Release any held connections. Idempotent.
    async fn close(&self) -> Result<(), StoreError>;

    /// Write `value` at `key` iff `key` does not already hold a value.
    async fn create_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Read the value at `key`.
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Atomically read-modify-write the value at `key`.
    ///
    /// `mutate` receives the current value (`None` if the key is absent) and
    /// returns the value to commit. The backend must guarantee no other
    /// writer's commit is interleaved between the read `mutate` observed and
    /// the write it produced; on a lost race it returns
    /// [`StoreError::Conflict`]. Returns the bytes that were committed.
    async fn update_raw(
        &self,
        key: &str,
        mutate: Box<dyn FnOnce(Option<&[u8]>) -> Result<Vec<u8>, StoreError> + Send>,
    ) -> Result<Vec<u8>, StoreError>;

    /// Remove the value at `key`.
    async fn delete_raw(&self, key: &str) -> Result<(), StoreError>;

    /// Scan every key under `prefix`.
    async fn list_raw(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Watch `prefix_or_key`, either as a prefix scan or an exact key.
    async fn watch_raw(&self, prefix_or_key: &str, is_prefix: bool) -> Result<Box<dyn Watcher>, StoreError>;
}

/// A decoded watch event for a typed [`Store<T>`].
#[derive(Debug, Clone)]
pub struct TypedWatchEvent<T> {
    /// The kind of change.
    pub event_type: WatchEventType,
    /// The full storage key this event concerns.
    pub key: String,
    /// The decoded object, or `None` for an [`WatchEventType::Error`] event.
    pub object: Option<T>,
}

/// A typed handle over a [`Watcher`], decoding raw bytes into `T` as events arrive.
pub struct TypedWatcher<T> {
    inner: Box<dyn Watcher>,
    _marker: PhantomData<T>,
}

impl<T: Object> TypedWatcher<T> {
    /// Await the next event on this subscription.
    pub async fn next(&mut self) -> Option<TypedWatchEvent<T>> {
        let raw = self.inner.recv().await?;
        let object = if raw.value.is_empty() {
            None
        } else {
            match serde_json::from_slice(&raw.value) {
                Ok(obj) => Some(obj),
                Err(err) => {
                    tracing::warn!(key = %raw.key, error = %err, "dropping unparsable watch payload");
                    None
                }
            }
        };
        Some(TypedWatchEvent {
            event_type: raw.event_type,
            key: raw.key,
            object,
        })
    }

    /// Close the underlying subscription. Idempotent.
    pub async fn close(&mut self) {
        self.inner.close().await;
    }
}

/// A type-safe handle to one kind of object in the store.
///
/// Cheap to clone: it only wraps an `Arc<dyn StorageBackend>`.
pub struct Store<T> {
    backend: Arc<dyn StorageBackend>,
    _marker: PhantomData<T>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Store {
            backend: self.backend.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Object> Store<T> {
    /// Build a typed store over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Store {
            backend,
            _marker: PhantomData,
        }
    }

    fn key_of(&self, obj: &T) -> String {
        if obj.has_namespace() {
            format!("/{}/{}/{}", T::KIND, obj.namespace(), obj.name())
        } else {
            format!("/{}/{}", T::KIND, obj.name())
        }
    }

    /// Create `obj`, assigning a GUID and `created_at` if unset. Fails with
    /// [`StoreError::AlreadyExists`] if the key is already taken.
    pub async fn create(&self, obj: &mut T) -> Result<(), StoreError> {
        if obj.guid().is_empty() {
            obj.set_guid(Uuid::new_v4().to_string());
        }
        obj.set_created_at(Utc::now());
        if obj.name().is_empty() {
            let guid = obj.guid().to_owned();
            obj.set_name(guid);
        }
        let key = self.key_of(obj);
        let value = serde_json::to_vec(&*obj)?;
        with_timeout(self.backend.create_raw(&key, value)).await?;
        tracing::debug!(%key, "created object");
        Ok(())
    }

    /// Fetch the object addressed by `obj`'s name (and namespace, if
    /// applicable), overwriting `obj` in place.
    pub async fn get(&self, obj: &mut T) -> Result<(), StoreError> {
        let key = self.key_of(obj);
        let bytes = with_timeout(self.backend.get_raw(&key)).await?;
        *obj = serde_json::from_slice(&bytes)?;
        Ok(())
    }

    /// Compare-and-swap update of `obj`. Historical metadata (`guid`, `kind`,
    /// `namespace`, `name`, `created_at`) is preserved from the stored value;
    /// `updated_at` is stamped with the current time. On success `obj` is
    /// overwritten with the value actually committed.
    pub async fn update(&self, obj: &mut T) -> Result<(), StoreError> {
        let key = self.key_of(obj);
        let now = Utc::now();
        let desired = obj.clone();
        let mutate: Box<dyn FnOnce(Option<&[u8]>) -> Result<Vec<u8>, StoreError> + Send> =
            Box::new(move |current: Option<&[u8]>| -> Result<Vec<u8>, StoreError> {
                let mut merged = desired;
                match current {
                    Some(bytes) => {
                        let old: T = serde_json::from_slice(bytes)?;
                        merged.set_guid(old.guid().to_owned());
                        merged.meta_mut().kind = old.meta().kind.clone();
                        merged.set_namespace(old.namespace().to_owned());
                        merged.set_name(old.name().to_owned());
                        if let Some(created) = old.created_at() {
                            merged.set_created_at(created);
                        }
                    }
                    None => merged.set_created_at(now),
                }
                merged.set_updated_at(now);
                Ok(serde_json::to_vec(&merged)?)
            });
        let committed = with_timeout(self.backend.update_raw(&key, mutate)).await?;
        *obj = serde_json::from_slice(&committed)?;
        tracing::debug!(%key, "updated object");
        Ok(())
    }

    /// Remove the object addressed by `obj`.
    pub async fn delete(&self, obj: &T) -> Result<(), StoreError> {
        let key = self.key_of(obj);
        with_timeout(self.backend.delete_raw(&key)).await?;
        tracing::debug!(%key, "deleted object");
        Ok(())
    }

    /// List every object of this kind, optionally scoped to one namespace.
    pub async fn list(&self, namespace: Option<&str>) -> Result<ObjectList<T>, StoreError> {
        let prefix = match namespace {
            Some(ns) => format!("/{}/{}/", T::KIND, ns),
            None => format!("/{}/", T::KIND),
        };
        let raw = with_timeout(self.backend.list_raw(&prefix)).await?;
        let mut items = Vec::with_capacity(raw.len());
        for bytes in raw {
            items.push(serde_json::from_slice(&bytes)?);
        }
        tracing::debug!(count = items.len(), kind = T::KIND, "listed objects");
        Ok(ObjectList { items })
    }

    /// Open a watch over this kind, scoped by `option`. `template` supplies
    /// the name/namespace needed by [`WatchOption::OnNamespace`] and
    /// [`WatchOption::OnName`].
    pub async fn watch(&self, template: &T, option: WatchOption) -> Result<TypedWatcher<T>, StoreError> {
        let (target, is_prefix) = match option {
            WatchOption::OnKind => (format!("/{}/", T::KIND), true),
            WatchOption::OnNamespace => {
                if template.has_namespace() {
                    (format!("/{}/{}/", T::KIND, template.namespace()), true)
                } else {
                    (format!("/{}/", T::KIND), true)
                }
            }
            WatchOption::OnName => {
                if template.has_namespace() && template.namespace().is_empty() {
                    return Err(StoreError::InvalidWatch(
                        "namespace is required while watching a namespace-sensitive object".into(),
                    ));
                }
                if template.name().is_empty() {
                    return Err(StoreError::InvalidWatch(
                        "name must be specified while watching a specific target".into(),
                    ));
                }
                (self.key_of(template), false)
            }
        };
        let inner = self.backend.watch_raw(&target, is_prefix).await?;
        Ok(TypedWatcher {
            inner,
            _marker: PhantomData,
        })
    }

    /// Close the underlying backend connection.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.backend.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn with_timeout_passes_through_fast_results() {
        let result = with_timeout(async { Ok::<_, StoreError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_surfaces_internal_error_when_exceeded() {
        let slow = async {
            tokio::time::sleep(DEFAULT_CALL_TIMEOUT + Duration::from_secs(1)).await;
            Ok::<_, StoreError>(())
        };
        let result = with_timeout(slow).await;
        assert!(matches!(result, Err(StoreError::Internal(_))));
    }
}
