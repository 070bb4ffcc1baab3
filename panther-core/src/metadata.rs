//! Metadata carried by every stored object, and the object/list traits built on top of it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource kind names as they appear in storage keys.
pub mod kind {
    /// A managed host.
    pub const HOST: &str = "host";
    /// The most recent security-update scan of a host.
    pub const SYSTEM_SCAN: &str = "system_scan";
    /// A single command dispatched to a host.
    pub const HOST_OPERATION: &str = "host_operation";
}

/// Metadata shared by every object kind: identity, kind tag and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Stable unique identifier, assigned on create.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guid: String,
    /// Resource kind tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// User-visible name, unique within (kind, namespace).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Namespace segment; only meaningful for namespace-sensitive kinds.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Set once, on first successful create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Set on every successful update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A record kind that can be stored, sorted and watched.
///
/// Mirrors [`ResourceExt`](crate::object::ObjectExt) in spirit: this trait supplies the
/// required hooks, the extension trait supplies ergonomic accessors.
pub trait Object: Clone + std::fmt::Debug + Send + Sync + Serialize + for<'de> Deserialize<'de> {
    /// The kind tag used in storage keys and watch filtering.
    const KIND: &'static str;

    /// Borrow the shared metadata envelope.
    fn meta(&self) -> &ObjectMeta;
    /// Mutably borrow the shared metadata envelope.
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    /// Whether this kind is scoped by a second namespace key segment.
    fn has_namespace(&self) -> bool {
        false
    }
}

/// Ergonomic accessors layered over [`Object`], analogous to `ResourceExt`.
pub trait ObjectExt: Object {
    /// Stable unique identifier.
    fn guid(&self) -> &str {
        &self.meta().guid
    }
    /// Assign the unique identifier.
    fn set_guid(&mut self, id: impl Into<String>) {
        self.meta_mut().guid = id.into();
    }
    /// User-visible name.
    fn name(&self) -> &str {
        &self.meta().name
    }
    /// Assign the user-visible name.
    fn set_name(&mut self, name: impl Into<String>) {
        self.meta_mut().name = name.into();
    }
    /// Namespace segment, empty when not namespace-sensitive.
    fn namespace(&self) -> &str {
        &self.meta().namespace
    }
    /// Assign the namespace segment.
    fn set_namespace(&mut self, ns: impl Into<String>) {
        self.meta_mut().namespace = ns.into();
    }
    /// Creation timestamp, if the object has ever been persisted.
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.meta().created_at
    }
    /// Stamp the creation timestamp.
    fn set_created_at(&mut self, ts: DateTime<Utc>) {
        self.meta_mut().created_at = Some(ts);
    }
    /// Most recent update timestamp, if any.
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.meta().updated_at
    }
    /// Stamp the update timestamp.
    fn set_updated_at(&mut self, ts: DateTime<Utc>) {
        self.meta_mut().updated_at = Some(ts);
    }
}

impl<T: Object> ObjectExt for T {}

/// A typed list of objects, mirroring `kube_core::ObjectList`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectList<T> {
    /// The members returned by the listing call.
    pub items: Vec<T>,
}

impl<T> ObjectList<T> {
    /// Iterate over the members of this list.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for ObjectList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
