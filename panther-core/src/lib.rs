//! Shared object model and storage abstraction for the panther fleet orchestrator.
//!
//! This crate has no opinion about which database backs the store, or how
//! hosts are reached over SSH; it only defines the vocabulary every other
//! panther crate speaks: [`object::Host`], [`object::SystemScan`],
//! [`object::HostOperation`], and the [`store::Store`] handle that persists
//! and watches them.

pub mod error;
pub mod metadata;
pub mod object;
pub mod sort;
pub mod store;

pub use error::StoreError;
pub use metadata::{Object, ObjectExt, ObjectList, ObjectMeta};
pub use object::{Host, HostOperation, LoginCredential, OperationMethod, OperationType, SecuritySeverity, SecurityUpdate, State, SystemScan};
pub use store::{Store, StorageBackend, TypedWatchEvent, TypedWatcher, WatchEvent, WatchEventType, WatchOption, Watcher};
