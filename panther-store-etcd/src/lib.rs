//! An etcd v3-backed implementation of [`panther_core::StorageBackend`].

pub mod client;
pub mod config;
pub mod watcher;

pub use client::EtcdBackend;
pub use config::{EtcdConfig, SslOptions};
