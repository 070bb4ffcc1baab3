//! Connection configuration for the etcd-backed storage backend.
use std::sync::Arc;
use std::time::Duration;

use etcd_client::{Client, ConnectOptions, TlsOptions};
use serde::{Deserialize, Serialize};

use crate::EtcdBackend;

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// TLS material for an etcd connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SslOptions {
    /// Whether TLS is enabled for this connection.
    #[serde(default)]
    pub enabled: bool,
    /// SNI override presented during the TLS handshake.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    /// Path to the CA certificate used to verify the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_cert: String,
    /// Path to the client private key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// Path to the client certificate.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cert: String,
}

/// Configuration for the etcd v3 storage backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtcdConfig {
    /// Cluster member addresses, e.g. `["https://etcd-0:2379"]`.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Two-segment key prefix every record is stored under.
    #[serde(default)]
    pub namespace: Vec<String>,
    /// Username for etcd's built-in auth, if enabled.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Password for etcd's built-in auth, if enabled.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// TLS material, if the cluster requires it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslOptions>,
}

impl EtcdConfig {
    /// Dial the configured cluster and build a [`EtcdBackend`].
    pub async fn open(&self) -> anyhow::Result<Arc<EtcdBackend>> {
        let mut opts = ConnectOptions::new().with_connect_timeout(DEFAULT_DIAL_TIMEOUT);
        if !self.user.is_empty() {
            opts = opts.with_user(self.user.clone(), self.password.clone());
        }
        if let Some(ssl) = &self.ssl {
            if ssl.enabled {
                let mut tls = TlsOptions::new();
                if !ssl.ca_cert.is_empty() {
                    tls = tls.ca_certificate(etcd_client::Certificate::from_file(&ssl.ca_cert)?);
                }
                if !ssl.cert.is_empty() && !ssl.key.is_empty() {
                    tls = tls.identity(etcd_client::Identity::from_file(&ssl.cert, &ssl.key)?);
                }
                if !ssl.server_name.is_empty() {
                    tls = tls.domain_name(&ssl.server_name);
                }
                opts = opts.with_tls(tls);
            }
        }

        let client = Client::connect(&self.endpoints, Some(opts)).await?;

        let namespace = if self.namespace.is_empty() {
            vec!["/com.redhat".to_owned(), "panther".to_owned()]
        } else {
            self.namespace.clone()
        };
        let parts: Vec<&str> = namespace
            .iter()
            .map(|seg| seg.trim_matches('/'))
            .filter(|seg| !seg.is_empty())
            .collect();
        let prefix = format!("/{}", parts.join("/"));

        Ok(Arc::new(EtcdBackend::new(client, prefix)))
    }
}
