//! Concrete record kinds: [`Host`], [`SystemScan`] and [`HostOperation`].
use serde::{Deserialize, Serialize};

use crate::metadata::{kind, Object, ObjectMeta};

/// A pair of login credentials used to authenticate an SSH session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredential {
    /// Remote login user.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Remote login password.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// A managed host reachable over SSH.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    /// Shared metadata envelope.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// IPv4 or IPv6 literal address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_addr: String,
    /// TCP port of the SSH daemon; defaults to 22.
    #[serde(default)]
    pub ssh_port: u16,
    /// Credential used to open the SSH session.
    #[serde(default)]
    pub ssh_cred: LoginCredential,
    /// Optional credential used to elevate privilege via `su` once connected.
    #[serde(default)]
    pub op_cred: LoginCredential,
    /// Free-form operator note.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Host {
    /// Build an empty host, tagged with the correct kind.
    pub fn new() -> Self {
        Host {
            metadata: ObjectMeta {
                kind: kind::HOST.to_owned(),
                ..Default::default()
            },
            ssh_port: 22,
            ..Default::default()
        }
    }

    /// Column headers for an ASCII-table rendering of a host listing.
    pub fn header() -> &'static [&'static str] {
        &[
            "GUID",
            "Name",
            "SSH Address",
            "SSH Port",
            "SSH User",
            "Op User",
            "Comment",
            "Created At",
            "Updated At",
        ]
    }

    /// Render this host as a row matching [`Host::header`].
    pub fn row(&self) -> Vec<String> {
        vec![
            self.metadata.guid.clone(),
            self.metadata.name.clone(),
            self.ssh_addr.clone(),
            self.ssh_port.to_string(),
            self.ssh_cred.user.clone(),
            self.op_cred.user.clone(),
            self.comment.clone(),
            self.metadata
                .created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            self.metadata
                .updated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ]
    }
}

impl Object for Host {
    const KIND: &'static str = kind::HOST;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Execution state shared by [`SystemScan`] and [`HostOperation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Not yet observed by a worker. Only legal writer-initiated state.
    #[default]
    Unknown,
    /// A worker or client has requested work to begin.
    Started,
    /// Preconditions failed before any I/O began; terminal.
    Abort,
    /// A worker has claimed the record and is performing I/O.
    InProgress,
    /// Work completed successfully; terminal.
    Success,
    /// Work completed with an error; terminal.
    Failure,
}

impl State {
    /// True once the state can no longer be transitioned by a worker.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Success | State::Failure | State::Abort)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Unknown => "<null>",
            State::Started => "STARTED",
            State::Abort => "ABORT",
            State::InProgress => "IN-PROGRESS",
            State::Success => "COMPLETED",
            State::Failure => "FAILED",
        };
        f.write_str(s)
    }
}

/// Severity of a reported security update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecuritySeverity {
    /// Not set; should not appear in a successful scan result.
    #[default]
    Unknown,
    /// Critical severity.
    Critical,
    /// Important severity.
    Important,
    /// Moderate severity.
    Moderate,
}

impl std::fmt::Display for SecuritySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecuritySeverity::Unknown => "<null>",
            SecuritySeverity::Critical => "Critical",
            SecuritySeverity::Important => "Important",
            SecuritySeverity::Moderate => "Moderate",
        };
        f.write_str(s)
    }
}

/// A single reported security update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityUpdate {
    /// CVE identifier, e.g. `CVE-2020-1234`.
    pub cve_id: String,
    /// Reported severity.
    pub severity: SecuritySeverity,
    /// The package affected, as reported by the scan.
    pub package: String,
}

/// The most recent security-update scan of a single host.
///
/// At most one `SystemScan` exists per host name; its lifecycle is driven by
/// [`State`] and it is garbage-collected when its host is deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemScan {
    /// Shared metadata envelope. `name` equals the owning host's name.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Current lifecycle state.
    #[serde(default)]
    pub state: State,
    /// Security updates discovered by the most recent successful scan.
    #[serde(default)]
    pub security: Vec<SecurityUpdate>,
}

impl SystemScan {
    /// Build an empty scan, tagged with the correct kind.
    pub fn new() -> Self {
        SystemScan {
            metadata: ObjectMeta {
                kind: kind::SYSTEM_SCAN.to_owned(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Column headers for an ASCII-table rendering of a scan listing.
    pub fn header() -> &'static [&'static str] {
        &[
            "GUID",
            "Name",
            "State",
            "Security (Critical)",
            "Security (Important)",
            "Security (Moderate)",
            "Updated At",
        ]
    }

    /// Render this scan as a row matching [`SystemScan::header`].
    pub fn row(&self) -> Vec<String> {
        let (mut critical, mut important, mut moderate) = (0u32, 0u32, 0u32);
        for each in &self.security {
            match each.severity {
                SecuritySeverity::Critical => critical += 1,
                SecuritySeverity::Important => important += 1,
                SecuritySeverity::Moderate => moderate += 1,
                SecuritySeverity::Unknown => {}
            }
        }
        vec![
            self.metadata.guid.clone(),
            self.metadata.name.clone(),
            self.state.to_string(),
            critical.to_string(),
            important.to_string(),
            moderate.to_string(),
            self.metadata
                .updated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ]
    }
}

impl Object for SystemScan {
    const KIND: &'static str = kind::SYSTEM_SCAN;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// The issuer of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Not set; causes the operation to abort.
    #[default]
    Unknown,
    /// Issued internally, e.g. by the scan handler.
    Internal,
    /// Issued by an API client.
    User,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationType::Unknown => "<null>",
            OperationType::Internal => "internal",
            OperationType::User => "user",
        };
        f.write_str(s)
    }
}

/// The SSH session method used to execute an operation's command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMethod {
    /// Not set; causes the operation to abort.
    #[default]
    Unknown,
    /// Run to completion; `data` carries only the exit status.
    Run,
    /// Run to completion; `data` carries stdout.
    Output,
    /// Run to completion; `data` carries stdout followed by stderr.
    CombinedOutput,
}

impl std::fmt::Display for OperationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationMethod::Unknown => "<null>",
            OperationMethod::Run => "run",
            OperationMethod::Output => "output",
            OperationMethod::CombinedOutput => "combined_output",
        };
        f.write_str(s)
    }
}

/// A single command dispatched to a host over SSH.
///
/// Namespace-sensitive: its namespace is the name of the target [`Host`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostOperation {
    /// Shared metadata envelope.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// The shell command to execute.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// Who issued this operation.
    #[serde(default)]
    pub r#type: OperationType,
    /// How the command should be executed.
    #[serde(default)]
    pub method: OperationMethod,
    /// Timeout in seconds; `0` means unbounded.
    #[serde(default)]
    pub timeout: u64,
    /// Current lifecycle state.
    #[serde(default)]
    pub state: State,
    /// Captured output, or the reason for failure.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl HostOperation {
    /// Build an empty operation, tagged with the correct kind.
    pub fn new() -> Self {
        HostOperation {
            metadata: ObjectMeta {
                kind: kind::HOST_OPERATION.to_owned(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Column headers for an ASCII-table rendering of an operation listing.
    pub fn header() -> &'static [&'static str] {
        &[
            "GUID", "Host", "Command", "Type", "Method", "State", "Data", "Created At", "Updated At",
        ]
    }

    /// Render this operation as a row matching [`HostOperation::header`].
    pub fn row(&self) -> Vec<String> {
        vec![
            self.metadata.guid.clone(),
            self.metadata.namespace.clone(),
            self.command.clone(),
            self.r#type.to_string(),
            self.method.to_string(),
            self.state.to_string(),
            self.data.clone(),
            self.metadata
                .created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            self.metadata
                .updated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ]
    }
}

impl Object for HostOperation {
    const KIND: &'static str = kind::HOST_OPERATION;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn has_namespace(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_defaults_port() {
        let h = Host::new();
        assert_eq!(h.ssh_port, 22);
        assert_eq!(h.metadata.kind, kind::HOST);
    }

    #[test]
    fn round_trip_preserves_fields() {
        let mut scan = SystemScan::new();
        scan.metadata.name = "h1".into();
        scan.state = State::Success;
        scan.security.push(SecurityUpdate {
            cve_id: "CVE-2020-1234".into(),
            severity: SecuritySeverity::Critical,
            package: "openssl-1.0.1e-57.x86_64".into(),
        });
        let bytes = serde_json::to_vec(&scan).unwrap();
        let back: SystemScan = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.metadata.name, scan.metadata.name);
        assert_eq!(back.state, scan.state);
        assert_eq!(back.security, scan.security);
    }

    #[test]
    fn host_operation_is_namespace_sensitive() {
        let op = HostOperation::new();
        assert!(op.has_namespace());
    }
}
