//! Per-kind handlers invoked by the worker [`pool`](crate::pool): the actual
//! business logic of scanning hosts and executing operations.
use anyhow::Context;
use uuid::Uuid;

use panther_core::{
    Host, HostOperation, ObjectExt, OperationMethod, OperationType, SecuritySeverity, SecurityUpdate, State,
    Store, SystemScan, WatchEventType, WatchOption,
};
use panther_ssh::Conn;

use crate::pool::Job;

/// Holds a typed [`Store`] per kind and dispatches jobs to the handler for
/// that kind.
pub struct Handlers {
    hosts: Store<Host>,
    scans: Store<SystemScan>,
    ops: Store<HostOperation>,
}

impl Handlers {
    /// Build a handler set over the given typed stores.
    pub fn new(hosts: Store<Host>, scans: Store<SystemScan>, ops: Store<HostOperation>) -> Self {
        Handlers { hosts, scans, ops }
    }

    /// Route `job` to its per-kind handler.
    pub async fn dispatch(&self, job: Job) {
        match job {
            Job::Host { host, gc: false } => self.handle_host(host).await,
            Job::Host { host, gc: true } => self.gc_host(host).await,
            Job::Scan(scan) => self.handle_scan(scan).await,
            Job::Op(op) => self.handle_op(op).await,
        }
    }

    /// Ensure a [`SystemScan`] exists for `host` and is ready to be picked up
    /// by [`Handlers::handle_scan`]. Only *prepares* the scan; it does not
    /// perform any scanning itself.
    async fn handle_host(&self, host: Host) {
        let mut scan = SystemScan::new();
        scan.set_name(host.name().to_owned());
        match self.scans.get(&mut scan).await {
            Ok(()) => {
                if matches!(scan.state, State::Success | State::Failure) {
                    scan.state = State::Started;
                    if let Err(err) = self.scans.update(&mut scan).await {
                        tracing::error!(host = host.name(), error = %err, "abort to scan host: could not re-arm scan result");
                    }
                }
            }
            Err(err) if err.is_internal() => {
                tracing::error!(host = host.name(), error = %err, "unexpected storage error while trying to scan host");
            }
            Err(_) => {
                scan.state = State::Started;
                if let Err(err) = self.scans.create(&mut scan).await {
                    tracing::error!(host = host.name(), error = %err, "could not initiate host scan result");
                }
            }
        }
    }

    /// Remove the [`SystemScan`] belonging to a deleted host.
    async fn gc_host(&self, host: Host) {
        let mut scan = SystemScan::new();
        scan.set_name(host.name().to_owned());
        if let Err(err) = self.scans.delete(&scan).await {
            if err.is_internal() {
                tracing::error!(host = host.name(), error = %err, "could not clean up scan result related to host");
            } else {
                tracing::warn!(host = host.name(), error = %err, "scan result related to host seems to have already been removed");
            }
        }
    }

    /// Run the update scan for a host whose [`SystemScan`] is `Started`.
    async fn handle_scan(&self, mut scan: SystemScan) {
        if scan.state != State::Started {
            return;
        }
        scan.state = State::InProgress;
        scan.security.clear();
        if let Err(err) = self.scans.update(&mut scan).await {
            tracing::error!(host = scan.name(), error = %err, "abort to scan host: could not mark in progress");
            return;
        }

        match self.run_scan(&scan).await {
            Ok(security) => {
                scan.security = security;
                scan.state = State::Success;
            }
            Err(err) => {
                tracing::error!(host = scan.name(), error = %err, "abort to scan host");
                scan.state = State::Failure;
            }
        }

        if let Err(err) = self.scans.update(&mut scan).await {
            tracing::error!(host = scan.name(), error = %err, "could not save scan result");
        }
    }

    /// Run the internal `yum updateinfo list cve` operation against `scan`'s
    /// host and parse its output into [`SecurityUpdate`]s.
    async fn run_scan(&self, scan: &SystemScan) -> anyhow::Result<Vec<SecurityUpdate>> {
        let mut host = Host::new();
        host.set_name(scan.name().to_owned());
        self.hosts.get(&mut host).await.context("loading host")?;

        let mut op = HostOperation::new();
        op.set_guid(Uuid::new_v4().to_string());
        op.set_name(op.guid().to_owned());
        op.set_namespace(host.name().to_owned());
        op.r#type = OperationType::Internal;
        op.command = "yum updateinfo list cve".to_owned();
        op.method = OperationMethod::Output;
        op.state = State::Started;

        let mut watcher = self
            .ops
            .watch(&op, WatchOption::OnName)
            .await
            .context("opening operation watch")?;

        let result: anyhow::Result<HostOperation> = async {
            self.ops.create(&mut op).await.context("creating scan operation")?;
            loop {
                let Some(event) = watcher.next().await else {
                    anyhow::bail!("watch stream closed unexpectedly");
                };
                match event.event_type {
                    WatchEventType::Create => continue,
                    WatchEventType::Delete => anyhow::bail!("target has been deleted before we could proceed"),
                    WatchEventType::Error => anyhow::bail!("watch stream failed"),
                    WatchEventType::Update => {
                        let Some(cv) = event.object else { continue };
                        match cv.state {
                            State::Success => return Ok(cv),
                            State::Failure => anyhow::bail!(cv.data.clone()),
                            _ => continue,
                        }
                    }
                }
            }
        }
        .await;
        watcher.close().await;

        let completed = result?;
        Ok(parse_cve_lines(&completed.data))
    }

    /// Execute a single [`HostOperation`] whose state is `Started`.
    async fn handle_op(&self, mut op: HostOperation) {
        if op.state != State::Started {
            return;
        }
        if op.namespace().is_empty() {
            tracing::warn!(command = %op.command, "abort to perform command: no assigned host");
            op.state = State::Abort;
            let _ = self.ops.update(&mut op).await;
            return;
        }
        if op.r#type == OperationType::Unknown || op.method == OperationMethod::Unknown {
            tracing::warn!(command = %op.command, host = op.namespace(), "abort to perform command: no assigned type or method");
            op.state = State::Abort;
            let _ = self.ops.update(&mut op).await;
            return;
        }

        let mut host = Host::new();
        host.set_name(op.namespace().to_owned());
        if let Err(err) = self.hosts.get(&mut host).await {
            tracing::error!(command = %op.command, host = op.namespace(), error = %err, "could not perform command: storage error");
            op.state = State::Abort;
            let _ = self.ops.update(&mut op).await;
            return;
        }

        op.state = State::InProgress;
        if let Err(err) = self.ops.update(&mut op).await {
            tracing::error!(host = host.name(), error = %err, "could not refresh operation state");
            op.state = State::Failure;
            op.data = err.to_string();
            let _ = self.ops.update(&mut op).await;
            return;
        }

        match self.run_op(&host, &op).await {
            Ok(data) => {
                op.data = data;
                op.state = State::Success;
            }
            Err(err) => {
                tracing::error!(command = %op.command, host = host.name(), error = %err, "failed to perform command");
                op.data = err.to_string();
                op.state = State::Failure;
            }
        }

        if let Err(err) = self.ops.update(&mut op).await {
            tracing::error!(error = %err, "could not store execution result");
        }
    }

    async fn run_op(&self, host: &Host, op: &HostOperation) -> anyhow::Result<String> {
        let conn = Conn::connect(&host.ssh_addr, host.ssh_port, &host.ssh_cred.user, &host.ssh_cred.password)
            .await
            .context("connecting to host")?;
        let result = self.run_op_on_conn(&conn, host, op).await;
        let _ = conn.close().await;
        result
    }

    async fn run_op_on_conn(&self, conn: &Conn, host: &Host, op: &HostOperation) -> anyhow::Result<String> {
        if !host.op_cred.user.is_empty() {
            conn.su(&host.op_cred.user, &host.op_cred.password, timeout_opt(op.timeout))
                .await
                .context("elevating privilege")?;
        }
        let data = match op.method {
            OperationMethod::Run => {
                conn.run(&op.command, timeout_opt(op.timeout)).await?;
                String::new()
            }
            OperationMethod::Output => {
                String::from_utf8_lossy(&conn.output(&op.command, timeout_opt(op.timeout)).await?).into_owned()
            }
            OperationMethod::CombinedOutput => {
                String::from_utf8_lossy(&conn.combined_output(&op.command, timeout_opt(op.timeout)).await?).into_owned()
            }
            OperationMethod::Unknown => unreachable!("validated by handle_op before dispatch"),
        };
        Ok(data)
    }
}

fn timeout_opt(timeout: u64) -> Option<u64> {
    if timeout == 0 {
        None
    } else {
        Some(timeout)
    }
}

fn parse_cve_lines(data: &str) -> Vec<SecurityUpdate> {
    let mut out = Vec::new();
    for raw_line in data.lines() {
        let line = raw_line.trim();
        if !line.starts_with("CVE-") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            continue;
        }
        let severity = match fields[1] {
            "Critical/Sec." => SecuritySeverity::Critical,
            "Important/Sec." => SecuritySeverity::Important,
            "Moderate/Sec." => SecuritySeverity::Moderate,
            _ => SecuritySeverity::Unknown,
        };
        out.push(SecurityUpdate {
            cve_id: fields[0].to_owned(),
            severity,
            package: fields[2].to_owned(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_cve_lines() {
        let data = "Last metadata expiration check\nCVE-2020-1234 Critical/Sec.  openssl-1.0.1e-57.x86_64\nCVE-2021-5678 Moderate/Sec.  bash-4.2.46\nnot a cve line\n";
        let parsed = parse_cve_lines(data);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].cve_id, "CVE-2020-1234");
        assert_eq!(parsed[0].severity, SecuritySeverity::Critical);
        assert_eq!(parsed[0].package, "openssl-1.0.1e-57.x86_64");
        assert_eq!(parsed[1].severity, SecuritySeverity::Moderate);
    }

    #[test]
    fn ignores_malformed_cve_lines() {
        let data = "CVE-2020-1234 only-two-fields\nCVE-2020-5678 one two three four\n";
        assert!(parse_cve_lines(data).is_empty());
    }

    #[test]
    fn unrecognized_severity_still_records_update() {
        let data = "CVE-2020-9999 Unknown/Sec.  glibc-2.17\n";
        let parsed = parse_cve_lines(data);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].severity, SecuritySeverity::Unknown);
    }
}
