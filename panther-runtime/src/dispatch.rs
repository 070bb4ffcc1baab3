//! The scheduler/dispatcher: watches every kind for changes, fires a cron
//! tick, and turns both into [`Job`]s for the worker pool. It performs no
//! orchestration logic itself — only translation from storage events to work.
use std::time::Duration;

use tokio::sync::watch;

use panther_core::{Host, HostOperation, Store, SystemScan, WatchEventType, WatchOption};

use crate::pool::{Job, Pool};
use crate::schedule::Cron;

/// Fallback re-arm interval used whenever the cron schedule has no next
/// occurrence (an exhausted one-shot expression).
const REVALIDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Ties the three kind watchers and the cron timer to the worker [`Pool`].
pub struct Dispatcher {
    hosts: Store<Host>,
    scans: Store<SystemScan>,
    ops: Store<HostOperation>,
    pool: Pool,
    cron: Cron,
}

impl Dispatcher {
    /// Build a dispatcher over the given typed stores, worker pool and cron
    /// schedule.
    pub fn new(hosts: Store<Host>, scans: Store<SystemScan>, ops: Store<HostOperation>, pool: Pool, cron: Cron) -> Self {
        Dispatcher { hosts, scans, ops, pool, cron }
    }

    /// Run the event loop until a watch stream errors or `shutdown` signals
    /// `true`. Closes every watcher and drains the worker pool before
    /// returning.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut host_watch = self.hosts.watch(&Host::new(), WatchOption::OnKind).await?;
        let mut scan_watch = self.scans.watch(&SystemScan::new(), WatchOption::OnKind).await?;
        let mut op_watch = self.ops.watch(&HostOperation::new(), WatchOption::OnKind).await?;

        let sender = self.pool.sender();
        let first_delay = self.cron.next().unwrap_or(REVALIDATE_INTERVAL);
        let sleep = tokio::time::sleep(first_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                maybe = host_watch.next() => {
                    match maybe {
                        Some(event) => {
                            match event.event_type {
                                WatchEventType::Create | WatchEventType::Update => {
                                    if let Some(host) = event.object {
                                        let sender = sender.clone();
                                        tokio::spawn(async move { sender.send(Job::Host { host, gc: false }).await });
                                    }
                                }
                                WatchEventType::Delete => {
                                    if let Some(host) = event.object {
                                        let sender = sender.clone();
                                        tokio::spawn(async move { sender.send(Job::Host { host, gc: true }).await });
                                    }
                                }
                                WatchEventType::Error => {
                                    tracing::error!("host watch failed, shutting down dispatcher");
                                    break;
                                }
                            }
                        }
                        None => break,
                    }
                }
                maybe = scan_watch.next() => {
                    match maybe {
                        Some(event) => {
                            match event.event_type {
                                WatchEventType::Create | WatchEventType::Update => {
                                    if let Some(scan) = event.object {
                                        let sender = sender.clone();
                                        tokio::spawn(async move { sender.send(Job::Scan(scan)).await });
                                    }
                                }
                                WatchEventType::Error => {
                                    tracing::error!("scan watch failed, shutting down dispatcher");
                                    break;
                                }
                                WatchEventType::Delete => {}
                            }
                        }
                        None => break,
                    }
                }
                maybe = op_watch.next() => {
                    match maybe {
                        Some(event) => {
                            match event.event_type {
                                WatchEventType::Create => {
                                    if let Some(op) = event.object {
                                        let sender = sender.clone();
                                        tokio::spawn(async move { sender.send(Job::Op(op)).await });
                                    }
                                }
                                WatchEventType::Error => {
                                    tracing::error!("operation watch failed, shutting down dispatcher");
                                    break;
                                }
                                WatchEventType::Update | WatchEventType::Delete => {}
                            }
                        }
                        None => break,
                    }
                }
                _ = &mut sleep => {
                    match self.cron.next() {
                        Some(next) => {
                            sleep.as_mut().reset(tokio::time::Instant::now() + next);
                            self.scan_all_hosts(&sender).await;
                        }
                        None => {
                            sleep.as_mut().reset(tokio::time::Instant::now() + REVALIDATE_INTERVAL);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        host_watch.close().await;
        scan_watch.close().await;
        op_watch.close().await;
        self.pool.close().await;
        Ok(())
    }

    /// List every host and enqueue a host-event job per member, re-entering
    /// [`crate::handlers::Handlers`]'s host handler to CAS each scan back to
    /// `Started`.
    async fn scan_all_hosts(&self, sender: &crate::pool::JobSender) {
        match self.hosts.list(None).await {
            Ok(list) => {
                for host in list {
                    sender.send(Job::Host { host, gc: false }).await;
                }
            }
            Err(err) => tracing::error!(error = %err, "could not retrieve host list from storage"),
        }
    }
}
