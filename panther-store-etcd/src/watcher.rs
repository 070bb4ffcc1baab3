//! Turns etcd's raw put/delete watch stream into panther's typed [`WatchEvent`]s.
use async_trait::async_trait;
use etcd_client::{Client, EventType, WatchOptions};
use panther_core::{WatchEvent, WatchEventType};
use tokio::sync::mpsc;

const WATCH_CHAN_SIZE: usize = panther_core::store::DEFAULT_WATCH_CHAN_SIZE;

/// A [`panther_core::Watcher`] backed by a single etcd watch stream.
pub struct EtcdWatcher {
    rx: mpsc::Receiver<WatchEvent>,
    cancel: Option<etcd_client::Watcher>,
}

impl EtcdWatcher {
    pub(crate) async fn open(
        mut client: Client,
        key: String,
        prefix: String,
        is_prefix: bool,
    ) -> anyhow::Result<Self> {
        let mut opts = WatchOptions::new().with_prev_key().with_progress_notify();
        if is_prefix {
            opts = opts.with_prefix();
        }
        let (watcher, mut stream) = client.watch(key, Some(opts)).await?;

        let (tx, rx) = mpsc::channel(WATCH_CHAN_SIZE);
        tokio::spawn(async move {
            loop {
                match stream.message().await {
                    Ok(Some(resp)) => {
                        if resp.events().is_empty() {
                            // Server-side progress notification; not a real change.
                            continue;
                        }
                        for event in resp.events() {
                            let Some(kv) = event.kv() else { continue };
                            let key = strip_prefix(kv.key(), &prefix);
                            let event_type = match event.event_type() {
                                EventType::Put => {
                                    if kv.create_revision() == kv.mod_revision() {
                                        WatchEventType::Create
                                    } else {
                                        WatchEventType::Update
                                    }
                                }
                                EventType::Delete => WatchEventType::Delete,
                            };
                            let value = match event.event_type() {
                                EventType::Delete => event
                                    .prev_kv()
                                    .map(|p| p.value().to_vec())
                                    .unwrap_or_default(),
                                EventType::Put => kv.value().to_vec(),
                            };
                            if tx
                                .send(WatchEvent {
                                    event_type,
                                    key,
                                    value,
                                })
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        let _ = tx
                            .send(WatchEvent {
                                event_type: WatchEventType::Error,
                                key: String::new(),
                                value: Vec::new(),
                            })
                            .await;
                        return;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "etcd watch stream failed");
                        let _ = tx
                            .send(WatchEvent {
                                event_type: WatchEventType::Error,
                                key: String::new(),
                                value: Vec::new(),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(EtcdWatcher {
            rx,
            cancel: Some(watcher),
        })
    }
}

fn strip_prefix(raw_key: &[u8], prefix: &str) -> String {
    let s = String::from_utf8_lossy(raw_key);
    s.strip_prefix(prefix).unwrap_or(&s).to_string()
}

#[async_trait]
impl panther_core::Watcher for EtcdWatcher {
    async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        if let Some(mut w) = self.cancel.take() {
            let _ = w.cancel().await;
        }
        self.rx.close();
    }
}
