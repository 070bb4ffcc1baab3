//! `/api/v1/exec` — the scan and cmd WebSocket bridges.
//!
//! `mode=scan` streams [`SystemScan`] snapshots for a watched set of hosts
//! (or every host, for `watch=*`) and accepts client-issued rescan orders.
//! `mode=cmd` accepts one order of commands, creates the corresponding
//! [`HostOperation`]s, and streams each until every targeted operation
//! reaches a terminal state.
use std::collections::HashMap;

use anyhow::Context;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State as StateExtractor};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use panther_core::{
    Host, HostOperation, ObjectExt, OperationMethod, OperationType, State as RecordState, Store, SystemScan,
    WatchEventType, WatchOption,
};

use crate::cache::WatchCache;

/// Normal closure: the session ran to completion.
const CLOSE_NORMAL: u16 = 1000;
/// Unsupported data: the client sent something we can't act on.
const CLOSE_UNSUPPORTED: u16 = 1003;
/// Internal error: something failed on our side.
const CLOSE_INTERNAL: u16 = 1011;

#[derive(Clone)]
struct ExecState {
    hosts: Store<Host>,
    scans: Store<SystemScan>,
    ops: Store<HostOperation>,
}

/// Build the `/api/v1/exec` router over the given stores.
pub fn router(hosts: Store<Host>, scans: Store<SystemScan>, ops: Store<HostOperation>) -> Router {
    Router::new()
        .route("/api/v1/exec", get(handler))
        .with_state(ExecState { hosts, scans, ops })
}

#[derive(Deserialize)]
struct ExecQuery {
    mode: Option<String>,
    watch: Option<String>,
}

#[derive(Deserialize)]
struct WsOrderRequest {
    #[serde(default)]
    commands: Vec<WsCommand>,
}

#[derive(Deserialize, Clone)]
struct WsCommand {
    #[serde(default)]
    command: String,
    #[serde(default)]
    target: String,
}

async fn handler(
    ws: WebSocketUpgrade,
    StateExtractor(state): StateExtractor<ExecState>,
    Query(q): Query<ExecQuery>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        match q.mode.as_deref() {
            Some("scan") => {
                let watch = q.watch.unwrap_or_default();
                if let Err(err) = run_scan_session(socket, state, &watch).await {
                    tracing::error!(error = %err, "scan session ended with an error");
                }
            }
            Some("cmd") => {
                if let Err(err) = run_cmd_session(socket, state).await {
                    tracing::error!(error = %err, "cmd session ended with an error");
                }
            }
            Some(_) => {
                let mut socket = socket;
                close_with(&mut socket, CLOSE_UNSUPPORTED, "no such channel").await;
            }
            None => {
                let mut socket = socket;
                close_with(&mut socket, CLOSE_UNSUPPORTED, "invalid mode").await;
            }
        }
    })
}

async fn run_scan_session(mut socket: WebSocket, state: ExecState, watch_param: &str) -> anyhow::Result<()> {
    let targets: Vec<&str> = watch_param.split(',').collect();
    if targets.len() == 1 && targets[0].is_empty() {
        close_with(&mut socket, CLOSE_UNSUPPORTED, "target required").await;
        return Ok(());
    }
    let loose = targets.iter().any(|t| *t == "*");
    let cache = WatchCache::<SystemScan>::new(loose);

    let mut watcher = state
        .scans
        .watch(&SystemScan::new(), WatchOption::OnKind)
        .await
        .context("opening scan watch")?;

    let mut initial = Vec::new();
    if loose {
        let list = state.scans.list(None).await.context("listing scans")?;
        for scan in list {
            cache.set(scan.name().to_owned(), scan.clone()).await;
            initial.push(scan);
        }
    } else {
        for name in &targets {
            let mut scan = SystemScan::new();
            scan.set_name((*name).to_owned());
            match state.scans.get(&mut scan).await {
                Ok(()) => {
                    cache.set(scan.name().to_owned(), scan.clone()).await;
                    initial.push(scan);
                }
                Err(err) if err.is_internal() => {
                    watcher.close().await;
                    return Err(err.into());
                }
                Err(_) => continue,
            }
        }
    }
    if send_json(&mut socket, &initial).await.is_err() {
        watcher.close().await;
        return Ok(());
    }

    loop {
        tokio::select! {
            event = watcher.next() => {
                let Some(event) = event else { break };
                if event.event_type == WatchEventType::Error {
                    break;
                }
                let Some(scan) = event.object else { continue };
                if !cache.check(scan.name()).await {
                    continue;
                }
                match event.event_type {
                    WatchEventType::Create | WatchEventType::Update => cache.set(scan.name().to_owned(), scan).await,
                    WatchEventType::Delete => { cache.pop(scan.name()).await; }
                    WatchEventType::Error => unreachable!("handled above"),
                }
                let snapshot = cache.flush().await;
                if send_json(&mut socket, &snapshot).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_rescan_order(&state, &cache, &text).await,
                    Some(Ok(Message::Binary(_))) => tracing::warn!("ignored unsupported binary message"),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "error reading from websocket");
                        break;
                    }
                }
            }
        }
    }
    watcher.close().await;
    Ok(())
}

async fn handle_rescan_order(state: &ExecState, cache: &WatchCache<SystemScan>, text: &str) {
    let order: WsOrderRequest = match serde_json::from_str(text) {
        Ok(order) => order,
        Err(err) => {
            tracing::warn!(error = %err, "ignored invalid order message");
            return;
        }
    };
    for cmd in order.commands {
        let Some(mut scan) = cache.get(&cmd.target).await else { continue };
        if matches!(scan.state, RecordState::Success | RecordState::Failure) {
            scan.state = RecordState::Started;
            if let Err(err) = state.scans.update(&mut scan).await {
                tracing::error!(host = %cmd.target, error = %err, "could not start rescanning host");
            }
        }
    }
}

async fn run_cmd_session(mut socket: WebSocket, state: ExecState) -> anyhow::Result<()> {
    let text = match socket.recv().await {
        Some(Ok(Message::Text(text))) => text,
        Some(Ok(Message::Binary(_))) => {
            close_with(&mut socket, CLOSE_UNSUPPORTED, "unsupported binary data").await;
            return Ok(());
        }
        _ => return Ok(()),
    };
    let order: WsOrderRequest = serde_json::from_str(&text).context("decoding order")?;

    let mut commands: HashMap<String, WsCommand> = HashMap::new();
    for cmd in &order.commands {
        let mut host = Host::new();
        host.set_name(cmd.target.clone());
        match state.hosts.get(&mut host).await {
            Ok(()) => {
                commands.insert(host.name().to_owned(), cmd.clone());
            }
            Err(err) if err.is_internal() => {
                close_with(&mut socket, CLOSE_INTERNAL, "internal server error").await;
                return Err(err.into());
            }
            Err(_) => tracing::warn!(target = %cmd.target, "abort request: no such host"),
        }
    }

    let mut watcher = state
        .ops
        .watch(&HostOperation::new(), WatchOption::OnKind)
        .await
        .context("opening operation watch")?;
    let cache = WatchCache::<HostOperation>::new(false);

    for (name, cmd) in &commands {
        let mut op = HostOperation::new();
        op.set_guid(Uuid::new_v4().to_string());
        op.set_name(op.guid().to_owned());
        op.set_namespace(name.clone());
        op.r#type = OperationType::User;
        op.command = cmd.command.clone();
        op.method = OperationMethod::CombinedOutput;
        op.state = RecordState::Started;
        if let Err(err) = state.ops.create(&mut op).await {
            watcher.close().await;
            return Err(err.into());
        }
        cache.set(op.name().to_owned(), op).await;
    }

    let mut finished = 0usize;
    while finished < commands.len() {
        let Some(event) = watcher.next().await else { break };
        if event.event_type == WatchEventType::Error {
            break;
        }
        let Some(cv) = event.object else { continue };
        if cache.get(cv.name()).await.is_none() {
            continue;
        }
        cache.set(cv.name().to_owned(), cv.clone()).await;
        if send_json(&mut socket, &cv).await.is_err() {
            break;
        }
        if matches!(cv.state, RecordState::Success | RecordState::Failure) {
            finished += 1;
        }
    }
    watcher.close().await;

    // We still tell the client we are exiting either way, for extra
    // stability assurance.
    if commands.len() != order.commands.len() {
        close_with(
            &mut socket,
            CLOSE_NORMAL,
            "order was partially performed, which may be caused by invalid data",
        )
        .await;
    } else {
        close_with(&mut socket, CLOSE_NORMAL, "completed").await;
    }
    Ok(())
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).expect("response types are always serializable");
    socket.send(Message::Text(text.into())).await
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_owned().into(),
        })))
        .await;
}
