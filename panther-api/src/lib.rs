//! Axum-based HTTP/WebSocket bridge: REST host CRUD, the scan/cmd WebSocket
//! streams, and the static front-end asset tree. This crate converts
//! requests into store operations and streams watch events back; it does
//! not reimplement any of the orchestration logic in `panther-runtime`.
use std::path::Path;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use panther_core::{Host, HostOperation, Store, SystemScan};

pub mod cache;
pub mod error;
pub mod exec;
pub mod host;

/// Build the full application router: host CRUD, the exec WebSocket bridge,
/// and a static asset fallback rooted at `www_root`.
pub fn build_router(hosts: Store<Host>, scans: Store<SystemScan>, ops: Store<HostOperation>, www_root: impl AsRef<Path>) -> Router {
    let www_root = www_root.as_ref();
    let static_service = ServeDir::new(www_root)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(www_root.join("index.html")));

    Router::new()
        .merge(host::router(hosts.clone()))
        .merge(exec::router(hosts, scans, ops))
        .fallback_service(static_service)
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(TraceLayer::new_for_http())
}
