//! `/api/v1/host` — REST CRUD over [`Host`] records.
use std::net::IpAddr;
use std::str::FromStr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use panther_core::sort::{sort_by, SortScope};
use panther_core::{Host, ObjectExt, Store};

use crate::error::ApiError;

/// Build the `/api/v1/host` resource router over `store`.
pub fn router(store: Store<Host>) -> Router {
    Router::new()
        .route("/api/v1/host", get(list).post(create).put(update).delete(remove))
        .with_state(store)
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

/// `GET /api/v1/host?search=name1,name2` or `search=*` for every host.
async fn list(State(store): State<Store<Host>>, Query(q): Query<SearchQuery>) -> Result<Json<Vec<Host>>, ApiError> {
    let search = q.search.unwrap_or_default();
    let targets: Vec<&str> = search.split(',').collect();
    if targets.len() == 1 && targets[0].is_empty() {
        return Err(ApiError::BadRequest("target required".into()));
    }
    let all = targets.iter().any(|t| *t == "*");
    let mut hosts = if all {
        store.list(None).await?.items
    } else {
        let mut out = Vec::with_capacity(targets.len());
        for name in targets {
            let mut host = Host::new();
            host.set_name(name.to_owned());
            store.get(&mut host).await?;
            out.push(host);
        }
        out
    };
    sort_by(&mut hosts, SortScope::Name);
    Ok(Json(hosts))
}

/// `POST /api/v1/host` — create a host.
async fn create(
    State(store): State<Store<Host>>,
    Json(mut host): Json<Host>,
) -> Result<(StatusCode, Json<Host>), ApiError> {
    validate_and_fulfill(&mut host)?;
    store.create(&mut host).await?;
    Ok((StatusCode::CREATED, Json(host)))
}

/// `PUT /api/v1/host` — update a host.
async fn update(State(store): State<Store<Host>>, Json(mut host): Json<Host>) -> Result<Json<Host>, ApiError> {
    validate_and_fulfill(&mut host)?;
    store.update(&mut host).await?;
    Ok(Json(host))
}

#[derive(Deserialize)]
struct DeleteQuery {
    target: Option<String>,
}

/// `DELETE /api/v1/host?target=name` — delete a host.
async fn remove(State(store): State<Store<Host>>, Query(q): Query<DeleteQuery>) -> Result<StatusCode, ApiError> {
    let target = q
        .target
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("target required".into()))?;
    let mut host = Host::new();
    host.set_name(target);
    store.delete(&host).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_and_fulfill(host: &mut Host) -> Result<(), ApiError> {
    if IpAddr::from_str(&host.ssh_addr).is_err() {
        return Err(ApiError::BadRequest(format!("invalid IP address: {}", host.ssh_addr)));
    }
    if host.ssh_port == 0 {
        host.ssh_port = 22;
    }
    if host.ssh_cred.user.is_empty() || host.ssh_cred.password.is_empty() {
        return Err(ApiError::BadRequest("invalid SSH authentication credential".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparsable_address() {
        let mut host = Host::new();
        host.ssh_addr = "not-an-ip".into();
        host.ssh_cred.user = "root".into();
        host.ssh_cred.password = "hunter2".into();
        assert!(validate_and_fulfill(&mut host).is_err());
    }

    #[test]
    fn defaults_ssh_port() {
        let mut host = Host::new();
        host.ssh_addr = "10.0.0.5".into();
        host.ssh_port = 0;
        host.ssh_cred.user = "root".into();
        host.ssh_cred.password = "hunter2".into();
        validate_and_fulfill(&mut host).unwrap();
        assert_eq!(host.ssh_port, 22);
    }

    #[test]
    fn rejects_missing_credential() {
        let mut host = Host::new();
        host.ssh_addr = "10.0.0.5".into();
        assert!(validate_and_fulfill(&mut host).is_err());
    }
}
