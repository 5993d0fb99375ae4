//! Read-only introspection HTTP surface.
//!
//! - `GET /health`
//! - `GET /identity`
//! - `GET /latest` (alias `/manifest`)
//! - `GET /latest/{owner_key}/{stream_name}`

use std::io;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::scheduler::LatestManifests;
use crate::signing::SigningIdentity;

/// Public signing identity as reported over HTTP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub public_key: String,
    pub key_source: &'static str,
}

impl From<&SigningIdentity> for IdentityView {
    fn from(identity: &SigningIdentity) -> Self {
        Self {
            public_key: identity.public_key_hex().to_string(),
            key_source: identity.source().as_str(),
        }
    }
}

#[derive(Clone)]
pub struct IntrospectState {
    identity: Arc<IdentityView>,
    latest: watch::Receiver<LatestManifests>,
}

impl IntrospectState {
    pub fn new(identity: IdentityView, latest: watch::Receiver<LatestManifests>) -> Self {
        Self {
            identity: Arc::new(identity),
            latest,
        }
    }
}

pub fn router(state: IntrospectState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/identity", get(identity))
        .route("/latest", get(latest))
        .route("/manifest", get(latest))
        .route("/latest/{owner_key}/{stream_name}", get(latest_for_stream))
        .with_state(state)
}

/// Serve until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: IntrospectState,
    cancel: CancellationToken,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "introspection server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn health(State(state): State<IntrospectState>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "publicKey": state.identity.public_key,
        "keySource": state.identity.key_source,
    }))
}

async fn identity(State(state): State<IntrospectState>) -> Json<IdentityView> {
    Json(state.identity.as_ref().clone())
}

async fn latest(State(state): State<IntrospectState>) -> Response {
    let manifest = state.latest.borrow().latest().cloned();
    match manifest {
        Some(manifest) => Json(manifest).into_response(),
        None => not_found("no manifest published yet"),
    }
}

async fn latest_for_stream(
    State(state): State<IntrospectState>,
    Path((owner_key, stream_name)): Path<(String, String)>,
) -> Response {
    let manifest = state
        .latest
        .borrow()
        .for_stream(&owner_key, &stream_name)
        .cloned();
    match manifest {
        Some(manifest) => Json(manifest).into_response(),
        None => not_found("no manifest published for this stream"),
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_protocol::{Epoch, ManifestPayload, SegmentEntry, SignedManifest, StreamIdentity};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::num::NonZeroU64;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn state() -> (IntrospectState, String) {
        let identity = SigningIdentity::ephemeral();
        let public_key = identity.public_key_hex().to_string();
        let (_tx, rx) = watch::channel(LatestManifests::default());
        (IntrospectState::new(IdentityView::from(&identity), rx), public_key)
    }

    #[tokio::test]
    async fn test_health_and_identity() {
        let (state, public_key) = state();

        let (status, body) = get_json(router(state.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["publicKey"], public_key.as_str());
        assert_eq!(body["keySource"], "ephemeral");

        let (status, body) = get_json(router(state), "/identity").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["publicKey"], public_key.as_str());
    }

    #[tokio::test]
    async fn test_latest_serves_published_manifest() {
        let identity = SigningIdentity::ephemeral();
        let (tx, rx) = watch::channel(LatestManifests::default());
        let state = IntrospectState::new(IdentityView::from(&identity), rx);

        let owner = identity.public_key_hex().to_string();
        let stream = StreamIdentity::new(&owner, "show").unwrap();
        let payload = ManifestPayload::new(
            &stream,
            "index",
            Epoch::containing(25_000, NonZeroU64::new(12_000).unwrap()),
            vec![SegmentEntry::from_bytes("seg1.ts", b"one")],
            None,
        );
        let manifest = SignedManifest::seal(payload, 25, &identity).unwrap();
        tx.send_modify(|view| view.record(manifest.clone()));

        let (status, body) = get_json(router(state.clone()), "/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], manifest.id.as_str());
        assert_eq!(body["kind"], 30313);

        let uri = format!("/latest/{owner}/show");
        let (status, body) = get_json(router(state.clone()), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(SignedManifest::from_json(&body.to_string()).unwrap(), manifest);

        let (status, _) = get_json(router(state), &format!("/latest/{owner}/other")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_latest_is_404_when_empty() {
        let (state, _) = state();

        for uri in ["/latest", "/manifest", "/latest/abc/show"] {
            let (status, body) = get_json(router(state.clone()), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body["error"].is_string());
        }
    }
}
