//! Internal HTTP API of a node

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, WriteLocation};
use crate::coordinator::executor::{ApplyEnvelope, RemoteError};
use crate::node::engine::DocumentStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

#[derive(Clone)]
pub struct NodeHttpState {
    pub store: Arc<DocumentStore>,
}

/// Error as sent back to the coordinator's `HttpExecutor`
struct ApplyError(Error);

impl IntoResponse for ApplyError {
    fn into_response(self) -> Response {
        let body = RemoteError {
            kind: self.0.failure_kind(),
            reason: self.0.to_string(),
        };
        (self.0.to_http_status(), Json(body)).into_response()
    }
}

async fn apply(
    State(state): State<NodeHttpState>,
    Json(envelope): Json<ApplyEnvelope>,
) -> Result<Json<WriteLocation>, ApplyError> {
    if &envelope.copy.node != state.store.node() {
        return Err(ApplyError(Error::ShardNotFound(format!(
            "{} is not hosted on {}",
            envelope.copy.partition,
            state.store.node()
        ))));
    }
    if envelope.copy.partition != envelope.request.partition {
        return Err(ApplyError(Error::InvalidRequest(format!(
            "copy of {} received a request for {}",
            envelope.copy.partition, envelope.request.partition
        ))));
    }

    tracing::debug!(
        "{} {} on {} ({:?})",
        envelope.request.operation.name(),
        envelope.request.partition,
        state.store.node(),
        envelope.copy.role
    );
    state.store.apply(&envelope.request).map(Json).map_err(ApplyError)
}

async fn health(State(state): State<NodeHttpState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "node": state.store.node(),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

pub fn create_router(state: NodeHttpState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/_internal/apply", axum::routing::post(apply))
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}
