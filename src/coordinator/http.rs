//! Public HTTP API of the coordinator

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{parse_duration, ConsistencyLevel, Error, NodeId, NodeState, Operation};
use crate::coordinator::broadcast::AggregateBroadcastResult;
use crate::coordinator::metadata::CollectionSpec;
use crate::coordinator::service::{BroadcastRequest, Coordinator, OperationRequest, WriteResponse};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Shared coordinator state for HTTP handlers.
#[derive(Clone)]
pub struct CoordState {
    pub coordinator: Arc<Coordinator>,
}

/// Error rendered as `{"error": {"type", "reason"}, "status"}`
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.to_http_status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        (
            status,
            Json(json!({
                "error": {
                    "type": self.0.type_name(),
                    "reason": self.0.to_string(),
                },
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Query parameters of single-key endpoints
#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    routing: Option<String>,
    consistency: Option<String>,
    timeout: Option<String>,
    version: Option<u64>,
    version_type: Option<String>,
}

impl WriteParams {
    fn into_request(self, mut request: OperationRequest) -> crate::Result<OperationRequest> {
        request.routing = self.routing;
        if let Some(consistency) = self.consistency {
            request.consistency = consistency.parse()?;
        }
        if let Some(timeout) = self.timeout {
            request.timeout = Some(parse_duration(&timeout)?);
        }
        request.version = self.version;
        if let Some(version_type) = self.version_type {
            request.version_type = version_type.parse()?;
        }
        Ok(request)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BroadcastParams {
    consistency: Option<String>,
    timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    partitions: Option<u32>,
    replicas: Option<usize>,
    #[serde(default)]
    routing_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct NodeStateBody {
    state: String,
}

fn write_body(response: &WriteResponse) -> serde_json::Value {
    json!({
        "_index": response.collection,
        "_id": response.id,
        "_version": response.location.version,
        "_seq_no": response.location.seq_no,
        "_primary": response.location.node,
        "_shard": response.location.partition.shard,
        "result": response.location.result.as_str(),
        "_shards": response.shards,
    })
}

fn broadcast_body(result: &AggregateBroadcastResult) -> serde_json::Value {
    json!({ "_shards": result })
}

async fn create_collection(
    State(state): State<CoordState>,
    Path(collection): Path<String>,
    Query(params): Query<CreateParams>,
) -> ApiResult<impl IntoResponse> {
    let coordinator = &state.coordinator;
    let spec = CollectionSpec::new(
        collection,
        params
            .partitions
            .unwrap_or_else(|| coordinator.default_partitions()),
        params.replicas.unwrap_or_else(|| coordinator.default_replicas()),
    )
    .with_routing_required(params.routing_required);

    let metadata = coordinator.create_collection(spec).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "acknowledged": true,
            "collection": metadata.name,
            "partitions": metadata.partitions,
            "replicas": metadata.replicas,
            "routing_required": metadata.routing_required,
        })),
    ))
}

async fn index_document(
    State(state): State<CoordState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<WriteParams>,
    Json(source): Json<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    if !source.is_object() {
        return Err(Error::InvalidRequest("document source must be a JSON object".into()).into());
    }
    let request = params.into_request(OperationRequest::new(
        collection,
        id,
        Operation::Index { source },
    ))?;

    let response = state.coordinator.single_key_mutate(request).await?;
    let status = match response.location.result {
        crate::common::ApplyResult::Created => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(write_body(&response))))
}

async fn delete_document(
    State(state): State<CoordState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<WriteParams>,
) -> ApiResult<impl IntoResponse> {
    let request = params.into_request(OperationRequest::delete(collection, id))?;
    let response = state.coordinator.single_key_mutate(request).await?;
    let status = match response.location.result {
        crate::common::ApplyResult::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    Ok((status, Json(write_body(&response))))
}

async fn rebuild_collection(
    State(state): State<CoordState>,
    Path(collection): Path<String>,
    Query(params): Query<BroadcastParams>,
) -> ApiResult<impl IntoResponse> {
    let mut request = BroadcastRequest::rebuild(collection);
    if let Some(consistency) = params.consistency {
        request.consistency = consistency.parse::<ConsistencyLevel>()?;
    }
    if let Some(timeout) = params.timeout {
        request.timeout = Some(parse_duration(&timeout)?);
    }

    // Partition failures are reported in the body, never as an error status
    let result = state.coordinator.broadcast(request).await?;
    Ok((StatusCode::OK, Json(broadcast_body(&result))))
}

async fn admin_topology(State(state): State<CoordState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.coordinator.topology().await?;
    Ok(Json(json!({
        "version": snapshot.version,
        "collections": snapshot.collections,
    })))
}

async fn admin_collections(State(state): State<CoordState>) -> ApiResult<impl IntoResponse> {
    let collections = state.coordinator.collections().await?;
    Ok(Json(json!({ "collections": collections })))
}

async fn admin_node_state(
    State(state): State<CoordState>,
    Path(node): Path<String>,
    Json(body): Json<NodeStateBody>,
) -> ApiResult<impl IntoResponse> {
    let new_state: NodeState = body.state.parse()?;
    let node = NodeId::new(node);
    state.coordinator.set_node_state(&node, new_state).await?;
    Ok(Json(json!({ "node": node, "state": new_state })))
}

async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    match state.coordinator.topology().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "topology_version": snapshot.version,
                "collections": snapshot.collections.len(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "reason": e.to_string() })),
        ),
    }
}

/// Liveness probe: answers as long as the process serves requests
async fn health_live() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": crate::common::timestamp_now_millis(),
        })),
    )
}

async fn metrics(State(state): State<CoordState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.coordinator.metrics().to_prometheus(),
    )
}

/// Creates the HTTP router with all public endpoints.
pub fn create_router(state: CoordState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/health/live", axum::routing::get(health_live))
        .route("/metrics", axum::routing::get(metrics))
        .route("/admin/topology", axum::routing::get(admin_topology))
        .route("/admin/collections", axum::routing::get(admin_collections))
        .route(
            "/admin/nodes/:node/state",
            axum::routing::post(admin_node_state),
        )
        .route("/:collection", axum::routing::put(create_collection))
        .route(
            "/:collection/_doc/:id",
            axum::routing::put(index_document).delete(delete_document),
        )
        .route(
            "/:collection/_rebuild",
            axum::routing::post(rebuild_collection),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}
