// routes.rs — The HTTP surface and its handlers.
//
// POST /v1/actions/{plan,apply} run the lifecycle for arbitrary actions;
// the GET endpoints are conveniences that build the equivalent read
// request server-side and run plan+apply for it. The front-end is the sole
// idempotency gate: it consults the store after validation and records the
// completed response (success or error) before returning it.

use axum::body::Bytes;
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use pvw_idempotency::{Lookup, StoredResponse};
use pvw_model::{request_hash, validate, ActionRequest, ActionType, RiskLevel};
use pvw_policy::{Phase, PolicyEngine};

use crate::auth::{actor_from, require_bearer};
use crate::error::ApiError;
use crate::state::AppState;

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Build the full router for the daemon.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/environments", get(list_environments))
        .route("/v1/inventory", get(read_inventory))
        .route("/v1/tasks", get(read_tasks))
        .route("/v1/tasks/status", get(read_task_status))
        .route("/v1/vm/status", get(read_vm_status))
        .route("/v1/actions/plan", post(plan_action))
        .route("/v1/actions/apply", post(apply_action))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tag every response with an `x-request-id` for log correlation.
async fn request_id(request: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    let mut response = next.run(request).await;
    if let Ok(value) = id.to_string().parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

// ── Health and environment listing ──

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

/// What `/v1/environments` exposes per environment. The token secret (and
/// even the name of the variable holding it) stays out of the response.
#[derive(Debug, Serialize)]
struct EnvironmentSummary {
    name: String,
    base_url: String,
    token_id: String,
}

async fn list_environments(State(state): State<AppState>) -> Json<Vec<EnvironmentSummary>> {
    let environments = state
        .config
        .environments
        .iter()
        .map(|env| EnvironmentSummary {
            name: env.name.clone(),
            base_url: env.base_url.clone(),
            token_id: env.token_id.clone(),
        })
        .collect();
    Json(environments)
}

// ── Plan / apply ──

async fn plan_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    run_lifecycle(&state, &headers, &body, Phase::Plan, "/v1/actions/plan").await
}

async fn apply_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    run_lifecycle(&state, &headers, &body, Phase::Apply, "/v1/actions/apply").await
}

/// The shared lifecycle path: strict decode, actor stamping, validation,
/// idempotency gate, execution, idempotency record.
async fn run_lifecycle(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    phase: Phase,
    endpoint: &str,
) -> Result<Response, ApiError> {
    let mut req = decode_strict(body)?;
    req.actor = actor_from(headers);
    validate(&req, &state.config.environment_names())?;

    // The payload hash exists only for admitted requests; a 400 never
    // touches the idempotency store.
    let payload_hash =
        request_hash(&req).map_err(|err| ApiError::Internal(err.to_string()))?;

    let idempotency_key = idempotency_key(headers);
    if let Some(key) = &idempotency_key {
        match state.idempotency.lookup(endpoint, key, &payload_hash) {
            Lookup::Replay(stored) => return Ok(replay_response(stored)),
            Lookup::Conflict => return Err(ApiError::IdempotencyConflict),
            Lookup::Miss => {}
        }
    }

    let completed = execute_phase(state, &req, phase).await;

    if let Some(key) = &idempotency_key {
        let high_risk = phase == Phase::Apply
            && PolicyEngine::risk_profile(req.action).0 == RiskLevel::High;
        state
            .idempotency
            .record(endpoint, key, &payload_hash, &completed, high_risk);
    }

    Ok(replay_response(completed))
}

/// Run one phase to a recordable response: success and error outcomes both
/// become a `StoredResponse` so the idempotency store can replay either.
async fn execute_phase(state: &AppState, req: &ActionRequest, phase: Phase) -> StoredResponse {
    let outcome: Result<Vec<u8>, ApiError> = match phase {
        Phase::Plan => state
            .runner
            .plan(req)
            .map_err(ApiError::from)
            .and_then(|outcome| {
                serde_json::to_vec(&outcome).map_err(|err| ApiError::Internal(err.to_string()))
            }),
        Phase::Apply => match state.runner.apply(req).await {
            Ok(outcome) => {
                serde_json::to_vec(&outcome).map_err(|err| ApiError::Internal(err.to_string()))
            }
            Err(err) => Err(err.into()),
        },
    };

    match outcome {
        Ok(body) => StoredResponse {
            status: StatusCode::OK.as_u16(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            body,
        },
        Err(err) => StoredResponse {
            status: err.status().as_u16(),
            content_type: CONTENT_TYPE_TEXT.to_string(),
            body: format!("{err}\n").into_bytes(),
        },
    }
}

/// Materialize a stored (or just-completed) response byte-for-byte.
fn replay_response(stored: StoredResponse) -> Response {
    let status =
        StatusCode::from_u16(stored.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, stored.content_type)],
        stored.body,
    )
        .into_response()
}

fn decode_strict(body: &[u8]) -> Result<ActionRequest, ApiError> {
    // serde_json::from_slice rejects unknown fields (the struct demands it)
    // and trailing content after the top-level object.
    serde_json::from_slice(body).map_err(|err| ApiError::InvalidArgument(err.to_string()))
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

// ── Server-side read conveniences ──

fn default_inventory_state() -> String {
    "all".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InventoryQuery {
    environment: String,
    #[serde(default = "default_inventory_state")]
    state: String,
}

async fn read_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<InventoryQuery>,
) -> Result<Response, ApiError> {
    if query.state != "all" && query.state != "running" {
        return Err(ApiError::InvalidArgument(
            "state must be 'all' or 'running'".to_string(),
        ));
    }
    let req = ActionRequest::new(
        query.environment,
        ActionType::ReadInventory,
        format!("inventory/{}", query.state),
    );
    run_read(&state, &headers, req).await
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TasksQuery {
    environment: String,
    node: String,
    #[serde(default)]
    limit: Option<u32>,
}

async fn read_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TasksQuery>,
) -> Result<Response, ApiError> {
    let mut req = ActionRequest::new(query.environment, ActionType::ReadTasks, "task/list")
        .with_param("node", query.node.as_str());
    if let Some(limit) = query.limit {
        req = req.with_param("limit", i64::from(limit));
    }
    run_read(&state, &headers, req).await
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskStatusQuery {
    environment: String,
    node: String,
    upid: String,
}

async fn read_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TaskStatusQuery>,
) -> Result<Response, ApiError> {
    if query.upid.is_empty() {
        return Err(ApiError::InvalidArgument("upid is required".to_string()));
    }
    let req = ActionRequest::new(query.environment, ActionType::ReadTaskStatus, "task/status")
        .with_param("node", query.node.as_str())
        .with_param("upid", query.upid.as_str());
    run_read(&state, &headers, req).await
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VmStatusQuery {
    environment: String,
    node: String,
    vmid: String,
}

async fn read_vm_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<VmStatusQuery>,
) -> Result<Response, ApiError> {
    if query.vmid.is_empty() || !query.vmid.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::InvalidArgument(
            "vmid must be a decimal VM identifier".to_string(),
        ));
    }
    let req = ActionRequest::new(
        query.environment,
        ActionType::ReadVm,
        format!("vm/{}", query.vmid),
    )
    .with_param("node", query.node.as_str());
    run_read(&state, &headers, req).await
}

/// Server-side plan+apply for the GET conveniences: the same validation and
/// audit trail as a client-driven lifecycle, returning the action result.
async fn run_read(
    state: &AppState,
    headers: &HeaderMap,
    mut req: ActionRequest,
) -> Result<Response, ApiError> {
    req.actor = actor_from(headers);
    validate(&req, &state.config.environment_names())?;

    state.runner.plan(&req)?;
    let outcome = state.runner.apply(&req).await?;

    Ok((StatusCode::OK, Json(outcome.result)).into_response())
}
