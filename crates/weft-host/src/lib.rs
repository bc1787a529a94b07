//! HTTP adapter: exposes registered invokables as `POST /invoke/:name`
//! endpoints over one store binding per adapter instance.
//!
//! Request bodies are JSON decoding to the invokable's declared input
//! type; outputs come back as JSON. Raised resources surface as error
//! bodies carrying their packed form.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use weft_engine::{ensure_builtins, invoke, EngineError, Invokable, Outcome};
use weft_resource::{json as wire, Resource, ResourceError};
use weft_store::Store;

/// One adapter instance: a store plus the invokables it serves by name.
#[derive(Clone)]
pub struct HostState {
    store: Store,
    invokables: Arc<HashMap<String, Box<dyn Invokable>>>,
}

/// Builder for [`HostState`].
pub struct HostBuilder {
    store: Store,
    invokables: HashMap<String, Box<dyn Invokable>>,
}

impl HostBuilder {
    pub fn new(store: Store) -> Self {
        HostBuilder {
            store,
            invokables: HashMap::new(),
        }
    }

    pub fn serve(mut self, name: impl Into<String>, invokable: Box<dyn Invokable>) -> Self {
        self.invokables.insert(name.into(), invokable);
        self
    }

    pub fn build(self) -> Result<HostState, ResourceError> {
        ensure_builtins()?;
        Ok(HostState {
            store: self.store,
            invokables: Arc::new(self.invokables),
        })
    }
}

pub fn router(state: HostState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/invoke/:name", post(invoke_endpoint))
        .with_state(state)
}

#[derive(Debug)]
enum ApiError {
    Invalid(String),
    UnknownInvokable(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        ApiError::Invalid(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::UnknownInvokable(name) => (
                StatusCode::NOT_FOUND,
                "unknown_invokable",
                format!("no invokable named '{name}'"),
            ),
            ApiError::Engine(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "engine_error",
                err.to_string(),
            ),
        };
        let body = json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn invoke_endpoint(
    State(state): State<HostState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let invokable = state
        .invokables
        .get(&name)
        .ok_or_else(|| ApiError::UnknownInvokable(name.clone()))?;

    let input_ref = match invokable.input_type() {
        Some(input_type) => {
            let fields: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|e| ApiError::Invalid(format!("request body is not JSON: {e}")))?;
            let input = wire::resource_from_json(&input_type, &fields)?;
            Some(state.store.commit_value(&input).map_err(EngineError::from)?)
        }
        None if body.is_empty() => None,
        None => {
            return Err(ApiError::Invalid(format!(
                "invokable '{name}' declares no input type; send an empty body"
            )))
        }
    };

    log::debug!("invoking '{name}'");
    let invocation = invoke(&state.store, invokable.as_ref(), input_ref.as_ref())?;
    match invocation.outcome(&state.store)? {
        Outcome::Completed(output) => Ok(Json(wire::resource_to_json(&output)?).into_response()),
        Outcome::Suspended(request) => {
            let packed = wire::resource_to_json(&request.to_value()?)?;
            Ok((
                StatusCode::CONFLICT,
                Json(json!({ "code": "input_required", "request": packed })),
            )
                .into_response())
        }
        Outcome::Failed(raised) => {
            let packed = wire::resource_to_json(&raised)?;
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "code": "invocation_failed", "error": packed })),
            )
                .into_response())
        }
    }
}
