//! HTTP handlers.
//!
//! - `GET  /healthz`
//! - `POST /counters/current` reads a counter
//! - `PUT  /counters` overwrites a counter
//! - `POST /counters/next` allocates the next number
//! - `POST /records/{entity}` numbers a new record and returns it
//!
//! Counter requests address a sequence by `numerator`, optional `group` and
//! optional `period` (a local `YYYY-MM-DDTHH:MM:SS` datetime). A `period`
//! must come with the field's `granularity`; it is truncated to the start of
//! its bucket so it addresses the same row the records draw from.

use std::{sync::Arc, time::Instant};

use autonumber::{Autonumber, CounterStore, Granularity, Record, SequenceKey};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::server::{
    error::ApiError,
    store::Backend,
    telemetry::{increment_allocations, record_allocation_duration},
};

#[derive(Clone)]
pub struct AppState {
    numbering: Arc<Autonumber<Backend>>,
}

impl AppState {
    pub fn new(numbering: Autonumber<Backend>) -> Self {
        Self {
            numbering: Arc::new(numbering),
        }
    }

    fn store(&self) -> &CounterStore<Backend> {
        self.numbering.store()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/counters", put(set_current))
        .route("/counters/current", post(get_current))
        .route("/counters/next", post(allocate_next))
        .route("/records/{entity}", post(create_record))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    numerator: String,
    #[serde(default)]
    group: Option<Value>,
    #[serde(default)]
    period: Option<NaiveDateTime>,
    #[serde(default)]
    granularity: Option<Granularity>,
}

impl KeyRequest {
    fn into_key(self) -> Result<SequenceKey, ApiError> {
        if self.numerator.trim().is_empty() {
            return Err(ApiError::invalid("numerator must not be empty"));
        }
        let mut key = SequenceKey::new(self.numerator);
        if let Some(group) = self.group {
            key = key.with_group(group);
        }
        match (self.period, self.granularity) {
            (Some(period), Some(granularity)) => {
                key = key.with_period(granularity.bucket_start(period));
            }
            (Some(_), None) => {
                return Err(ApiError::invalid("period requires a granularity"));
            }
            (None, Some(_)) => {
                return Err(ApiError::invalid("granularity requires a period"));
            }
            (None, None) => {}
        }
        Ok(key)
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRequest {
    #[serde(flatten)]
    key: KeyRequest,
    value: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    count: u64,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_current(
    State(state): State<AppState>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let key = request.into_key()?;
    let count = state.store().get_current(&key).await?;
    Ok(Json(CountResponse { count }))
}

async fn set_current(
    State(state): State<AppState>,
    Json(request): Json<SetRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let key = request.key.into_key()?;
    state.store().set_current(&key, request.value).await?;
    tracing::info!(key = %key, count = request.value, "Counter overwritten");
    Ok(Json(CountResponse {
        count: request.value,
    }))
}

async fn allocate_next(
    State(state): State<AppState>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let key = request.into_key()?;
    let start = Instant::now();
    let count = state.store().allocate_next(&key).await?;
    record_allocation_duration(start.elapsed().as_secs_f64() * 1000.0);
    increment_allocations(1);
    Ok(Json(CountResponse { count }))
}

async fn create_record(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !body.is_object() {
        return Err(ApiError::invalid("record body must be a JSON object"));
    }

    let fields = state.numbering.fields(&entity).map_or(0, <[_]>::len);
    let mut record = Record::new(entity, body);
    let start = Instant::now();
    state.numbering.before_create(&mut record).await?;
    if fields > 0 {
        record_allocation_duration(start.elapsed().as_secs_f64() * 1000.0);
        increment_allocations(fields as u64);
    }
    Ok(Json(record.into_body()))
}
