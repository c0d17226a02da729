// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  The tracker is a public read-only
// dashboard feed, so there is no authentication.  CORS is configured
// permissively for development; tighten `allowed_origins` in production.
//
// An empty filter result is not an error: it is served as an empty array
// with HTTP 200 so the dashboard can render its empty state.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::app_state::AppState;
use crate::export;
use crate::filter::{self, FilterSpec, SortKey, CHART_TOP_N};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/records", get(records))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/export.csv", get(export_csv))
        .route("/api/v1/refresh", post(refresh))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Query parsing
// =============================================================================

/// Filter/sort selection shared by the records, chart, and export endpoints.
#[derive(Debug, Default, Deserialize)]
struct FeedQuery {
    /// Comma-separated exchange list, e.g. `upbit,bithumb`. Omitted → all.
    exchanges: Option<String>,
    min_volume: Option<f64>,
    min_change_rate: Option<f64>,
    /// One of `abs_change`, `signed_change`, `volume`. Omitted → `abs_change`.
    sort: Option<String>,
}

impl FeedQuery {
    fn parse(&self) -> Result<(FilterSpec, SortKey), String> {
        let mut spec = FilterSpec::default();

        if let Some(raw) = &self.exchanges {
            let mut exchanges = Vec::new();
            for token in raw.split(',').filter(|t| !t.trim().is_empty()) {
                exchanges.push(token.parse()?);
            }
            if !exchanges.is_empty() {
                spec.exchanges = exchanges;
            }
        }
        if let Some(v) = self.min_volume {
            spec.min_volume = v;
        }
        if let Some(v) = self.min_change_rate {
            spec.min_change_rate = v;
        }

        let sort = match &self.sort {
            Some(raw) => raw.parse()?,
            None => SortKey::default(),
        };

        Ok((spec, sort))
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let fetched_at = state.batch_snapshot().map(|b| b.fetched_at);
    Json(json!({
        "status": "ok",
        "state_version": state.current_state_version(),
        "fetched_at": fetched_at,
        "server_time": chrono::Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Table feed
// =============================================================================

async fn records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let (spec, sort) = match query.parse() {
        Ok(parsed) => parsed,
        Err(message) => return bad_request(message),
    };

    match state.batch_snapshot() {
        Some(batch) => {
            let rows = filter::apply(&batch.records, &spec, sort);
            Json(json!({
                "fetched_at": batch.fetched_at,
                "total": rows.len(),
                "records": rows,
                "warnings": batch.warnings,
            }))
            .into_response()
        }
        None => no_data_response(),
    }
}

// =============================================================================
// Chart feed — top 10 by absolute change rate
// =============================================================================

async fn chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let (spec, sort) = match query.parse() {
        Ok(parsed) => parsed,
        Err(message) => return bad_request(message),
    };

    match state.batch_snapshot() {
        Some(batch) => {
            let rows = filter::apply(&batch.records, &spec, sort);
            let top = filter::top_by_volatility(&rows, CHART_TOP_N);
            Json(json!({
                "fetched_at": batch.fetched_at,
                "records": top,
            }))
            .into_response()
        }
        None => no_data_response(),
    }
}

// =============================================================================
// CSV export
// =============================================================================

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let (spec, sort) = match query.parse() {
        Ok(parsed) => parsed,
        Err(message) => return bad_request(message),
    };

    let Some(batch) = state.batch_snapshot() else {
        return no_data_response();
    };

    let rows = filter::apply(&batch.records, &spec, sort);
    match export::to_csv(&rows) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export::CSV_FILENAME),
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "CSV rendering failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "CSV rendering failed" })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Manual refresh trigger
// =============================================================================

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = crate::refresh::run_refresh(&state).await;
    Json(json!({
        "fetched_at": snapshot.fetched_at,
        "records": snapshot.records.len(),
        "warnings": snapshot.warnings,
    }))
}

// =============================================================================
// Shared responses
// =============================================================================

fn no_data_response() -> Response {
    Json(json!({
        "fetched_at": null,
        "total": 0,
        "records": [],
        "warnings": [],
        "message": "no data fetched yet",
    }))
    .into_response()
}
