use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::annotation::{Annotation, AnnotationId, Coordinate};
use crate::error::AnnotateError;
use crate::orchestrator::EnrichmentOrchestrator;
use crate::render::{sidebar_entries, PopupView, SidebarEntry};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<EnrichmentOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: EnrichmentOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/annotations", get(list_annotations).post(create_annotation))
        .route("/annotations/reset", post(reset_annotations))
        .route(
            "/annotations/{id}",
            get(get_annotation)
                .patch(edit_annotation)
                .delete(delete_annotation),
        )
        .route("/annotations/{id}/popup", get(popup))
        .route("/selection", post(select_coordinate))
        .route("/sidebar", get(sidebar))
        .route("/session/finish", post(finish_session))
        .route("/session/reopen", post(reopen_session))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Router for the binary: API plus whatever extra routes (e.g. `/metrics`)
/// the caller merges in.
pub fn router_with(state: AppState, extra: Router) -> Router {
    router(state).merge(extra)
}

/* ----------------------------
Request / response bodies
---------------------------- */

#[derive(Deserialize)]
struct SelectReq {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct CreateReq {
    caption: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

#[derive(Deserialize)]
struct EditReq {
    caption: String,
}

#[derive(Serialize)]
struct CreatedResp {
    id: AnnotationId,
}

#[derive(Serialize)]
struct ErrorResp {
    error: String,
}

fn reject(e: AnnotateError) -> Response {
    let status = match e {
        AnnotateError::SessionFinished => StatusCode::CONFLICT,
        AnnotateError::EmptyCaption
        | AnnotateError::NoSelection
        | AnnotateError::InvalidCoordinate { .. } => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorResp {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/* ----------------------------
Handlers
---------------------------- */

async fn list_annotations(State(state): State<AppState>) -> Json<Vec<Annotation>> {
    Json(state.orchestrator.store().snapshot())
}

async fn get_annotation(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Annotation>, StatusCode> {
    state
        .orchestrator
        .store()
        .get(AnnotationId(id))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn select_coordinate(
    State(state): State<AppState>,
    Json(body): Json<SelectReq>,
) -> Response {
    let res = Coordinate::new(body.lat, body.lon)
        .and_then(|c| state.orchestrator.select_coordinate(c));
    match res {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => reject(e),
    }
}

async fn create_annotation(
    State(state): State<AppState>,
    Json(body): Json<CreateReq>,
) -> Response {
    let orch = &state.orchestrator;
    let res = match (body.lat, body.lon) {
        (Some(lat), Some(lon)) => match Coordinate::new(lat, lon) {
            Ok(c) => orch.confirm(c, &body.caption).await,
            Err(e) => Err(e),
        },
        (None, None) => orch.submit_caption(&body.caption).await,
        (lat, lon) => Err(AnnotateError::InvalidCoordinate {
            lat: lat.map_or_else(|| "missing".to_string(), |v| v.to_string()),
            lon: lon.map_or_else(|| "missing".to_string(), |v| v.to_string()),
        }),
    };
    match res {
        // The enrichment task keeps running after the handle is dropped.
        Ok(confirmed) => {
            tracing::info!(target: "api", id = %confirmed.id, "annotation accepted");
            (StatusCode::ACCEPTED, Json(CreatedResp { id: confirmed.id })).into_response()
        }
        Err(e) => reject(e),
    }
}

async fn edit_annotation(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<EditReq>,
) -> StatusCode {
    state.orchestrator.edit_caption(AnnotationId(id), &body.caption);
    StatusCode::NO_CONTENT
}

async fn delete_annotation(State(state): State<AppState>, Path(id): Path<u64>) -> StatusCode {
    state.orchestrator.delete(AnnotationId(id));
    StatusCode::NO_CONTENT
}

async fn reset_annotations(State(state): State<AppState>) -> StatusCode {
    let n = state.orchestrator.reset();
    tracing::info!(target: "api", removed = n, "annotations reset");
    StatusCode::NO_CONTENT
}

async fn popup(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Html<String>, StatusCode> {
    let a = state
        .orchestrator
        .store()
        .get(AnnotationId(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Html(PopupView::from_annotation(&a).to_html()))
}

async fn sidebar(State(state): State<AppState>) -> Json<Vec<SidebarEntry>> {
    let orch = &state.orchestrator;
    Json(sidebar_entries(
        &orch.store().snapshot(),
        orch.is_finished(),
    ))
}

async fn finish_session(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.finish();
    StatusCode::NO_CONTENT
}

async fn reopen_session(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.reopen();
    StatusCode::NO_CONTENT
}
