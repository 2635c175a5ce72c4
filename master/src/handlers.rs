use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{
    shuffle, ErrorResponse, JobProgress, JobResults, ReportStatusRequest, ReportStatusResponse,
    TaskAssignment, TaskRequest, TaskSnapshot,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks/request", post(request_task))
        .route("/api/v1/tasks/report", post(report_status))
        .route("/api/v1/tasks", get(list_tasks))
        .route("/api/v1/job", get(get_job))
        .route("/api/v1/job/results", get(get_job_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = match self {
            SchedulerError::UnknownMapTask(_) => StatusCode::NOT_FOUND,
            SchedulerError::PartitionOutOfRange { .. } => StatusCode::BAD_REQUEST,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// RequestTask: el master decide map o reduce
async fn request_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskAssignment> {
    let assignment = state.scheduler.request_task();
    debug!("worker {} pidió tarea -> {:?}", req.worker_id, assignment);
    Json(assignment)
}

// ReportStatus
async fn report_status(
    State(state): State<AppState>,
    Json(req): Json<ReportStatusRequest>,
) -> Result<Json<ReportStatusResponse>, SchedulerError> {
    state
        .scheduler
        .report_status(req.kind, req.task_id, req.outcome)
        .map_err(|e| {
            warn!("reporte inválido del worker {}: {}", req.worker_id, e);
            e
        })?;

    Ok(Json(ReportStatusResponse { ok: true }))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskSnapshot>> {
    Json(state.scheduler.tasks())
}

// Done() + progreso
async fn get_job(State(state): State<AppState>) -> Json<JobProgress> {
    Json(state.scheduler.progress())
}

// Lista los mr-out-<p> ya publicados
async fn get_job_results(State(state): State<AppState>) -> Json<JobResults> {
    let files = shuffle::list_outputs(&state.output_dir).unwrap_or_else(|e| {
        warn!(
            "no se pudo leer el directorio de salida {}: {}",
            state.output_dir.display(),
            e
        );
        Vec::new()
    });

    Json(JobResults {
        output_dir: state.output_dir.to_string_lossy().to_string(),
        files,
    })
}
