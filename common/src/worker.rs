use serde::{Deserialize, Serialize};

use crate::task::{TaskKind, TaskOutcome};

pub type WorkerId = String;

/// Cuerpo de `POST /api/v1/tasks/request`.
/// El master decide si toca map o reduce; el id del worker es solo para logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub worker_id: WorkerId,
}

/// Cuerpo de `POST /api/v1/tasks/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatusRequest {
    pub worker_id: WorkerId,
    pub kind: TaskKind,
    /// Id de tarea map o índice de partición reduce.
    pub task_id: u32,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatusResponse {
    pub ok: bool,
}

/// Cuerpo de error que devuelve el master ante un error de protocolo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
