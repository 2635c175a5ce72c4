use serde::{Deserialize, Serialize};
use std::fmt;

/// Id estable de una tarea map (orden de los splits de entrada).
pub type MapTaskId = u32;

/// Índice de partición de una tarea reduce, en [0, N).
pub type PartitionIndex = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

/// Estado de una tarea dentro del registro del master.
/// `Failed` no es terminal: vuelve a ser asignable en el siguiente poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Idle,
    InProgress,
    Completed,
    Failed,
}

/// Respuesta del master a un poll de un worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAssignment {
    /// No hay nada asignable ahora mismo; volver a preguntar tras el backoff.
    Wait,
    Map {
        task_id: MapTaskId,
        input_split: String,
        reduce_count: u32,
    },
    Reduce {
        partition: PartitionIndex,
        reduce_count: u32,
        /// Cantidad de tareas map (M): el reduce espera un intermedio de cada una.
        map_count: u32,
    },
    /// Ambas fases completas: el worker debe salir.
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

impl TaskOutcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            TaskOutcome::Succeeded
        } else {
            TaskOutcome::Failed
        }
    }
}

/// Foto de una tarea para la CLI (`GET /api/v1/tasks`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub kind: TaskKind,
    /// Id de la tarea map o índice de partición para reduce.
    pub task_id: u32,
    /// Solo para tareas map.
    pub input_split: Option<String>,
    pub status: TaskStatus,
    /// Segundos desde que empezó el lease actual (solo si está InProgress).
    pub lease_age_secs: Option<u64>,
}
