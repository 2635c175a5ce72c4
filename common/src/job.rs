use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progreso del único job que coordina el master (`GET /api/v1/job`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    /// true sii todas las tareas map y reduce están Completed.
    pub done: bool,
    pub map_phase_done: bool,
    pub reduce_phase_done: bool,

    pub reduce_count: u32,
    pub total_map_tasks: u32,
    pub completed_map_tasks: u32,
    pub total_reduce_tasks: u32,
    pub completed_reduce_tasks: u32,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobProgress {
    pub fn total_tasks(&self) -> u32 {
        self.total_map_tasks + self.total_reduce_tasks
    }

    pub fn completed_tasks(&self) -> u32 {
        self.completed_map_tasks + self.completed_reduce_tasks
    }
}
