use common::{MapTaskId, PartitionIndex};
use thiserror::Error;

/// Errores de protocolo: un reporte que no corresponde a ninguna tarea.
/// Nunca modifican el registro.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("tarea map desconocida: {0}")]
    UnknownMapTask(MapTaskId),

    #[error("partición {partition} fuera de rango (reduce_count={reduce_count})")]
    PartitionOutOfRange {
        partition: PartitionIndex,
        reduce_count: u32,
    },
}
