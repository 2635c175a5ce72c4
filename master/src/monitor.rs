use std::{collections::HashSet, time::Duration};

use common::TaskKind;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::AppState;

/// Loop de vigilancia del job:
/// - avisa (una vez) de cada lease vencido que nadie re-pidió todavía
/// - cuando Done() es true espera `linger` para que los workers que quedan
///   reciban Terminate, y retorna
///
/// El master usa el retorno de esta función como señal de apagado.
pub async fn monitor_job(state: AppState, sweep: Duration, linger: Duration) {
    let mut reported: HashSet<(TaskKind, u32)> = HashSet::new();

    loop {
        sleep(sweep).await;

        if state.scheduler.done() {
            let progress = state.scheduler.progress();
            info!(
                "job terminado: {} map + {} reduce completadas, apagando en {:?}",
                progress.completed_map_tasks, progress.completed_reduce_tasks, linger
            );
            sleep(linger).await;
            return;
        }

        let expired = state.scheduler.expired_leases();
        let current: HashSet<(TaskKind, u32)> =
            expired.iter().map(|t| (t.kind, t.task_id)).collect();

        for task in &expired {
            if reported.insert((task.kind, task.task_id)) {
                warn!(
                    "tarea {} {} sin reporte hace {}s, se reasigna en el próximo poll",
                    task.kind,
                    task.task_id,
                    task.lease_age_secs.unwrap_or_default()
                );
            }
        }

        // si ya se re-asignó, que pueda volver a avisar más adelante
        reported.retain(|k| current.contains(k));
    }
}
