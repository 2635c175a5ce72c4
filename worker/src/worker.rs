use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use common::{config, App, TaskAssignment, TaskKind, TaskOutcome};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::executor::Executor;
use crate::rpc::MasterClient;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub master_url: String,
    pub app: App,
    /// Espera tras un Wait antes de volver a pedir tarea.
    pub poll_backoff: Duration,
    pub intermediate_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl WorkerConfig {
    pub fn new(master_url: impl Into<String>, app: App) -> Self {
        Self {
            master_url: master_url.into(),
            app,
            poll_backoff: Duration::from_millis(config::DEFAULT_POLL_BACKOFF_MS),
            intermediate_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Lo que hizo un worker hasta recibir Terminate.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub maps_succeeded: u32,
    pub maps_failed: u32,
    pub reduces_succeeded: u32,
    pub reduces_failed: u32,
    pub waits: u32,
}

impl WorkerSummary {
    fn record(&mut self, kind: TaskKind, success: bool) {
        match (kind, success) {
            (TaskKind::Map, true) => self.maps_succeeded += 1,
            (TaskKind::Map, false) => self.maps_failed += 1,
            (TaskKind::Reduce, true) => self.reduces_succeeded += 1,
            (TaskKind::Reduce, false) => self.reduces_failed += 1,
        }
    }

    pub fn tasks(&self) -> u32 {
        self.maps_succeeded + self.maps_failed + self.reduces_succeeded + self.reduces_failed
    }
}

/// Corre una tarea bloqueante fuera del runtime.
/// Cualquier error (o panic de la aplicación) cuenta como fallo de la tarea.
async fn run_task<F>(kind: TaskKind, task_id: u32, job: F) -> bool
where
    F: FnOnce() -> Result<usize> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!("error procesando tarea {} {}: {:#}", kind, task_id, e);
            false
        }
        Err(e) => {
            warn!("panic o join error en tarea {} {}: {:?}", kind, task_id, e);
            false
        }
    }
}

/// Loop principal del worker:
/// - pide tarea al master
/// - Map/Reduce: la ejecuta y reporta Succeeded/Failed
/// - Wait: duerme `poll_backoff`
/// - Terminate: sale
///
/// Solo retorna error si no se puede hablar con el master.
pub async fn run(config: WorkerConfig) -> Result<WorkerSummary> {
    let worker_id = uuid::Uuid::new_v4().to_string();
    let master = MasterClient::new(&config.master_url, worker_id);
    let executor = Arc::new(Executor::new(
        config.app,
        config.intermediate_dir.clone(),
        config.output_dir.clone(),
    ));

    info!(
        "worker {} arrancando (app={}, master={})",
        master.worker_id(),
        config.app.name,
        config.master_url
    );

    let mut summary = WorkerSummary::default();

    loop {
        let assignment = master
            .request_task()
            .await
            .context("no se pudo pedir tarea al master")?;

        let (kind, task_id, success) = match assignment {
            TaskAssignment::Wait => {
                summary.waits += 1;
                sleep(config.poll_backoff).await;
                continue;
            }
            TaskAssignment::Terminate => {
                info!(
                    "worker {} terminado por el master ({} tareas ejecutadas)",
                    master.worker_id(),
                    summary.tasks()
                );
                return Ok(summary);
            }
            TaskAssignment::Map {
                task_id,
                input_split,
                reduce_count,
            } => {
                info!("tengo tarea map {} (input={})", task_id, input_split);
                let exec = executor.clone();
                let ok = run_task(TaskKind::Map, task_id, move || {
                    exec.execute_map(task_id, &input_split, reduce_count)
                })
                .await;
                (TaskKind::Map, task_id, ok)
            }
            TaskAssignment::Reduce {
                partition,
                map_count,
                ..
            } => {
                info!("tengo tarea reduce {}", partition);
                let exec = executor.clone();
                let ok = run_task(TaskKind::Reduce, partition, move || {
                    exec.execute_reduce(partition, map_count)
                })
                .await;
                (TaskKind::Reduce, partition, ok)
            }
        };

        summary.record(kind, success);
        master
            .report_status(kind, task_id, TaskOutcome::from_success(success))
            .await
            .context("no se pudo reportar al master")?;
    }
}
