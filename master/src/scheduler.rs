use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use common::{
    config, JobProgress, TaskAssignment, TaskKind, TaskOutcome, TaskSnapshot,
};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::SchedulerError;
use crate::registry::{ClaimKind, MapClaim, PhaseScan, ReduceClaim, TaskRegistry};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Un InProgress con lease más viejo que esto vuelve a ser asignable.
    pub lease_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lease_timeout: Duration::from_secs(config::DEFAULT_LEASE_TIMEOUT_SECS),
        }
    }
}

/// Núcleo del master: responde polls y reportes de los workers.
///
/// Cada poll recorre primero la fase map bajo su lock y, solo si la fase map
/// terminó, la fase reduce bajo el suyo. Nunca se asigna un reduce mientras
/// quede un map sin Completed.
pub struct Scheduler {
    registry: TaskRegistry,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    finished_at: OnceLock<DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(splits: Vec<String>, reduce_count: u32, config: SchedulerConfig) -> Self {
        Self::with_clock(splits, reduce_count, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        splits: Vec<String>,
        reduce_count: u32,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = TaskRegistry::new(splits, reduce_count);
        let (_, total_maps) = registry.map_counts();
        info!(
            "job creado: {} tareas map, {} tareas reduce (lease={:?})",
            total_maps, reduce_count, config.lease_timeout
        );

        Self {
            registry,
            config,
            clock,
            started_at: Utc::now(),
            finished_at: OnceLock::new(),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn reduce_count(&self) -> u32 {
        self.registry.reduce_count()
    }

    /// RequestTask: una asignación, Wait o Terminate.
    pub fn request_task(&self) -> TaskAssignment {
        let now = self.clock.now();
        let lease = self.config.lease_timeout;
        let reduce_count = self.reduce_count();

        match self.registry.claim_map(now, lease) {
            PhaseScan::Assigned(MapClaim {
                task_id,
                input_split,
                claim,
            }) => {
                log_claim(TaskKind::Map, task_id, claim);
                return TaskAssignment::Map {
                    task_id,
                    input_split,
                    reduce_count,
                };
            }
            PhaseScan::Pending => {
                debug!("fase map en curso, sin tareas asignables");
                return TaskAssignment::Wait;
            }
            PhaseScan::Done => {}
        }

        // el lock de map ya se soltó
        match self.registry.claim_reduce(now, lease) {
            PhaseScan::Assigned(ReduceClaim { partition, claim }) => {
                log_claim(TaskKind::Reduce, partition, claim);
                TaskAssignment::Reduce {
                    partition,
                    reduce_count,
                    map_count: self.registry.map_count(),
                }
            }
            PhaseScan::Pending => {
                debug!("fase reduce en curso, sin tareas asignables");
                TaskAssignment::Wait
            }
            PhaseScan::Done => {
                self.mark_finished();
                TaskAssignment::Terminate
            }
        }
    }

    /// ReportStatus. Succeeded y Failed solo aplican sobre InProgress (un
    /// Succeeded repetido es no-op). Un id desconocido es error de protocolo.
    pub fn report_status(
        &self,
        kind: TaskKind,
        task_id: u32,
        outcome: TaskOutcome,
    ) -> Result<(), SchedulerError> {
        let changed = match (kind, outcome) {
            (TaskKind::Map, TaskOutcome::Succeeded) => self.registry.complete_map(task_id)?,
            (TaskKind::Map, TaskOutcome::Failed) => self.registry.fail_map(task_id)?,
            (TaskKind::Reduce, TaskOutcome::Succeeded) => {
                self.registry.complete_reduce(task_id)?
            }
            (TaskKind::Reduce, TaskOutcome::Failed) => self.registry.fail_reduce(task_id)?,
        };

        if changed {
            info!("tarea {} {} -> {:?}", kind, task_id, outcome);
        } else {
            debug!(
                "reporte {:?} para tarea {} {} sin efecto (estado ya resuelto)",
                outcome, kind, task_id
            );
        }

        if self.registry.all_completed() {
            self.mark_finished();
        }
        Ok(())
    }

    /// Done(): true sii todas las tareas map y reduce están Completed.
    pub fn done(&self) -> bool {
        let done = self.registry.all_completed();
        if done {
            self.mark_finished();
        }
        done
    }

    pub fn progress(&self) -> JobProgress {
        let (completed_map_tasks, total_map_tasks) = self.registry.map_counts();
        let (completed_reduce_tasks, total_reduce_tasks) = self.registry.reduce_counts();
        let done = self.done();

        JobProgress {
            done,
            map_phase_done: self.registry.map_phase_done(),
            reduce_phase_done: self.registry.reduce_phase_done(),
            reduce_count: self.reduce_count(),
            total_map_tasks,
            completed_map_tasks,
            total_reduce_tasks,
            completed_reduce_tasks,
            started_at: self.started_at,
            finished_at: self.finished_at.get().copied(),
        }
    }

    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        self.registry.snapshot(self.clock.now())
    }

    /// Leases vencidos que todavía nadie re-pidió (solo para logs).
    pub fn expired_leases(&self) -> Vec<TaskSnapshot> {
        self.registry
            .expired_leases(self.clock.now(), self.config.lease_timeout)
    }

    fn mark_finished(&self) {
        if self.finished_at.set(Utc::now()).is_ok() {
            info!("job completo: todas las tareas map y reduce terminadas");
        }
    }
}

fn log_claim(kind: TaskKind, task_id: u32, claim: ClaimKind) {
    match claim {
        ClaimKind::Fresh => info!("asignando tarea {} {}", kind, task_id),
        ClaimKind::Retry => info!("reasignando tarea {} {} tras fallo", kind, task_id),
        ClaimKind::Relet { lease_age } => warn!(
            "lease vencido en tarea {} {} ({:?} sin reporte), reasignando",
            kind, task_id, lease_age
        ),
    }
}
