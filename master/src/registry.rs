// master/src/registry.rs
//
// Dos tablas, cada una con su mutex:
// - map: asociativa por split de entrada (más un índice id -> split)
// - reduce: vector denso indexado por partición
// Solo operaciones atómicas; ninguna toma los dos mutex a la vez.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime},
};

use common::{MapTaskId, PartitionIndex, TaskKind, TaskSnapshot, TaskStatus};
use tracing::warn;

use crate::error::SchedulerError;

/// Estado + lease de una tarea (map o reduce).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskState {
    status: TaskStatus,
    /// Solo tiene sentido mientras está InProgress.
    lease_started: Option<SystemTime>,
}

/// Por qué una tarea resultó asignable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// Estaba Idle.
    Fresh,
    /// Un worker reportó Failed.
    Retry,
    /// Seguía InProgress pero el lease venció: se re-asigna sin cambiar de
    /// estado, el worker original todavía puede reportar.
    Relet { lease_age: Duration },
}

impl TaskState {
    pub const fn idle() -> Self {
        Self {
            status: TaskStatus::Idle,
            lease_started: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn lease_started(&self) -> Option<SystemTime> {
        self.lease_started
    }

    fn lease_age(&self, now: SystemTime) -> Option<Duration> {
        if self.status != TaskStatus::InProgress {
            return None;
        }
        // lease en el futuro (reloj hacia atrás): lo tratamos como vigente
        self.lease_started
            .and_then(|started| now.duration_since(started).ok())
    }

    fn lease_expired(&self, now: SystemTime, timeout: Duration) -> bool {
        self.lease_age(now).is_some_and(|age| age > timeout)
    }

    /// Si la tarea es asignable la deja InProgress con lease = now.
    fn try_claim(&mut self, now: SystemTime, timeout: Duration) -> Option<ClaimKind> {
        let claim = match self.status {
            TaskStatus::Idle => ClaimKind::Fresh,
            TaskStatus::Failed => ClaimKind::Retry,
            TaskStatus::InProgress => match self.lease_age(now) {
                Some(age) if age > timeout => ClaimKind::Relet { lease_age: age },
                _ => return None,
            },
            TaskStatus::Completed => return None,
        };

        self.status = TaskStatus::InProgress;
        self.lease_started = Some(now);
        Some(claim)
    }

    /// Idempotente, y solo aplica sobre InProgress: una tarea Failed vuelve
    /// a InProgress antes de poder completarse. Devuelve true si hubo cambio.
    fn mark_completed(&mut self) -> bool {
        if self.status != TaskStatus::InProgress {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.lease_started = None;
        true
    }

    /// Solo aplica sobre InProgress: un fallo tardío nunca pisa un Completed.
    fn mark_failed(&mut self) -> bool {
        if self.status != TaskStatus::InProgress {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.lease_started = None;
        true
    }

    fn snapshot(
        &self,
        kind: TaskKind,
        task_id: u32,
        input_split: Option<String>,
        now: SystemTime,
    ) -> TaskSnapshot {
        TaskSnapshot {
            kind,
            task_id,
            input_split,
            status: self.status,
            lease_age_secs: self.lease_age(now).map(|d| d.as_secs()),
        }
    }
}

/// Resultado de una pasada de asignación sobre una fase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseScan<T> {
    Assigned(T),
    /// Quedan tareas sin completar pero ninguna es asignable ahora.
    Pending,
    /// Todas Completed.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapClaim {
    pub task_id: MapTaskId,
    pub input_split: String,
    pub claim: ClaimKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceClaim {
    pub partition: PartitionIndex,
    pub claim: ClaimKind,
}

enum Scan<K> {
    Claimed(K, ClaimKind),
    Pending,
    AllCompleted,
}

/// Recorre en orden y reclama la primera tarea asignable.
fn scan_and_claim<'a, K>(
    entries: impl Iterator<Item = (K, &'a mut TaskState)>,
    now: SystemTime,
    timeout: Duration,
) -> Scan<K> {
    let mut all_completed = true;
    for (key, state) in entries {
        if let Some(claim) = state.try_claim(now, timeout) {
            return Scan::Claimed(key, claim);
        }
        if state.status != TaskStatus::Completed {
            all_completed = false;
        }
    }
    if all_completed {
        Scan::AllCompleted
    } else {
        Scan::Pending
    }
}

#[derive(Debug)]
struct MapEntry {
    id: MapTaskId,
    state: TaskState,
}

#[derive(Debug)]
struct MapTable {
    /// Orden de recorrido: por split (determinista).
    tasks: BTreeMap<String, MapEntry>,
    /// id -> split; los ids son 0..M en orden de entrada.
    split_by_id: Vec<String>,
    phase_done: bool,
}

#[derive(Debug)]
struct ReduceTable {
    tasks: Vec<TaskState>,
    phase_done: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // el estado siempre es consistente al soltar el lock
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct TaskRegistry {
    map: Mutex<MapTable>,
    reduce: Mutex<ReduceTable>,
    map_count: u32,
    reduce_count: u32,
}

impl TaskRegistry {
    /// Crea una tarea map por split (los duplicados se ignoran) y
    /// `reduce_count` tareas reduce, todas Idle.
    pub fn new<I>(splits: I, reduce_count: u32) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut tasks = BTreeMap::new();
        let mut split_by_id = Vec::new();

        for split in splits {
            if tasks.contains_key(&split) {
                warn!("split duplicado ignorado: {}", split);
                continue;
            }
            let id = split_by_id.len() as MapTaskId;
            split_by_id.push(split.clone());
            tasks.insert(
                split,
                MapEntry {
                    id,
                    state: TaskState::idle(),
                },
            );
        }

        let map_count = split_by_id.len() as u32;

        Self {
            map: Mutex::new(MapTable {
                tasks,
                split_by_id,
                phase_done: false,
            }),
            reduce: Mutex::new(ReduceTable {
                tasks: vec![TaskState::idle(); reduce_count as usize],
                phase_done: false,
            }),
            map_count,
            reduce_count,
        }
    }

    pub fn reduce_count(&self) -> u32 {
        self.reduce_count
    }

    /// M, fijo desde la creación.
    pub fn map_count(&self) -> u32 {
        self.map_count
    }

    /* ---------------- fase map ---------------- */

    pub fn claim_map(&self, now: SystemTime, lease_timeout: Duration) -> PhaseScan<MapClaim> {
        let mut guard = lock(&self.map);
        let MapTable {
            tasks, phase_done, ..
        } = &mut *guard;

        if *phase_done {
            return PhaseScan::Done;
        }

        let entries = tasks
            .iter_mut()
            .map(|(split, entry)| ((entry.id, split), &mut entry.state));

        match scan_and_claim(entries, now, lease_timeout) {
            Scan::Claimed((task_id, split), claim) => PhaseScan::Assigned(MapClaim {
                task_id,
                input_split: split.clone(),
                claim,
            }),
            Scan::Pending => PhaseScan::Pending,
            Scan::AllCompleted => {
                *phase_done = true;
                PhaseScan::Done
            }
        }
    }

    pub fn complete_map(&self, id: MapTaskId) -> Result<bool, SchedulerError> {
        self.update_map(id, TaskState::mark_completed)
    }

    pub fn fail_map(&self, id: MapTaskId) -> Result<bool, SchedulerError> {
        self.update_map(id, TaskState::mark_failed)
    }

    fn update_map(
        &self,
        id: MapTaskId,
        update: fn(&mut TaskState) -> bool,
    ) -> Result<bool, SchedulerError> {
        let mut guard = lock(&self.map);
        let MapTable {
            tasks, split_by_id, ..
        } = &mut *guard;

        let entry = split_by_id
            .get(id as usize)
            .and_then(|split| tasks.get_mut(split))
            .ok_or(SchedulerError::UnknownMapTask(id))?;

        Ok(update(&mut entry.state))
    }

    pub fn map_task(&self, id: MapTaskId) -> Option<(String, TaskState)> {
        let guard = lock(&self.map);
        let split = guard.split_by_id.get(id as usize)?;
        guard.tasks.get(split).map(|e| (split.clone(), e.state))
    }

    /// Flag cacheado: solo pasa a true en un poll que ve todo Completed.
    pub fn map_phase_done(&self) -> bool {
        lock(&self.map).phase_done
    }

    /* ---------------- fase reduce ---------------- */

    pub fn claim_reduce(
        &self,
        now: SystemTime,
        lease_timeout: Duration,
    ) -> PhaseScan<ReduceClaim> {
        let mut guard = lock(&self.reduce);
        let ReduceTable { tasks, phase_done } = &mut *guard;

        if *phase_done {
            return PhaseScan::Done;
        }

        let entries = tasks
            .iter_mut()
            .enumerate()
            .map(|(i, state)| (i as PartitionIndex, state));

        match scan_and_claim(entries, now, lease_timeout) {
            Scan::Claimed(partition, claim) => PhaseScan::Assigned(ReduceClaim { partition, claim }),
            Scan::Pending => PhaseScan::Pending,
            Scan::AllCompleted => {
                *phase_done = true;
                PhaseScan::Done
            }
        }
    }

    pub fn complete_reduce(&self, partition: PartitionIndex) -> Result<bool, SchedulerError> {
        self.update_reduce(partition, TaskState::mark_completed)
    }

    pub fn fail_reduce(&self, partition: PartitionIndex) -> Result<bool, SchedulerError> {
        self.update_reduce(partition, TaskState::mark_failed)
    }

    fn update_reduce(
        &self,
        partition: PartitionIndex,
        update: fn(&mut TaskState) -> bool,
    ) -> Result<bool, SchedulerError> {
        let mut guard = lock(&self.reduce);
        let state = guard.tasks.get_mut(partition as usize).ok_or(
            SchedulerError::PartitionOutOfRange {
                partition,
                reduce_count: self.reduce_count,
            },
        )?;
        Ok(update(state))
    }

    pub fn reduce_task(&self, partition: PartitionIndex) -> Option<TaskState> {
        lock(&self.reduce).tasks.get(partition as usize).copied()
    }

    pub fn reduce_phase_done(&self) -> bool {
        lock(&self.reduce).phase_done
    }

    /* ---------------- lecturas ---------------- */

    /// (completadas, total) de la fase map.
    pub fn map_counts(&self) -> (u32, u32) {
        let guard = lock(&self.map);
        let done = guard
            .tasks
            .values()
            .filter(|e| e.state.status == TaskStatus::Completed)
            .count();
        (done as u32, guard.tasks.len() as u32)
    }

    /// (completadas, total) de la fase reduce.
    pub fn reduce_counts(&self) -> (u32, u32) {
        let guard = lock(&self.reduce);
        let done = guard
            .tasks
            .iter()
            .filter(|s| s.status == TaskStatus::Completed)
            .count();
        (done as u32, guard.tasks.len() as u32)
    }

    /// true sii todas las tareas map y reduce están Completed.
    /// Completed es terminal, así que mirar las tablas por separado alcanza.
    pub fn all_completed(&self) -> bool {
        let (map_done, map_total) = self.map_counts();
        if map_done < map_total {
            return false;
        }
        let (reduce_done, reduce_total) = self.reduce_counts();
        reduce_done == reduce_total
    }

    /// Todas las tareas: primero map por id, después reduce por partición.
    pub fn snapshot(&self, now: SystemTime) -> Vec<TaskSnapshot> {
        let mut out = Vec::new();

        {
            let guard = lock(&self.map);
            for (id, split) in guard.split_by_id.iter().enumerate() {
                if let Some(entry) = guard.tasks.get(split) {
                    out.push(entry.state.snapshot(
                        TaskKind::Map,
                        id as u32,
                        Some(split.clone()),
                        now,
                    ));
                }
            }
        }

        {
            let guard = lock(&self.reduce);
            for (p, state) in guard.tasks.iter().enumerate() {
                out.push(state.snapshot(TaskKind::Reduce, p as u32, None, now));
            }
        }

        out
    }

    /// Tareas InProgress cuyo lease ya venció y que nadie re-pidió todavía.
    pub fn expired_leases(&self, now: SystemTime, lease_timeout: Duration) -> Vec<TaskSnapshot> {
        let mut out = Vec::new();

        {
            let guard = lock(&self.map);
            for (split, entry) in guard.tasks.iter() {
                if entry.state.lease_expired(now, lease_timeout) {
                    out.push(entry.state.snapshot(
                        TaskKind::Map,
                        entry.id,
                        Some(split.clone()),
                        now,
                    ));
                }
            }
        }

        {
            let guard = lock(&self.reduce);
            for (p, state) in guard.tasks.iter().enumerate() {
                if state.lease_expired(now, lease_timeout) {
                    out.push(state.snapshot(TaskKind::Reduce, p as u32, None, now));
                }
            }
        }

        out
    }
}
