// master/src/state.rs

use std::{path::PathBuf, sync::Arc};

use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    // donde los workers publican los mr-out-<p>
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(scheduler: Scheduler, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            output_dir: output_dir.into(),
        }
    }
}
