pub mod app;
pub mod config;
pub mod indexer;
pub mod job;
pub mod results;
pub mod shuffle;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use app::{App, MapFn, ReduceFn};
pub use job::JobProgress;
pub use results::JobResults;
pub use shuffle::KeyValue;
pub use task::{
    MapTaskId, PartitionIndex, TaskAssignment, TaskKind, TaskOutcome, TaskSnapshot, TaskStatus,
};
pub use worker::{
    ErrorResponse, ReportStatusRequest, ReportStatusResponse, TaskRequest, WorkerId,
};
