pub mod executor;
pub mod rpc;
pub mod worker;

pub use executor::Executor;
pub use rpc::MasterClient;
pub use worker::{run, WorkerConfig, WorkerSummary};
