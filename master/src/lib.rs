pub mod clock;
pub mod error;
pub mod handlers;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SchedulerError;
pub use handlers::build_router;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use state::AppState;

use std::time::Duration;

/// Cada cuánto el monitor mira leases vencidos y Done().
pub const MONITOR_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
