//! Background job scheduler and job implementations.

mod event_dispatch;
mod pool_metrics;
mod scheduler;
mod slot_generation;
mod slot_reconciliation;

pub use event_dispatch::EventDispatchJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use slot_generation::SlotGenerationJob;
pub use slot_reconciliation::SlotReconciliationJob;
