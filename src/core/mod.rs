//! Core scheduling abstractions and capacity accounting.

pub mod error;
pub mod executor;
pub mod journal;
pub mod lifecycle;
pub mod limit;
pub mod metrics;
pub mod queue;
pub mod resource_manager;
pub mod task;

pub use error::{AppResult, SchedulerError};
pub use executor::{Spawn, TaskExecutor};
pub use journal::{InMemoryJournal, JobRecord, NullJournal, TaskJournal};
pub use lifecycle::{
    FailureKind, LifecycleOutcome, LifecyclePolicy, TaskFailure, TaskPolicy, DEFAULT_TASK_SPEED,
};
pub use limit::{
    ConnDirection, Dimension, Limiter, PriorityClass, ResourceLimit, ResourceRequest,
    ResourceUsage, GIB, MIB,
};
pub use metrics::{ClassCounters, MetricsSnapshot, NodeMetrics};
pub use queue::{by_type, by_types, TaskQueue, TaskSelector};
pub use resource_manager::{
    LimitedResourceManager, NullResourceManager, ReservationHandle, ReservationId,
    ResourceManager, ResourceReservation, ResourceStat,
};
pub use task::{Task, TaskId, TaskState, TaskType};
