//! Node wiring: shared context, dispatcher, spawner and caller-facing API.

pub mod api;
pub mod context;
pub mod dispatcher;
pub mod tokio_spawner;

pub use api::{signer_status_of, status_of, submit_task, ServiceStatus, SubmitResponse};
pub use context::NodeContext;
pub use dispatcher::{Dispatcher, RunOutcome};
pub use tokio_spawner::TokioSpawner;
