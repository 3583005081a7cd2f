pub mod orchestrator;
pub mod task;

pub use orchestrator::{BatchHandle, BatchOrchestrator, SubscriptionId};
pub use task::{BatchPhase, BatchStatus, Task, TaskAction, TaskFailure, TaskSuccess};
