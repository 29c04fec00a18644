pub mod activities;
pub mod detection;
pub mod lifecycle;
pub mod querier;
pub mod queues;
pub mod runtime;
pub mod store;
pub mod sweep;
pub mod worker;

pub use activities::{
    Activities, ApprovalResponse, ExecuteActionsInput, ExecuteActionsOutput, InfraClient,
    PlanActionsInput, PlanActionsOutput, TenantClientFactory, TriageInput, TriageOutput,
    VerifyOutcomeInput, VerifyOutcomeOutput, WasteScanInput, WasteScanOutput,
};
pub use detection::DetectionResult;
pub use lifecycle::{
    ACTIVITY_TIMEOUT, HIL_TIMEOUT, TerminationReason, WorkflowInput, WorkflowResult,
    anomaly_lifecycle,
};
pub use querier::{ListOptions, QueryError, RuntimeQuerier, WorkflowQuerier};
pub use queues::{
    QUEUE_ANOMALY, QUEUE_DETECT, QUEUE_EXEC, QueueConfig, UnknownQueue, default_configs,
    parse_queues,
};
pub use runtime::{
    ActivityError, ApprovalWait, StartError, WorkflowCtx, WorkflowHandle, WorkflowRuntime,
};
pub use store::{
    StoreError, UpdateRejected, WorkflowStatus, WorkflowStore, WorkflowSummary,
};
pub use sweep::{SweepAccount, SweepInput, SweepResult, WASTE_SAVINGS_THRESHOLD, awsdoc_sweep};
pub use worker::{WorkerPool, shutdown_channel, shutdown_on_signal, trigger_shutdown};
