//! # Pipeline
//!
//! The queue-driven core: the [`JobProducer`] plans and enqueues jobs, workers
//! execute them and report a [`JobResult`], and the [`JobDispatcher`] settles
//! each delivery (ack, or DLQ with diagnostics). [`WorkerPool`]s run the
//! consumers for each config being served.

pub mod context;
pub mod deletion;
pub mod dispatcher;
pub mod download;
pub mod fetch;
pub mod guard;
pub mod metadata;
pub mod outcome;
pub mod producer;
pub mod transform;
pub mod upload;
pub mod worker_pool;

pub use context::{PipelineContext, PipelineSettings};
pub use dispatcher::{dead_letter_copy, DispatchOutcome, JobDispatcher};
pub use fetch::fetch_all;
pub use outcome::{FailureKind, HttpDiagnostics, JobDone, JobFailure, JobResult};
pub use producer::{plan_data_jobs, plan_metadata_jobs, EnqueueReport, JobProducer, PlannedJob};
pub use transform::{to_data_values, RowIds, TransformError, Transformed};
pub use worker_pool::{ConsumerRegistry, WorkerPool, WorkerPoolSnapshot};
