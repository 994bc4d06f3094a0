//! # Job Dispatcher
//!
//! The thin broker adapter around the workers. It decodes a delivery, runs the
//! matching worker and turns the result into broker actions:
//!
//! - `Ok` acks the delivery and counts the job as completed.
//! - `Err` publishes an annotated copy (origin queue, reason, timestamp, retry
//!   count, HTTP diagnostics) to the config's DLQ and then acks the original.
//!   If that publish fails the delivery is rejected without requeue and the
//!   queue's dead-letter exchange routes it to the DLQ instead.

use chrono::Utc;
use tracing::{debug, error, instrument, warn};

use crate::messaging::headers::{DEATH_TIMESTAMP, ORIGINAL_QUEUE, RETRY_COUNT};
use crate::messaging::{parse_work_queue, queue_names_for, BrokerMessage, Delivery, MessagingResult};
use crate::models::Job;

use super::context::PipelineContext;
use super::deletion::run_data_deletion;
use super::download::run_data_download;
use super::metadata::{run_metadata_download, run_metadata_upload};
use super::outcome::{JobDone, JobFailure, JobResult};
use super::upload::run_data_upload;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(JobDone),
    DeadLettered(JobFailure),
}

#[derive(Debug, Clone)]
pub struct JobDispatcher {
    ctx: PipelineContext,
}

impl JobDispatcher {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run the worker for a decoded job without touching the broker delivery
    pub async fn execute(&self, job: &Job) -> JobResult {
        match job {
            Job::MetadataDownload(job) => run_metadata_download(&self.ctx, job).await,
            Job::MetadataUpload(job) => run_metadata_upload(&self.ctx, job).await,
            Job::DataDownload(job) => run_data_download(&self.ctx, job).await,
            Job::DataUpload(job) => run_data_upload(&self.ctx, job).await,
            Job::DataDeletion(job) => run_data_deletion(&self.ctx, job).await,
        }
    }

    #[instrument(skip_all, fields(queue = %delivery.handle.queue_name(), message_id = delivery.message.message_id.as_deref().unwrap_or("")))]
    pub async fn process(&self, delivery: Delivery) -> MessagingResult<DispatchOutcome> {
        let Delivery { message, handle } = delivery;
        let queue = handle.queue_name().to_string();

        let (job, result) = match self.decode(&queue, &message) {
            Ok(job) => {
                debug!(job = %job.describe(), "Processing job");
                let result = self.execute(&job).await;
                (Some(job), result)
            }
            Err(failure) => (None, Err(failure)),
        };

        match result {
            Ok(done) => {
                self.ctx.messaging.ack(&handle).await?;
                if let Some(job) = &job {
                    if let Err(e) = self
                        .ctx
                        .progress
                        .mark_completed(job.main_config_id(), job.process_type())
                        .await
                    {
                        warn!(error = %e, "Failed to record job completion");
                    }
                }
                Ok(DispatchOutcome::Completed(done))
            }
            Err(failure) => {
                error!(
                    failure_kind = %failure.kind,
                    reason = failure.reason,
                    error = %failure.message,
                    "💀 Job failed; dead-lettering"
                );
                let copy = dead_letter_copy(&queue, &message, &failure);
                match dead_letter_queue_for(&queue) {
                    Some(dlq) => match self.ctx.messaging.publish(&dlq, &copy).await {
                        Ok(_) => self.ctx.messaging.ack(&handle).await?,
                        Err(e) => {
                            warn!(dlq = %dlq, error = %e, "DLQ publish failed; rejecting to dead-letter exchange");
                            self.ctx.messaging.nack(&handle, false).await?;
                        }
                    },
                    None => self.ctx.messaging.nack(&handle, false).await?,
                }
                Ok(DispatchOutcome::DeadLettered(failure))
            }
        }
    }

    fn decode(&self, queue: &str, message: &BrokerMessage) -> Result<Job, JobFailure> {
        let job = Job::from_bytes(&message.body)
            .map_err(|e| JobFailure::invalid_payload(format!("undecodable job body: {e}")))?;

        // A job must arrive on its own config's queue for its process type
        let expected = queue_names_for(job.main_config_id())
            .map_err(|e| JobFailure::invalid_payload(e.to_string()))?;
        if expected.for_process(job.process_type()) != queue {
            return Err(JobFailure::invalid_payload(format!(
                "{} job for config {} delivered on {queue}",
                job.process_type(),
                job.main_config_id()
            )));
        }
        Ok(job)
    }
}

/// DLQ of the config owning a work queue
fn dead_letter_queue_for(queue: &str) -> Option<String> {
    let (config_id, _) = parse_work_queue(queue)?;
    queue_names_for(&config_id).ok().map(|queues| queues.failed)
}

/// The failed message as it is stored in the DLQ; id and body are unchanged
pub fn dead_letter_copy(queue: &str, message: &BrokerMessage, failure: &JobFailure) -> BrokerMessage {
    let mut copy = message.clone();
    copy.redelivered = false;
    copy.headers
        .insert(ORIGINAL_QUEUE.to_string(), queue.to_string().into());
    copy.headers
        .insert(DEATH_TIMESTAMP.to_string(), Utc::now().to_rfc3339().into());
    copy.headers
        .insert(RETRY_COUNT.to_string(), message.retry_count().into());
    failure.annotate(&mut copy.headers);
    copy
}
