//! # Download Worker
//!
//! `received -> fetching -> transforming -> persisted -> upload-enqueued`.
//! Any failing step returns a [`JobFailure`]; the dispatcher dead-letters the
//! message. An empty result set finishes the job without an artifact.

use tracing::{info, instrument, warn};

use crate::messaging::queue_names_for;
use crate::models::{DataJob, DataValueSet, Job, ProcessType, UploadJob};
use crate::planner::DimensionSpace;
use crate::store::artifact_name;

use super::context::PipelineContext;
use super::fetch::fetch_all;
use super::guard::{pagination_guard, Guarded};
use super::outcome::{JobDone, JobFailure, JobResult};
use super::producer::PlannedJob;
use super::transform::{resolve_attribute_option_combo, to_data_values, RowIds};

#[instrument(skip_all, fields(config_id = %job.main_config_id, data_item = %job.data_item.id, period = %job.period_id))]
pub async fn run_data_download(ctx: &PipelineContext, job: &DataJob) -> JobResult {
    // Live config for the source connection so credential changes apply
    let live = ctx
        .load_config(&job.main_config_id)
        .await
        .map_err(|e| JobFailure::from_error(&e))?;

    let dimensions =
        match pagination_guard(ctx, job, ProcessType::DataDownload, DimensionSpace::Source).await? {
            Guarded::FannedOut(done) => return Ok(done),
            Guarded::Proceed(dimensions) => dimensions,
        };

    let source = ctx
        .clients
        .source(&live.source)
        .map_err(|e| JobFailure::from_client(&e))?;
    let timeout = ctx.cap_timeout(job.runtime.timeout());

    let response = fetch_all(
        source.as_ref(),
        &dimensions,
        ctx.settings.fetch_page_size,
        timeout,
    )
    .await
    .map_err(|e| JobFailure::from_client(&e))?;

    if response.rows.is_empty() {
        info!("No source records for job");
        return Ok(JobDone::Empty);
    }

    let destination = ctx.clients.destination();
    let combo =
        resolve_attribute_option_combo(destination.as_ref(), &job.data_item, &dimensions, timeout)
            .await?;
    let transformed = to_data_values(&job.data_item, &response, RowIds::Source, combo.as_deref())?;
    if transformed.dropped > 0 {
        warn!(dropped = transformed.dropped, "Dropped rows without a destination mapping");
    }
    if transformed.values.is_empty() {
        info!("No mapped records for job");
        return Ok(JobDone::Empty);
    }

    let records = transformed.values.len();
    let payload = serde_json::to_value(DataValueSet::new(transformed.values))
        .map_err(|e| JobFailure::invalid_payload(e.to_string()))?;
    let name = artifact_name(&job.main_config_id, ProcessType::DataDownload);
    ctx.artifacts
        .save(&name, &payload)
        .await
        .map_err(|e| JobFailure::from_store(&e))?;

    let upload = UploadJob::from_artifact(&job.main_config_id, &name)
        .with_timeout_ms(job.runtime.timeout_ms)
        .for_item(&job.data_item.id, Some(job.period_id.clone()));

    let enqueued = match queue_names_for(&job.main_config_id) {
        Ok(queues) => ctx
            .producer()
            .enqueue(
                &queues,
                ProcessType::DataUpload,
                vec![PlannedJob::new(Job::DataUpload(upload))],
            )
            .await
            .map_err(|e| JobFailure::from_error(&e)),
        Err(e) => Err(JobFailure::from_messaging(&e)),
    };

    if let Err(failure) = enqueued {
        // Nothing references the artifact; a retry downloads it again
        if let Err(e) = ctx.artifacts.delete(&name).await {
            warn!(artifact = %name, error = %e, "Failed to delete orphaned artifact");
        }
        return Err(failure);
    }

    info!(artifact = %name, records, "📦 Records persisted and upload enqueued");
    Ok(JobDone::UploadEnqueued {
        artifact: name,
        records,
    })
}
