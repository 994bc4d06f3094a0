//! # Deletion Worker
//!
//! Download and upload in one job, against the destination only: read back the
//! destination's records for the job's dimensions (destination id space) and
//! import them with the `DELETE` strategy. Empty reads finish without a write.

use tracing::{info, instrument};

use crate::models::{DataJob, DataValueSet, ImportStrategy, ProcessType};
use crate::planner::DimensionSpace;

use super::context::PipelineContext;
use super::fetch::fetch_all;
use super::guard::{pagination_guard, Guarded};
use super::outcome::{JobDone, JobFailure, JobResult};
use super::transform::{resolve_attribute_option_combo, to_data_values, RowIds};
use super::upload::interpret_import;

#[instrument(skip_all, fields(config_id = %job.main_config_id, data_item = %job.data_item.id, period = %job.period_id))]
pub async fn run_data_deletion(ctx: &PipelineContext, job: &DataJob) -> JobResult {
    let dimensions = match pagination_guard(
        ctx,
        job,
        ProcessType::DataDeletion,
        DimensionSpace::Destination,
    )
    .await?
    {
        Guarded::FannedOut(done) => return Ok(done),
        Guarded::Proceed(dimensions) => dimensions,
    };

    let destination = ctx.clients.destination();
    let timeout = ctx.cap_timeout(job.runtime.timeout());

    let response = fetch_all(
        destination.as_ref(),
        &dimensions,
        ctx.settings.fetch_page_size,
        timeout,
    )
    .await
    .map_err(|e| JobFailure::from_client(&e))?;
    if response.rows.is_empty() {
        info!("No destination records to delete");
        return Ok(JobDone::Empty);
    }

    let combo =
        resolve_attribute_option_combo(destination.as_ref(), &job.data_item, &dimensions, timeout)
            .await?;
    let transformed =
        to_data_values(&job.data_item, &response, RowIds::Destination, combo.as_deref())?;
    if transformed.values.is_empty() {
        return Ok(JobDone::Empty);
    }

    info!(records = transformed.values.len(), "🧹 Deleting destination records");
    let result = destination
        .import_data_values(
            &DataValueSet::new(transformed.values),
            ImportStrategy::Delete,
            timeout,
        )
        .await;
    interpret_import(result)
}
