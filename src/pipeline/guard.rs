//! Pagination guard shared by the download and deletion workers.
//!
//! A job without override dimensions is planned again; if the plan paginates,
//! the sub-jobs are enqueued on the job's own queue and the job itself is done.
//! A job with overrides always proceeds with exactly those dimensions.

use tracing::info;

use crate::messaging::queue_names_for;
use crate::models::{DataJob, DimensionMap, Job, ProcessType};
use crate::planner::{plan, DimensionSpace, PlanRequest, PlanVerdict};

use super::context::PipelineContext;
use super::outcome::{JobDone, JobFailure};
use super::producer::PlannedJob;

pub enum Guarded {
    Proceed(DimensionMap),
    FannedOut(JobDone),
}

pub async fn pagination_guard(
    ctx: &PipelineContext,
    job: &DataJob,
    process: ProcessType,
    space: DimensionSpace,
) -> Result<Guarded, JobFailure> {
    let request = PlanRequest {
        data_item: &job.data_item,
        period_id: &job.period_id,
        runtime: &job.runtime,
        override_dimensions: job.override_dimensions.as_ref(),
        space,
    };

    let (dimension, chunks) = match plan(&request).map_err(|e| JobFailure::from_planner(&e))? {
        PlanVerdict::Single(dimensions) => return Ok(Guarded::Proceed(dimensions)),
        PlanVerdict::Paginate { dimension, chunks } => (dimension, chunks),
    };

    let wrap: fn(DataJob) -> Job = match process {
        ProcessType::DataDeletion => Job::DataDeletion,
        _ => Job::DataDownload,
    };
    let sub_jobs: Vec<PlannedJob> = chunks
        .into_iter()
        .map(|chunk| PlannedJob {
            job: wrap(job.with_override(chunk)),
            paginated_by: Some(dimension.clone()),
        })
        .collect();

    let queues = queue_names_for(&job.main_config_id).map_err(|e| JobFailure::from_messaging(&e))?;
    let report = ctx
        .producer()
        .enqueue(&queues, process, sub_jobs)
        .await
        .map_err(|e| JobFailure::from_error(&e))?;

    info!(
        sub_jobs = report.enqueued,
        dimension = %dimension,
        "🔀 Job fanned out into paginated sub-jobs"
    );
    Ok(Guarded::FannedOut(JobDone::FannedOut {
        sub_jobs: report.enqueued,
        dimension,
    }))
}
