//! # Upload Worker
//!
//! Imports a data value set into the destination with `CREATE_AND_UPDATE`.
//! The payload is inline or an artifact reference, never both. The artifact is
//! deleted after a successful or conflicting (409) import and kept otherwise.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::clients::ClientResult;
use crate::models::{DataValueSet, ImportStrategy, ImportSummary, UploadJob};

use super::context::PipelineContext;
use super::outcome::{JobDone, JobFailure, JobResult};

#[instrument(skip_all, fields(config_id = %job.main_config_id, artifact = job.artifact.as_deref().unwrap_or("<inline>")))]
pub async fn run_data_upload(ctx: &PipelineContext, job: &UploadJob) -> JobResult {
    let payload = load_payload(ctx, job).await?;
    let values = parse_data_values(payload)?;

    let result = ctx
        .clients
        .destination()
        .import_data_values(
            &values,
            ImportStrategy::CreateAndUpdate,
            ctx.cap_timeout(job.timeout()),
        )
        .await;
    let done = interpret_import(result)?;

    if let Some(artifact) = &job.artifact {
        discard_artifact(ctx, artifact).await;
    }
    Ok(done)
}

/// Inline payload or the referenced artifact's contents
pub(crate) async fn load_payload(ctx: &PipelineContext, job: &UploadJob) -> Result<Value, JobFailure> {
    match (&job.payload, &job.artifact) {
        (Some(_), Some(_)) => Err(JobFailure::invalid_payload(
            "upload job carries both an inline payload and an artifact",
        )),
        (None, None) => Err(JobFailure::invalid_payload(
            "upload job carries neither an inline payload nor an artifact",
        )),
        (Some(payload), None) => Ok(payload.clone()),
        (None, Some(artifact)) => ctx
            .artifacts
            .load(artifact)
            .await
            .map_err(|e| JobFailure::from_store(&e)),
    }
}

/// `dataValues` must be a non-empty array of data values
pub(crate) fn parse_data_values(payload: Value) -> Result<DataValueSet, JobFailure> {
    match payload.get("dataValues") {
        Some(Value::Array(values)) if !values.is_empty() => {}
        Some(Value::Array(_)) => return Err(JobFailure::invalid_payload("dataValues is empty")),
        _ => return Err(JobFailure::invalid_payload("dataValues must be an array")),
    }
    serde_json::from_value(payload)
        .map_err(|e| JobFailure::invalid_payload(format!("malformed dataValues: {e}")))
}

/// Import result to job outcome; a 409 is a partial success
pub(crate) fn interpret_import(result: ClientResult<ImportSummary>) -> JobResult {
    match result {
        Ok(summary) => {
            let count = &summary.import_count;
            if count.ignored > 0 {
                warn!(
                    imported = count.imported,
                    updated = count.updated,
                    ignored = count.ignored,
                    deleted = count.deleted,
                    "Destination ignored records"
                );
            } else {
                info!(
                    imported = count.imported,
                    updated = count.updated,
                    deleted = count.deleted,
                    "✅ Import complete"
                );
            }
            Ok(JobDone::Imported { summary })
        }
        Err(err) if err.is_conflict() => {
            let summary = err.import_summary();
            match &summary {
                Some(summary) => warn!(
                    imported = summary.import_count.imported,
                    updated = summary.import_count.updated,
                    ignored = summary.import_count.ignored,
                    deleted = summary.import_count.deleted,
                    conflicts = summary.conflicts.len(),
                    "Destination reported conflicts; treating as partial success"
                ),
                None => warn!("Destination reported a conflict without an import summary"),
            }
            Ok(JobDone::PartialSuccess { summary })
        }
        Err(err) => Err(JobFailure::from_client(&err)),
    }
}

pub(crate) async fn discard_artifact(ctx: &PipelineContext, artifact: &str) {
    if let Err(e) = ctx.artifacts.delete(artifact).await {
        warn!(artifact = %artifact, error = %e, "Failed to delete artifact after import");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use serde_json::json;

    #[test]
    fn test_payload_shape_validation() {
        assert!(parse_data_values(json!({})).is_err());
        assert!(parse_data_values(json!({"dataValues": []})).is_err());
        assert!(parse_data_values(json!({"dataValues": [{"value": 1}]})).is_err());

        let set = parse_data_values(json!({"dataValues": [{
            "dataElement": "de", "period": "202401", "orgUnit": "ou", "value": "4"
        }]}))
        .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_conflict_is_partial_success() {
        let result = interpret_import(Err(ClientError::Http {
            status: 409,
            url: "https://dst/api/dataValueSets".into(),
            body: r#"{"importCount":{"imported":0,"ignored":5,"updated":0,"deleted":0}}"#.into(),
        }));
        match result {
            Ok(JobDone::PartialSuccess { summary: Some(summary) }) => {
                assert_eq!(summary.import_count.ignored, 5)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_server_error_fails_the_job() {
        let failure = interpret_import(Err(ClientError::Http {
            status: 502,
            url: "u".into(),
            body: "bad gateway".into(),
        }))
        .unwrap_err();
        assert!(failure.is_retryable());
        assert_eq!(failure.http.unwrap().body, "bad gateway");
    }
}
