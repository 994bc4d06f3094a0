//! # Metadata Workers
//!
//! `metadata-download` exports the source metadata a data item depends on (its
//! mapped data elements and category option combos, plus the attribute category
//! and options for attribute items), persists it as an artifact and enqueues a
//! `metadata-upload`, which imports it into the destination.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::clients::MetadataRequest;
use crate::messaging::queue_names_for;
use crate::models::{DataItemConfig, Job, MetadataJob, ProcessType, UploadJob};
use crate::store::artifact_name;

use super::context::PipelineContext;
use super::outcome::{JobDone, JobFailure, JobResult};
use super::producer::PlannedJob;
use super::upload::{discard_artifact, load_payload};

#[instrument(skip_all, fields(config_id = %job.main_config_id, data_item = %job.data_item.id))]
pub async fn run_metadata_download(ctx: &PipelineContext, job: &MetadataJob) -> JobResult {
    let live = ctx
        .load_config(&job.main_config_id)
        .await
        .map_err(|e| JobFailure::from_error(&e))?;

    let request = metadata_request(&job.data_item);
    if request.is_empty() {
        return Ok(JobDone::Empty);
    }

    let source = ctx
        .clients
        .source(&live.source)
        .map_err(|e| JobFailure::from_client(&e))?;
    let metadata = source
        .fetch_metadata(&request, ctx.cap_timeout(job.runtime.timeout()))
        .await
        .map_err(|e| JobFailure::from_client(&e))?;

    let objects = object_count(&metadata);
    if objects == 0 {
        info!("Source returned no metadata objects");
        return Ok(JobDone::Empty);
    }

    let name = artifact_name(&job.main_config_id, ProcessType::MetadataDownload);
    ctx.artifacts
        .save(&name, &metadata)
        .await
        .map_err(|e| JobFailure::from_store(&e))?;

    let upload = UploadJob::from_artifact(&job.main_config_id, &name)
        .with_timeout_ms(job.runtime.timeout_ms)
        .for_item(&job.data_item.id, None);
    let enqueued = match queue_names_for(&job.main_config_id) {
        Ok(queues) => ctx
            .producer()
            .enqueue(
                &queues,
                ProcessType::MetadataUpload,
                vec![PlannedJob::new(Job::MetadataUpload(upload))],
            )
            .await
            .map_err(|e| JobFailure::from_error(&e)),
        Err(e) => Err(JobFailure::from_messaging(&e)),
    };
    if let Err(failure) = enqueued {
        if let Err(e) = ctx.artifacts.delete(&name).await {
            warn!(artifact = %name, error = %e, "Failed to delete orphaned artifact");
        }
        return Err(failure);
    }

    info!(artifact = %name, objects, "📦 Metadata persisted and upload enqueued");
    Ok(JobDone::UploadEnqueued {
        artifact: name,
        records: objects,
    })
}

#[instrument(skip_all, fields(config_id = %job.main_config_id, artifact = job.artifact.as_deref().unwrap_or("<inline>")))]
pub async fn run_metadata_upload(ctx: &PipelineContext, job: &UploadJob) -> JobResult {
    let payload = load_payload(ctx, job).await?;
    if object_count(&payload) == 0 {
        return Err(JobFailure::invalid_payload(
            "metadata payload contains no objects",
        ));
    }

    let result = ctx
        .clients
        .destination()
        .import_metadata(&payload, ctx.cap_timeout(job.timeout()))
        .await;
    let done = match result {
        Ok(report) => {
            if report.stats.ignored > 0 {
                warn!(
                    ignored = report.stats.ignored,
                    status = report.status.as_deref().unwrap_or("unknown"),
                    "Destination ignored metadata objects"
                );
            } else {
                info!(
                    created = report.stats.created,
                    updated = report.stats.updated,
                    "✅ Metadata imported"
                );
            }
            JobDone::MetadataImported { report }
        }
        Err(err) if err.is_conflict() => {
            warn!(error = %err, "Destination reported metadata conflicts; treating as partial success");
            JobDone::PartialSuccess { summary: None }
        }
        Err(err) => return Err(JobFailure::from_client(&err)),
    };

    if let Some(artifact) = &job.artifact {
        discard_artifact(ctx, artifact).await;
    }
    Ok(done)
}

/// Metadata objects referenced by a data item
pub fn metadata_request(data_item: &DataItemConfig) -> MetadataRequest {
    let mut elements = Vec::new();
    let mut combos = Vec::new();
    for id in data_item.source_ids() {
        match id.split_once('.') {
            Some((element, combo)) => {
                push_unique(&mut elements, element);
                push_unique(&mut combos, combo);
            }
            None => push_unique(&mut elements, &id),
        }
    }

    let mut request = MetadataRequest::default()
        .with_objects("dataElements", elements)
        .with_objects("categoryOptionCombos", combos);
    if data_item.is_attribute() {
        request = request
            .with_objects(
                "categories",
                data_item.attribute_id.iter().cloned().collect(),
            )
            .with_objects("categoryOptions", data_item.attribute_options.clone());
    }
    request
}

fn push_unique(ids: &mut Vec<String>, id: &str) {
    if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

/// Objects across all metadata collections; `system` and other non-array keys are ignored
fn object_count(metadata: &Value) -> usize {
    metadata
        .as_object()
        .map(|collections| {
            collections
                .values()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .sum()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataItemType, ItemMapping};
    use serde_json::json;

    #[test]
    fn test_request_splits_operands_and_adds_attribute_objects() {
        let item = DataItemConfig {
            id: "item".into(),
            item_type: DataItemType::AttributeValues,
            name: None,
            mapping: vec![
                ItemMapping::new("de1.coc1", "x"),
                ItemMapping::new("de1.coc2", "y"),
                ItemMapping::new("de2", "z"),
            ],
            period_type_id: "MONTHLY".into(),
            parent_org_unit_id: "root".into(),
            org_unit_level: 2,
            attribute_id: Some("attr".into()),
            attribute_options: vec!["o1".into(), "o2".into()],
        };

        let request = metadata_request(&item);
        assert_eq!(
            request.objects,
            vec![
                ("dataElements".to_string(), vec!["de1".to_string(), "de2".to_string()]),
                ("categoryOptionCombos".to_string(), vec!["coc1".to_string(), "coc2".to_string()]),
                ("categories".to_string(), vec!["attr".to_string()]),
                ("categoryOptions".to_string(), vec!["o1".to_string(), "o2".to_string()]),
            ]
        );
    }

    #[test]
    fn test_object_count_ignores_system_block() {
        let metadata = json!({"system": {"version": "2.40"}, "dataElements": [{"id": "a"}, {"id": "b"}]});
        assert_eq!(object_count(&metadata), 2);
        assert_eq!(object_count(&json!({"system": {}})), 0);
    }
}
