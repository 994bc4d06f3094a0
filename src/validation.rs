//! # Data Validation
//!
//! Compares record counts between source and destination for every
//! `(data item, period)` pair of a config. The source is queried in source id
//! space and the destination in destination id space, each with a one-row page so
//! only the pager total crosses the wire.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument};

use crate::clients::{AnalyticsApi, AnalyticsQuery, ClientFactory};
use crate::error::{MigratorError, MigratorResult};
use crate::models::{DataItemConfig, MigrationConfig, RuntimeConfig};
use crate::planner::{query_maps, DimensionSpace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRow {
    pub data_item_id: String,
    pub period_id: String,
    pub source_count: u64,
    pub destination_count: u64,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub config_id: String,
    pub all_match: bool,
    pub rows: Vec<ValidationRow>,
}

pub struct DataValidator {
    clients: Arc<dyn ClientFactory>,
    max_timeout: Duration,
}

impl std::fmt::Debug for DataValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataValidator")
            .field("max_timeout", &self.max_timeout)
            .finish_non_exhaustive()
    }
}

impl DataValidator {
    pub fn new(clients: Arc<dyn ClientFactory>, max_timeout: Duration) -> Self {
        Self {
            clients,
            max_timeout,
        }
    }

    #[instrument(skip_all, fields(config_id = %config.id))]
    pub async fn validate(
        &self,
        config: &MigrationConfig,
        runtime: &RuntimeConfig,
    ) -> MigratorResult<ValidationReport> {
        if runtime.periods.is_empty() {
            return Err(MigratorError::invalid_request("at least one period is required"));
        }

        let source = self.clients.source(&config.source)?;
        let destination = self.clients.destination();
        let timeout = runtime.timeout_capped(self.max_timeout);

        let mut rows = Vec::new();
        for data_item in &config.data_items {
            for period_id in &runtime.periods {
                let source_count = count_records(
                    source.as_ref(),
                    data_item,
                    period_id,
                    runtime,
                    DimensionSpace::Source,
                    timeout,
                )
                .await?;
                let destination_count = count_records(
                    destination.as_ref(),
                    data_item,
                    period_id,
                    runtime,
                    DimensionSpace::Destination,
                    timeout,
                )
                .await?;
                rows.push(ValidationRow {
                    data_item_id: data_item.id.clone(),
                    period_id: period_id.clone(),
                    source_count,
                    destination_count,
                    matches: source_count == destination_count,
                });
            }
        }

        let all_match = rows.iter().all(|row| row.matches);
        info!(pairs = rows.len(), all_match, "Validation finished");
        Ok(ValidationReport {
            config_id: config.id.clone(),
            all_match,
            rows,
        })
    }
}

async fn count_records(
    api: &dyn AnalyticsApi,
    data_item: &DataItemConfig,
    period_id: &str,
    runtime: &RuntimeConfig,
    space: DimensionSpace,
    timeout: Duration,
) -> MigratorResult<u64> {
    let mut total = 0;
    for dimensions in query_maps(data_item, period_id, runtime, space)? {
        let response = api
            .fetch_analytics(&AnalyticsQuery::first_page(dimensions, 1), timeout)
            .await?;
        total += response.total();
    }
    Ok(total)
}
