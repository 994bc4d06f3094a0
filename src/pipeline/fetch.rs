//! Paged analytics fetch shared by the download, deletion and validation paths.

use std::time::Duration;

use tracing::debug;

use crate::clients::{AnalyticsApi, AnalyticsQuery, AnalyticsResponse, ClientResult};
use crate::models::DimensionMap;

/// Fetch every page for `dimensions` and merge the rows into one response.
///
/// `timeout` bounds each page request, not the whole fetch.
pub async fn fetch_all(
    api: &dyn AnalyticsApi,
    dimensions: &DimensionMap,
    page_size: u32,
    timeout: Duration,
) -> ClientResult<AnalyticsResponse> {
    let mut query = AnalyticsQuery::first_page(dimensions.clone(), page_size);
    let mut combined = api.fetch_analytics(&query, timeout).await?;
    let page_count = combined.page_count();

    for page in 2..=page_count {
        query.page = page;
        let next = api.fetch_analytics(&query, timeout).await?;
        debug!(page, page_count, rows = next.rows.len(), "Fetched analytics page");
        combined.rows.extend(next.rows);
    }

    Ok(combined)
}
