//! Request and response shapes of the analytics and metadata endpoints.

use serde::{Deserialize, Serialize};

use crate::models::DimensionMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub dimensions: DimensionMap,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
}

impl AnalyticsQuery {
    pub fn first_page(dimensions: DimensionMap, page_size: u32) -> Self {
        Self {
            dimensions,
            page: 1,
            page_size,
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.dimensions.query_pairs();
        pairs.push(("paging".to_string(), "true".to_string()));
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("pageSize".to_string(), self.page_size.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct MetaData {
    #[serde(default)]
    pager: Option<Pager>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    #[serde(default)]
    pub headers: Vec<AnalyticsHeader>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    meta_data: Option<MetaData>,
}

impl AnalyticsResponse {
    pub fn new(headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers
                .iter()
                .map(|name| AnalyticsHeader {
                    name: name.to_string(),
                    column: None,
                })
                .collect(),
            rows,
            meta_data: None,
        }
    }

    pub fn with_pager(mut self, pager: Pager) -> Self {
        self.meta_data = Some(MetaData { pager: Some(pager) });
        self
    }

    pub fn pager(&self) -> Option<&Pager> {
        self.meta_data.as_ref().and_then(|m| m.pager.as_ref())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.name == name)
    }

    /// Pages available; 1 when the server did not page the response
    pub fn page_count(&self) -> u32 {
        self.pager().map(|p| p.page_count.max(1)).unwrap_or(1)
    }

    /// Total rows across all pages
    pub fn total(&self) -> u64 {
        self.pager()
            .map(|p| p.total)
            .unwrap_or(self.rows.len() as u64)
    }
}

/// Metadata objects to export, as `(object type, ids)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequest {
    pub objects: Vec<(String, Vec<String>)>,
}

impl MetadataRequest {
    pub fn with_objects(mut self, object_type: &str, ids: Vec<String>) -> Self {
        if !ids.is_empty() {
            self.objects.push((object_type.to_string(), ids));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// `{type}:filter=id:in:[..]` and `{type}:fields=:owner` per object type
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.objects.len() * 2);
        for (object_type, ids) in &self.objects {
            pairs.push((
                format!("{object_type}:filter"),
                format!("id:in:[{}]", ids.join(",")),
            ));
            pairs.push((format!("{object_type}:fields"), ":owner".to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataImportStats {
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataImportReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stats: MetadataImportStats,
}

impl MetadataImportReport {
    /// Parse a metadata import response, with or without the `response` envelope
    pub fn from_response(body: &serde_json::Value) -> Option<Self> {
        let candidate = match body.get("response") {
            Some(inner) if inner.get("stats").is_some() => inner,
            _ => body,
        };
        candidate.get("stats")?;
        serde_json::from_value(candidate.clone()).ok()
    }
}
