use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Per-run options posted alongside a job request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub periods: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub paginate_by_data: bool,
    /// Bound on each outbound fetch/post, in milliseconds
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_org_unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_level: Option<u32>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            periods: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            paginate_by_data: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            parent_org_unit_id: None,
            org_unit_level: None,
        }
    }
}

impl RuntimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Clamp the per-call timeout to a service-wide ceiling
    pub fn timeout_capped(&self, ceiling: Duration) -> Duration {
        self.timeout().min(ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_empty_body() {
        let runtime: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(runtime, RuntimeConfig::default());
        assert_eq!(runtime.page_size, 50);
        assert_eq!(runtime.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_and_timeout_field_name() {
        let runtime: RuntimeConfig = serde_json::from_value(serde_json::json!({
            "periods": ["202401", "202402"],
            "pageSize": 10,
            "paginateByData": true,
            "timeout": 1500,
            "orgUnitLevel": 3
        }))
        .unwrap();

        assert_eq!(runtime.periods.len(), 2);
        assert!(runtime.paginate_by_data);
        assert_eq!(runtime.timeout_ms, 1500);
        assert_eq!(runtime.org_unit_level, Some(3));
        assert_eq!(
            runtime.timeout_capped(Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }
}
