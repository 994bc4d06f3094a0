//! Fixture builders for migration configs and runtime options.

use analytics_migrator::models::{
    ConnectionConfig, DataItemConfig, DataItemType, ItemMapping, MigrationConfig, RuntimeConfig,
};

pub const CONFIG_ID: &str = "cfg-test";
pub const PERIOD: &str = "202401";

/// `DX_VALUES` item with `n` mappings `src{i} -> dst{i}`
pub fn dx_item(id: &str, n: usize) -> DataItemConfig {
    DataItemConfig {
        id: id.to_string(),
        item_type: DataItemType::DxValues,
        name: None,
        mapping: (0..n)
            .map(|i| ItemMapping::new(format!("src{i}"), format!("dst{i}")))
            .collect(),
        period_type_id: "MONTHLY".into(),
        parent_org_unit_id: "root".into(),
        org_unit_level: 3,
        attribute_id: None,
        attribute_options: vec![],
    }
}

pub fn attribute_item(id: &str, n: usize, options: &[&str]) -> DataItemConfig {
    DataItemConfig {
        item_type: DataItemType::AttributeValues,
        attribute_id: Some("attr".into()),
        attribute_options: options.iter().map(|o| o.to_string()).collect(),
        ..dx_item(id, n)
    }
}

pub fn migration_config(id: &str, data_items: Vec<DataItemConfig>) -> MigrationConfig {
    MigrationConfig {
        id: id.to_string(),
        name: Some("test migration".into()),
        source: ConnectionConfig::new("https://source.example.org").with_basic_auth("admin", "district"),
        data_items,
    }
}

pub fn runtime(periods: &[&str]) -> RuntimeConfig {
    RuntimeConfig {
        periods: periods.iter().map(|p| p.to_string()).collect(),
        ..RuntimeConfig::default()
    }
}

/// Analytics rows `[dx, pe, ou, value]`
pub fn rows(rows: &[[&str; 4]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}
