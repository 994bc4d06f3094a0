//! proptest strategies for planner properties.

use proptest::prelude::*;

use analytics_migrator::models::{DataItemConfig, RuntimeConfig};

use super::builders::{attribute_item, dx_item, PERIOD};

pub fn page_size() -> impl Strategy<Value = usize> {
    1usize..=60
}

pub fn dx_item_strategy() -> impl Strategy<Value = DataItemConfig> {
    (1usize..=200).prop_map(|n| dx_item("item", n))
}

pub fn attribute_item_strategy() -> impl Strategy<Value = DataItemConfig> {
    (1usize..=120, 1usize..=6).prop_map(|(n, options)| {
        let names: Vec<String> = (0..options).map(|i| format!("opt{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        attribute_item("item", n, &refs)
    })
}

pub fn runtime_strategy() -> impl Strategy<Value = RuntimeConfig> {
    (page_size(), any::<bool>()).prop_map(|(page_size, paginate_by_data)| RuntimeConfig {
        periods: vec![PERIOD.to_string()],
        page_size,
        paginate_by_data,
        ..RuntimeConfig::default()
    })
}
