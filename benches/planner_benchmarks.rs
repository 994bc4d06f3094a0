use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use analytics_migrator::clients::AnalyticsResponse;
use analytics_migrator::models::{
    ConnectionConfig, DataItemConfig, DataItemType, ItemMapping, MigrationConfig, ProcessType,
    RuntimeConfig,
};
use analytics_migrator::pipeline::{plan_data_jobs, to_data_values, RowIds};
use analytics_migrator::planner::{plan, DimensionSpace, PlanRequest};

fn data_item(mappings: usize) -> DataItemConfig {
    DataItemConfig {
        id: "bench".into(),
        item_type: DataItemType::DxValues,
        name: None,
        mapping: (0..mappings)
            .map(|i| ItemMapping::new(format!("src{i}"), format!("dst{i}")))
            .collect(),
        period_type_id: "MONTHLY".into(),
        parent_org_unit_id: "root".into(),
        org_unit_level: 3,
        attribute_id: None,
        attribute_options: vec![],
    }
}

fn runtime(periods: usize) -> RuntimeConfig {
    RuntimeConfig {
        periods: (1..=periods).map(|m| format!("2024{m:02}")).collect(),
        paginate_by_data: true,
        ..RuntimeConfig::default()
    }
}

fn benchmark_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let runtime = runtime(1);
    for mappings in [10, 500, 5_000] {
        let item = data_item(mappings);
        group.bench_with_input(BenchmarkId::from_parameter(mappings), &item, |b, item| {
            b.iter(|| {
                plan(black_box(&PlanRequest {
                    data_item: item,
                    period_id: "202401",
                    runtime: &runtime,
                    override_dimensions: None,
                    space: DimensionSpace::Source,
                }))
            })
        });
    }
    group.finish();
}

fn benchmark_plan_data_jobs(c: &mut Criterion) {
    let config = MigrationConfig {
        id: "bench".into(),
        name: None,
        source: ConnectionConfig::new("https://source.example.org"),
        data_items: (0..20).map(|_| data_item(200)).collect(),
    };
    let runtime = runtime(12);
    c.bench_function("plan_data_jobs_20_items_12_periods", |b| {
        b.iter(|| plan_data_jobs(black_box(&config), &runtime, ProcessType::DataDownload))
    });
}

fn benchmark_transform(c: &mut Criterion) {
    let item = data_item(200);
    let rows = (0..10_000)
        .map(|i| {
            vec![
                format!("src{}", i % 250),
                "202401".to_string(),
                format!("ou{i}"),
                i.to_string(),
            ]
        })
        .collect();
    let response = AnalyticsResponse::new(&["dx", "pe", "ou", "value"], rows);
    c.bench_function("to_data_values_10k_rows", |b| {
        b.iter(|| to_data_values(black_box(&item), &response, RowIds::Source, None))
    });
}

criterion_group!(
    benches,
    benchmark_plan,
    benchmark_plan_data_jobs,
    benchmark_transform
);
criterion_main!(benches);
