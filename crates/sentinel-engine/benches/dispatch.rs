//! Benchmarks for manifest loading and check dispatch
//!
//! These measure how the dispatch loop scales with project size, using
//! generated manifests where every model depends on the two before it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sentinel_core::ConfigDocument;
use sentinel_dbt::Manifest;
use sentinel_engine::{plan, run, Artifacts, Registry};

/// Generate a v12 manifest with N models
fn generate_large_manifest(num_models: usize) -> String {
    let mut nodes = serde_json::Map::new();

    for i in 0..num_models {
        let model_id = format!("model.project.model_{}", i);
        let depends_on: Vec<String> = (i.saturating_sub(2)..i)
            .map(|j| format!("model.project.model_{}", j))
            .collect();
        let layer = if i % 2 == 0 { "staging" } else { "marts" };

        let node = serde_json::json!({
            "name": format!("model_{}", i),
            "resource_type": "model",
            "package_name": "project",
            "original_file_path": format!("models/{}/model_{}.sql", layer, i),
            "unique_id": model_id.clone(),
            "description": if i % 3 == 0 { "" } else { "A generated model" },
            "config": { "materialized": "table" },
            "tags": ["generated"],
            "meta": {},
            "depends_on": { "nodes": depends_on, "macros": [] }
        });
        nodes.insert(model_id, node);
    }

    serde_json::json!({
        "metadata": {
            "dbt_schema_version": "https://schemas.getdbt.com/dbt/manifest/v12.json",
            "dbt_version": "1.8.0",
            "project_name": "project",
            "generated_at": "2024-01-01T00:00:00Z"
        },
        "nodes": nodes,
        "sources": {},
        "macros": {}
    })
    .to_string()
}

const CONFIG: &str = "
manifest_checks:
  - name: check_model_description_populated
  - name: check_model_names
    include: ^models/staging
    model_name_pattern: ^model_
  - name: check_model_has_tags
    tags: [generated]
  - name: check_model_max_fanout
  - name: check_model_documentation_coverage
";

/// Benchmark: Parse and normalize large manifests (100, 1000, 5000 models)
fn bench_manifest_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest_loading");

    for num_models in [100, 1000, 5000].iter() {
        let manifest_json = generate_large_manifest(*num_models);

        group.bench_with_input(BenchmarkId::from_parameter(num_models), num_models, |b, _| {
            b.iter(|| black_box(Manifest::from_str(&manifest_json)))
        });
    }

    group.finish();
}

/// Benchmark: Expand definitions into (check, resource) jobs
fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    let definitions = Registry::builtin()
        .validate(&ConfigDocument::from_yaml(CONFIG).unwrap())
        .unwrap();

    for num_models in [100, 1000, 5000].iter() {
        let manifest = Manifest::from_str(&generate_large_manifest(*num_models)).unwrap();
        let artifacts = Artifacts::new(manifest);

        group.bench_with_input(BenchmarkId::from_parameter(num_models), num_models, |b, _| {
            b.iter(|| black_box(plan(&definitions, &artifacts.context()).len()))
        });
    }

    group.finish();
}

/// Benchmark: Full run, planning plus execution plus sorting
fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    let definitions = Registry::builtin()
        .validate(&ConfigDocument::from_yaml(CONFIG).unwrap())
        .unwrap();

    for num_models in [100, 1000, 5000].iter() {
        let manifest = Manifest::from_str(&generate_large_manifest(*num_models)).unwrap();
        let artifacts = Artifacts::new(manifest);

        group.bench_with_input(BenchmarkId::from_parameter(num_models), num_models, |b, _| {
            b.iter(|| black_box(run(&definitions, &artifacts.context())))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_manifest_loading, bench_planning, bench_full_run);
criterion_main!(benches);
