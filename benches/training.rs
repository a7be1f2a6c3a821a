use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use transitml::prelude::*;

fn schema() -> Schema {
    Schema::new(
        (0..6).map(|i| format!("feature_{i}")).collect(),
        "disposition",
        (0..6).map(|i| format!("feature_{i}")).collect(),
    )
    .unwrap()
}

fn create_dataset(n_rows: usize) -> Vec<RawRecord> {
    let mut rng = rand::thread_rng();
    let labels = ["CONFIRMED", "CANDIDATE", "FALSE POSITIVE"];

    (0..n_rows)
        .map(|i| {
            let class = i % 3;
            let mut record = RawRecord::new();
            for f in 0..6 {
                let center = (class * 10 + f) as f64;
                record.insert(
                    format!("feature_{f}"),
                    RawValue::Number(center + rng.gen::<f64>()),
                );
            }
            record.insert("disposition", RawValue::Text(labels[class].to_string()));
            record
        })
        .collect()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [300, 1000].iter() {
        let rows = create_dataset(*n_rows);
        group.bench_with_input(BenchmarkId::new("train", n_rows), &rows, |b, rows| {
            b.iter(|| {
                let trainer = ModelTrainer::new(schema());
                trainer.train(black_box(rows)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let rows = create_dataset(1000);
    let (artifact, _) = ModelTrainer::new(schema()).train(&rows).unwrap();
    let service = InferenceService::new();
    service.load_artifact(artifact).unwrap();

    let batch: Vec<RawRecord> = create_dataset(100)
        .into_iter()
        .map(|mut r| {
            r.insert("disposition", RawValue::Null);
            r
        })
        .collect();

    group.bench_function("predict_100", |b| {
        b.iter(|| service.predict(black_box(&batch)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
