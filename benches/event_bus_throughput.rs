use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use reasoning_sessions::event_bus::{Event, EventBus, EventData, EventType};
use tokio::runtime::Runtime;

const BATCH_SIZES: &[usize] = &[64, 256, 1024];

async fn emit_batch(bus: &EventBus, batch: usize) {
    for i in 0..batch {
        bus.emit(Event::new(
            format!("event_{i}"),
            EventType::SessionUpdated,
            "bench-session",
            EventData::Session { status: "active".to_string() },
            chrono::Utc::now(),
        ))
        .await;
    }
}

fn event_bus_throughput(c: &mut Criterion) {
    let runtime = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("event_bus_emit");

    for &batch in BATCH_SIZES {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &size| {
            b.to_async(&runtime).iter(|| async {
                let bus = EventBus::default();
                emit_batch(&bus, size).await;
            });
        });
    }

    group.finish();
}

criterion_group!(benches, event_bus_throughput);
criterion_main!(benches);
