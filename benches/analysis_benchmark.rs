use btstats::models::{Direction, EventKind, TraceEvent};
use btstats::parsers::blktrace::{encode_record, ByteOrder, TraceCodec};
use btstats::processors::{PluginArgs, PluginSet};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Cursor;

// Queue / insert / issue / complete for each request, sequential sectors
fn sample_events(requests: u64) -> Vec<TraceEvent> {
    (0..requests)
        .flat_map(|i| {
            let sector = i * 8;
            let t = i * 1_000;
            let dir = if i % 3 == 0 { Direction::Write } else { Direction::Read };
            [
                TraceEvent::of_kind(EventKind::Queue, dir, t, sector, 4096),
                TraceEvent::of_kind(EventKind::Insert, dir, t + 10, sector, 4096),
                TraceEvent::of_kind(EventKind::Issue, dir, t + 20, sector, 4096),
                TraceEvent::of_kind(EventKind::Complete, dir, t + 700, sector, 4096),
            ]
        })
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let events = sample_events(2_500);
    let mut group = c.benchmark_group("decode");

    for (name, order) in [("native", ByteOrder::Native), ("swapped", ByteOrder::Swapped)] {
        let bytes: Vec<u8> = events.iter().flat_map(|e| encode_record(e, order).unwrap()).collect();

        group.bench_function(name, |b| {
            b.iter(|| {
                let codec = TraceCodec::default();
                let mut reader = Cursor::new(black_box(&bytes));
                let mut count = 0usize;
                while let Ok(Some(_)) = codec.decode(&mut reader) {
                    count += 1;
                }
                count
            })
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let events = sample_events(2_500);
    let mut group = c.benchmark_group("dispatch");

    group.bench_function("plugin_set_feed", |b| {
        b.iter(|| {
            let mut set = PluginSet::new(&PluginArgs::default()).unwrap();
            for event in events.iter() {
                set.feed(black_box(event));
            }
            set.close();
            set
        })
    });

    group.bench_function("plugin_set_report", |b| {
        let mut set = PluginSet::new(&PluginArgs::default()).unwrap();
        events.iter().for_each(|e| set.feed(e));
        set.close();
        b.iter(|| black_box(&set).report())
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_dispatch);
criterion_main!(benches);
