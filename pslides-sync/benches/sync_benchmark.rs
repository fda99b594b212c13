use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use pslides_core::DeckState;
use pslides_sync::{BroadcastGroup, SyncMessage};
use uuid::Uuid;

fn typical_state() -> DeckState {
    DeckState {
        current_index: 12,
        current_slide_fragment_activation: vec![true; 8],
        clock_elapsed: 1_234_567,
        clock_start: Some(1_700_000_000_000),
    }
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("Protocol");
    group.throughput(Throughput::Elements(1));

    let peer = Uuid::new_v4();
    let deck = Uuid::new_v4();
    let state = typical_state();

    group.bench_function("encode_state", |b| {
        b.iter(|| {
            let msg = SyncMessage::state(peer, deck, 1, black_box(&state)).unwrap();
            black_box(msg.encode().unwrap())
        })
    });

    let encoded = SyncMessage::state(peer, deck, 1, &state).unwrap().encode().unwrap();
    group.bench_function("decode_state", |b| {
        b.iter(|| {
            let msg = SyncMessage::decode(black_box(&encoded)).unwrap();
            black_box(msg.deck_state().unwrap())
        })
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("Broadcast");
    let messages = 1_000;
    group.throughput(Throughput::Elements(messages));

    group.bench_function("1k_states_to_4_contexts", |b| {
        let channel = BroadcastGroup::new(2048);
        let mut receivers: Vec<_> = (0..4).map(|_| channel.subscribe()).collect();
        let encoded = Arc::new(
            SyncMessage::state(Uuid::new_v4(), Uuid::new_v4(), 1, &typical_state())
                .unwrap()
                .encode()
                .unwrap(),
        );

        b.iter(|| {
            for _ in 0..messages {
                channel.broadcast_raw(encoded.clone());
            }
            for rx in &mut receivers {
                while rx.try_recv().is_ok() {}
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_fan_out);
criterion_main!(benches);
