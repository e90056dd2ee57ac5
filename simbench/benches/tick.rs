//! Full-tick benchmarks: prepare, encode for every observer, post-update.
//!
//! Run with: cargo bench --package infosync-simbench --bench tick

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use simbench::{SimConfig, Simulation};
use wire::InfoProtocol;

fn crowd(protocol: InfoProtocol, avatars: u16, observers: u16) -> Simulation {
    Simulation::new(SimConfig {
        protocol,
        avatars,
        observers,
        ticks: 1,
        ..SimConfig::default()
    })
    .unwrap()
}

fn benchmark_player_crowd(c: &mut Criterion) {
    let mut group = c.benchmark_group("player_tick");
    group.sample_size(20);
    for &(avatars, observers) in &[(200u16, 50u16), (1000, 250), (2000, 2000)] {
        group.throughput(Throughput::Elements(u64::from(observers)));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{avatars}x{observers}")),
            &(avatars, observers),
            |b, &(avatars, observers)| {
                let mut sim = crowd(InfoProtocol::Player, avatars, observers);
                b.iter(|| black_box(sim.run().unwrap()));
            },
        );
    }
    group.finish();
}

fn benchmark_npc_crowd(c: &mut Criterion) {
    let mut sim = crowd(InfoProtocol::Npc, 4000, 500);
    c.bench_function("npc_tick_4000x500", |b| {
        b.iter(|| black_box(sim.run().unwrap()));
    });
}

criterion_group!(benches, benchmark_player_crowd, benchmark_npc_crowd);
criterion_main!(benches);
