#![allow(dead_code)]
//! Core benchmarks: entity creation, archetype transitions, query iteration.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lattice_ecs::{Phase, QueryDesc, World};

#[derive(Debug, Copy, Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Copy, Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Copy, Clone)]
struct Health(u32);

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_1k_two_components", |b| {
        b.iter(|| {
            let mut world = World::new();
            let position = world.register::<Position>("position");
            let velocity = world.register::<Velocity>("velocity");
            for i in 0..1_000 {
                let entity = world.spawn();
                world
                    .set(
                        entity,
                        position,
                        Position {
                            x: i as f32,
                            y: 0.0,
                            z: 0.0,
                        },
                    )
                    .unwrap();
                world
                    .set(entity, velocity, Velocity { x: 1.0, y: 0.0, z: 0.0 })
                    .unwrap();
            }
            black_box(world.entity_count())
        });
    });

    group.finish();
}

fn bench_transitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition");

    group.bench_function("add_remove_1k", |b| {
        let mut world = World::new();
        let position = world.register::<Position>("position");
        let health = world.register::<Health>("health");
        let entities: Vec<_> = (0..1_000)
            .map(|i| {
                let entity = world.spawn();
                world
                    .set(
                        entity,
                        position,
                        Position {
                            x: i as f32,
                            y: 0.0,
                            z: 0.0,
                        },
                    )
                    .unwrap();
                entity
            })
            .collect();

        b.iter(|| {
            for &entity in &entities {
                world.add_component(entity, health).unwrap();
            }
            for &entity in &entities {
                world.remove_component(entity, health).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    group.bench_function("query_10k_two_components", |b| {
        let mut world = World::new();
        let position = world.register::<Position>("position");
        let velocity = world.register::<Velocity>("velocity");
        for i in 0..10_000 {
            let entity = world.spawn();
            world
                .set(
                    entity,
                    position,
                    Position {
                        x: i as f32,
                        y: 0.0,
                        z: 0.0,
                    },
                )
                .unwrap();
            world
                .set(entity, velocity, Velocity { x: 1.0, y: 1.0, z: 0.0 })
                .unwrap();
        }
        let query = world.query(&QueryDesc::new().with(position).with(velocity));

        b.iter(|| {
            world.query_iterate(query, |view| {
                let (positions, velocities) = view.slices::<(Position, Velocity)>();
                for (p, v) in positions.iter_mut().zip(velocities.iter()) {
                    p.x += v.x;
                    p.y += v.y;
                    p.z += v.z;
                }
            });
        });
    });

    group.bench_function("progress_10k_gravity", |b| {
        let mut world = World::new();
        let position = world.register::<Position>("position");
        let velocity = world.register::<Velocity>("velocity");
        for i in 0..10_000 {
            let entity = world.spawn();
            world
                .set(
                    entity,
                    position,
                    Position {
                        x: i as f32,
                        y: 100.0,
                        z: 0.0,
                    },
                )
                .unwrap();
            world
                .set(entity, velocity, Velocity { x: 0.0, y: 0.0, z: 0.0 })
                .unwrap();
        }
        let desc = QueryDesc::new().with(position).with(velocity);
        world.add_system(
            Phase::Physics,
            &desc,
            |view| {
                let (positions, velocities) = view.slices::<(Position, Velocity)>();
                for (p, v) in positions.iter_mut().zip(velocities.iter_mut()) {
                    v.y -= 9.81 * 0.016;
                    p.y += v.y * 0.016;
                }
            },
            "apply_gravity",
        );

        b.iter(|| world.progress());
    });

    group.finish();
}

criterion_group!(benches, bench_spawn, bench_transitions, bench_iteration);
criterion_main!(benches);
