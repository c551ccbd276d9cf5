//! Phased system scheduling: the gravity simulation and tick ordering.

use std::cell::RefCell;
use std::rc::Rc;

use lattice_ecs::{ComponentHandle, Entity, Phase, QueryDesc, World};

#[derive(Debug, Clone, Copy)]
struct Velocity {
    vertical: f32,
}

#[derive(Debug, Clone, Copy)]
struct Height {
    value: f32,
}

const GRAVITY: f32 = 9.81;
const TIME_STEP: f32 = 0.05;

struct FallingWorld {
    world: World,
    entity: Entity,
    height: ComponentHandle<Height>,
    velocity: ComponentHandle<Velocity>,
}

fn falling_world() -> FallingWorld {
    let mut world = World::new();
    let velocity = world.register::<Velocity>("velocity");
    let height = world.register::<Height>("height");

    let entity = world.spawn();
    world.set(entity, height, Height { value: 3.0 }).unwrap();
    world
        .set(entity, velocity, Velocity { vertical: 10.0 })
        .unwrap();

    let desc = QueryDesc::new().with(velocity).with(height);
    world.add_system(
        Phase::Physics,
        &desc,
        |view| {
            let (velocities, heights) = view.slices::<(Velocity, Height)>();
            for (velocity, height) in velocities.iter_mut().zip(heights.iter_mut()) {
                height.value += velocity.vertical * TIME_STEP;
                velocity.vertical -= GRAVITY * TIME_STEP;
            }
        },
        "apply_gravity",
    );

    FallingWorld {
        world,
        entity,
        height,
        velocity,
    }
}

#[test]
fn one_tick_integrates_gravity() {
    let mut sim = falling_world();

    sim.world.progress();

    let height = sim.world.get(sim.entity, sim.height).unwrap().value;
    assert_eq!(height, 3.5);

    let vertical = sim.world.get(sim.entity, sim.velocity).unwrap().vertical;
    assert!((vertical - (10.0 - GRAVITY * TIME_STEP)).abs() < 1e-4);
    assert!((vertical - 9.5095).abs() < 1e-4);
}

#[test]
fn simulation_is_deterministic() {
    let run = || {
        let mut sim = falling_world();
        let mut ticks = 0u32;
        while sim.world.get(sim.entity, sim.height).unwrap().value > 0.0 {
            sim.world.progress();
            ticks += 1;
            assert!(ticks < 10_000, "simulation failed to terminate");
        }
        (ticks, sim.world.get(sim.entity, sim.height).unwrap().value)
    };

    let (first_ticks, first_height) = run();
    let (second_ticks, second_height) = run();
    assert_eq!(first_ticks, second_ticks);
    assert_eq!(first_height, second_height);
    assert!(first_height <= 0.0);
}

#[test]
fn phases_run_in_fixed_order() {
    let mut world = World::new();
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let everything = QueryDesc::new();

    // Registration order deliberately scrambled across phases.
    for (phase, label) in [
        (Phase::Render, "render"),
        (Phase::Physics, "physics"),
        (Phase::PostUpdate, "post_update"),
        (Phase::PreUpdate, "pre_update"),
        (Phase::Update, "update_first"),
        (Phase::Update, "update_second"),
        (Phase::Transform, "transform"),
        (Phase::PostRender, "post_render"),
        (Phase::PreRender, "pre_render"),
    ] {
        let log = Rc::clone(&log);
        let mut fired_this_tick = false;
        world.add_system(
            phase,
            &everything,
            move |_view| {
                // One entry per tick even if several archetypes match.
                if !fired_this_tick {
                    log.borrow_mut().push(label);
                    fired_this_tick = true;
                }
            },
            label,
        );
    }

    world.progress();

    assert_eq!(
        log.borrow().as_slice(),
        &[
            "physics",
            "pre_update",
            "update_first",
            "update_second",
            "post_update",
            "transform",
            "pre_render",
            "render",
            "post_render",
        ]
    );
}

#[test]
fn systems_see_rows_in_ascending_order() {
    let mut world = World::new();
    let value = world.register::<u32>("value");
    for seed in 0..8u32 {
        let entity = world.spawn();
        world.set(entity, value, seed).unwrap();
    }

    let seen: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    world.add_system(
        Phase::Update,
        &QueryDesc::new().with(value),
        move |view| {
            sink.borrow_mut().extend_from_slice(view.slice::<u32>(0));
        },
        "collect_values",
    );

    world.progress();
    assert_eq!(seen.borrow().as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[cfg(debug_assertions)]
#[test]
fn debug_builds_accumulate_system_stats() {
    let mut sim = falling_world();
    let id = sim
        .world
        .add_system(Phase::PostRender, &QueryDesc::new(), |_| {}, "noop");

    for _ in 0..5 {
        sim.world.progress();
    }

    let stats = sim.world.system_stats(id).unwrap();
    assert_eq!(stats.calls, 5);
}
