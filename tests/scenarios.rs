//! Integration tests for the concrete scenarios this crate's behavior is
//! specified against, exercised only through the public `World` API.

use std::cell::RefCell;
use std::rc::Rc;

use ecs_core::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: i32,
    y: i32,
}

struct Dead;
struct C;

#[test]
fn s1_basic_match_and_unmatch() {
    let world = World::new(|_w| Ok(())).unwrap();
    let e1 = world.create_entity(|w, e| w.insert_component(e, Position { x: 5, y: 0 }));

    let family = world
        .family(FamilyDefinition::new().all::<Position>().none::<Dead>())
        .unwrap();
    assert_eq!(family.len(), 1);
    assert_eq!(family.first(), e1);

    world.configure_entity(e1, |w, e| w.insert_component(e, Dead));
    assert_eq!(family.len(), 0);

    world.remove_component::<Dead>(e1);
    assert_eq!(family.len(), 1);
    assert_eq!(family.first(), e1);
}

#[test]
fn s2_deferred_removal_during_iteration() {
    let world = World::new(|_w| Ok(())).unwrap();
    let e1 = world.create_entity(|w, e| w.insert_component(e, C));
    let e2 = world.create_entity(|w, e| w.insert_component(e, C));
    let e3 = world.create_entity(|w, e| w.insert_component(e, C));

    let family = world.family(FamilyDefinition::new().all::<C>()).unwrap();

    let mut visited = Vec::new();
    family.for_each(|e| {
        visited.push(e);
        if e == e2 {
            world.remove_entity(e2);
        }
    });

    assert_eq!(visited, vec![e1, e2, e3]);
    assert_eq!(family.len(), 2);
    assert!(!family.contains(e2));
}

#[test]
fn s3_fixed_interval_accumulation() {
    struct Counter {
        ticks: Rc<RefCell<u32>>,
        last_alpha: Rc<RefCell<f32>>,
    }
    impl System for Counter {
        fn on_tick(&mut self, _world: &World) {
            *self.ticks.borrow_mut() += 1;
        }
        fn on_alpha(&mut self, _world: &World, alpha: f32) {
            *self.last_alpha.borrow_mut() = alpha;
        }
        fn interval(&self) -> Interval {
            Interval::Fixed(0.25)
        }
    }

    let ticks = Rc::new(RefCell::new(0));
    let last_alpha = Rc::new(RefCell::new(0.0));

    let world = World::new(|w| {
        w.add_system(Counter {
            ticks: ticks.clone(),
            last_alpha: last_alpha.clone(),
        })
    })
    .unwrap();

    world.tick(1.1);

    assert_eq!(*ticks.borrow(), 4);
    assert!((*last_alpha.borrow() - 0.4).abs() < 1e-5);
}

#[test]
fn s4_replacement_fires_both_hooks_in_order() {
    let trace = Rc::new(RefCell::new(Vec::<String>::new()));

    let add_trace = trace.clone();
    let remove_trace = trace.clone();

    let world = World::new(|w| {
        w.on_component_add::<Position>(move |_w, _e, p| {
            add_trace.borrow_mut().push(format!("add({},{})", p.x, p.y));
        })?;
        w.on_component_remove::<Position>(move |_w, _e, p| {
            remove_trace
                .borrow_mut()
                .push(format!("remove({},{})", p.x, p.y));
        })?;
        Ok(())
    })
    .unwrap();

    let e = world.create_entity(|w, e| w.insert_component(e, Position { x: 1, y: 0 }));
    world.configure_entity(e, |w, e| w.insert_component(e, Position { x: 2, y: 0 }));

    assert_eq!(
        *trace.borrow(),
        vec!["add(1,0)".to_string(), "remove(1,0)".to_string(), "add(2,0)".to_string()]
    );
}

#[test]
fn s5_generation_invalidates_stale_handle() {
    let world = World::new(|_w| Ok(())).unwrap();
    let e = world.create_entity(|_, _| {});
    world.remove_entity(e);
    let e2 = world.create_entity(|_, _| {});

    assert_eq!(e.id(), e2.id());
    assert_eq!(e2.generation(), e.generation() + 1);
    assert!(!world.contains(e));
    assert!(world.contains(e2));
    assert_ne!(e, e2);
}

#[test]
fn s6_family_backfill() {
    let world = World::new(|_w| Ok(())).unwrap();
    for _ in 0..100 {
        world.create_entity(|w, e| w.insert_component(e, Position { x: 0, y: 0 }));
    }

    let family = world.family(FamilyDefinition::new().all::<Position>()).unwrap();
    assert_eq!(family.len(), 100);
}
