//! End-to-end behaviour of the engine: matching, deferred mutation, event
//! ordering, live re-registration and failure isolation.

use std::cell::RefCell;
use std::rc::Rc;

use engine_core::{
    Engine, EngineConfig, EngineError, Entity, EntityView, SYSTEM_FAILED, SchedulerState,
    Signature, SystemContext, UpdateFn,
};
use serde_json::{Value, json};

type Log<T> = Rc<RefCell<Vec<T>>>;

fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

fn update<F>(f: F) -> UpdateFn
where
    F: FnMut(&mut SystemContext<'_>, &mut EntityView<'_>) -> anyhow::Result<()> + 'static,
{
    Box::new(f)
}

fn engine() -> Engine {
    Engine::with_config(EngineConfig::new().with_tick_rate(None))
}

/// Register a system that records `(tick_id, entity)` for every invocation.
fn recording_system(engine: &mut Engine, name: &str, signature: &[&str], seen: &Log<(u64, Entity)>) {
    let seen = Rc::clone(seen);
    engine
        .register_system(name, signature.to_vec(), move |_ctx| {
            update(move |ctx, view| {
                seen.borrow_mut().push((ctx.tick_id(), view.entity()));
                Ok(())
            })
        })
        .unwrap();
}

fn invoked_in(seen: &Log<(u64, Entity)>, tick: u64) -> Vec<Entity> {
    seen.borrow()
        .iter()
        .filter(|(t, _)| *t == tick)
        .map(|(_, e)| *e)
        .collect()
}

#[test]
fn test_move_scenario() {
    let mut engine = engine();
    engine
        .register_component("POSITION", json!({"x": 0, "y": 0}))
        .unwrap();
    engine
        .register_system("Move", ["POSITION"], |_ctx| {
            update(|_ctx, view| {
                let position = view
                    .get_mut("POSITION")
                    .ok_or_else(|| anyhow::anyhow!("missing POSITION"))?;
                let x = position.get_i64("x")?;
                position.set("x", x + 1)?;
                Ok(())
            })
        })
        .unwrap();

    let e1 = engine.create_entity();
    engine.add_component(e1, "POSITION").unwrap();

    engine.tick();
    assert_eq!(engine.get_component(e1, "POSITION").unwrap().get_i64("x").unwrap(), 1);
    engine.tick();
    assert_eq!(engine.get_component(e1, "POSITION").unwrap().get_i64("x").unwrap(), 2);
}

#[test]
fn test_reactor_scenario() {
    let mut engine = engine();
    engine
        .register_component("JITTERBUG", json!({"amount": 0}))
        .unwrap();
    let amounts = log::<i64>();
    let seen = Rc::clone(&amounts);
    engine
        .register_system("Reactor", ["JITTERBUG"], move |_ctx| {
            update(move |_ctx, view| {
                let amount = view
                    .get("JITTERBUG")
                    .ok_or_else(|| anyhow::anyhow!("missing JITTERBUG"))?
                    .get_i64("amount")?;
                seen.borrow_mut().push(amount);
                Ok(())
            })
        })
        .unwrap();

    let e2 = engine.create_entity();
    let report = engine.tick();
    assert_eq!(report.invocations_of("Reactor"), 0);

    engine
        .add_component_with(e2, "JITTERBUG", json!({"amount": 3}))
        .unwrap();
    let report = engine.tick();
    assert_eq!(report.invocations_of("Reactor"), 1);
    assert_eq!(*amounts.borrow(), vec![3]);
}

#[test]
fn test_schema_reregistration_affects_future_instances_only() {
    let mut engine = engine();
    engine.register_component("A", json!({"x": 1})).unwrap();
    let before = engine.create_entity();
    engine.add_component(before, "A").unwrap();

    engine.register_component("A", json!({"x": 2})).unwrap();
    let after = engine.create_entity();
    engine.add_component(after, "A").unwrap();

    assert_eq!(engine.get_component(before, "A").unwrap().get_i64("x").unwrap(), 1);
    assert_eq!(engine.get_component(after, "A").unwrap().get_i64("x").unwrap(), 2);
}

#[test]
fn test_invocation_matches_snapshot_under_churn() {
    let mut engine = engine();
    for name in ["A", "B", "C"] {
        engine.register_component(name, Value::Null).unwrap();
    }
    let seen_ab = log();
    let seen_c = log();
    recording_system(&mut engine, "ab", &["A", "B"], &seen_ab);
    recording_system(&mut engine, "c", &["C"], &seen_c);

    let entities: Vec<Entity> = (0..12).map(|_| engine.create_entity()).collect();
    let sig_ab = Signature::new(["A", "B"]).unwrap();
    let sig_c = Signature::new(["C"]).unwrap();

    for round in 0..8u64 {
        for (i, &e) in entities.iter().enumerate() {
            if !engine.is_alive(e) {
                continue;
            }
            let i = i as u64;
            if (i + round) % 2 == 0 {
                engine.add_component(e, "A").unwrap();
            } else {
                engine.remove_component(e, "A").unwrap();
            }
            if (i * 3 + round) % 4 < 2 {
                engine.add_component(e, "B").unwrap();
            } else {
                engine.remove_component(e, "B").unwrap();
            }
            if (i + round * 5) % 3 == 0 {
                engine.add_component(e, "C").unwrap();
            } else {
                engine.remove_component(e, "C").unwrap();
            }
        }
        if round == 5 {
            engine.destroy_entity(entities[4]).unwrap();
        }

        let expected_ab = engine.world().scan(&sig_ab);
        let expected_c = engine.world().scan(&sig_c);
        let tick = engine.tick().tick_id;
        assert_eq!(invoked_in(&seen_ab, tick), expected_ab, "round {round}");
        assert_eq!(invoked_in(&seen_c, tick), expected_c, "round {round}");
    }
}

#[test]
fn test_listener_removal_applies_next_tick() {
    let mut engine = engine();
    engine.register_component("TRIGGER", Value::Null).unwrap();
    engine
        .register_component("POSITION", json!({"x": 0.0}))
        .unwrap();

    engine.on("strip", |ctx, payload| {
        let entity: Entity = serde_json::from_value(payload.clone())?;
        ctx.remove_component(entity, "POSITION")?;
        Ok(())
    });

    let target = engine.create_entity();
    engine.add_component(target, "POSITION").unwrap();
    let trigger = engine.create_entity();
    engine.add_component(trigger, "TRIGGER").unwrap();

    engine
        .register_system("Trigger", ["TRIGGER"], move |_ctx| {
            update(move |ctx, _view| {
                ctx.emit("strip", json!(target));
                Ok(())
            })
        })
        .unwrap();
    let seen = log();
    recording_system(&mut engine, "Mover", &["POSITION"], &seen);

    let report = engine.tick();
    assert_eq!(invoked_in(&seen, report.tick_id), vec![target]);
    assert!(!engine.has_component(target, "POSITION"));

    let report = engine.tick();
    assert!(invoked_in(&seen, report.tick_id).is_empty());
}

#[test]
fn test_component_added_mid_tick_visible_next_tick() {
    let mut engine = engine();
    engine.register_component("SEED", Value::Null).unwrap();
    engine
        .register_component("POSITION", json!({"x": 0.0}))
        .unwrap();

    let seed = engine.create_entity();
    engine.add_component(seed, "SEED").unwrap();
    let spawned = log::<Entity>();
    let record = Rc::clone(&spawned);
    engine
        .register_system("Spawner", ["SEED"], move |_ctx| {
            update(move |ctx, view| {
                let child = ctx.create_entity();
                assert!(ctx.is_alive(child));
                ctx.add_component_with(child, "POSITION", json!({"x": 5}))?;
                assert!(!ctx.has_component(child, "POSITION"));
                ctx.remove_component(view.entity(), "SEED")?;
                record.borrow_mut().push(child);
                Ok(())
            })
        })
        .unwrap();
    let seen = log();
    recording_system(&mut engine, "Mover", &["POSITION"], &seen);

    let first = engine.tick();
    assert_eq!(first.invocations_of("Mover"), 0);
    assert_eq!(first.applied, 3);

    let child = spawned.borrow()[0];
    assert!(engine.is_alive(child));
    assert_eq!(
        engine.get_component(child, "POSITION").unwrap().get_f64("x").unwrap(),
        5.0
    );

    let second = engine.tick();
    assert_eq!(second.invocations_of("Spawner"), 0);
    assert_eq!(invoked_in(&seen, second.tick_id), vec![child]);
}

#[test]
fn test_destroyed_mid_tick_still_visited() {
    let mut engine = engine();
    engine.register_component("MORTAL", Value::Null).unwrap();
    let entities: Vec<Entity> = (0..3).map(|_| engine.create_entity()).collect();
    for &e in &entities {
        engine.add_component(e, "MORTAL").unwrap();
    }

    engine
        .register_system("Reaper", ["MORTAL"], |_ctx| {
            update(|ctx, view| {
                ctx.destroy_entity(view.entity())?;
                Ok(())
            })
        })
        .unwrap();
    let seen = log();
    recording_system(&mut engine, "Witness", &["MORTAL"], &seen);

    let report = engine.tick();
    assert_eq!(invoked_in(&seen, report.tick_id), entities);
    assert_eq!(engine.entity_count(), 0);
    assert_eq!(engine.tick().total_invocations(), 0);
}

#[test]
fn test_event_order() {
    let mut engine = engine();
    let order = log::<&'static str>();
    for label in ["L1", "L2", "L3"] {
        let order = Rc::clone(&order);
        engine.on("ping", move |_ctx, _payload| {
            order.borrow_mut().push(label);
            Ok(())
        });
    }
    engine.emit("ping", Value::Null);
    assert_eq!(*order.borrow(), vec!["L1", "L2", "L3"]);
}

#[test]
fn test_subscription_during_emit_applies_to_later_emits() {
    let mut engine = engine();
    let calls = log::<&'static str>();
    let outer = Rc::clone(&calls);
    engine.on("ping", move |ctx, _payload| {
        outer.borrow_mut().push("outer");
        let inner = Rc::clone(&outer);
        ctx.on("ping", move |_ctx, _payload| {
            inner.borrow_mut().push("inner");
            Ok(())
        });
        Ok(())
    });

    engine.emit("ping", Value::Null);
    assert_eq!(*calls.borrow(), vec!["outer"]);
    engine.emit("ping", Value::Null);
    assert_eq!(*calls.borrow(), vec!["outer", "outer", "inner"]);
}

#[test]
fn test_off_removes_only_that_listener() {
    let mut engine = engine();
    let calls = log::<u8>();
    let first = Rc::clone(&calls);
    let handle = engine.on("ping", move |_ctx, _payload| {
        first.borrow_mut().push(1);
        Ok(())
    });
    let second = Rc::clone(&calls);
    engine.on("ping", move |_ctx, _payload| {
        second.borrow_mut().push(2);
        Ok(())
    });

    assert!(engine.off(&handle));
    assert!(!engine.off(&handle));
    engine.emit("ping", Value::Null);
    assert_eq!(*calls.borrow(), vec![2]);
    assert_eq!(engine.listener_count("ping"), 1);
}

#[test]
fn test_failing_listener_does_not_stop_others() {
    let mut engine = engine();
    let calls = log::<u8>();
    engine.on("ping", |_ctx, _payload| Err(anyhow::anyhow!("listener broke")));
    let after = Rc::clone(&calls);
    engine.on("ping", move |_ctx, _payload| {
        after.borrow_mut().push(1);
        Ok(())
    });
    engine.emit("ping", Value::Null);
    assert_eq!(*calls.borrow(), vec![1]);
}

#[test]
fn test_host_emit_applies_each_listener_before_the_next() {
    let mut engine = engine();
    engine.register_component("TAG", Value::Null).unwrap();
    let e = engine.create_entity();

    engine.on("mark", move |ctx, _payload| {
        ctx.add_component(e, "TAG")?;
        Ok(())
    });
    let seen = log::<bool>();
    let sink = Rc::clone(&seen);
    engine.on("mark", move |ctx, _payload| {
        sink.borrow_mut().push(ctx.has_component(e, "TAG"));
        Ok(())
    });

    engine.emit("mark", Value::Null);
    assert_eq!(*seen.borrow(), vec![true]);
    assert!(engine.has_component(e, "TAG"));
}

#[test]
fn test_listener_reads_other_entity_fields() {
    let mut engine = engine();
    engine
        .register_component("SCORE", json!({"points": 0}))
        .unwrap();
    let keeper = engine.create_entity();
    engine
        .add_component_with(keeper, "SCORE", json!({"points": 42}))
        .unwrap();

    let read = log::<Option<i64>>();
    let sink = Rc::clone(&read);
    engine.on("audit", move |ctx, _payload| {
        let points = match ctx.get_component(keeper, "SCORE") {
            Some(score) => Some(score.get_i64("points")?),
            None => None,
        };
        sink.borrow_mut().push(points);
        Ok(())
    });
    engine.emit("audit", Value::Null);
    assert_eq!(*read.borrow(), vec![Some(42)]);
}

#[test]
fn test_system_reads_other_entity_fields() {
    let mut engine = engine();
    engine.register_component("LEADER", json!({"x": 0})).unwrap();
    engine.register_component("FOLLOWER", json!({"x": 0})).unwrap();
    let leader = engine.create_entity();
    engine
        .add_component_with(leader, "LEADER", json!({"x": 10}))
        .unwrap();
    let follower = engine.create_entity();
    engine.add_component(follower, "FOLLOWER").unwrap();

    let own = log::<bool>();
    let sink = Rc::clone(&own);
    engine
        .register_system("follow", ["FOLLOWER"], move |_ctx| {
            update(move |ctx, view| {
                sink.borrow_mut()
                    .push(ctx.get_component(view.entity(), "FOLLOWER").is_some());
                let target = ctx
                    .get_component(leader, "LEADER")
                    .ok_or_else(|| anyhow::anyhow!("leader missing"))?
                    .get_i64("x")?;
                let me = view
                    .get_mut("FOLLOWER")
                    .ok_or_else(|| anyhow::anyhow!("missing FOLLOWER"))?;
                me.set("x", target)?;
                Ok(())
            })
        })
        .unwrap();

    let report = engine.tick();
    assert!(report.failures.is_empty());
    assert_eq!(*own.borrow(), vec![false]);
    assert_eq!(
        engine.get_component(follower, "FOLLOWER").unwrap().get_i64("x").unwrap(),
        10
    );
    assert!(engine.has_component(follower, "FOLLOWER"));
}

#[test]
fn test_disable_and_reenable() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();
    let seen = log();
    recording_system(&mut engine, "X", &["X"], &seen);

    engine.set_system_enabled("X", false);
    engine.set_system_enabled("X", false);
    let report = engine.tick();
    assert_eq!(report.invocations_of("X"), 0);
    assert_eq!(engine.is_system_enabled("X"), Some(false));

    engine.set_system_enabled("X", true);
    let report = engine.tick();
    assert_eq!(report.invocations_of("X"), 1);
}

#[test]
fn test_systems_run_in_registration_order() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    let order = log::<String>();
    for name in ["first", "second", "third"] {
        let order = Rc::clone(&order);
        engine
            .register_system(name, ["X"], move |_ctx| {
                update(move |ctx, _view| {
                    order.borrow_mut().push(ctx.system().unwrap_or_default().to_string());
                    Ok(())
                })
            })
            .unwrap();
    }
    engine.tick();
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_reregistering_system_replaces_closure_state() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    let counts = log::<(u32, u32)>();
    let register = |engine: &mut Engine, generation: u32| {
        let counts = Rc::clone(&counts);
        engine
            .register_system("counter", ["X"], move |_ctx| {
                let mut calls = 0;
                update(move |_ctx, _view| {
                    calls += 1;
                    counts.borrow_mut().push((generation, calls));
                    Ok(())
                })
            })
            .unwrap();
    };

    register(&mut engine, 1);
    let other = log();
    recording_system(&mut engine, "other", &["X"], &other);
    engine.tick();
    engine.tick();
    engine.set_system_enabled("counter", false);

    register(&mut engine, 2);
    assert_eq!(engine.is_system_enabled("counter"), Some(true));
    assert_eq!(engine.system_names(), vec!["counter", "other"]);
    engine.tick();

    assert_eq!(*counts.borrow(), vec![(1, 1), (1, 2), (2, 1)]);
}

#[test]
fn test_system_registered_mid_tick_runs_next_tick() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    let seen = log::<(u64, Entity)>();
    let late_log = Rc::clone(&seen);
    engine
        .register_system("installer", ["X"], move |_ctx| {
            let late_log = Rc::clone(&late_log);
            update(move |ctx, _view| {
                let late_log = Rc::clone(&late_log);
                ctx.register_system("late", ["X"], move |_ctx| {
                    update(move |ctx, view| {
                        late_log.borrow_mut().push((ctx.tick_id(), view.entity()));
                        Ok(())
                    })
                })?;
                ctx.unregister_system("installer");
                Ok(())
            })
        })
        .unwrap();

    let first = engine.tick();
    assert_eq!(first.invocations_of("late"), 0);
    assert_eq!(engine.system_names(), vec!["late"]);

    let second = engine.tick();
    assert_eq!(invoked_in(&seen, second.tick_id), vec![e]);
}

#[test]
fn test_unregistered_mid_tick_still_runs_this_tick() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    engine
        .register_system("remover", ["X"], |_ctx| {
            update(|ctx, _view| {
                ctx.unregister_system("victim");
                ctx.set_system_enabled("ghost", true);
                Ok(())
            })
        })
        .unwrap();
    let seen = log();
    recording_system(&mut engine, "victim", &["X"], &seen);

    let report = engine.tick();
    assert_eq!(report.invocations_of("victim"), 1);
    assert_eq!(engine.system_names(), vec!["remover"]);
}

#[test]
fn test_failure_is_isolated_and_reported() {
    let mut engine = engine();
    engine.register_component("X", json!({"poison": false})).unwrap();
    let entities: Vec<Entity> = (0..3).map(|_| engine.create_entity()).collect();
    engine.add_component(entities[0], "X").unwrap();
    engine
        .add_component_with(entities[1], "X", json!({"poison": true}))
        .unwrap();
    engine.add_component(entities[2], "X").unwrap();

    let failed = log::<Value>();
    let sink = Rc::clone(&failed);
    engine.on(SYSTEM_FAILED, move |_ctx, payload| {
        sink.borrow_mut().push(payload.clone());
        Ok(())
    });

    engine
        .register_system("fragile", ["X"], |_ctx| {
            update(|_ctx, view| {
                let poisoned = view
                    .get("X")
                    .ok_or_else(|| anyhow::anyhow!("missing X"))?
                    .get_bool("poison")?;
                anyhow::ensure!(!poisoned, "poisoned entity {}", view.entity());
                Ok(())
            })
        })
        .unwrap();
    let seen = log();
    recording_system(&mut engine, "sturdy", &["X"], &seen);

    let report = engine.tick();
    assert_eq!(report.invocations_of("fragile"), 2);
    assert_eq!(report.invocations_of("sturdy"), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].entity, Some(entities[1]));
    assert_eq!(engine.is_system_enabled("fragile"), Some(false));

    assert_eq!(failed.borrow().len(), 1);
    assert_eq!(failed.borrow()[0]["system"], json!("fragile"));

    let next = engine.tick();
    assert_eq!(next.invocations_of("fragile"), 0);
    assert_eq!(next.invocations_of("sturdy"), 3);
}

#[test]
fn test_panicking_init_registered_mid_tick_is_contained() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    let failed = log::<Value>();
    let sink = Rc::clone(&failed);
    engine.on(SYSTEM_FAILED, move |_ctx, payload| {
        sink.borrow_mut().push(payload.clone());
        Ok(())
    });

    engine
        .register_system("installer", ["X"], |_ctx| {
            update(|ctx, _view| {
                if ctx.tick_id() == 1 {
                    ctx.register_system("doomed", ["X"], |_ctx| -> UpdateFn {
                        panic!("init exploded")
                    })?;
                }
                Ok(())
            })
        })
        .unwrap();

    let report = engine.tick();
    assert_eq!(engine.system_names(), vec!["installer"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].system, "doomed");
    assert_eq!(report.failures[0].entity, None);
    assert!(report.failures[0].message.contains("init exploded"));
    assert_eq!(failed.borrow().len(), 1);
    assert_eq!(failed.borrow()[0]["entity"], Value::Null);

    let failures = engine.take_failures();
    assert_eq!(failures.len(), 1);
    let next = engine.tick();
    assert_eq!(next.invocations_of("installer"), 1);
    assert!(next.failures.is_empty());
}

#[test]
fn test_reference_errors_surface() {
    let mut engine = engine();
    engine
        .register_component("POSITION", json!({"x": 0.0}))
        .unwrap();
    let e = engine.create_entity();

    let err = engine.add_component(e, "MISSING").unwrap_err();
    assert!(err.is_unknown_component_type());

    let err = engine
        .add_component_with(e, "POSITION", json!({"z": 1.0}))
        .unwrap_err();
    assert!(err.is_shape_violation());

    let err = engine
        .register_component("NESTED", json!({"inner": {"x": 1}}))
        .unwrap_err();
    assert!(err.is_shape_violation());

    engine.remove_component(e, "POSITION").unwrap();

    engine.destroy_entity(e).unwrap();
    assert!(matches!(
        engine.destroy_entity(e),
        Err(EngineError::UnknownEntity(id)) if id == e
    ));
    assert!(matches!(
        engine.add_component(e, "POSITION"),
        Err(EngineError::UnknownEntity(_))
    ));
    assert!(matches!(
        engine.remove_component(e, "POSITION"),
        Err(EngineError::UnknownEntity(_))
    ));
    assert!(engine.get_component(e, "POSITION").is_none());

    let fresh = engine.create_entity();
    assert_ne!(fresh, e);
}

#[test]
fn test_context_rejects_dead_entities() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    let errors = log::<String>();
    let sink = Rc::clone(&errors);
    engine
        .register_system("double-kill", ["X"], move |_ctx| {
            update(move |ctx, view| {
                ctx.destroy_entity(view.entity())?;
                if let Err(err) = ctx.destroy_entity(view.entity()) {
                    sink.borrow_mut().push(err.to_string());
                }
                Ok(())
            })
        })
        .unwrap();

    engine.tick();
    assert_eq!(errors.borrow().len(), 1);
    assert!(!engine.is_alive(e));
}

#[test]
fn test_stop_handle_from_system() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();

    let handle = engine.stop_handle();
    engine
        .register_system("watchdog", ["X"], move |_ctx| {
            update(move |ctx, _view| {
                if ctx.tick_id() == 2 {
                    handle.stop();
                }
                Ok(())
            })
        })
        .unwrap();

    assert_eq!(engine.start().unwrap(), 2);
    assert_eq!(engine.state(), SchedulerState::Stopped);
    assert!(!engine.stop_handle().is_requested());
}

#[test]
fn test_host_stop_before_start_ends_after_first_tick() {
    let mut engine = Engine::with_config(
        EngineConfig::new().with_tick_rate(None).with_max_ticks(3),
    );
    engine.stop();
    assert_eq!(engine.state(), SchedulerState::Stopped);
    assert_eq!(engine.start().unwrap(), 1);
    assert_eq!(engine.state(), SchedulerState::Stopped);

    assert_eq!(engine.start().unwrap(), 3);
    assert_eq!(engine.tick_id(), 4);
}

#[test]
fn test_engines_are_independent() {
    let mut a = engine();
    let mut b = engine();
    a.register_component("ONLY_A", Value::Null).unwrap();
    let e = a.create_entity();
    a.add_component(e, "ONLY_A").unwrap();

    assert!(b.component_names().is_empty());
    assert_eq!(b.entity_count(), 0);
    assert!(b.add_component(e, "ONLY_A").is_err());
    assert_ne!(a.instance_id(), b.instance_id());
}

#[test]
fn test_mode_installs_bundle() {
    let mut engine = engine();
    engine
        .use_mode(|engine: &mut Engine| -> Result<(), EngineError> {
            engine.register_component("POSITION", json!({"x": 0.0}))?;
            engine.register_system("noop", ["POSITION"], |_ctx| update(|_ctx, _view| Ok(())))?;
            engine.on("noop.ping", |_ctx, _payload| Ok(()));
            Ok(())
        })
        .unwrap();
    assert_eq!(engine.system_names(), vec!["noop"]);
    assert_eq!(engine.listener_count("noop.ping"), 1);
}

#[tokio::test]
async fn test_start_async_runs_bounded_ticks() {
    let mut engine = Engine::with_config(
        EngineConfig::new()
            .with_tick_rate(Some(1000.0))
            .with_max_ticks(3),
    );
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();
    let seen = log();
    recording_system(&mut engine, "X", &["X"], &seen);

    let ticks = engine.start_async().await.unwrap();
    assert_eq!(ticks, 3);
    assert_eq!(seen.borrow().len(), 3);
    assert_eq!(engine.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn test_start_async_stops_from_system() {
    let mut engine = engine();
    engine.register_component("X", Value::Null).unwrap();
    let e = engine.create_entity();
    engine.add_component(e, "X").unwrap();
    engine
        .register_system("stopper", ["X"], |_ctx| {
            update(|ctx, _view| {
                if ctx.tick_id() == 4 {
                    ctx.stop();
                }
                Ok(())
            })
        })
        .unwrap();

    assert_eq!(engine.start_async().await.unwrap(), 4);
}
