use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn test_config() -> WorldConfig {
    WorldConfig {
        width: 400.0,
        height: 200.0,
        seed: Some(7),
        ..WorldConfig::default()
    }
}

fn message(user_id: &str, text: &str) -> Message {
    Message {
        display_name: format!("user{}", user_id),
        user_id: user_id.to_string(),
        text: text.to_string(),
        color: None,
        emotes: Vec::new(),
    }
}

/// Ticks until the dude is standing on the floor
fn settle(dude: &mut Dude, config: &WorldConfig, rng: &mut StdRng) {
    for _ in 0..500 {
        dude.update(config, rng);
        if matches!(dude.state(), AnimationState::Idle | AnimationState::Run) {
            return;
        }
    }
    panic!("dude never settled, state {:?}", dude.state());
}

#[test]
fn test_spawn_above_scene_within_bounds() {
    let config = test_config();
    let mut rng = StdRng::seed_from_u64(1);

    for i in 0..50 {
        let dude = Dude::spawn(&i.to_string(), "x", &config, &mut rng);
        let position = dude.position();
        assert_eq!(position.y, -32.0);
        assert!(position.x >= 64.0 && position.x < config.width - 64.0);
        assert!(dude.direction() == 1.0 || dude.direction() == -1.0);
        assert_eq!(dude.state(), AnimationState::Idle);
        assert_eq!(dude.tint(), "#969696");
    }
}

#[test]
fn test_spawned_dude_falls_and_lands() {
    let config = test_config();
    let mut rng = StdRng::seed_from_u64(2);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);

    dude.update(&config, &mut rng);
    assert_eq!(dude.state(), AnimationState::Fall);

    let mut landed = false;
    for _ in 0..200 {
        dude.update(&config, &mut rng);
        if dude.state() == AnimationState::Land {
            landed = true;
            break;
        }
    }
    assert!(landed);
    assert_eq!(dude.position().y, config.height - 32.0);
    assert_eq!(dude.velocity(), Vec2::default());

    // Landing lasts land_duration_ms, then back to the ground states
    for _ in 0..20 {
        dude.update(&config, &mut rng);
    }
    assert!(matches!(
        dude.state(),
        AnimationState::Idle | AnimationState::Run
    ));
}

#[test]
fn test_land_only_reachable_from_fall() {
    let config = test_config();
    let mut rng = StdRng::seed_from_u64(3);
    let mut dice = StdRng::seed_from_u64(4);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);
    let mut landings = 0;

    for _ in 0..5000 {
        if dice.gen_bool(0.02) {
            dude.jump();
        }
        let before = dude.state();
        dude.update(&config, &mut rng);
        let after = dude.state();

        if after == AnimationState::Land && before != AnimationState::Land {
            assert_eq!(before, AnimationState::Fall);
            landings += 1;
        }
    }
    assert!(landings > 1);
}

#[test]
fn test_jump_sets_velocity() {
    let config = test_config();
    let mut rng = StdRng::seed_from_u64(5);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);
    settle(&mut dude, &config, &mut rng);

    assert!(dude.jump());
    assert_eq!(dude.state(), AnimationState::Jump);
    assert_eq!(dude.velocity().x, dude.direction() * 100.0);
    assert_eq!(dude.velocity().y, -300.0);
}

#[test]
fn test_jump_ignored_while_airborne() {
    let config = test_config();
    let mut rng = StdRng::seed_from_u64(6);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);

    // Spawned above the floor: falling after the first tick
    dude.update(&config, &mut rng);
    assert_eq!(dude.state(), AnimationState::Fall);
    let velocity = dude.velocity();

    assert!(!dude.jump());
    assert_eq!(dude.state(), AnimationState::Fall);
    assert_eq!(dude.velocity(), velocity);

    settle(&mut dude, &config, &mut rng);
    assert!(dude.jump());
    assert!(!dude.jump());
    assert_eq!(dude.state(), AnimationState::Jump);
}

#[test]
fn test_jump_command_during_fall_changes_nothing() {
    let mut world = World::new(test_config());
    world.handle_message(&message("1", "hi"));
    world.update();
    assert_eq!(world.get("1").unwrap().state(), AnimationState::Fall);

    let directives = world.handle_message(&message("1", "!jump"));
    assert_eq!(directives, vec![Directive::Jump]);
    assert_eq!(world.get("1").unwrap().state(), AnimationState::Fall);
}

#[test]
fn test_idle_run_toggle() {
    let config = WorldConfig {
        max_dwell_ms: 0.0,
        ..test_config()
    };
    let mut rng = StdRng::seed_from_u64(8);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);
    settle(&mut dude, &config, &mut rng);

    // A zero dwell flips every tick
    let mut previous = dude.state();
    for _ in 0..10 {
        dude.update(&config, &mut rng);
        let state = dude.state();
        assert!(matches!(state, AnimationState::Idle | AnimationState::Run));
        assert_ne!(state, previous);
        previous = state;
    }
}

#[test]
fn test_wall_bounce_flips_once_per_contact() {
    let config = WorldConfig {
        width: 200.0,
        max_dwell_ms: 0.0,
        ..test_config()
    };
    let mut rng = StdRng::seed_from_u64(9);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);

    let mut flips = 0;
    let mut flipped_last_tick = false;
    for _ in 0..3000 {
        let direction = dude.direction();
        dude.update(&config, &mut rng);

        let flipped = dude.direction() != direction;
        if flipped {
            assert!(!flipped_last_tick, "flipped on consecutive ticks");
            let x = dude.position().x;
            if direction > 0.0 {
                assert!(x + 28.0 >= config.width);
            } else {
                assert!(x - 28.0 <= 0.0);
            }
            flips += 1;
        }
        flipped_last_tick = flipped;
    }
    assert!(flips >= 2);
}

#[test]
fn test_lifetime_monotonic_and_reset_by_message() {
    let config = WorldConfig {
        max_lifetime_ms: 1000.0,
        ..test_config()
    };
    let mut rng = StdRng::seed_from_u64(10);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);

    let mut previous = dude.lifetime();
    for _ in 0..30 {
        dude.update(&config, &mut rng);
        assert!(dude.lifetime() <= previous);
        previous = dude.lifetime();
    }
    assert!(previous < 1000.0);

    dude.add_message("hello".to_string(), &config);
    assert_eq!(dude.lifetime(), 1000.0);
    assert_eq!(dude.fade(), config.max_fade_ms);
    assert_eq!(dude.opacity(), 1.0);
}

#[test]
fn test_message_restores_opacity_during_fade() {
    let config = WorldConfig {
        max_lifetime_ms: 50.0,
        max_fade_ms: 1000.0,
        ..test_config()
    };
    let mut rng = StdRng::seed_from_u64(11);
    let mut dude = Dude::spawn("1", "a", &config, &mut rng);

    for _ in 0..20 {
        dude.update(&config, &mut rng);
    }
    assert!(dude.opacity() < 1.0);
    assert!(dude.fade() < 1000.0);

    dude.add_message("still here".to_string(), &config);
    assert_eq!(dude.opacity(), 1.0);
    assert_eq!(dude.fade(), 1000.0);
    assert_eq!(dude.lifetime(), 50.0);
}

#[test]
fn test_fade_out_and_removal() {
    let config = WorldConfig {
        max_lifetime_ms: 50.0,
        max_fade_ms: 50.0,
        ..test_config()
    };
    let mut world = World::new(config);
    world.handle_message(&message("1", "hi"));
    world.handle_message(&message("2", "hey"));

    let mut removed = 0;
    let mut previous_opacity = 1.0;
    for _ in 0..100 {
        if let Some(dude) = world.get("1") {
            assert!(dude.opacity() <= previous_opacity);
            previous_opacity = dude.opacity();
        }
        removed += world.update();
        if world.is_empty() {
            break;
        }
    }

    assert_eq!(removed, 2);
    assert!(world.get("1").is_none());
    assert!(world.views().is_empty());

    // A returning chatter gets a fresh entity
    world.handle_message(&message("1", "back"));
    assert_eq!(world.len(), 1);
    assert_eq!(world.get("1").unwrap().opacity(), 1.0);
}

#[test]
fn test_messages_display_in_order() {
    let config = WorldConfig {
        message_display_ms: 100.0,
        ..test_config()
    };
    let mut world = World::new(config);
    world.handle_message(&message("1", "one"));
    world.handle_message(&message("1", "two"));
    assert_eq!(world.len(), 1);

    let current = |world: &World| world.views()[0].message.clone();
    assert_eq!(current(&world).as_deref(), Some("one"));

    world.update();
    assert_eq!(current(&world).as_deref(), Some("one"));

    for _ in 0..9 {
        world.update();
    }
    assert_eq!(current(&world).as_deref(), Some("two"));

    for _ in 0..10 {
        world.update();
    }
    assert_eq!(current(&world), None);
}

#[test]
fn test_message_backlog_keeps_newest() {
    let config = WorldConfig {
        message_display_ms: 100.0,
        ..test_config()
    };
    let mut world = World::new(config);
    for i in 0..10 {
        world.handle_message(&message("1", &format!("m{}", i)));
    }

    let mut shown = vec![world.views()[0].message.clone().unwrap()];
    for _ in 0..200 {
        world.update();
        match world.views().first().and_then(|view| view.message.clone()) {
            Some(text) if shown.last() != Some(&text) => shown.push(text),
            _ => {}
        }
    }
    assert_eq!(shown, vec!["m0", "m6", "m7", "m8", "m9"]);
}

#[test]
fn test_emotes_released_one_per_interval() {
    let mut world = World::new(test_config());
    let mut msg = message("1", "");
    msg.emotes = vec!["a".to_string(), "b".to_string()];
    world.handle_message(&msg);

    // No text: nothing to say
    assert_eq!(world.views()[0].message, None);

    world.update();
    assert_eq!(world.views()[0].emotes, vec!["a".to_string()]);

    for _ in 0..20 {
        world.update();
    }
    assert_eq!(
        world.views()[0].emotes,
        vec!["a".to_string(), "b".to_string()]
    );

    // Past emote_lifetime_ms both are gone
    for _ in 0..200 {
        world.update();
    }
    assert!(world.views()[0].emotes.is_empty());
}

#[test]
fn test_user_color_overrides_stream_color() {
    let mut world = World::new(test_config());

    let mut first = message("1", "hi");
    first.color = Some("#0000FF".to_string());
    world.handle_message(&first);
    assert_eq!(world.get("1").unwrap().tint(), "#0000FF");

    world.handle_message(&message("1", "!color red"));
    assert_eq!(world.get("1").unwrap().tint(), "red");

    let mut later = message("1", "still red");
    later.color = Some("#00FF00".to_string());
    world.handle_message(&later);
    assert_eq!(world.get("1").unwrap().tint(), "red");

    // Invalid value keeps the current tint
    world.handle_message(&message("1", "!color nope"));
    assert_eq!(world.get("1").unwrap().tint(), "red");
}

#[test]
fn test_views_in_creation_order() {
    let mut world = World::new(test_config());
    world.handle_message(&message("b", "first"));
    world.handle_message(&message("a", "second"));
    world.handle_message(&message("b", "again"));
    world.update();

    let ids: Vec<String> = world.views().into_iter().map(|v| v.user_id).collect();
    assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
}

#[test]
fn test_seeded_worlds_are_deterministic() {
    let run = || {
        let mut world = World::new(test_config());
        world.handle_message(&message("1", "hi"));
        world.handle_message(&message("2", "!jump"));
        for _ in 0..120 {
            world.update();
        }
        world.views()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_entity_view_serialization() {
    let mut world = World::new(test_config());
    world.handle_message(&message("42", "hello"));

    let json = serde_json::to_value(&world.views()[0]).unwrap();
    assert_eq!(json["userId"], "42");
    assert_eq!(json["name"], "user42");
    assert_eq!(json["state"], "Idle");
    assert_eq!(json["message"], "hello");
    assert_eq!(json["tint"], "#969696");
    assert_eq!(json["position"]["y"], -32.0);
}

#[test]
fn test_resize_moves_floor() {
    let mut world = World::new(test_config());
    world.resize(400.0, 120.0);
    world.handle_message(&message("1", "hi"));
    for _ in 0..300 {
        world.update();
    }
    assert_eq!(world.get("1").unwrap().position().y, 120.0 - 32.0);
}

#[test]
fn test_scheduler_first_call_advances() {
    let mut scheduler = FrameScheduler::new(50.0, 50.0);
    assert!(scheduler.should_advance(0.0));
}

#[test]
fn test_scheduler_caps_rate_and_carries_remainder() {
    // 50 fps: 20ms minimum between ticks
    let mut scheduler = FrameScheduler::new(50.0, 50.0);
    assert!(scheduler.should_advance(0.0));
    assert!(!scheduler.should_advance(10.0));
    assert!(scheduler.should_advance(25.0));

    // Last frame snapped to 20, not 25
    assert!(!scheduler.should_advance(39.0));
    assert!(scheduler.should_advance(41.0));

    // Exactly the minimum is not enough
    assert!(!scheduler.should_advance(60.0));
}

#[test]
fn test_scheduler_clamps_stalls() {
    let mut scheduler = FrameScheduler::new(50.0, 50.0);
    assert!(scheduler.should_advance(0.0));

    // A long stall runs a single tick; elapsed clamps to 50, leaving 10 over
    assert!(scheduler.should_advance(1000.0));
    assert!(!scheduler.should_advance(1005.0));
    assert!(scheduler.should_advance(1011.0));
}

#[test]
fn test_scheduler_zero_fps_falls_back() {
    let mut scheduler = FrameScheduler::new(0.0, 100.0);
    assert!(scheduler.should_advance(0.0));
    assert!(!scheduler.should_advance(10.0));
    assert!(scheduler.should_advance(20.0));
    assert!(scheduler.should_advance(40.0));
}

#[test]
fn test_scheduler_raises_small_stall_clamp() {
    // 60 fps needs ~16.7ms between ticks; a 10ms clamp would never allow one
    let mut scheduler = FrameScheduler::new(60.0, 10.0);
    assert!(scheduler.should_advance(0.0));
    assert!(scheduler.should_advance(20.0));
    assert!(scheduler.should_advance(1000.0));
}

#[test]
fn test_scheduler_ignores_backwards_time() {
    let mut scheduler = FrameScheduler::new(50.0, 50.0);
    assert!(scheduler.should_advance(100.0));
    assert!(!scheduler.should_advance(50.0));
}

#[test]
fn test_simulation_loop_drains_inbox_on_tick() {
    let clock = ManualClock::new(0.0);
    let (mut sim, tx) = SimulationLoop::new(World::new(test_config()), clock.clone());

    tx.send(message("1", "hi")).unwrap();
    assert!(sim.frame());
    assert_eq!(sim.world().len(), 1);

    // Queued until the next tick
    tx.send(message("2", "hey")).unwrap();
    assert!(!sim.frame());
    assert_eq!(sim.world().len(), 1);

    clock.advance(17.0);
    assert!(sim.frame());
    assert_eq!(sim.world().len(), 2);

    let ids: Vec<String> = sim
        .world()
        .views()
        .into_iter()
        .map(|v| v.user_id)
        .collect();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
}

#[test]
fn test_simulation_loop_ticks_follow_clock() {
    let clock = ManualClock::default();
    let (mut sim, tx) = SimulationLoop::new(World::new(test_config()), clock.clone());
    tx.send(message("1", "hi")).unwrap();

    let mut ticks = 0;
    // One simulated second of 4ms host frames
    for _ in 0..250 {
        if sim.frame() {
            ticks += 1;
        }
        clock.advance(4.0);
    }
    assert!((55..=61).contains(&ticks), "ticks = {}", ticks);
}
