mod common;

use assert_approx_eq::assert_approx_eq;
use common::{attributes, forward_route, fwd, held_distance, line, rev, run_until};
use rail_authority::{
    Aspect, ControlMode, EndAuthority, NextObject, OutOfControlReason, Route, RouteSide,
    SectionKind, SignalKind, Simulation, TrackNetwork, TrainKind, TrainPath,
};

#[test]
fn node_control_runs_to_the_end_of_the_track() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 5]);
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    sim.step(0.1);
    let train = sim.get_train(id).unwrap();
    assert_eq!(train.mode(), ControlMode::AutoNode);
    assert_eq!(train.authority(RouteSide::Ahead).kind, EndAuthority::EndOfTrack);
    assert!(s.iter().all(|id| sim.network().section(*id).is_held_by(train.id())));

    let stopped = run_until(&mut sim, 3000, |sim| {
        let train = sim.get_train(id).unwrap();
        train.front().element.section == s[4] && train.speed() < 0.01
    });
    assert!(stopped);
    let train = sim.get_train(id).unwrap();
    assert_eq!(train.mode(), ControlMode::AutoNode);
    assert_eq!(train.out_of_control_reason(), None);
    assert!(train.authority(RouteSide::Ahead).distance < 15.0);
    // Sections left behind are given up.
    assert!(!sim.network().section(s[0]).is_held_by(id));
    assert!(!sim.network().section(s[2]).is_held_by(id));
}

#[test]
fn signal_control_clears_the_block_ahead() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 5]);
    let a = net.add_signal(fwd(s[1]));
    let b = net.add_signal(fwd(s[3]));
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    sim.step(0.1);
    let train = sim.get_train(id).unwrap();
    let net = sim.network();
    assert_eq!(train.mode(), ControlMode::AutoSignal);
    assert_eq!(net.aspect(a), Aspect::Approach1);
    assert_eq!(net.aspect(b), Aspect::Stop);
    assert_eq!(net.signal(a).block(), &[s[2], s[3]]);
    assert!(net.section(s[2]).is_reserved_by(id));
    assert!(!net.section(s[4]).is_held_by(id));

    let authority = train.authority(RouteSide::Ahead);
    assert_eq!(authority.kind, EndAuthority::Signal);
    assert_approx_eq!(authority.distance, 350.0 + 500.0 + 1000.0, 1.0);
}

#[test]
fn speed_post_limits_the_train_from_where_it_stands() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[1000.0; 4]);
    net.add_speed_post(fwd(s[0]), 650.0, 20.0);
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    sim.step(0.1);
    assert_approx_eq!(sim.get_train(id).unwrap().allowed_max_speed(), 30.0);

    let close = run_until(&mut sim, 2000, |sim| {
        sim.get_train(id).unwrap().distance_travelled() > 490.0
    });
    assert!(close);
    assert_approx_eq!(sim.get_train(id).unwrap().allowed_max_speed(), 30.0);

    let passed = run_until(&mut sim, 2000, |sim| {
        sim.get_train(id).unwrap().distance_travelled() > 505.0
    });
    assert!(passed);
    let train = sim.get_train(id).unwrap();
    assert_approx_eq!(train.allowed_max_speed(), 20.0);
    assert!(train.speed() < 21.0);
}

#[test]
fn signal_put_back_in_front_of_a_player_train_is_passed_at_danger() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 6]);
    let a = net.add_signal(fwd(s[1]));
    net.add_signal(fwd(s[3]));
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Player, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    // Put the signal back once the train can no longer stop in front of it.
    let mut held = false;
    for _ in 0..2000 {
        sim.step(0.1);
        let train = sim.get_train(id).unwrap();
        let Some(distance) = train.distance_to_signal(sim.network()) else {
            continue;
        };
        if train.speed() > 5.0 && distance < train.speed().powi(2) / 2.0 - 50.0 {
            sim.set_signal_hold(a, true);
            held = true;
            break;
        }
    }
    assert!(held);
    assert_eq!(sim.network().aspect(a), Aspect::Stop);

    let passed = run_until(&mut sim, 1000, |sim| {
        sim.get_train(id).unwrap().mode() == ControlMode::OutOfControl
    });
    assert!(passed);
    let train = sim.get_train(id).unwrap();
    assert_eq!(train.out_of_control_reason(), Some(OutOfControlReason::Spad));
    assert_eq!(train.authority(RouteSide::Ahead).distance, 0.0);

    sim.step(0.1);
    let train = sim.get_train(id).unwrap();
    assert!(train.is_emergency_braking());
    assert_approx_eq!(train.acc(), -1.5);
    // Nothing is held beyond the sections the train stands on.
    assert!(sim
        .network()
        .iter_sections()
        .filter(|section| section.is_reserved_by(id))
        .all(|section| section.is_occupied_by(id)));
    assert!(!sim.network().section(s[3]).is_held_by(id));

    let stopped = run_until(&mut sim, 1000, |sim| sim.get_train(id).unwrap().speed() == 0.0);
    assert!(stopped);
    sim.step(0.1);
    assert_eq!(sim.get_train(id).unwrap().mode(), ControlMode::OutOfControl);
}

#[test]
fn authority_ends_where_the_route_loops_back() {
    let mut net = TrackNetwork::new();
    let t = net.add_section(SectionKind::Normal, 1000.0);
    let j = net.add_section(SectionKind::Junction, 50.0);
    let la = net.add_section(SectionKind::Normal, 400.0);
    let lb = net.add_section(SectionKind::Normal, 400.0);
    net.connect(t, 1, j, 0);
    net.connect(j, 1, la, 0);
    net.connect(j, 1, lb, 1);
    net.connect(la, 1, lb, 0);
    let route = Route::new(vec![fwd(t), fwd(j), fwd(la), fwd(lb), rev(j), rev(t)]);

    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(route),
            0,
            500.0,
        )
        .unwrap();

    sim.step(0.1);
    let train = sim.get_train(id).unwrap();
    let authority = train.authority(RouteSide::Ahead);
    assert_eq!(authority.kind, EndAuthority::Loop);
    assert_approx_eq!(authority.distance, 1350.0, 0.1);
    assert!(sim.network().section(lb).is_reserved_by(id));
}

#[test]
fn authority_never_reaches_past_held_sections() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 8]);
    net.add_signal(fwd(s[1]));
    net.add_signal(fwd(s[3]));
    net.add_signal(fwd(s[5]));
    let mut sim = Simulation::new(net);
    let attrs = attributes(TrainKind::Ai, 100.0);
    let first = sim
        .add_train(&attrs, TrainPath::single(forward_route(&s[2..])), 0, 300.0)
        .unwrap();
    let second = sim
        .add_train(&attrs, TrainPath::single(forward_route(&s)), 0, 300.0)
        .unwrap();

    for _ in 0..1500 {
        sim.step(0.1);
        for id in [first, second] {
            let train = sim.get_train(id).unwrap();
            assert_eq!(train.out_of_control_reason(), None);
            let authority = train.authority(RouteSide::Ahead);
            assert!(authority.distance <= held_distance(&sim, train) + 1e-6);
        }
    }

    // The following train never enters a section held by the one in front.
    let net = sim.network();
    let front = sim.get_train(first).unwrap();
    assert!(front
        .occupied()
        .all(|el| !net.section(el.section).is_occupied_by(second)));
}

#[test]
fn ai_train_finds_a_new_route_after_passing_a_signal_at_danger() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 6]);
    let a = net.add_signal(fwd(s[1]));
    net.add_signal(fwd(s[3]));
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    let mut held = false;
    for _ in 0..2000 {
        sim.step(0.1);
        let train = sim.get_train(id).unwrap();
        let Some(distance) = train.distance_to_signal(sim.network()) else {
            continue;
        };
        if train.speed() > 5.0 && distance < train.speed().powi(2) / 2.0 - 50.0 {
            sim.set_signal_hold(a, true);
            held = true;
            break;
        }
    }
    assert!(held);
    let passed = run_until(&mut sim, 1000, |sim| {
        sim.get_train(id).unwrap().mode() == ControlMode::OutOfControl
    });
    assert!(passed);

    let recovered = run_until(&mut sim, 1000, |sim| sim.get_train(id).unwrap().mode().is_auto());
    assert!(recovered);
    let train = sim.get_train(id).unwrap();
    assert_eq!(train.out_of_control_reason(), None);
    assert_eq!(train.route(RouteSide::Ahead).last(), Some(fwd(s[5])));
    assert_eq!(train.front().element, fwd(s[2]));
}

#[test]
fn following_train_does_not_hold_up_the_train_ahead() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 12]);
    net.add_signal(fwd(s[1]));
    let mut sim = Simulation::new(net);
    let attrs = attributes(TrainKind::Ai, 100.0);
    let ahead = sim
        .add_train(&attrs, TrainPath::single(forward_route(&s[3..])), 0, 300.0)
        .unwrap();
    let behind = sim
        .add_train(&attrs, TrainPath::single(forward_route(&s)), 0, 300.0)
        .unwrap();

    sim.step(0.1);
    assert_eq!(sim.get_train(ahead).unwrap().mode(), ControlMode::AutoNode);
    assert_eq!(sim.get_train(behind).unwrap().mode(), ControlMode::AutoSignal);
    // The train behind queues for the block only up to the train in it.
    assert!(sim.network().section(s[3]).claims().any(|c| c.train == behind));
    assert!(s[4..].iter().all(|id| sim
        .network()
        .section(*id)
        .claims()
        .all(|c| c.train != behind)));

    let arrived = run_until(&mut sim, 6000, |sim| {
        let train = sim.get_train(ahead).unwrap();
        train.front().element == fwd(s[11]) && train.speed() < 0.01
    });
    assert!(arrived);
    let train = sim.get_train(ahead).unwrap();
    assert_eq!(train.authority(RouteSide::Ahead).kind, EndAuthority::EndOfTrack);
    assert_eq!(train.out_of_control_reason(), None);

    let waiting = sim.get_train(behind).unwrap();
    assert_eq!(waiting.out_of_control_reason(), None);
    assert_eq!(waiting.authority(RouteSide::Ahead).kind, EndAuthority::Signal);
}

#[test]
fn signal_limit_applies_where_the_train_reaches_the_signal() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 5]);
    let a = net.add_object(SignalKind::Normal, fwd(s[1]), 0.0, Some(20.0));
    net.add_signal(fwd(s[3]));
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    sim.step(0.1);
    assert_eq!(sim.get_train(id).unwrap().mode(), ControlMode::AutoSignal);
    assert!(!sim.network().aspect(a).is_stop());

    // The signal stands 850 m ahead of the front.
    let close = run_until(&mut sim, 2000, |sim| {
        sim.get_train(id).unwrap().distance_travelled() > 845.0
    });
    assert!(close);
    let train = sim.get_train(id).unwrap();
    assert!(train.distance_travelled() < 850.0);
    assert_approx_eq!(train.allowed_max_speed(), 30.0);
    // Already braking down to the limit ahead.
    assert!(train.speed() < 21.0);

    let passed = run_until(&mut sim, 100, |sim| {
        sim.get_train(id).unwrap().distance_travelled() >= 850.0
    });
    assert!(passed);
    assert_approx_eq!(sim.get_train(id).unwrap().allowed_max_speed(), 20.0);
}

#[test]
fn signal_control_hands_over_to_node_control_past_the_last_signal() {
    let mut net = TrackNetwork::new();
    let s = line(&mut net, &[500.0; 5]);
    net.add_signal(fwd(s[1]));
    net.add_signal(fwd(s[3]));
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Ai, 100.0),
            TrainPath::single(forward_route(&s)),
            0,
            150.0,
        )
        .unwrap();

    let mut modes = vec![];
    for _ in 0..2500 {
        sim.step(0.1);
        let train = sim.get_train(id).unwrap();
        let front = train.front();
        let next = sim.network().get_next_object(
            train.route(RouteSide::Ahead),
            front.route_index,
            front.offset,
            Some(SignalKind::Normal),
        );
        let signal_ahead = matches!(next, NextObject::Found { .. });
        assert_eq!(train.mode() == ControlMode::AutoSignal, signal_ahead);
        assert_eq!(train.mode() == ControlMode::AutoNode, !signal_ahead);
        if modes.last() != Some(&train.mode()) {
            modes.push(train.mode());
        }
    }
    assert_eq!(modes, vec![ControlMode::AutoSignal, ControlMode::AutoNode]);
    let train = sim.get_train(id).unwrap();
    assert_eq!(train.front().element, fwd(s[4]));
    assert_eq!(train.authority(RouteSide::Ahead).kind, EndAuthority::EndOfTrack);
}

#[test]
fn switch_thrown_under_a_train_puts_it_out_of_control() {
    let mut net = TrackNetwork::new();
    let s0 = net.add_section(SectionKind::Normal, 500.0);
    let j = net.add_section(SectionKind::Junction, 50.0);
    let a = net.add_section(SectionKind::Normal, 500.0);
    let b = net.add_section(SectionKind::Normal, 500.0);
    net.connect(s0, 1, j, 0);
    net.connect(j, 1, a, 0);
    net.connect(j, 1, b, 0);
    let mut sim = Simulation::new(net);
    let id = sim
        .add_train(
            &attributes(TrainKind::Player, 100.0),
            TrainPath::single(forward_route(&[s0, j, a])),
            0,
            300.0,
        )
        .unwrap();
    sim.step(0.1);
    assert!(sim.network().section(j).is_reserved_by(id));

    // Throw the switch behind the interlocking's back.
    sim.network_mut().set_switch(j, 1);
    let derailed = run_until(&mut sim, 1000, |sim| {
        sim.get_train(id).unwrap().mode() == ControlMode::OutOfControl
    });
    assert!(derailed);
    let train = sim.get_train(id).unwrap();
    assert_eq!(
        train.out_of_control_reason(),
        Some(OutOfControlReason::MisalignedSwitch)
    );
    assert!(!sim.network().section(a).is_reserved_by(id));

    let stopped = run_until(&mut sim, 1000, |sim| sim.get_train(id).unwrap().speed() == 0.0);
    assert!(stopped);
    let train = sim.get_train(id).unwrap();
    assert_eq!(train.front().element, fwd(b));
    assert_eq!(
        train.out_of_control_reason(),
        Some(OutOfControlReason::MisalignedSwitch)
    );
}
