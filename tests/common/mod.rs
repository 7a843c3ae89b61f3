//! Helpers shared by the integration tests.
#![allow(dead_code)]

use rail_authority::{
    Direction, Route, RouteElement, RouteSide, SectionId, SectionKind, Simulation, TrackNetwork,
    Train, TrainAttributes, TrainKind,
};

pub fn fwd(section: SectionId) -> RouteElement {
    RouteElement::new(section, Direction::Forward)
}

pub fn rev(section: SectionId) -> RouteElement {
    RouteElement::new(section, Direction::Reverse)
}

/// Adds plain sections of the given lengths, each linked to the next.
pub fn line(net: &mut TrackNetwork, lengths: &[f64]) -> Vec<SectionId> {
    let ids = lengths
        .iter()
        .map(|length| net.add_section(SectionKind::Normal, *length))
        .collect::<Vec<_>>();
    for pair in ids.windows(2) {
        net.connect(pair[0], 1, pair[1], 0);
    }
    ids
}

pub fn forward_route(ids: &[SectionId]) -> Route {
    ids.iter().map(|id| fwd(*id)).collect()
}

pub fn reverse_route(ids: &[SectionId]) -> Route {
    ids.iter().rev().map(|id| rev(*id)).collect()
}

pub fn attributes(kind: TrainKind, length: f64) -> TrainAttributes {
    TrainAttributes {
        kind,
        length,
        max_speed: 30.0,
        max_acc: 1.0,
        brake_dec: 1.0,
    }
}

/// Steps the simulation until `done` holds, at most `max_steps` times.
pub fn run_until(
    sim: &mut Simulation,
    max_steps: usize,
    done: impl Fn(&Simulation) -> bool,
) -> bool {
    for _ in 0..max_steps {
        sim.step(0.1);
        if done(sim) {
            return true;
        }
    }
    false
}

/// The distance from the train's front to the end of the sections it holds ahead.
pub fn held_distance(sim: &Simulation, train: &Train) -> f64 {
    let net = sim.network();
    let front = train.front();
    let mut distance = net.length(front.element.section) - front.offset;
    for el in train
        .route(RouteSide::Ahead)
        .iter()
        .skip(front.route_index + 1)
    {
        if !net.section(el.section).is_held_by(train.id()) {
            break;
        }
        distance += net.length(el.section);
    }
    distance
}
