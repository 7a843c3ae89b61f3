use super::{find_train, forget_boundaries, DeadlockInfo};
use crate::network::TrackNetwork;
use crate::route::Route;
use crate::train::{RouteSide, TrainNumber};
use crate::{SectionId, TrainId, TrainSet};
use log::debug;

/// Whether the train holds any section of `route` from `first` to `last`.
fn holds_any(
    network: &TrackNetwork,
    route: &Route,
    first: usize,
    last: usize,
    train: TrainId,
) -> bool {
    route
        .iter()
        .take(last + 1)
        .skip(first)
        .any(|el| network.section(el.section).is_held_by(train))
}

/// Sets and lifts the deadlock traps at both ends of every stretch the train shares
/// with another train: while one train is inside, the other is kept out, and a train
/// waiting to enter keeps the other from entering at the far end.
pub(crate) fn update_traps(trains: &mut TrainSet, network: &mut TrackNetwork, id: TrainId) {
    let Some(train) = trains.get(id) else {
        return;
    };
    let number = train.number();
    let route = train.route(RouteSide::Ahead);
    let mut stale = Vec::new();

    for (start, entry) in train.deadlock_info().iter() {
        let other = find_train(trains, entry.other);
        let (Some(last), Some(other)) = (route.find(entry.end), other) else {
            stale.push((start, entry.other));
            continue;
        };
        // The start of the stretch may already be behind the train.
        let first = route.find(start).filter(|idx| *idx <= last).unwrap_or(0);
        let own_inside = holds_any(network, route, first, last, id);
        let other_inside = holds_any(network, route, first, last, other);
        let other_route = trains[other].route(RouteSide::Ahead);
        let other_waiting = other_route
            .find(entry.end)
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| other_route.get(idx))
            .map_or(false, |el| network.section(el.section).is_held_by(other));

        if own_inside && !other_inside {
            if network.section_mut(entry.end).set_trap(entry.other, number) {
                debug!("train {} kept out of {:?} by train {}", entry.other, entry.end, number);
            }
            network.section_mut(start).release_trap(number, entry.other);
        } else if other_inside || other_waiting {
            if !own_inside && network.section_mut(start).set_trap(number, entry.other) {
                debug!("train {} kept out of {:?} by train {}", number, start, entry.other);
            }
        } else {
            network.section_mut(start).release_trap(number, entry.other);
        }
    }

    if !stale.is_empty() {
        forget_boundaries(trains, network, id, &stale);
    }
}

/// Lifts the traps that hold the train back without a boundary that still needs them.
/// Run while the train stands at a signal, so that it is not held forever by a
/// train that has since taken another way.
pub(crate) fn recheck_traps(trains: &TrainSet, network: &mut TrackNetwork, id: TrainId) {
    let Some(train) = trains.get(id) else {
        return;
    };
    let number = train.number();
    let traps = network
        .iter_sections()
        .filter_map(|section| {
            section
                .deadlock_traps()
                .get(&number)
                .map(|by| (section.id(), by.clone()))
        })
        .collect::<Vec<(SectionId, _)>>();

    for (section, trappers) in traps {
        for by in trappers {
            if !still_needed(trains, train.deadlock_info(), section, by) {
                debug!("released stale trap on train {} at {:?}", number, section);
                network.section_mut(section).release_trap(number, by);
            }
        }
    }
}

fn still_needed(
    trains: &TrainSet,
    info: &DeadlockInfo,
    section: SectionId,
    by: TrainNumber,
) -> bool {
    info.get(section).iter().any(|e| e.other == by) && find_train(trains, by).is_some()
}

#[cfg(test)]
mod test {
    use super::recheck_traps;
    use crate::deadlock::DeadlockEntry;
    use crate::network::{SectionKind, TrackNetwork};
    use crate::route::{Direction, Route, RouteElement, TrainPath};
    use crate::train::{Train, TrainAttributes, TrainKind, TrainNumber};
    use crate::TrainSet;

    #[test]
    fn stale_trap_is_released_on_recheck() {
        let mut net = TrackNetwork::new();
        let ids = (0..3)
            .map(|_| net.add_section(SectionKind::Normal, 500.0))
            .collect::<Vec<_>>();
        let attributes = TrainAttributes {
            kind: TrainKind::Ai,
            length: 100.0,
            max_speed: 30.0,
            max_acc: 1.0,
            brake_dec: 1.0,
        };
        let mut trains = TrainSet::with_key();
        let mut add = |number, section| {
            let el = RouteElement::new(section, Direction::Forward);
            let path = TrainPath::single(Route::new(vec![el]));
            trains.insert_with_key(|id| {
                Train::new(id, TrainNumber(number), &attributes, path, vec![el], 200.0, 0, &net)
            })
        };
        let a = add(1, ids[0]);
        let b = add(2, ids[2]);
        trains[a].deadlock_mut().insert(
            ids[2],
            DeadlockEntry {
                other: TrainNumber(2),
                end: ids[1],
            },
        );
        net.section_mut(ids[1]).set_trap(TrainNumber(1), TrainNumber(2));
        net.section_mut(ids[2]).set_trap(TrainNumber(1), TrainNumber(2));

        recheck_traps(&trains, &mut net, a);
        assert!(!net.section(ids[1]).is_trapped(TrainNumber(1)));
        assert!(net.section(ids[2]).is_trapped(TrainNumber(1)));

        // Once the other train is gone no trap is needed.
        trains.remove(b);
        recheck_traps(&trains, &mut net, a);
        assert!(!net.section(ids[2]).is_trapped(TrainNumber(1)));
    }
}
