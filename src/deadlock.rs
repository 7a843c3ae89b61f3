//! Deadlock avoidance between trains whose routes overlap in opposite directions.
//!
//! Whenever a train gets a new route, the stretches it shares with other trains in the
//! opposite direction are found and recorded in both trains as [DeadlockInfo]. While the
//! trains run, deadlock traps on the ends of those stretches keep one train out while
//! the other is inside.

use crate::config::DeadlockResolution;
use crate::network::TrackNetwork;
use crate::train::{RouteSide, TrainNumber};
use crate::{SectionId, TrainId, TrainSet};
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

mod strategy;
mod traps;

pub(crate) use traps::{recheck_traps, update_traps};

/// One end of a stretch shared with another train running the other way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeadlockEntry {
    /// The number of the other train.
    pub other: TrainNumber,
    /// The last section of the shared stretch, in this train's direction.
    pub end: SectionId,
}

/// The deadlock boundaries along a train's route, keyed by the first section of each
/// shared stretch.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeadlockInfo {
    boundaries: Vec<(SectionId, SmallVec<[DeadlockEntry; 2]>)>,
}

impl DeadlockInfo {
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// The number of recorded entries.
    pub fn len(&self) -> usize {
        self.boundaries.iter().map(|(_, entries)| entries.len()).sum()
    }

    /// The entries of the stretches starting at the given section.
    pub fn get(&self, start: SectionId) -> &[DeadlockEntry] {
        self.boundaries
            .iter()
            .find(|(s, _)| *s == start)
            .map_or(&[], |(_, entries)| entries.as_slice())
    }

    /// All entries with the section they start at.
    pub fn iter(&self) -> impl Iterator<Item = (SectionId, DeadlockEntry)> + '_ {
        self.boundaries
            .iter()
            .flat_map(|(start, entries)| entries.iter().map(move |e| (*start, *e)))
    }

    /// Whether any stretch is shared with the given train.
    pub fn involves(&self, other: TrainNumber) -> bool {
        self.iter().any(|(_, e)| e.other == other)
    }

    /// Records a stretch. Returns `false` if it was already known.
    pub(crate) fn insert(&mut self, start: SectionId, entry: DeadlockEntry) -> bool {
        let idx = match self.boundaries.iter().position(|(s, _)| *s == start) {
            Some(idx) => idx,
            None => {
                self.boundaries.push((start, SmallVec::new()));
                self.boundaries.len() - 1
            }
        };
        let entries = &mut self.boundaries[idx].1;
        if entries.contains(&entry) {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Forgets the stretch starting at `start` shared with `other`, returning its end.
    pub(crate) fn remove(&mut self, start: SectionId, other: TrainNumber) -> Option<SectionId> {
        let idx = self.boundaries.iter().position(|(s, _)| *s == start)?;
        let entries = &mut self.boundaries[idx].1;
        let pos = entries.iter().position(|e| e.other == other)?;
        let entry = entries.remove(pos);
        if entries.is_empty() {
            self.boundaries.remove(idx);
        }
        Some(entry.end)
    }

    /// Forgets every stretch shared with `other`.
    pub(crate) fn remove_train(&mut self, other: TrainNumber) {
        for (_, entries) in self.boundaries.iter_mut() {
            entries.retain(|e| e.other != other);
        }
        self.boundaries.retain(|(_, entries)| !entries.is_empty());
    }

    pub(crate) fn clear(&mut self) {
        self.boundaries.clear();
    }
}

/// Finds the train with the given number.
pub(crate) fn find_train(trains: &TrainSet, number: TrainNumber) -> Option<TrainId> {
    trains
        .iter()
        .find(|(_, train)| train.number() == number)
        .map(|(id, _)| id)
}

/// Removes a train from the deadlock records of every other train. Its traps go
/// with its reservations when it is released from the network.
pub(crate) fn forget_train(trains: &mut TrainSet, id: TrainId) {
    let Some(train) = trains.get_mut(id) else {
        return;
    };
    let number = train.number();
    train.deadlock_mut().clear();
    for (_, other) in trains.iter_mut() {
        other.deadlock_mut().remove_train(number);
    }
}

/// Rebuilds the deadlock boundaries of a train that got a new route.
pub(crate) fn detect(
    trains: &mut TrainSet,
    network: &mut TrackNetwork,
    id: TrainId,
    resolution: DeadlockResolution,
) {
    let Some(train) = trains.get(id) else {
        return;
    };
    let stale = train
        .deadlock_info()
        .iter()
        .map(|(start, e)| (start, e.other))
        .collect::<Vec<_>>();
    forget_boundaries(trains, network, id, &stale);

    let Some(train) = trains.get(id) else {
        return;
    };
    if !train.checks_deadlocks() {
        if let Some(train) = trains.get_mut(id) {
            train.mark_route_checked();
        }
        return;
    }
    let own = train.route_ahead();
    let length = train.length();
    let mut others = trains
        .iter()
        .filter(|(other, t)| *other != id && t.is_active())
        .map(|(other, t)| (other, t.number()))
        .collect::<Vec<_>>();
    others.sort_by_key(|(_, number)| *number);

    let strategy = resolution.strategy();
    let mut found = Vec::new();
    for (other, _) in others {
        let theirs = trains[other].route_ahead();
        let ctx = strategy::OverlapContext {
            network: &*network,
            own: &own,
            handle: train.handle(RouteSide::Ahead),
            lengths: [length, trains[other].length()],
        };
        for overlap in strategy::opposite_overlaps(own.as_slice(), theirs.as_slice()) {
            for boundary in strategy.boundaries(&ctx, overlap) {
                let ends = (own.get(boundary.first), own.get(boundary.last));
                if let (Some(start), Some(end)) = ends {
                    found.push((other, start.section, end.section));
                }
            }
        }
    }

    let number = trains[id].number();
    for (other, start, end) in found {
        let Some([train, other]) = trains.get_disjoint_mut([id, other]) else {
            continue;
        };
        debug!(
            "trains {} and {} share {:?}..{:?} in opposite directions",
            number,
            other.number(),
            start,
            end
        );
        train.deadlock_mut().insert(
            start,
            DeadlockEntry {
                other: other.number(),
                end,
            },
        );
        other
            .deadlock_mut()
            .insert(end, DeadlockEntry { other: number, end: start });
    }
    if let Some(train) = trains.get_mut(id) {
        train.mark_route_checked();
    }
}

/// Forgets the given boundaries of a train, with their mirror images in the other
/// trains, and lifts the traps they put on either end.
pub(crate) fn forget_boundaries(
    trains: &mut TrainSet,
    network: &mut TrackNetwork,
    id: TrainId,
    stale: &[(SectionId, TrainNumber)],
) {
    let Some(number) = trains.get(id).map(|t| t.number()) else {
        return;
    };
    for (start, other) in stale.iter().copied() {
        let Some(end) = trains[id].deadlock_mut().remove(start, other) else {
            continue;
        };
        if let Some(other_id) = find_train(trains, other) {
            trains[other_id].deadlock_mut().remove(end, number);
        }
        network.section_mut(start).release_trap(number, other);
        network.section_mut(end).release_trap(other, number);
    }
}
