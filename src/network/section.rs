use crate::authority::EndAuthority;
use crate::route::{Direction, RouteElement};
use crate::train::{TrainHandle, TrainNumber};
use crate::util::u8_enum;
use crate::{SectionId, SignalId, TrainId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// The kind of a track circuit section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum SectionKind {
    Normal = 0,
    /// A switch: one end has a single link, the other has two, of which
    /// the switch position selects one.
    Junction = 1,
    /// A diamond crossing: both ends have two links, and link `i` at one end
    /// runs through to link `i` at the other.
    Crossover = 2,
    /// A buffer stop: only one end is linked.
    EndOfTrack = 3,
}

u8_enum!(SectionKind {
    Normal,
    Junction,
    Crossover,
    EndOfTrack
});

/// A link to an end of another section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pin {
    pub section: SectionId,
    pub end: usize,
}

impl Pin {
    /// The element a train is on after passing through this link.
    pub fn entered(self) -> RouteElement {
        RouteElement::new(self.section, Direction::entering_at(self.end))
    }
}

/// The smallest indivisible unit of track used for occupancy and reservation.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackSection {
    /// The section ID.
    id: SectionId,
    /// The kind of section.
    kind: SectionKind,
    /// The length in m.
    length: f64,
    /// The links at each end.
    ends: [SmallVec<[Pin; 2]>; 2],
    /// Signals and speed posts seen when travelling in each direction, ordered by offset.
    objects: [SmallVec<[SignalId; 2]>; 2],
    /// The branch a junction is set to.
    switch_position: usize,
    /// Occupation and reservation state.
    state: SectionState,
}

/// The mutable occupation and reservation state of a section.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct SectionState {
    /// Trains with at least one car on the section.
    occupied: SmallVec<[TrainHandle; 2]>,
    /// The single train holding the reservation.
    reserved: Option<TrainHandle>,
    /// Trains that want the section next, in order of arrival.
    claims: SmallVec<[TrainHandle; 2]>,
    /// Trains that may not enter, mapped to the trains they would trap.
    deadlock_traps: BTreeMap<TrainNumber, SmallVec<[TrainNumber; 2]>>,
}

/// Why a section cannot be taken by a train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Blocked {
    Trapped,
    Occupied,
    Reserved,
    Claimed,
}

impl TrackSection {
    pub(crate) fn new(id: SectionId, kind: SectionKind, length: f64) -> Self {
        Self {
            id,
            kind,
            length,
            ends: Default::default(),
            objects: Default::default(),
            switch_position: 0,
            state: Default::default(),
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// The length of the section in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The links at the given end (0 or 1).
    pub fn pins(&self, end: usize) -> &[Pin] {
        &self.ends[end]
    }

    /// Whether the section has movable parts that a reservation locks.
    pub fn is_switch(&self) -> bool {
        matches!(self.kind, SectionKind::Junction | SectionKind::Crossover)
    }

    /// The end of a junction that carries the two branches.
    pub fn branch_end(&self) -> Option<usize> {
        if self.kind != SectionKind::Junction {
            return None;
        }
        (0..2).find(|end| self.ends[*end].len() > 1)
    }

    /// The branch a junction is currently set to.
    pub fn switch_position(&self) -> usize {
        self.switch_position
    }

    /// The signals and speed posts seen when travelling in `direction`.
    pub fn objects(&self, direction: Direction) -> &[SignalId] {
        &self.objects[direction.index()]
    }

    /// The trains occupying the section.
    pub fn occupying_trains(&self) -> impl Iterator<Item = TrainHandle> + '_ {
        self.state.occupied.iter().copied()
    }

    pub fn is_occupied(&self) -> bool {
        !self.state.occupied.is_empty()
    }

    pub fn is_occupied_by(&self, train: TrainId) -> bool {
        self.state.occupied.iter().any(|h| h.train == train)
    }

    /// Whether a train other than the given one occupies the section.
    pub fn is_occupied_by_other(&self, train: TrainId) -> bool {
        self.state.occupied.iter().any(|h| h.train != train)
    }

    /// The train holding the reservation.
    pub fn reserved_by(&self) -> Option<TrainHandle> {
        self.state.reserved
    }

    pub fn is_reserved_by(&self, train: TrainId) -> bool {
        self.state.reserved.map(|h| h.train) == Some(train)
    }

    /// Whether the train occupies or holds the section.
    pub fn is_held_by(&self, train: TrainId) -> bool {
        self.is_reserved_by(train) || self.is_occupied_by(train)
    }

    /// Whether the train with the given number occupies or holds the section.
    pub fn is_held_by_number(&self, number: TrainNumber) -> bool {
        self.state.reserved.map(|h| h.number) == Some(number)
            || self.state.occupied.iter().any(|h| h.number == number)
    }

    /// The trains claiming the section, first claim first.
    pub fn claims(&self) -> impl Iterator<Item = TrainHandle> + '_ {
        self.state.claims.iter().copied()
    }

    /// The trains that may not enter the section and the trains they would trap.
    pub fn deadlock_traps(&self) -> &BTreeMap<TrainNumber, SmallVec<[TrainNumber; 2]>> {
        &self.state.deadlock_traps
    }

    /// Whether a deadlock trap prevents the train from entering.
    pub fn is_trapped(&self, number: TrainNumber) -> bool {
        self.state.deadlock_traps.contains_key(&number)
    }

    /// Determines whether, and why, the train may not take the section.
    pub(crate) fn blocked_for(&self, handle: TrainHandle) -> Option<Blocked> {
        if self.is_trapped(handle.number) {
            Some(Blocked::Trapped)
        } else if self.is_occupied_by_other(handle.train) {
            Some(Blocked::Occupied)
        } else if matches!(self.state.reserved, Some(r) if r.train != handle.train) {
            Some(Blocked::Reserved)
        } else if !self.is_held_by(handle.train)
            && matches!(self.state.claims.first(), Some(c) if c.train != handle.train)
        {
            Some(Blocked::Claimed)
        } else {
            None
        }
    }

    /// Whether the train may take the section.
    pub fn is_available(&self, handle: TrainHandle) -> bool {
        self.blocked_for(handle).is_none()
    }

    /// How a train's authority ends in front of the section when it is blocked.
    pub(crate) fn end_authority(&self, reason: Blocked) -> EndAuthority {
        match reason {
            Blocked::Trapped => EndAuthority::EndOfAuthority,
            Blocked::Reserved | Blocked::Claimed if self.is_switch() => {
                EndAuthority::ReservedSwitch
            }
            _ => EndAuthority::TrainAhead,
        }
    }

    /// Places a claim for the section.
    pub(crate) fn claim(&mut self, handle: TrainHandle) {
        if self.is_reserved_by(handle.train) {
            return;
        }
        if !self.state.claims.iter().any(|c| c.train == handle.train) {
            self.state.claims.push(handle);
        }
    }

    /// Reserves the section. The caller checks availability first.
    pub(crate) fn reserve(&mut self, handle: TrainHandle) {
        self.state.claims.retain(|c| c.train != handle.train);
        self.state.reserved = Some(handle);
    }

    /// Drops the train's reservation and claim. Returns `true` if a reservation was dropped.
    pub(crate) fn unreserve(&mut self, train: TrainId) -> bool {
        self.state.claims.retain(|c| c.train != train);
        if self.is_reserved_by(train) && !self.is_occupied_by(train) {
            self.state.reserved = None;
            true
        } else {
            false
        }
    }

    /// Marks the section occupied by the train, which also holds it from now on.
    pub(crate) fn set_occupied(&mut self, handle: TrainHandle) {
        if !self.is_occupied_by(handle.train) {
            self.state.occupied.push(handle);
        }
        if self.state.reserved.is_none() {
            self.state.reserved = Some(handle);
        }
        self.state.claims.retain(|c| c.train != handle.train);
    }

    /// Removes the train's occupation, and with it the train's reservation.
    /// Returns `true` if the train occupied the section.
    pub(crate) fn clear_occupied(&mut self, train: TrainId) -> bool {
        let before = self.state.occupied.len();
        self.state.occupied.retain(|h| h.train != train);
        let cleared = self.state.occupied.len() != before;
        if self.is_reserved_by(train) {
            self.state.reserved = None;
        }
        // Another train still on the section keeps holding it.
        if self.state.reserved.is_none() {
            self.state.reserved = self.state.occupied.first().copied();
        }
        cleared
    }

    pub(crate) fn set_switch_position(&mut self, position: usize) {
        self.switch_position = position;
    }

    /// Forbids `trapped` from entering because it would trap `by`.
    pub(crate) fn set_trap(&mut self, trapped: TrainNumber, by: TrainNumber) -> bool {
        let trappers = self.state.deadlock_traps.entry(trapped).or_default();
        if trappers.contains(&by) {
            false
        } else {
            trappers.push(by);
            true
        }
    }

    /// Removes a trap on `trapped` set because of `by`.
    pub(crate) fn release_trap(&mut self, trapped: TrainNumber, by: TrainNumber) -> bool {
        let Some(trappers) = self.state.deadlock_traps.get_mut(&trapped) else {
            return false;
        };
        let before = trappers.len();
        trappers.retain(|n| *n != by);
        let released = trappers.len() != before;
        if trappers.is_empty() {
            self.state.deadlock_traps.remove(&trapped);
        }
        released
    }

    /// Removes every trap involving the train, either as trapped or trapping train.
    pub(crate) fn release_traps_of(&mut self, number: TrainNumber) {
        self.state.deadlock_traps.remove(&number);
        for trappers in self.state.deadlock_traps.values_mut() {
            trappers.retain(|n| *n != number);
        }
        self.state.deadlock_traps.retain(|_, trappers| !trappers.is_empty());
    }

    /// Drops everything the train holds on this section.
    pub(crate) fn release_train(&mut self, handle: TrainHandle) {
        self.clear_occupied(handle.train);
        self.unreserve(handle.train);
        self.release_traps_of(handle.number);
    }

    pub(crate) fn add_pin(&mut self, end: usize, pin: Pin) {
        self.ends[end].push(pin);
    }

    /// Inserts an object keeping the per-direction list ordered by offset.
    pub(crate) fn add_object(
        &mut self,
        direction: Direction,
        signal: SignalId,
        offset_of: impl Fn(SignalId) -> f64,
    ) {
        let list = &mut self.objects[direction.index()];
        let offset = offset_of(signal);
        let idx = list
            .iter()
            .position(|other| offset_of(*other) > offset)
            .unwrap_or(list.len());
        list.insert(idx, signal);
    }
}
