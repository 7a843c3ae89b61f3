//! The track network: sections, their links, and the signals along them.

pub use gateway::NextObject;
pub use passing::PassingPath;
pub(crate) use section::Blocked;
pub use section::{Pin, SectionKind, TrackSection};
pub use signal::{Aspect, Signal, SignalKind};

use crate::error::AuthorityError;
use crate::route::{Route, RouteElement};
use crate::train::TrainHandle;
use crate::util::DISTANCE_EPSILON;
use crate::{SectionId, SectionSet, SignalId, SignalSet, TrainId};
use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod gateway;
mod passing;
mod section;
mod signal;

/// A network of track circuit sections.
///
/// The topology is built once and then only the section and signal states change.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackNetwork {
    /// The sections in the network.
    sections: SectionSet,
    /// The signals and speed posts.
    signals: SignalSet,
    /// Registered passing paths, in both directions of travel.
    passing_paths: Vec<PassingPath>,
}

impl TrackNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a section to the network.
    pub fn add_section(&mut self, kind: SectionKind, length: f64) -> SectionId {
        self.sections
            .insert_with_key(|id| TrackSection::new(id, kind, length))
    }

    /// Specifies that end `a_end` of section `a` joins end `b_end` of section `b`.
    ///
    /// The order in which the links of a junction's branching end are added
    /// determines the switch position that selects them.
    pub fn connect(&mut self, a: SectionId, a_end: usize, b: SectionId, b_end: usize) {
        self.sections[a].add_pin(a_end, Pin { section: b, end: b_end });
        self.sections[b].add_pin(b_end, Pin { section: a, end: a_end });
    }

    /// Adds a normal signal at the exit end of a section for the given direction of travel.
    pub fn add_signal(&mut self, location: RouteElement) -> SignalId {
        let offset = self.sections[location.section].length();
        self.add_object(SignalKind::Normal, location, offset, None)
    }

    /// Adds a distant signal.
    pub fn add_distant_signal(&mut self, location: RouteElement, offset: f64) -> SignalId {
        self.add_object(SignalKind::Distant, location, offset, None)
    }

    /// Adds a speed post imposing `limit` m/s from `offset` m into the section.
    pub fn add_speed_post(&mut self, location: RouteElement, offset: f64, limit: f64) -> SignalId {
        self.add_object(SignalKind::SpeedPost, location, offset, Some(limit))
    }

    /// Adds a trackside object. Normal signals may carry a speed limit that
    /// applies beyond them while they are not at danger.
    pub fn add_object(
        &mut self,
        kind: SignalKind,
        location: RouteElement,
        offset: f64,
        speed_limit: Option<f64>,
    ) -> SignalId {
        let length = self.sections[location.section].length();
        let offset = if kind == SignalKind::Normal {
            length
        } else {
            offset.clamp(0.0, length)
        };
        let id = self
            .signals
            .insert_with_key(|id| Signal::new(id, kind, location, offset, speed_limit));
        let signals = &self.signals;
        self.sections[location.section].add_object(location.direction, id, |s| {
            signals[s].offset()
        });
        id
    }

    /// Registers a passing path. Both routes must be contiguous and run in the same direction.
    pub fn add_passing_path(
        &mut self,
        main: Route,
        alternative: Route,
    ) -> Result<(), AuthorityError> {
        self.validate_route(&main)?;
        self.validate_route(&alternative)?;
        let length = self.route_length(&alternative);
        let path = PassingPath::new(main, alternative, length);
        self.passing_paths.push(path.reversed());
        self.passing_paths.push(path);
        Ok(())
    }

    /// Sets the position of a junction.
    pub fn set_switch(&mut self, section: SectionId, position: usize) {
        self.sections[section].set_switch_position(position);
    }

    /// Gets a reference to the section with the given ID.
    pub fn section(&self, id: SectionId) -> &TrackSection {
        &self.sections[id]
    }

    /// Gets the section with the given ID, if it exists.
    pub fn get_section(&self, id: SectionId) -> Option<&TrackSection> {
        self.sections.get(id)
    }

    pub(crate) fn section_mut(&mut self, id: SectionId) -> &mut TrackSection {
        &mut self.sections[id]
    }

    /// Returns an iterator over all the sections.
    pub fn iter_sections(&self) -> impl Iterator<Item = &TrackSection> {
        self.sections.values()
    }

    /// Gets a reference to the signal with the given ID.
    pub fn signal(&self, id: SignalId) -> &Signal {
        &self.signals[id]
    }

    /// Returns an iterator over all the signals and speed posts.
    pub fn iter_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    /// The registered passing paths.
    pub fn passing_paths(&self) -> &[PassingPath] {
        &self.passing_paths
    }

    /// The length of the section in m.
    pub fn length(&self, section: SectionId) -> f64 {
        self.sections[section].length()
    }

    /// The total length of a route in m.
    pub fn route_length(&self, route: &Route) -> f64 {
        route.iter().map(|el| self.length(el.section)).sum()
    }

    /// The element a train is on after leaving `element`, following the current switch positions.
    ///
    /// `prev` is the section the train came from, which selects the path through a crossover.
    pub fn next_element(
        &self,
        prev: Option<SectionId>,
        element: RouteElement,
    ) -> Option<RouteElement> {
        let section = &self.sections[element.section];
        let pins = section.pins(element.direction.exit_end());
        let pin = match section.kind() {
            SectionKind::Junction if pins.len() > 1 => pins.get(section.switch_position()),
            SectionKind::Crossover if pins.len() > 1 => {
                let entry = section.pins(element.direction.entry_end());
                let path = prev
                    .and_then(|p| entry.iter().position(|pin| pin.section == p))
                    .unwrap_or(0);
                pins.get(path)
            }
            _ => pins.first(),
        };
        pin.map(|pin| pin.entered())
    }

    /// All elements a train could be on after leaving `element`, whatever the switch positions.
    pub fn successors(&self, prev: Option<SectionId>, element: RouteElement) -> Vec<RouteElement> {
        let section = &self.sections[element.section];
        match section.kind() {
            SectionKind::Crossover => self.next_element(prev, element).into_iter().collect(),
            _ => section
                .pins(element.direction.exit_end())
                .iter()
                .map(|pin| pin.entered())
                .collect(),
        }
    }

    /// Whether `to` can be entered directly from `from`.
    pub fn is_linked(&self, from: RouteElement, to: RouteElement) -> bool {
        self.sections[from.section]
            .pins(from.direction.exit_end())
            .iter()
            .any(|pin| pin.entered() == to)
    }

    /// The switch position a junction needs for a train running from `prev`
    /// through `element` to `next`.
    pub(crate) fn required_switch_position(
        &self,
        prev: Option<SectionId>,
        element: RouteElement,
        next: Option<SectionId>,
    ) -> Option<usize> {
        let section = &self.sections[element.section];
        let branch_end = section.branch_end()?;
        let neighbour = if branch_end == element.direction.exit_end() {
            next
        } else {
            prev
        }?;
        section
            .pins(branch_end)
            .iter()
            .position(|pin| pin.section == neighbour)
    }

    /// Whether a junction is set for a train running from `prev` through `element` to `next`.
    pub fn is_aligned(
        &self,
        prev: Option<SectionId>,
        element: RouteElement,
        next: Option<SectionId>,
    ) -> bool {
        match self.required_switch_position(prev, element, next) {
            Some(position) => self.sections[element.section].switch_position() == position,
            None => true,
        }
    }

    /// The normal signal at the exit of a section for the given direction of travel.
    pub fn exit_signal(&self, element: RouteElement) -> Option<SignalId> {
        let section = &self.sections[element.section];
        section
            .objects(element.direction)
            .iter()
            .copied()
            .find(|id| {
                let signal = &self.signals[*id];
                signal.is_normal() && signal.offset() >= section.length() - DISTANCE_EPSILON
            })
    }

    /// Checks that every section of the route exists and is linked to the next.
    pub fn validate_route(&self, route: &Route) -> Result<(), AuthorityError> {
        let first = route.first().ok_or(AuthorityError::EmptyRoute)?;
        if !self.sections.contains_key(first.section) {
            return Err(AuthorityError::UnknownSection(first.section));
        }
        for pair in route.as_slice().windows(2) {
            let [from, to] = [pair[0], pair[1]];
            if !self.sections.contains_key(to.section) {
                return Err(AuthorityError::UnknownSection(to.section));
            }
            if !self.is_linked(from, to) {
                return Err(AuthorityError::DisjointRoute {
                    from: from.section,
                    to: to.section,
                });
            }
        }
        Ok(())
    }

    /// Cuts the route at the first element that does not belong to the network.
    /// Returns `true` if anything was removed.
    pub(crate) fn truncate_to_network(&self, route: &mut Route) -> bool {
        let valid = route
            .iter()
            .enumerate()
            .take_while(|(idx, el)| {
                self.sections.contains_key(el.section)
                    && (*idx == 0
                        || route
                            .get(idx - 1)
                            .map_or(false, |prev| self.is_linked(prev, *el)))
            })
            .count();
        if valid < route.len() {
            warn!(
                "route does not match the network after {} of {} sections; truncating",
                valid,
                route.len()
            );
            route.truncate(valid);
            true
        } else {
            false
        }
    }

    /// Finds the elements a train of `length` m would cover with its front `offset` m into
    /// `front`, listed rear first, provided the train may stand on all of them.
    pub fn placement(
        &self,
        handle: TrainHandle,
        front: RouteElement,
        offset: f64,
        length: f64,
    ) -> Option<Vec<RouteElement>> {
        if !self.sections.get(front.section)?.is_available(handle) {
            return None;
        }
        let mut elements = vec![front];
        let mut remaining = length - offset;
        let mut current = front.reversed();
        let mut prev = None;
        while remaining > DISTANCE_EPSILON {
            let next = self.next_element(prev, current)?;
            if !self.sections[next.section].is_available(handle) {
                return None;
            }
            elements.push(next.reversed());
            remaining -= self.length(next.section);
            prev = Some(current.section);
            current = next;
        }
        elements.reverse();
        Some(elements)
    }

    /// Whether a train of `length` m fits with its front `offset` m into `front`.
    pub fn can_place_train(
        &self,
        handle: TrainHandle,
        front: RouteElement,
        offset: f64,
        length: f64,
    ) -> bool {
        self.placement(handle, front, offset, length).is_some()
    }

    /// Reserves the element at `idx` of the route, setting a junction for the route.
    pub(crate) fn reserve_element(&mut self, handle: TrainHandle, route: &Route, idx: usize) {
        let Some(element) = route.get(idx) else {
            return;
        };
        let prev = idx.checked_sub(1).and_then(|i| route.get(i)).map(|el| el.section);
        let next = route.get(idx + 1).map(|el| el.section);
        let position = self.required_switch_position(prev, element, next);
        let section = &mut self.sections[element.section];
        if let Some(position) = position {
            if !section.is_occupied() {
                section.set_switch_position(position);
            }
        }
        section.reserve(handle);
    }

    /// Releases the reservations and claims the train holds on the route from `from` onwards,
    /// leaving occupied sections alone. Each section is released at most once.
    pub(crate) fn release_route(&mut self, train: TrainId, route: &Route, from: usize) -> usize {
        let mut released = 0;
        for el in route.iter().skip(from) {
            if self.sections[el.section].unreserve(train) {
                released += 1;
            }
        }
        for signal in self.signals.values_mut() {
            if signal.enabled_train().map(|h| h.train) == Some(train) {
                signal.reset();
            }
        }
        released
    }

    /// Drops everything the train holds anywhere in the network.
    pub(crate) fn release_train(&mut self, handle: TrainHandle) {
        for section in self.sections.values_mut() {
            section.release_train(handle);
        }
        for signal in self.signals.values_mut() {
            if signal.enabled_train().map(|h| h.train) == Some(handle.train) {
                signal.reset();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{SectionKind, TrackNetwork};
    use crate::route::{Direction, Route, RouteElement};
    use crate::train::{RouteSide, TrainHandle, TrainNumber};
    use crate::TrainId;
    use slotmap::SlotMap;

    fn fwd(section: crate::SectionId) -> RouteElement {
        RouteElement::new(section, Direction::Forward)
    }

    #[test]
    fn junction_follows_switch() {
        let mut net = TrackNetwork::new();
        let a = net.add_section(SectionKind::Normal, 100.0);
        let j = net.add_section(SectionKind::Junction, 20.0);
        let b = net.add_section(SectionKind::Normal, 100.0);
        let c = net.add_section(SectionKind::Normal, 100.0);
        net.connect(a, 1, j, 0);
        net.connect(j, 1, b, 0);
        net.connect(j, 1, c, 0);

        assert_eq!(net.next_element(Some(a), fwd(j)), Some(fwd(b)));
        net.set_switch(j, 1);
        assert_eq!(net.next_element(Some(a), fwd(j)), Some(fwd(c)));
        assert_eq!(net.successors(Some(a), fwd(j)).len(), 2);

        // Trailing through the junction from `b` needs position 0.
        assert!(!net.is_aligned(Some(b), fwd(j).reversed(), Some(a)));
        net.set_switch(j, 0);
        assert!(net.is_aligned(Some(b), fwd(j).reversed(), Some(a)));
    }

    #[test]
    fn validate_and_truncate() {
        let mut net = TrackNetwork::new();
        let a = net.add_section(SectionKind::Normal, 100.0);
        let b = net.add_section(SectionKind::Normal, 100.0);
        let c = net.add_section(SectionKind::Normal, 100.0);
        net.connect(a, 1, b, 0);

        let good = Route::new(vec![fwd(a), fwd(b)]);
        assert!(net.validate_route(&good).is_ok());

        let mut bad = Route::new(vec![fwd(a), fwd(b), fwd(c)]);
        assert!(net.validate_route(&bad).is_err());
        assert!(net.truncate_to_network(&mut bad));
        assert_eq!(bad, good);
    }

    #[test]
    fn placement_walks_backwards() {
        let mut net = TrackNetwork::new();
        let a = net.add_section(SectionKind::Normal, 100.0);
        let b = net.add_section(SectionKind::Normal, 100.0);
        net.connect(a, 1, b, 0);
        let mut trains = SlotMap::<TrainId, ()>::with_key();
        let handle = TrainHandle::new(trains.insert(()), TrainNumber(1), RouteSide::Ahead);

        let placed = net.placement(handle, fwd(b), 50.0, 120.0);
        assert_eq!(placed, Some(vec![fwd(a), fwd(b)]));
        assert!(!net.can_place_train(handle, fwd(b), 50.0, 200.0));
    }
}
