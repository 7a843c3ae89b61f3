//! The signal gateway: the requests trains make of signals and sections.

use super::{Aspect, Blocked, SignalKind, TrackNetwork};
use crate::authority::EndAuthority;
use crate::route::Route;
use crate::train::{TrainHandle, TrainNumber};
use crate::util::DISTANCE_EPSILON;
use crate::SignalId;
use log::debug;
use smallvec::SmallVec;

/// The result of a lookahead query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NextObject {
    /// An object was found.
    Found {
        signal: SignalId,
        /// Distance from the query position in m.
        distance: f64,
        /// Index of the route element the object stands on.
        route_index: usize,
        /// Offset of the object into that element in m.
        offset: f64,
    },
    /// The route ended first, this far from the query position.
    EndOfRoute { distance: f64 },
}

/// The outcome of a node clearance request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NodeClearance {
    /// Why the reservation stops.
    pub end: EndAuthority,
    /// The furthest route index now reserved by the request.
    pub last_reserved: Option<usize>,
}

impl TrackNetwork {
    /// Finds the next object of the given kind (or of any kind) along the route,
    /// strictly beyond `offset` m into the element at `index`.
    pub fn get_next_object(
        &self,
        route: &Route,
        index: usize,
        offset: f64,
        kind: Option<SignalKind>,
    ) -> NextObject {
        self.find_object(route, index, offset, None, kind)
    }

    /// Finds the next object of the given kind (or of any kind) along the route after
    /// `signal`, which stands on the element at `index`. Objects at the same offset
    /// that come after it in the section are included.
    pub fn get_object_after(
        &self,
        route: &Route,
        index: usize,
        signal: SignalId,
        kind: Option<SignalKind>,
    ) -> NextObject {
        let offset = self.signals[signal].offset();
        self.find_object(route, index, offset, Some(signal), kind)
    }

    fn find_object(
        &self,
        route: &Route,
        index: usize,
        offset: f64,
        after: Option<SignalId>,
        kind: Option<SignalKind>,
    ) -> NextObject {
        let mut distance = 0.0;
        for (idx, el) in route.iter().enumerate().skip(index) {
            let section = &self.sections[el.section];
            let objects = section.objects(el.direction);
            let (start, candidates) = if idx != index {
                (0.0, objects)
            } else if let Some(pos) = after.and_then(|a| objects.iter().position(|id| *id == a)) {
                (offset, &objects[pos + 1..])
            } else {
                let first = objects
                    .iter()
                    .position(|id| self.signals[*id].offset() > offset + DISTANCE_EPSILON)
                    .unwrap_or(objects.len());
                (offset, &objects[first..])
            };
            let found = candidates
                .iter()
                .find(|id| kind.map_or(true, |kind| kind == self.signals[**id].kind()));
            if let Some(id) = found {
                let signal_offset = self.signals[*id].offset();
                return NextObject::Found {
                    signal: *id,
                    distance: distance + signal_offset - start,
                    route_index: idx,
                    offset: signal_offset,
                };
            }
            distance += section.length() - start;
        }
        NextObject::EndOfRoute {
            distance: f64::max(distance, 0.0),
        }
    }

    /// The aspect shown by a signal.
    pub fn aspect(&self, signal: SignalId) -> Aspect {
        self.signals[signal].aspect()
    }

    /// Asks a normal signal standing at the end of route element `index` to clear for the train.
    ///
    /// The signal clears only if every section of its block, up to the next normal signal
    /// or the end of the route, can be reserved; they are then reserved for the train.
    /// Otherwise the train claims the block up to the first section it cannot take, so
    /// that it is next in line, unless a deadlock trap holds it back. Returns `true` if
    /// the signal shows a proceed aspect.
    pub fn request_clear_signal(
        &mut self,
        signal: SignalId,
        handle: TrainHandle,
        route: &Route,
        index: usize,
    ) -> bool {
        let sig = &self.signals[signal];
        if !sig.is_normal() || sig.is_held() {
            return false;
        }
        match sig.enabled_train() {
            Some(enabled) if enabled.train != handle.train => return false,
            Some(_) if !sig.aspect().is_stop() => return true,
            _ => {}
        }

        let (block, next_signal) = self.signal_block(route, index);
        self.signals[signal].enable(handle);
        if block.is_empty() {
            return false;
        }

        let blocked = block.iter().find_map(|idx| {
            route
                .get(*idx)
                .and_then(|el| self.sections[el.section].blocked_for(handle))
                .map(|reason| (*idx, reason))
        });
        if let Some((from, reason)) = blocked {
            if reason != Blocked::Trapped {
                // Sections beyond the blocked one may still be needed by the train in it.
                for idx in block.iter().filter(|idx| **idx <= from) {
                    if let Some(el) = route.get(*idx) {
                        self.sections[el.section].claim(handle);
                    }
                }
            }
            debug!(
                "signal {:?} held at danger for train {}: {:?}",
                signal, handle.number, reason
            );
            return false;
        }

        for idx in &block {
            self.reserve_element(handle, route, *idx);
        }
        let aspect = match next_signal {
            Some(next) if !self.signals[next].aspect().is_stop() => Aspect::Clear2,
            _ => Aspect::Approach1,
        };
        let sections = block
            .iter()
            .filter_map(|idx| route.get(*idx))
            .map(|el| el.section)
            .collect::<SmallVec<[_; 4]>>();
        for idx in &block {
            if let Some(el) = route.get(*idx) {
                self.update_distant_signals(el, aspect);
            }
        }
        let sig = &mut self.signals[signal];
        sig.set_aspect(aspect);
        sig.set_block(sections);
        debug!("signal {:?} cleared to {:?} for train {}", signal, aspect, handle.number);
        true
    }

    /// Distant signals in a cleared block announce the aspect of the signal at its end.
    fn update_distant_signals(&mut self, element: crate::RouteElement, aspect: Aspect) {
        let distant = self.sections[element.section]
            .objects(element.direction)
            .iter()
            .copied()
            .filter(|id| self.signals[*id].kind() == SignalKind::Distant)
            .collect::<SmallVec<[_; 2]>>();
        for id in distant {
            self.signals[id].set_aspect(aspect);
        }
    }

    /// The route indices protected by the signal at the end of element `index`,
    /// and the normal signal closing the block, if any.
    fn signal_block(
        &self,
        route: &Route,
        index: usize,
    ) -> (SmallVec<[usize; 8]>, Option<SignalId>) {
        let mut block = SmallVec::new();
        for (idx, el) in route.iter().enumerate().skip(index + 1) {
            block.push(idx);
            if let Some(next) = self.exit_signal(el) {
                return (block, Some(next));
            }
        }
        (block, None)
    }

    /// Reserves sections of the route for a train in node control, starting at route index `from`
    /// and stopping before anything the train cannot take, at a facing normal signal if
    /// `stop_at_signals`, or once `budget` m have been reserved. Nothing is reserved past
    /// a normal signal at the exit of the element before `from` if `stop_at_signals`.
    pub(crate) fn request_clear_node(
        &mut self,
        handle: TrainHandle,
        route: &Route,
        from: usize,
        budget: f64,
        stop_at_signals: bool,
    ) -> NodeClearance {
        let guarded = from
            .checked_sub(1)
            .and_then(|idx| route.get(idx))
            .map_or(false, |el| self.exit_signal(el).is_some());
        if stop_at_signals && guarded {
            return NodeClearance {
                end: EndAuthority::Signal,
                last_reserved: None,
            };
        }

        let loop_point = route.loop_point();
        let mut distance = 0.0;
        let mut last_reserved = None;

        for (idx, el) in route.iter().enumerate().skip(from) {
            let section = &self.sections[el.section];
            if let Some(reason) = section.blocked_for(handle) {
                return NodeClearance {
                    end: section.end_authority(reason),
                    last_reserved,
                };
            }
            if loop_point == Some(idx) {
                return NodeClearance {
                    end: EndAuthority::Loop,
                    last_reserved,
                };
            }

            let is_end_of_track = section.kind() == super::SectionKind::EndOfTrack;
            let length = section.length();
            self.reserve_element(handle, route, idx);
            last_reserved = Some(idx);
            distance += length;

            let end = if is_end_of_track && self.next_element(None, el).is_none() {
                Some(EndAuthority::EndOfTrack)
            } else if idx + 1 == route.len() {
                Some(EndAuthority::EndOfPath)
            } else if distance >= budget {
                Some(EndAuthority::MaxDistance)
            } else if stop_at_signals && self.exit_signal(el).is_some() {
                Some(EndAuthority::Signal)
            } else {
                None
            };
            if let Some(end) = end {
                return NodeClearance { end, last_reserved };
            }
        }

        let end = if route.is_empty() {
            EndAuthority::NoPathReserved
        } else {
            EndAuthority::EndOfPath
        };
        NodeClearance { end, last_reserved }
    }

    /// Returns a signal to danger.
    pub fn reset_signal(&mut self, signal: SignalId) {
        self.signals[signal].reset();
    }

    /// Keeps a normal signal at danger, or lets it clear again. Holding a signal
    /// throws it back to danger and gives up the part of its block no train stands on.
    pub fn set_signal_hold(&mut self, signal: SignalId, held: bool) {
        let sig = &mut self.signals[signal];
        sig.set_held(held);
        if !held || !sig.is_normal() {
            return;
        }
        let train = sig.enabled_train().map(|h| h.train);
        let block = sig.block().to_vec();
        sig.reset();
        if let Some(train) = train {
            for section in block {
                self.sections[section].unreserve(train);
            }
        }
        debug!("signal {:?} held at danger", signal);
    }

    /// Called when a train passes a normal signal: the signal drops back to danger
    /// behind it, while the sections of its block stay with the train.
    pub(crate) fn signal_passed(&mut self, signal: SignalId) {
        self.signals[signal].reset();
    }

    /// Allows a train to pass a signal at danger.
    pub fn request_permission(&mut self, signal: SignalId, number: TrainNumber) {
        self.signals[signal].grant_permission(number);
    }
}

#[cfg(test)]
mod test {
    use super::NextObject;
    use crate::authority::EndAuthority;
    use crate::network::{Aspect, SectionKind, SignalKind, TrackNetwork};
    use crate::route::{Direction, Route, RouteElement};
    use crate::train::{RouteSide, TrainHandle, TrainNumber};
    use crate::{SectionId, TrainId};
    use slotmap::SlotMap;

    fn line(net: &mut TrackNetwork, n: usize) -> (Vec<SectionId>, Route) {
        let ids = (0..n)
            .map(|_| net.add_section(SectionKind::Normal, 100.0))
            .collect::<Vec<_>>();
        for pair in ids.windows(2) {
            net.connect(pair[0], 1, pair[1], 0);
        }
        let route = ids
            .iter()
            .map(|id| RouteElement::new(*id, Direction::Forward))
            .collect();
        (ids, route)
    }

    fn handles() -> (TrainHandle, TrainHandle) {
        let mut trains = SlotMap::<TrainId, ()>::with_key();
        (
            TrainHandle::new(trains.insert(()), TrainNumber(1), RouteSide::Ahead),
            TrainHandle::new(trains.insert(()), TrainNumber(2), RouteSide::Ahead),
        )
    }

    #[test]
    fn next_object_of_kind() {
        let mut net = TrackNetwork::new();
        let (ids, route) = line(&mut net, 4);
        let post = net.add_speed_post(RouteElement::new(ids[1], Direction::Forward), 30.0, 20.0);
        let sig = net.add_signal(RouteElement::new(ids[2], Direction::Forward));

        assert_eq!(
            net.get_next_object(&route, 0, 50.0, None),
            NextObject::Found {
                signal: post,
                distance: 80.0,
                route_index: 1,
                offset: 30.0
            }
        );
        assert_eq!(
            net.get_next_object(&route, 1, 30.0, Some(SignalKind::Normal)),
            NextObject::Found {
                signal: sig,
                distance: 170.0,
                route_index: 2,
                offset: 100.0
            }
        );
        assert_eq!(
            net.get_next_object(&route, 2, 100.0, None),
            NextObject::EndOfRoute { distance: 100.0 }
        );
    }

    #[test]
    fn objects_sharing_an_offset_are_all_found() {
        let mut net = TrackNetwork::new();
        let (ids, route) = line(&mut net, 3);
        let sig = net.add_signal(RouteElement::new(ids[1], Direction::Forward));
        let post = net.add_speed_post(RouteElement::new(ids[1], Direction::Forward), 100.0, 10.0);

        let mut found = vec![];
        let mut next = net.get_next_object(&route, 0, 0.0, None);
        while let NextObject::Found {
            signal,
            route_index,
            ..
        } = next
        {
            found.push(signal);
            next = net.get_object_after(&route, route_index, signal, None);
        }
        assert_eq!(found, vec![sig, post]);
        assert_eq!(next, NextObject::EndOfRoute { distance: 100.0 });
        assert_eq!(
            net.get_object_after(&route, 1, sig, None),
            NextObject::Found {
                signal: post,
                distance: 0.0,
                route_index: 1,
                offset: 100.0
            }
        );
    }

    #[test]
    fn signal_clears_only_free_block() {
        let mut net = TrackNetwork::new();
        let (ids, route) = line(&mut net, 4);
        let sig = net.add_signal(RouteElement::new(ids[0], Direction::Forward));
        let (a, b) = handles();

        net.section_mut(ids[2]).set_occupied(b);
        assert!(!net.request_clear_signal(sig, a, &route, 0));
        assert_eq!(net.aspect(sig), Aspect::Stop);
        assert!(net.section(ids[2]).claims().any(|c| c.train == a.train));
        // Nothing beyond the occupied section is claimed.
        assert_eq!(net.section(ids[3]).claims().count(), 0);
        assert!(net.section(ids[2]).is_available(b));

        net.section_mut(ids[2]).clear_occupied(b.train);
        assert!(net.request_clear_signal(sig, a, &route, 0));
        assert_eq!(net.aspect(sig), Aspect::Approach1);
        assert!(ids[1..].iter().all(|id| net.section(*id).is_reserved_by(a.train)));
    }

    #[test]
    fn distant_signal_repeats_the_cleared_aspect() {
        let mut net = TrackNetwork::new();
        let (ids, route) = line(&mut net, 4);
        let first = net.add_signal(RouteElement::new(ids[0], Direction::Forward));
        let distant = net.add_distant_signal(RouteElement::new(ids[1], Direction::Forward), 50.0);
        let second = net.add_signal(RouteElement::new(ids[2], Direction::Forward));
        let (a, _) = handles();

        assert!(net.request_clear_signal(first, a, &route, 0));
        assert_eq!(net.aspect(first), Aspect::Approach1);
        assert_eq!(net.signal(first).block(), &[ids[1], ids[2]]);

        assert!(net.request_clear_signal(second, a, &route, 2));
        assert_eq!(net.aspect(second), Aspect::Approach1);

        // With the next signal off danger, the first one shows a clear aspect.
        net.reset_signal(first);
        assert!(net.request_clear_signal(first, a, &route, 0));
        assert_eq!(net.aspect(first), Aspect::Clear2);
        assert_eq!(net.aspect(distant), Aspect::Clear2);
    }

    #[test]
    fn node_clearance_causes() {
        let mut net = TrackNetwork::new();
        let (ids, route) = line(&mut net, 5);
        let (a, b) = handles();

        net.section_mut(ids[3]).set_occupied(b);
        let c = net.request_clear_node(a, &route, 1, 10_000.0, true);
        assert_eq!(c.end, EndAuthority::TrainAhead);
        assert_eq!(c.last_reserved, Some(2));

        net.section_mut(ids[3]).clear_occupied(b.train);
        let c = net.request_clear_node(a, &route, 3, 10_000.0, true);
        assert_eq!(c.end, EndAuthority::EndOfPath);

        let (ids, route) = line(&mut net, 5);
        let c = net.request_clear_node(a, &route, 0, 150.0, true);
        assert_eq!(c.end, EndAuthority::MaxDistance);
        assert_eq!(c.last_reserved, Some(1));

        // A train standing in front of a signal gets nothing beyond it.
        net.add_signal(RouteElement::new(ids[2], Direction::Forward));
        let c = net.request_clear_node(a, &route, 3, 10_000.0, true);
        assert_eq!(c.end, EndAuthority::Signal);
        assert_eq!(c.last_reserved, None);
        assert!(net.section(ids[3]).reserved_by().is_none());
    }

    #[test]
    fn held_signal_stays_at_danger() {
        let mut net = TrackNetwork::new();
        let (ids, route) = line(&mut net, 3);
        let sig = net.add_signal(RouteElement::new(ids[0], Direction::Forward));
        let (a, _) = handles();

        assert!(net.request_clear_signal(sig, a, &route, 0));
        net.set_signal_hold(sig, true);
        assert_eq!(net.aspect(sig), Aspect::Stop);
        assert!(net.section(ids[1]).reserved_by().is_none());
        assert!(!net.request_clear_signal(sig, a, &route, 0));

        net.set_signal_hold(sig, false);
        assert!(net.request_clear_signal(sig, a, &route, 0));
    }
}
