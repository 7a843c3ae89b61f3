use super::{ControlMode, RouteSide, Train};
use crate::authority::{Authority, EndAuthority};
use crate::config::AuthorityConfig;
use crate::network::TrackNetwork;
use crate::route::Route;
use crate::SectionId;
use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A facing switch that was moved against a train in manual mode.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct SwitchMarker {
    pub section: SectionId,
    /// The position it was found in. The marker holds until the switch moves again.
    pub position: usize,
}

impl Train {
    /// Rebuilds the routes on both sides of a train in manual or explorer mode and
    /// reserves along them.
    pub(crate) fn update_manual_control(
        &mut self,
        network: &mut TrackNetwork,
        config: &AuthorityConfig,
    ) {
        let explorer = self.mode == ControlMode::Explorer;
        for side in RouteSide::BOTH {
            let (mut route, end) = self.build_manual_route(network, config, side, explorer);
            self.check_facing_switch(network, side, &mut route);
            self.replace_manual_route(network, side, route);
            self.authority[side.index()] = self.reserve_manual_route(network, side, end);
        }
    }

    /// Follows the track from one end of the train as the switches lie, until a signal
    /// at danger, the end of the track, a loop, or far enough.
    fn build_manual_route(
        &self,
        network: &mut TrackNetwork,
        config: &AuthorityConfig,
        side: RouteSide,
        explorer: bool,
    ) -> (Route, EndAuthority) {
        let (start, remaining) = match side {
            RouteSide::Ahead => (
                self.front.element,
                network.length(self.front.element.section) - self.front.offset,
            ),
            RouteSide::Behind => (self.rear.element.reversed(), self.rear.offset),
        };
        let mut route = Route::new(vec![start]);
        let mut prev = self.previous_section(side);
        let mut current = start;
        let mut distance = remaining;

        let end = loop {
            if let Some(signal) = network.exit_signal(current) {
                let sig = network.signal(signal);
                if sig.aspect().is_stop() && !sig.has_permission(self.number) {
                    if !explorer {
                        break EndAuthority::Signal;
                    }
                    network.request_permission(signal, self.number);
                }
                if distance >= config.manual_min_distance {
                    break EndAuthority::MaxDistance;
                }
            }
            if distance >= 2.0 * config.manual_min_distance {
                break EndAuthority::MaxDistance;
            }
            let Some(next) = network.next_element(prev, current) else {
                break EndAuthority::EndOfTrack;
            };
            if route.contains(next.section) {
                break EndAuthority::Loop;
            }
            route.push(next);
            distance += network.length(next.section);
            prev = Some(current.section);
            current = next;
        };
        (route, end)
    }

    /// Cuts the new route short of a facing switch that was moved since the last
    /// step, so that the train does not silently take the other branch.
    fn check_facing_switch(&mut self, network: &TrackNetwork, side: RouteSide, route: &mut Route) {
        let slot = side.index();
        if let Some(marker) = self.switch_marker[slot] {
            if network.section(marker.section).switch_position() == marker.position {
                if let Some(idx) = route.find(marker.section).filter(|idx| *idx > 0) {
                    route.truncate(idx);
                }
                return;
            }
            self.switch_marker[slot] = None;
        }

        let old = &self.routes[slot];
        let Some(first) = route.first().and_then(|el| old.find_element_from(el, 0)) else {
            return;
        };
        let diverges = (1..route.len()).find(|k| {
            matches!(old.get(first + k), Some(el) if Some(el) != route.get(*k))
        });
        let Some(k) = diverges.filter(|k| *k > 1) else {
            return;
        };
        let Some(switch) = route.get(k - 1) else {
            return;
        };
        let section = network.section(switch.section);
        if section.branch_end() != Some(switch.direction.exit_end())
            || section.is_held_by(self.id)
        {
            return;
        }
        warn!(
            "train {}: switch {:?} ahead was moved against it",
            self.number, switch.section
        );
        self.switch_marker[slot] = Some(SwitchMarker {
            section: switch.section,
            position: section.switch_position(),
        });
        route.truncate(k - 1);
    }

    /// Installs a new manual route, releasing what the old one held beyond it.
    fn replace_manual_route(&mut self, network: &mut TrackNetwork, side: RouteSide, route: Route) {
        let slot = side.index();
        let old = std::mem::replace(&mut self.routes[slot], route);
        for el in old.iter() {
            if !self.routes[0].contains(el.section) && !self.routes[1].contains(el.section) {
                network.section_mut(el.section).unreserve(self.id);
            }
        }
        match side {
            RouteSide::Ahead => self.front.route_index = 0,
            RouteSide::Behind => self.rear.route_index = 0,
        }
    }

    /// Reserves the manual route up to the first section the train cannot take.
    fn reserve_manual_route(
        &self,
        network: &mut TrackNetwork,
        side: RouteSide,
        end: EndAuthority,
    ) -> Authority {
        let slot = side.index();
        let handle = self.handle(side);
        let route = &self.routes[slot];
        let mut blocked = None;
        for idx in 1..route.len() {
            let Some(el) = route.get(idx) else {
                break;
            };
            let section = network.section(el.section);
            if section.is_reserved_by(self.id) {
                continue;
            }
            if let Some(reason) = section.blocked_for(handle) {
                blocked = Some((idx, section.end_authority(reason)));
                break;
            }
            network.reserve_element(handle, route, idx);
        }
        if let Some((idx, _)) = blocked {
            for el in route.iter().skip(idx + 1) {
                network.section_mut(el.section).unreserve(self.id);
            }
        }

        let (distance, _) = self.reserved_distance(network, side);
        let kind = if self.switch_marker[slot].is_some() {
            EndAuthority::ReservedSwitch
        } else {
            blocked.map_or(end, |(_, kind)| kind)
        };
        Authority::new(kind, distance)
    }
}
