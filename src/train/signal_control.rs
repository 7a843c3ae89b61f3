use super::lookahead::{DeferredAction, ObjectItem};
use super::{ControlMode, OutOfControlReason, RouteSide, Train};
use crate::authority::{Authority, EndAuthority};
use crate::config::AuthorityConfig;
use crate::network::{NextObject, SignalKind, TrackNetwork};
use crate::util::DISTANCE_EPSILON;
use log::debug;
use smallvec::SmallVec;

impl Train {
    /// Extends the list of objects ahead up to the lookahead window, stopping at
    /// the first normal signal at danger.
    pub(crate) fn refresh_lookahead(&mut self, network: &TrackNetwork, config: &AuthorityConfig) {
        let horizon =
            self.distance_travelled + config.lookahead_distance(self.allowed_max_speed());
        loop {
            let (next, base) = match self.lookahead.last() {
                Some(item) => {
                    let signal = network.signal(item.signal);
                    if signal.is_normal() && signal.aspect().is_stop() {
                        break;
                    }
                    let next = network.get_object_after(
                        &self.routes[0],
                        item.route_index,
                        item.signal,
                        None,
                    );
                    (next, item.at)
                }
                None => {
                    let next = network.get_next_object(
                        &self.routes[0],
                        self.front.route_index,
                        self.front.offset,
                        None,
                    );
                    (next, self.distance_travelled)
                }
            };
            if base >= horizon {
                break;
            }
            match next {
                NextObject::EndOfRoute { .. } => break,
                NextObject::Found {
                    signal,
                    distance,
                    route_index,
                    offset,
                } => {
                    let at = base + distance;
                    if at > horizon {
                        break;
                    }
                    let item = ObjectItem {
                        signal,
                        kind: network.signal(signal).kind(),
                        route_index,
                        offset,
                        at,
                    };
                    self.lookahead.push(item);
                    self.schedule_speed_limit(network, &item);
                }
            }
        }
    }

    /// Schedules the speed limit an object imposes. Lower limits apply from the object
    /// onwards, higher ones once the whole train has passed it. A normal signal at
    /// danger imposes nothing until it clears.
    fn schedule_speed_limit(&mut self, network: &TrackNetwork, item: &ObjectItem) {
        let signal = network.signal(item.signal);
        let Some(limit) = signal.speed_limit() else {
            return;
        };
        if signal.is_normal() && signal.aspect().is_stop() {
            return;
        }
        if self.lookahead.deferred().iter().any(|a| a.signal == item.signal) {
            return;
        }
        let current = self
            .lookahead
            .deferred()
            .last()
            .map(|a| a.speed_limit)
            .or(self.lookahead.line_speed())
            .unwrap_or(f64::INFINITY);
        let trigger = if limit < current {
            item.at
        } else {
            item.at + self.length
        };
        debug!(
            "train {} will run at {} m/s from {:.1} m",
            self.number, limit, trigger
        );
        self.lookahead.schedule(DeferredAction {
            signal: item.signal,
            trigger,
            speed_limit: limit,
        });
    }

    /// Computes the authority of a train controlled by signals, switching to node
    /// control if `may_switch` and the signals ahead cannot be used.
    pub(crate) fn update_signal_control(
        &mut self,
        network: &mut TrackNetwork,
        config: &AuthorityConfig,
        may_switch: bool,
    ) {
        if !self.front_on_route() {
            self.set_out_of_control(OutOfControlReason::OutOfPath, network);
            return;
        }
        self.refresh_lookahead(network, config);

        let handle = self.handle(RouteSide::Ahead);
        let signals = self
            .lookahead
            .items()
            .filter(|item| item.kind == SignalKind::Normal)
            .copied()
            .collect::<SmallVec<[ObjectItem; 4]>>();
        let mut cleared = false;
        for item in signals {
            let index = item.route_index;
            if !network.request_clear_signal(item.signal, handle, &self.routes[0], index) {
                break;
            }
            self.schedule_speed_limit(network, &item);
            cleared = true;
        }
        if cleared {
            self.refresh_lookahead(network, config);
        }

        if may_switch && !self.signal_mode_valid(network) {
            debug!("train {} has no usable signal ahead", self.number);
            self.mode = ControlMode::AutoNode;
            self.update_node_control(network, config, false);
            return;
        }
        self.authority[0] = self.signal_authority(network);
    }

    /// The authority up to the first signal at danger or the end of the reserved sections.
    fn signal_authority(&self, network: &TrackNetwork) -> Authority {
        let (reserved, end) = self.reserved_distance(network, RouteSide::Ahead);
        let stop = self.lookahead.items().find(|item| {
            item.kind == SignalKind::Normal && network.signal(item.signal).aspect().is_stop()
        });
        if let Some(item) = stop {
            let distance = item.at - self.distance_travelled;
            if distance <= reserved + DISTANCE_EPSILON {
                return Authority::new(EndAuthority::Signal, distance);
            }
        }
        if end + 1 >= self.routes[0].len() {
            return Authority::new(self.end_of_route_kind(network), reserved);
        }
        let at_signal = self
            .routes[0]
            .get(end)
            .and_then(|el| network.exit_signal(el))
            .map_or(false, |signal| network.signal(signal).aspect().is_stop());
        let kind = if at_signal {
            EndAuthority::Signal
        } else {
            EndAuthority::EndOfAuthority
        };
        Authority::new(kind, reserved)
    }
}
