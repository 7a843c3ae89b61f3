use super::{ControlMode, OutOfControlReason, RouteSide, Train};
use crate::authority::Authority;
use crate::config::AuthorityConfig;
use crate::network::{NextObject, SignalKind, TrackNetwork};
use log::{debug, info};

impl Train {
    /// Whether the train can be controlled by signals: there is a normal signal ahead
    /// that is not working for another train, and everything up to it is held by this train.
    pub(crate) fn signal_mode_valid(&self, network: &TrackNetwork) -> bool {
        let next = network.get_next_object(
            &self.routes[0],
            self.front.route_index,
            self.front.offset,
            Some(SignalKind::Normal),
        );
        let NextObject::Found {
            signal,
            route_index,
            ..
        } = next
        else {
            return false;
        };
        if matches!(network.signal(signal).enabled_train(), Some(h) if h.train != self.id) {
            return false;
        }
        self.routes[0]
            .iter()
            .take(route_index + 1)
            .skip(self.front.route_index)
            .all(|el| network.section(el.section).is_held_by(self.id))
    }

    /// Picks the first control mode of a train that has just been placed or given a route.
    pub(crate) fn initialise_control(
        &mut self,
        network: &mut TrackNetwork,
        config: &AuthorityConfig,
    ) {
        if !self.front_on_route() {
            self.set_out_of_control(OutOfControlReason::OutOfPath, network);
            return;
        }
        let handle = self.handle(RouteSide::Ahead);
        let clearance = network.request_clear_node(
            handle,
            &self.routes[0],
            self.front.route_index + 1,
            config.node_max_distance,
            true,
        );
        self.node_end = clearance.end;
        self.mode = if self.signal_mode_valid(network) {
            ControlMode::AutoSignal
        } else {
            ControlMode::AutoNode
        };
        info!("train {} starts in {:?}", self.number, self.mode);
        match self.mode {
            ControlMode::AutoSignal => self.update_signal_control(network, config, false),
            _ => self.update_node_control(network, config, false),
        }
    }

    /// Computes the authority of a train in node control, switching to signal
    /// control if `may_switch` and a usable signal lies ahead.
    pub(crate) fn update_node_control(
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
        self.take_passing_path(network);

        let window = config.lookahead_distance(self.allowed_max_speed());
        let (reserved, end) = self.reserved_distance(network, RouteSide::Ahead);
        let budget = config.node_max_distance - reserved;
        if reserved <= window && budget > 0.0 && end + 1 < self.routes[0].len() {
            let clearance = network.request_clear_node(
                self.handle(RouteSide::Ahead),
                &self.routes[0],
                end + 1,
                budget,
                true,
            );
            self.node_end = clearance.end;
        }

        if may_switch && self.signal_mode_valid(network) {
            debug!("train {} has a usable signal ahead", self.number);
            self.mode = ControlMode::AutoSignal;
            self.update_signal_control(network, config, false);
            return;
        }

        let (reserved, end) = self.reserved_distance(network, RouteSide::Ahead);
        let kind = if end + 1 >= self.routes[0].len() {
            self.end_of_route_kind(network)
        } else {
            self.node_end
        };
        self.authority[0] = Authority::new(kind, reserved);
    }

    /// Takes the alternative of a passing path just ahead of the reserved sections
    /// when its main line is blocked and the alternative is free and long enough.
    fn take_passing_path(&mut self, network: &mut TrackNetwork) {
        let handle = self.handle(RouteSide::Ahead);
        let (_, end) = self.reserved_distance(network, RouteSide::Ahead);
        let route = &self.routes[0];
        let found = (self.front.route_index + 1..=end + 2).find_map(|idx| {
            // The junction in front of the passing path must still be movable.
            let entry = route.get(idx.checked_sub(1)?)?;
            if network.section(entry.section).is_occupied() {
                return None;
            }
            network
                .passing_paths()
                .iter()
                .find(|path| {
                    path.matches_at(route, idx)
                        && path.length() >= self.length
                        && path
                            .main()
                            .iter()
                            .any(|el| !network.section(el.section).is_available(handle))
                        && path
                            .alternative()
                            .iter()
                            .all(|el| network.section(el.section).is_available(handle))
                })
                .map(|path| (idx, path.main().len(), path.alternative().as_slice().to_vec()))
        });
        let Some((idx, main_len, alternative)) = found else {
            return;
        };

        for el in self.routes[0].as_slice()[idx..idx + main_len].to_vec() {
            network.section_mut(el.section).unreserve(self.id);
        }
        self.routes[0].splice(idx..idx + main_len, &alternative);
        if network.section(self.routes[0].as_slice()[idx - 1].section).is_reserved_by(self.id) {
            network.reserve_element(handle, &self.routes[0], idx - 1);
        }
        self.lookahead.clear();
        self.route_changed = true;
        info!(
            "train {} takes a passing path of {} sections",
            self.number,
            alternative.len()
        );
    }
}
