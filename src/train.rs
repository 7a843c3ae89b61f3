//! Trains, their motion along the track, and the control modes that govern their authority.

pub(crate) use coupling::COUPLING_DISTANCE;
pub use mode::{Capabilities, ControlMode, OutOfControlReason, TrainKind};

use self::lookahead::Lookahead;
use self::manual::SwitchMarker;
use self::speed::SpeedController;
use crate::authority::{Authority, EndAuthority};
use crate::config::AuthorityConfig;
use crate::deadlock::DeadlockInfo;
use crate::network::TrackNetwork;
use crate::route::{Route, RouteElement, TrainPath};
use crate::util::{u8_enum, DISTANCE_EPSILON};
use crate::{SectionId, TrainId};
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

mod coupling;
mod lookahead;
mod manual;
mod mode;
mod node_control;
mod signal_control;
mod speed;

/// How far short of the end of a leg a standing train may be and still reverse onto the next one.
const REVERSAL_TOLERANCE: f64 = 5.0; // m

/// The public, stable number of a train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct TrainNumber(pub u32);

impl fmt::Display for TrainNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of a train's two routes a reservation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum RouteSide {
    /// Ahead of the train's front.
    Ahead = 0,
    /// Behind the train's rear, only used in manual and explorer mode.
    Behind = 1,
}

u8_enum!(RouteSide { Ahead, Behind });

impl RouteSide {
    pub const BOTH: [RouteSide; 2] = [RouteSide::Ahead, RouteSide::Behind];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// How sections and signals refer to a train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainHandle {
    pub train: TrainId,
    pub number: TrainNumber,
    pub side: RouteSide,
}

impl TrainHandle {
    pub fn new(train: TrainId, number: TrainNumber, side: RouteSide) -> Self {
        Self {
            train,
            number,
            side,
        }
    }
}

/// The attributes of a simulated train.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainAttributes {
    /// What drives the train.
    pub kind: TrainKind,
    /// The train length in m.
    pub length: f64,
    /// The maximum speed in m/s.
    pub max_speed: f64,
    /// The maximum acceleration in m/s^2.
    pub max_acc: f64,
    /// The service braking deceleration, a positive number in m/s^2.
    pub brake_dec: f64,
}

/// Where one end of a train is.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainPosition {
    /// The section, traversed in the direction the train faces.
    pub element: RouteElement,
    /// Distance from the entry end of the section, in the train's direction, in m.
    pub offset: f64,
    /// Index of the section in the route on this end's side.
    pub route_index: usize,
}

/// A simulated train.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Train {
    /// The train's ID.
    pub(crate) id: TrainId,
    /// The train's public number.
    number: TrainNumber,
    /// What drives the train.
    kind: TrainKind,
    /// The train length in m.
    length: f64,
    /// The maximum speed in m/s.
    max_speed: f64,
    /// The speed in m/s, never negative.
    speed: f64,
    /// Whether the train is moving rear first.
    moving_backward: bool,
    /// The speed requested by the driver in m/s; negative means backwards.
    target_speed: Option<f64>,
    /// The speed controller.
    controller: SpeedController,
    /// The front of the train.
    front: TrainPosition,
    /// The rear of the train. Its element faces the same way as the train.
    rear: TrainPosition,
    /// The sections under the train, rear first.
    occupied: VecDeque<RouteElement>,
    /// The path the train was given.
    path: TrainPath,
    /// The routes ahead and behind. The route behind is only used in manual and explorer mode.
    routes: [Route; 2],
    /// The control mode.
    mode: ControlMode,
    /// Why the train is out of control.
    out_of_control: Option<OutOfControlReason>,
    /// The authority on either side.
    authority: [Authority; 2],
    /// Why the last node clearance stopped.
    node_end: EndAuthority,
    /// The objects ahead and pending speed limits.
    lookahead: Lookahead,
    /// The deadlock boundaries along the route.
    deadlock: DeadlockInfo,
    /// Facing switches set against the train in manual mode.
    switch_marker: [Option<SwitchMarker>; 2],
    /// The odometer reading in m.
    distance_travelled: f64,
    /// Whether the route changed since deadlocks were last checked.
    route_changed: bool,
    /// Whether a new route must be found once the train stands.
    regenerate: bool,
}

impl Train {
    /// Creates a train standing on `occupied` (rear first) with its front `offset` m into
    /// the last element, which is element `front_index` of the path's active leg.
    pub(crate) fn new(
        id: TrainId,
        number: TrainNumber,
        attributes: &TrainAttributes,
        path: TrainPath,
        occupied: Vec<RouteElement>,
        offset: f64,
        front_index: usize,
        network: &TrackNetwork,
    ) -> Self {
        let front_el = occupied[occupied.len() - 1];
        let rear_el = occupied[0];
        let behind_front: f64 = occupied[..occupied.len() - 1]
            .iter()
            .map(|el| network.length(el.section))
            .sum();
        let rear_offset = f64::max(offset + behind_front - attributes.length, 0.0);
        let route = path.active_leg().cloned().unwrap_or_default();
        let mode = if attributes.kind.capabilities().moves {
            ControlMode::Undefined
        } else {
            ControlMode::Inactive
        };
        Self {
            id,
            number,
            kind: attributes.kind,
            length: attributes.length,
            max_speed: attributes.max_speed,
            speed: 0.0,
            moving_backward: false,
            target_speed: None,
            controller: SpeedController::new(attributes.max_acc, attributes.brake_dec),
            front: TrainPosition {
                element: front_el,
                offset,
                route_index: front_index,
            },
            rear: TrainPosition {
                element: rear_el,
                offset: rear_offset,
                route_index: 0,
            },
            occupied: occupied.into(),
            path,
            routes: [route, Route::default()],
            mode,
            out_of_control: None,
            authority: [Authority::NONE; 2],
            node_end: EndAuthority::NoPathReserved,
            lookahead: Lookahead::default(),
            deadlock: DeadlockInfo::default(),
            switch_marker: [None; 2],
            distance_travelled: 0.0,
            route_changed: true,
            regenerate: false,
        }
    }

    /// Gets the train's ID.
    pub fn id(&self) -> TrainId {
        self.id
    }

    pub fn number(&self) -> TrainNumber {
        self.number
    }

    pub fn kind(&self) -> TrainKind {
        self.kind
    }

    /// The train's length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The attributes the train would be created with.
    pub fn attributes(&self) -> TrainAttributes {
        TrainAttributes {
            kind: self.kind,
            length: self.length,
            max_speed: self.max_speed,
            max_acc: self.controller.max_acc(),
            brake_dec: self.controller.brake_dec(),
        }
    }

    /// The train's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Whether the train is moving, or would move, rear first.
    pub fn is_moving_backward(&self) -> bool {
        self.moving_backward
    }

    /// The acceleration chosen in the last step, in m/s^2.
    pub fn acc(&self) -> f64 {
        self.controller.acc()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn out_of_control_reason(&self) -> Option<OutOfControlReason> {
        self.out_of_control
    }

    /// Whether the train is braking as hard as it can.
    pub fn is_emergency_braking(&self) -> bool {
        self.mode == ControlMode::OutOfControl && self.speed > 0.0
    }

    pub fn front(&self) -> &TrainPosition {
        &self.front
    }

    pub fn rear(&self) -> &TrainPosition {
        &self.rear
    }

    /// The sections under the train, rear first.
    pub fn occupied(&self) -> impl Iterator<Item = RouteElement> + '_ {
        self.occupied.iter().copied()
    }

    pub fn path(&self) -> &TrainPath {
        &self.path
    }

    /// The route on the given side, starting at or behind the train.
    pub fn route(&self, side: RouteSide) -> &Route {
        &self.routes[side.index()]
    }

    /// The route beyond the section the front stands on.
    pub(crate) fn route_ahead(&self) -> Route {
        self.routes[0].tail(self.front.route_index + 1)
    }

    /// The authority on the given side.
    pub fn authority(&self, side: RouteSide) -> Authority {
        self.authority[side.index()]
    }

    /// The deadlock boundaries along the train's route.
    pub fn deadlock_info(&self) -> &DeadlockInfo {
        &self.deadlock
    }

    /// The odometer reading in m.
    pub fn distance_travelled(&self) -> f64 {
        self.distance_travelled
    }

    /// The speed the train may currently run at, in m/s.
    pub fn allowed_max_speed(&self) -> f64 {
        match self.lookahead.line_speed() {
            Some(limit) => f64::min(self.max_speed, limit),
            None => self.max_speed,
        }
    }

    /// The distance to the next normal signal known ahead, in m.
    pub fn distance_to_signal(&self, network: &TrackNetwork) -> Option<f64> {
        self.lookahead
            .items()
            .find(|item| network.signal(item.signal).is_normal())
            .map(|item| item.at - self.distance_travelled)
    }

    /// The facing switch found set against the train in manual mode.
    pub fn misaligned_switch(&self, side: RouteSide) -> Option<SectionId> {
        self.switch_marker[side.index()].map(|m| m.section)
    }

    /// Creates a handle for reservations on the given side.
    pub fn handle(&self, side: RouteSide) -> TrainHandle {
        TrainHandle::new(self.id, self.number, side)
    }

    /// Whether the train is standing still.
    pub(crate) fn is_stopped(&self, config: &AuthorityConfig) -> bool {
        self.speed < config.standstill_speed
    }

    pub(crate) fn route_changed(&self) -> bool {
        self.route_changed
    }

    pub(crate) fn deadlock_mut(&mut self) -> &mut DeadlockInfo {
        &mut self.deadlock
    }

    pub(crate) fn mark_route_checked(&mut self) {
        self.route_changed = false;
    }

    pub(crate) fn needs_new_route(&self) -> bool {
        self.regenerate
    }

    /// Sets the speed the driver asks for; negative runs the train backwards in manual mode.
    pub(crate) fn set_target_speed(&mut self, speed: Option<f64>) {
        self.target_speed = speed;
    }

    /// Whether the train is halted in front of a signal or at the end of its authority.
    pub(crate) fn is_held_at_signal(&self, config: &AuthorityConfig) -> bool {
        self.is_stopped(config)
            && matches!(
                self.authority[0].kind,
                EndAuthority::Signal | EndAuthority::EndOfAuthority
            )
    }

    /// Whether the front stands on the route at the index it believes it is at.
    pub(crate) fn front_on_route(&self) -> bool {
        self.routes[0].get(self.front.route_index) == Some(self.front.element)
    }

    /// Advances the train by one time step and recomputes its authority.
    pub(crate) fn update(&mut self, dt: f64, network: &mut TrackNetwork, config: &AuthorityConfig) {
        if !self.kind.capabilities().moves {
            return;
        }
        match self.mode {
            ControlMode::Inactive | ControlMode::Turntable => {
                self.speed = 0.0;
                return;
            }
            ControlMode::Undefined => self.initialise_control(network, config),
            _ => {}
        }

        self.apply_speed_control(config);
        let distance = self.integrate(dt);
        if distance > DISTANCE_EPSILON {
            if self.moving_backward {
                self.move_backward(distance, network);
            } else {
                self.move_forward(distance, network);
                self.trim_route();
            }
        }
        self.lookahead.pop_passed(self.distance_travelled);
        self.lookahead.apply_due(self.distance_travelled);

        match self.mode {
            ControlMode::AutoSignal => self.update_signal_control(network, config, true),
            ControlMode::AutoNode => self.update_node_control(network, config, true),
            ControlMode::Manual | ControlMode::Explorer => {
                self.update_manual_control(network, config)
            }
            ControlMode::OutOfControl => self.authority = [Authority::NONE; 2],
            _ => {}
        }
        self.check_reversal(network, config);
    }

    /// Chooses the acceleration for this step.
    fn apply_speed_control(&mut self, config: &AuthorityConfig) {
        self.controller.reset();
        match self.mode {
            ControlMode::OutOfControl => self
                .controller
                .emergency_stop(config.emergency_deceleration),
            ControlMode::Manual | ControlMode::Explorer => {
                let target = self.target_speed.unwrap_or(0.0);
                let backward = target < 0.0;
                if backward != self.moving_backward {
                    if !self.is_stopped(config) {
                        self.controller.apply_speed_limit(self.speed, 0.0);
                        return;
                    }
                    self.moving_backward = backward;
                    self.speed = 0.0;
                }
                let side = if self.moving_backward {
                    RouteSide::Behind
                } else {
                    RouteSide::Ahead
                };
                let limit = f64::min(target.abs(), self.allowed_max_speed());
                self.controller.apply_speed_limit(self.speed, limit);
                self.controller
                    .stop_within(self.speed, self.authority[side.index()].distance);
            }
            _ => {
                let limit = match self.target_speed {
                    Some(target) => f64::min(f64::max(target, 0.0), self.allowed_max_speed()),
                    None => self.allowed_max_speed(),
                };
                self.controller.apply_speed_limit(self.speed, limit);
                for action in self.lookahead.deferred() {
                    if action.speed_limit < self.speed {
                        self.controller.apply_upcoming_speed_limit(
                            self.speed,
                            action.speed_limit,
                            action.trigger - self.distance_travelled,
                        );
                    }
                }
                self.controller
                    .stop_within(self.speed, self.authority[0].distance);
            }
        }
    }

    /// Integrates the speed, returning the distance covered.
    fn integrate(&mut self, dt: f64) -> f64 {
        let speed = f64::max(self.speed + dt * self.controller.acc(), 0.0);
        let distance = 0.5 * (self.speed + speed) * dt;
        self.speed = speed;
        distance
    }

    /// The section the train came from at the given end.
    pub(crate) fn previous_section(&self, side: RouteSide) -> Option<SectionId> {
        let n = self.occupied.len();
        match side {
            RouteSide::Ahead if n >= 2 => self.occupied.get(n - 2).map(|el| el.section),
            RouteSide::Ahead => self
                .front
                .route_index
                .checked_sub(1)
                .and_then(|idx| self.routes[0].get(idx))
                .map(|el| el.section),
            RouteSide::Behind => self.occupied.get(1).map(|el| el.section),
        }
    }

    /// Finds the element the given end of the train runs onto next, detecting
    /// the train leaving its route or the track.
    fn next_element_on(
        &mut self,
        side: RouteSide,
        network: &mut TrackNetwork,
    ) -> Option<RouteElement> {
        let (current, index) = match side {
            RouteSide::Ahead => (self.front.element, self.front.route_index),
            RouteSide::Behind => (self.rear.element.reversed(), self.rear.route_index),
        };
        let actual = network.next_element(self.previous_section(side), current);
        if self.mode == ControlMode::OutOfControl {
            if actual.is_none() {
                self.set_out_of_control(OutOfControlReason::SlippedToEndOfTrack, network);
            }
            return actual;
        }
        let planned = self.routes[side.index()].get(index + 1);
        match (planned, actual) {
            (_, None) => {
                self.set_out_of_control(OutOfControlReason::OutOfTrack, network);
                None
            }
            (Some(planned), Some(actual)) if planned == actual => Some(actual),
            (Some(_), Some(actual)) => {
                self.set_out_of_control(OutOfControlReason::MisalignedSwitch, network);
                Some(actual)
            }
            (None, Some(actual)) => {
                self.set_out_of_control(OutOfControlReason::OutOfPath, network);
                Some(actual)
            }
        }
    }

    /// Checks a train end passing the exit of `element` into `next`.
    fn pass_boundary(
        &mut self,
        element: RouteElement,
        next: RouteElement,
        side: RouteSide,
        network: &mut TrackNetwork,
    ) {
        let was_out_of_control = self.mode == ControlMode::OutOfControl;
        if let Some(signal) = network.exit_signal(element) {
            let sig = network.signal(signal);
            let ours = sig.enabled_train().map(|h| h.train) == Some(self.id);
            let permitted = sig.has_permission(self.number);
            if sig.aspect().is_stop() && !permitted {
                let reason = match side {
                    RouteSide::Ahead => OutOfControlReason::Spad,
                    RouteSide::Behind => OutOfControlReason::SpadRear,
                };
                self.set_out_of_control(reason, network);
            } else if ours || permitted {
                network.signal_passed(signal);
            }
        }

        if !network.is_aligned(Some(element.section), next, None) {
            self.set_out_of_control(OutOfControlReason::MisalignedSwitch, network);
        }

        let section = network.section(next.section);
        if section.is_reserved_by(self.id) {
            return;
        }
        let foreign = section.reserved_by().is_some() || section.is_occupied_by_other(self.id);
        if was_out_of_control {
            if foreign {
                self.set_out_of_control(OutOfControlReason::SlippedIntoPath, network);
            }
        } else {
            self.set_out_of_control(OutOfControlReason::OutOfAuthority, network);
        }
    }

    /// Marks a section as entered by the train.
    fn occupy(&mut self, element: RouteElement, network: &mut TrackNetwork) {
        network
            .section_mut(element.section)
            .set_occupied(self.handle(RouteSide::Ahead));
    }

    /// Marks the section as left by the train, unless another part of the train is still on it.
    fn vacate(&mut self, element: RouteElement, network: &mut TrackNetwork) {
        if !self.occupied.iter().any(|el| el.section == element.section) {
            network.section_mut(element.section).clear_occupied(self.id);
        }
    }

    /// Moves the train `distance` m front first.
    fn move_forward(&mut self, distance: f64, network: &mut TrackNetwork) {
        let mut moved = distance;
        self.front.offset += distance;
        loop {
            let length = network.length(self.front.element.section);
            let overshoot = self.front.offset - length;
            if overshoot <= DISTANCE_EPSILON {
                break;
            }
            let current = self.front.element;
            let Some(next) = self.next_element_on(RouteSide::Ahead, network) else {
                self.front.offset = length;
                moved -= overshoot;
                self.speed = 0.0;
                break;
            };
            self.pass_boundary(current, next, RouteSide::Ahead, network);
            self.front.element = next;
            self.front.offset = overshoot;
            self.front.route_index += 1;
            self.occupied.push_back(next);
            self.occupy(next, network);
        }

        self.distance_travelled += moved;
        self.rear.offset += moved;
        loop {
            let length = network.length(self.rear.element.section);
            if self.rear.offset - length <= DISTANCE_EPSILON || self.occupied.len() <= 1 {
                break;
            }
            self.rear.offset -= length;
            if let Some(left) = self.occupied.pop_front() {
                self.vacate(left, network);
            }
            if let Some(rear) = self.occupied.front() {
                self.rear.element = *rear;
            }
        }
    }

    /// Moves the train `distance` m rear first.
    fn move_backward(&mut self, distance: f64, network: &mut TrackNetwork) {
        let mut moved = distance;
        self.rear.offset -= distance;
        loop {
            if self.rear.offset >= -DISTANCE_EPSILON {
                break;
            }
            let overshoot = -self.rear.offset;
            let current = self.rear.element.reversed();
            let Some(next) = self.next_element_on(RouteSide::Behind, network) else {
                self.rear.offset = 0.0;
                moved -= overshoot;
                self.speed = 0.0;
                break;
            };
            self.pass_boundary(current, next, RouteSide::Behind, network);
            self.rear.element = next.reversed();
            self.rear.offset = network.length(next.section) - overshoot;
            self.rear.route_index += 1;
            self.occupied.push_front(self.rear.element);
            self.occupy(next, network);
        }

        self.distance_travelled -= moved;
        self.front.offset -= moved;
        loop {
            if self.front.offset >= -DISTANCE_EPSILON || self.occupied.len() <= 1 {
                break;
            }
            if let Some(left) = self.occupied.pop_back() {
                self.vacate(left, network);
            }
            if let Some(front) = self.occupied.back() {
                self.front.element = *front;
                self.front.offset += network.length(front.section);
            }
        }
    }

    /// Drops the route elements the whole train has left behind.
    fn trim_route(&mut self) {
        let Some(rear) = self.occupied.front().copied() else {
            return;
        };
        let end = usize::min(self.front.route_index + 1, self.routes[0].len());
        let Some(count) = self.routes[0].as_slice()[..end]
            .iter()
            .position(|el| *el == rear)
        else {
            return;
        };
        if count > 0 {
            self.routes[0].trim_front(count);
            self.front.route_index -= count;
            self.lookahead.shift_indices(count);
        }
    }

    /// How far the train holds the sections ahead on the given side, and the
    /// route index of the last held section.
    pub(crate) fn reserved_distance(
        &self,
        network: &TrackNetwork,
        side: RouteSide,
    ) -> (f64, usize) {
        let (position, remaining) = match side {
            RouteSide::Ahead => (
                self.front,
                network.length(self.front.element.section) - self.front.offset,
            ),
            RouteSide::Behind => (self.rear, self.rear.offset),
        };
        let route = &self.routes[side.index()];
        let loop_point = route.loop_point();
        let mut distance = remaining;
        let mut end = position.route_index;
        for (idx, el) in route.iter().enumerate().skip(position.route_index + 1) {
            if loop_point == Some(idx) || !network.section(el.section).is_held_by(self.id) {
                break;
            }
            distance += network.length(el.section);
            end = idx;
        }
        (f64::max(distance, 0.0), end)
    }

    /// Why the route ahead ends.
    pub(crate) fn end_of_route_kind(&self, network: &TrackNetwork) -> EndAuthority {
        match self.routes[0].last() {
            Some(el) if network.next_element(None, el).is_none() => EndAuthority::EndOfTrack,
            Some(_) => EndAuthority::EndOfPath,
            None => EndAuthority::NoPathReserved,
        }
    }

    /// Turns the train onto the next leg of its path once it stands at the end of the current one.
    fn check_reversal(&mut self, network: &mut TrackNetwork, config: &AuthorityConfig) {
        if !self.mode.is_auto()
            || !self.is_stopped(config)
            || !self.path.has_next_leg()
            || self.front.route_index + 1 < self.routes[0].len()
            || !matches!(
                self.authority[0].kind,
                EndAuthority::EndOfPath | EndAuthority::EndOfTrack
            )
            || self.authority[0].distance > speed::STOP_MARGIN + REVERSAL_TOLERANCE
        {
            return;
        }

        network.release_route(self.id, &self.routes[0], self.front.route_index + 1);
        let Some(mut leg) = self.path.next_leg().cloned() else {
            return;
        };
        network.truncate_to_network(&mut leg);
        let front = TrainPosition {
            element: self.rear.element.reversed(),
            offset: network.length(self.rear.element.section) - self.rear.offset,
            route_index: 0,
        };
        let rear = TrainPosition {
            element: self.front.element.reversed(),
            offset: network.length(self.front.element.section) - self.front.offset,
            route_index: 0,
        };
        self.front = front;
        self.rear = rear;
        self.occupied = self.occupied.iter().rev().map(|el| el.reversed()).collect();
        self.routes = [leg, Route::default()];
        self.lookahead.clear();
        self.route_changed = true;
        debug!(
            "train {} reverses onto leg {}",
            self.number,
            self.path.active_index()
        );
        match self.routes[0].find_element_from(self.front.element, 0) {
            Some(idx) => {
                self.front.route_index = idx;
                self.mode = ControlMode::Undefined;
            }
            None => self.set_out_of_control(OutOfControlReason::OutOfPath, network),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{RouteSide, TrainNumber};

    #[test]
    fn numbers_order_and_display() {
        assert!(TrainNumber(3) < TrainNumber(10));
        assert_eq!(TrainNumber(42).to_string(), "42");
        assert_eq!(RouteSide::Behind.index(), 1);
        assert_eq!(RouteSide::try_from(0), Ok(RouteSide::Ahead));
    }
}
