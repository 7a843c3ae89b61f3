use crate::config::AuthorityConfig;
use crate::deadlock;
use crate::error::AuthorityError;
use crate::network::{NextObject, SignalKind, TrackNetwork};
use crate::route::{Route, RouteElement, TrainPath};
use crate::train::{
    RouteSide, Train, TrainAttributes, TrainHandle, TrainKind, TrainNumber, COUPLING_DISTANCE,
};
use crate::{SectionId, SignalId, TrainId, TrainSet};
use itertools::Itertools;
use log::{info, warn};
use pathfinding::directed::dijkstra::dijkstra;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::Key;

/// A rail traffic simulation: trains sharing a track network.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Simulation {
    /// The track network.
    network: TrackNetwork,
    /// The trains being simulated.
    trains: TrainSet,
    /// The number given to the next train.
    next_number: u32,
    /// The tunable parameters.
    config: AuthorityConfig,
    /// The current frame of simulation.
    frame: usize,
}

impl Simulation {
    /// Creates a simulation on the given network.
    pub fn new(network: TrackNetwork) -> Self {
        Self::with_config(network, AuthorityConfig::default())
    }

    /// Creates a simulation with non-default parameters.
    pub fn with_config(network: TrackNetwork, config: AuthorityConfig) -> Self {
        Self {
            network,
            config,
            next_number: 1,
            ..Default::default()
        }
    }

    pub fn network(&self) -> &TrackNetwork {
        &self.network
    }

    /// Gets the network for adding topology. Section and signal states are only
    /// changed through the simulation.
    pub fn network_mut(&mut self) -> &mut TrackNetwork {
        &mut self.network
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Places a train on its path with its front `offset` m into element `front_index`
    /// of the active leg. The train's sections must be free.
    pub fn add_train(
        &mut self,
        attributes: &TrainAttributes,
        path: TrainPath,
        front_index: usize,
        offset: f64,
    ) -> Result<TrainId, AuthorityError> {
        let leg = path.active_leg().ok_or(AuthorityError::EmptyRoute)?;
        self.network.validate_route(leg)?;
        let front = leg.get(front_index).ok_or(AuthorityError::EmptyRoute)?;
        let number = self.take_number();
        let placing = TrainHandle::new(TrainId::null(), number, RouteSide::Ahead);
        let occupied = self
            .network
            .placement(placing, front, offset, attributes.length)
            .ok_or(AuthorityError::CannotPlace {
                section: front.section,
                length: attributes.length,
            })?;
        Ok(self.insert_train(number, attributes, path, occupied, offset, front_index))
    }

    fn take_number(&mut self) -> TrainNumber {
        self.next_number = u32::max(self.next_number, 1);
        let number = TrainNumber(self.next_number);
        self.next_number += 1;
        number
    }

    fn insert_train(
        &mut self,
        number: TrainNumber,
        attributes: &TrainAttributes,
        path: TrainPath,
        occupied: Vec<RouteElement>,
        offset: f64,
        front_index: usize,
    ) -> TrainId {
        let network = &self.network;
        let id = self.trains.insert_with_key(|id| {
            Train::new(
                id,
                number,
                attributes,
                path,
                occupied.clone(),
                offset,
                front_index,
                network,
            )
        });
        let handle = self.trains[id].handle(RouteSide::Ahead);
        for el in occupied {
            self.network.section_mut(el.section).set_occupied(handle);
        }
        info!("train {} placed at {:?}", number, self.trains[id].front().element);
        id
    }

    /// Removes a train, releasing everything it holds.
    pub fn remove_train(&mut self, id: TrainId) -> Result<Train, AuthorityError> {
        let handle = self
            .trains
            .get(id)
            .map(|t| t.handle(RouteSide::Ahead))
            .ok_or(AuthorityError::UnknownTrain(id))?;
        deadlock::forget_train(&mut self.trains, id);
        self.network.release_train(handle);
        self.trains
            .remove(id)
            .ok_or(AuthorityError::UnknownTrain(id))
    }

    /// Uncouples the last `rear_length` m of a standing train. The rear portion becomes
    /// a new, static train on the sections it stands on.
    pub fn split_train(
        &mut self,
        id: TrainId,
        rear_length: f64,
    ) -> Result<TrainId, AuthorityError> {
        let config = &self.config;
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        let rejected = AuthorityError::CannotSplit {
            train: train.number(),
            length: rear_length,
        };
        if !train.is_stopped(config) {
            return Err(rejected);
        }
        let attributes = TrainAttributes {
            kind: TrainKind::Static,
            length: rear_length,
            ..train.attributes()
        };
        let portion = train
            .detach_rear(rear_length, &mut self.network)
            .ok_or(rejected)?;
        let number = self.take_number();
        let path = TrainPath::single(Route::new(portion.occupied.clone()));
        let front_index = portion.occupied.len() - 1;
        Ok(self.insert_train(
            number,
            &attributes,
            path,
            portion.occupied,
            portion.front_offset,
            front_index,
        ))
    }

    /// Couples the train `rear`, standing right behind `front`, onto it.
    /// The rear train ceases to exist.
    pub fn join_trains(&mut self, front: TrainId, rear: TrainId) -> Result<(), AuthorityError> {
        let ahead = self.trains.get(front).ok_or(AuthorityError::UnknownTrain(front))?;
        let behind = self.trains.get(rear).ok_or(AuthorityError::UnknownTrain(rear))?;
        let rejected = AuthorityError::NotCoupled {
            front: ahead.number(),
            rear: behind.number(),
        };
        if front == rear || !ahead.is_stopped(&self.config) || !behind.is_stopped(&self.config) {
            return Err(rejected);
        }
        let gap = behind
            .gap_to(ahead, &self.network)
            .filter(|gap| gap.abs() <= COUPLING_DISTANCE)
            .ok_or(rejected)?;
        let absorbed = self.remove_train(rear)?;
        self.trains[front].absorb(&absorbed, gap, &mut self.network);
        Ok(())
    }

    /// Gives a train a new path. Its front must stand on the path's active leg.
    pub fn set_train_path(&mut self, id: TrainId, path: TrainPath) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.set_path(path, &mut self.network)
    }

    /// Sets the speed the driver asks for in m/s; negative runs the train backwards
    /// in manual mode, `None` runs at the allowed speed.
    pub fn set_target_speed(
        &mut self,
        id: TrainId,
        speed: Option<f64>,
    ) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.set_target_speed(speed);
        Ok(())
    }

    /// Switches a train to manual mode, or explorer mode if `explorer`.
    pub fn request_manual(&mut self, id: TrainId, explorer: bool) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.request_manual(explorer, &mut self.network)
    }

    /// Returns a train from manual or explorer mode to its original path.
    pub fn request_auto(&mut self, id: TrainId) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.request_auto(&mut self.network)
    }

    /// Puts a train that went out of control back on its original path.
    pub fn reset_out_of_control(&mut self, id: TrainId) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.reset_out_of_control()
    }

    pub fn enter_turntable(&mut self, id: TrainId) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.enter_turntable(&mut self.network)
    }

    pub fn leave_turntable(&mut self, id: TrainId) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.leave_turntable(&mut self.network)
    }

    /// Takes a standing train out of service. It keeps the sections it stands on
    /// and drops out of deadlock detection until it is activated again.
    pub fn deactivate_train(&mut self, id: TrainId) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.deactivate(&mut self.network)?;
        let boundaries = train
            .deadlock_info()
            .iter()
            .map(|(start, entry)| (start, entry.other))
            .collect::<Vec<_>>();
        deadlock::forget_boundaries(&mut self.trains, &mut self.network, id, &boundaries);
        Ok(())
    }

    /// Brings an inactive train into service.
    pub fn activate_train(&mut self, id: TrainId) -> Result<(), AuthorityError> {
        let train = self.trains.get_mut(id).ok_or(AuthorityError::UnknownTrain(id))?;
        train.activate()
    }

    /// Lets a train pass the next normal signal ahead of it at danger.
    /// Returns the signal, if there is one on the train's route.
    pub fn request_permission(&mut self, id: TrainId) -> Result<Option<SignalId>, AuthorityError> {
        let train = self.trains.get(id).ok_or(AuthorityError::UnknownTrain(id))?;
        let next = self.network.get_next_object(
            train.route(RouteSide::Ahead),
            train.front().route_index,
            train.front().offset,
            Some(SignalKind::Normal),
        );
        let NextObject::Found { signal, .. } = next else {
            return Ok(None);
        };
        self.network.request_permission(signal, train.number());
        Ok(Some(signal))
    }

    /// Keeps a signal at danger, or releases it.
    pub fn set_signal_hold(&mut self, signal: SignalId, held: bool) {
        self.network.set_signal_hold(signal, held);
    }

    /// Moves a switch, unless a train occupies or holds it.
    /// Returns `true` if the switch was moved.
    pub fn set_switch(&mut self, section: SectionId, position: usize) -> bool {
        let Some(s) = self.network.get_section(section) else {
            return false;
        };
        if s.is_occupied() || s.reserved_by().is_some() {
            return false;
        }
        self.network.set_switch(section, position);
        true
    }

    /// Gets a reference to the train with the given ID.
    pub fn get_train(&self, id: TrainId) -> Option<&Train> {
        self.trains.get(id)
    }

    /// Finds a train by its number.
    pub fn train_id(&self, number: TrainNumber) -> Option<TrainId> {
        deadlock::find_train(&self.trains, number)
    }

    /// Returns an iterator over all the trains in the simulation.
    pub fn iter_trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    /// Advances the simulation by `dt` seconds. Trains are updated one after the
    /// other in order of their numbers.
    pub fn step(&mut self, dt: f64) {
        let order = self
            .trains
            .iter()
            .map(|(id, train)| (train.number(), id))
            .sorted_by_key(|(number, _)| *number)
            .map(|(_, id)| id)
            .collect::<Vec<_>>();

        for id in order {
            if self.trains[id].route_changed() {
                deadlock::detect(
                    &mut self.trains,
                    &mut self.network,
                    id,
                    self.config.deadlock_resolution,
                );
            }
            deadlock::update_traps(&mut self.trains, &mut self.network, id);

            let train = &mut self.trains[id];
            train.update(dt, &mut self.network, &self.config);
            if train.needs_new_route() && train.is_stopped(&self.config) {
                self.regenerate_route(id);
            }
            if self.trains[id].is_held_at_signal(&self.config) {
                deadlock::recheck_traps(&self.trains, &mut self.network, id);
            }
        }
        self.frame += 1;
    }

    /// Finds the shortest route from where the train's front stands to the destination
    /// of its path, following any switch position.
    pub fn find_route(&self, id: TrainId) -> Result<Route, AuthorityError> {
        let train = self.trains.get(id).ok_or(AuthorityError::UnknownTrain(id))?;
        let goal = train.path().destination().ok_or(AuthorityError::EmptyRoute)?;
        let network = &self.network;
        let start = (
            train.front().element,
            train.previous_section(RouteSide::Ahead),
        );
        let (nodes, _) = dijkstra(
            &start,
            |(el, prev)| {
                network
                    .successors(*prev, *el)
                    .into_iter()
                    .map(|next| ((next, Some(el.section)), cost(network, next)))
                    .collect::<Vec<_>>()
            },
            |(el, _)| *el == goal,
        )
        .ok_or(AuthorityError::NoRoute(train.number()))?;
        Ok(nodes.into_iter().map(|(el, _)| el).collect())
    }

    /// Puts a train that went out of control on a new route to its destination.
    fn regenerate_route(&mut self, id: TrainId) {
        match self.find_route(id) {
            Ok(route) => self.trains[id].adopt_route(route),
            Err(err) => {
                warn!("{}", err);
                self.trains[id].abandon_route_search();
            }
        }
    }
}

/// The path finding cost of travelling through an element, in dm.
fn cost(network: &TrackNetwork, element: RouteElement) -> usize {
    (network.length(element.section) * 10.0) as usize
}
