use super::Train;
use crate::authority::Authority;
use crate::error::AuthorityError;
use crate::network::TrackNetwork;
use crate::route::{Route, TrainPath};
use crate::util::u8_enum;
use log::{info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The way a train's authority is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum ControlMode {
    /// Authority is granted block by block by signals.
    AutoSignal = 0,
    /// Authority is granted section by section where there are no usable signals.
    AutoNode = 1,
    /// Driven by a player along whatever the switches are set to.
    Manual = 2,
    /// Like manual, but signals are passed on permission obtained automatically.
    Explorer = 3,
    /// Braking to a stand after something went wrong.
    OutOfControl = 4,
    /// Standing on a turntable.
    Turntable = 5,
    /// Not taking part in the simulation.
    Inactive = 6,
    /// Waiting for its first authority.
    Undefined = 7,
}

u8_enum!(ControlMode {
    AutoSignal,
    AutoNode,
    Manual,
    Explorer,
    OutOfControl,
    Turntable,
    Inactive,
    Undefined,
});

impl ControlMode {
    /// Whether the train follows its path automatically.
    pub fn is_auto(self) -> bool {
        matches!(self, ControlMode::AutoSignal | ControlMode::AutoNode)
    }

    /// Whether the train is driven along the track without a path.
    pub fn is_manual(self) -> bool {
        matches!(self, ControlMode::Manual | ControlMode::Explorer)
    }
}

/// Why a train went out of control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum OutOfControlReason {
    /// Passed a signal at danger.
    Spad = 0,
    /// Passed a signal at danger while moving backwards.
    SpadRear = 1,
    /// Ran through a switch set against it.
    MisalignedSwitch = 2,
    /// Entered a section it did not hold.
    OutOfAuthority = 3,
    /// Ran past the end of its route.
    OutOfPath = 4,
    /// Slid into a section held by another train.
    SlippedIntoPath = 5,
    /// Slid into the end of the track.
    SlippedToEndOfTrack = 6,
    /// Reached the end of the track.
    OutOfTrack = 7,
}

u8_enum!(OutOfControlReason {
    Spad,
    SpadRear,
    MisalignedSwitch,
    OutOfAuthority,
    OutOfPath,
    SlippedIntoPath,
    SlippedToEndOfTrack,
    OutOfTrack,
});

/// What drives a train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum TrainKind {
    Player = 0,
    Ai = 1,
    /// Parked stock that never moves by itself.
    Static = 2,
    /// A train positioned from elsewhere, for example another simulator.
    Remote = 3,
}

u8_enum!(TrainKind {
    Player,
    Ai,
    Static,
    Remote
});

/// What the core does for a kind of train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// The train is moved by the simulation.
    pub moves: bool,
    /// A new route is searched for after the train went out of control.
    pub regenerates_route: bool,
    /// The train may be switched to manual or explorer mode.
    pub manual_control: bool,
    /// The train takes part in deadlock detection.
    pub deadlock_checks: bool,
}

const CAPABILITIES: [Capabilities; 4] = [
    // Player
    Capabilities {
        moves: true,
        regenerates_route: false,
        manual_control: true,
        deadlock_checks: true,
    },
    // Ai
    Capabilities {
        moves: true,
        regenerates_route: true,
        manual_control: false,
        deadlock_checks: true,
    },
    // Static
    Capabilities {
        moves: false,
        regenerates_route: false,
        manual_control: false,
        deadlock_checks: false,
    },
    // Remote
    Capabilities {
        moves: false,
        regenerates_route: false,
        manual_control: false,
        deadlock_checks: false,
    },
];

impl TrainKind {
    pub fn capabilities(self) -> Capabilities {
        CAPABILITIES[self as usize]
    }
}

impl Train {
    /// Whether the train takes part in deadlock detection.
    pub(crate) fn checks_deadlocks(&self) -> bool {
        self.kind.capabilities().deadlock_checks && self.mode != ControlMode::Inactive
    }

    /// Whether the train runs in the simulation, as opposed to parked or inactive stock.
    pub(crate) fn is_active(&self) -> bool {
        self.kind.capabilities().moves && self.mode != ControlMode::Inactive
    }

    /// Puts the train out of control: it brakes as hard as it can and gives up
    /// everything it holds ahead of it.
    pub(crate) fn set_out_of_control(
        &mut self,
        reason: OutOfControlReason,
        network: &mut TrackNetwork,
    ) {
        if self.mode == ControlMode::OutOfControl {
            if matches!(
                reason,
                OutOfControlReason::SlippedIntoPath | OutOfControlReason::SlippedToEndOfTrack
            ) {
                self.out_of_control = Some(reason);
            }
            return;
        }
        warn!("train {} out of control: {:?}", self.number, reason);
        self.release_forward(network);
        self.mode = ControlMode::OutOfControl;
        self.out_of_control = Some(reason);
        self.authority = [Authority::NONE; 2];
        self.switch_marker = [None; 2];
        self.lookahead.clear();
        if self.kind.capabilities().regenerates_route {
            self.regenerate = true;
        }
    }

    /// Releases the reservations ahead of the train, and behind it in manual mode.
    pub(crate) fn release_forward(&mut self, network: &mut TrackNetwork) {
        network.release_route(self.id, &self.routes[0], self.front.route_index + 1);
        network.release_route(self.id, &self.routes[1], self.rear.route_index + 1);
    }

    /// Finds the train's front on the active leg of its path.
    fn original_path_index(&self) -> Result<usize, AuthorityError> {
        let index = self
            .path
            .active_leg()
            .and_then(|leg| leg.find_element_from(self.front.element, 0));
        index.ok_or_else(|| {
            warn!(
                "train {} is not on its original path at {:?}",
                self.number, self.front.element
            );
            AuthorityError::OffOriginalPath(self.number)
        })
    }

    /// Follows the active leg of the path again from route index `index`.
    fn resume_path(&mut self, index: usize) {
        let route = self.path.active_leg().cloned().unwrap_or_default();
        self.routes = [route, Route::default()];
        self.front.route_index = index;
        self.rear.route_index = 0;
        self.moving_backward = false;
        self.switch_marker = [None; 2];
        self.lookahead.clear();
        self.route_changed = true;
    }

    /// Switches to manual or explorer mode.
    pub(crate) fn request_manual(
        &mut self,
        explorer: bool,
        network: &mut TrackNetwork,
    ) -> Result<(), AuthorityError> {
        let to = if explorer {
            ControlMode::Explorer
        } else {
            ControlMode::Manual
        };
        if !self.kind.capabilities().manual_control
            || matches!(
                self.mode,
                ControlMode::OutOfControl | ControlMode::Inactive | ControlMode::Turntable
            )
        {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to,
            });
        }
        if self.mode == to {
            return Ok(());
        }
        self.release_forward(network);
        self.routes = [
            Route::new(vec![self.front.element]),
            Route::new(vec![self.rear.element.reversed()]),
        ];
        self.front.route_index = 0;
        self.rear.route_index = 0;
        self.authority = [Authority::NONE; 2];
        self.lookahead.clear();
        self.route_changed = true;
        info!("train {} changes from {:?} to {:?}", self.number, self.mode, to);
        self.mode = to;
        Ok(())
    }

    /// Returns from manual or explorer mode to automatic control along the original path.
    /// Nothing changes if the train has left that path.
    pub(crate) fn request_auto(
        &mut self,
        network: &mut TrackNetwork,
    ) -> Result<(), AuthorityError> {
        if !self.mode.is_manual() || (self.moving_backward && self.speed > 0.0) {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Undefined,
            });
        }
        let index = self.original_path_index()?;
        self.release_forward(network);
        self.resume_path(index);
        self.target_speed = None;
        info!("train {} returns to automatic control", self.number);
        self.mode = ControlMode::Undefined;
        Ok(())
    }

    /// Puts a train that was out of control back into service on its original path.
    pub(crate) fn reset_out_of_control(&mut self) -> Result<(), AuthorityError> {
        if self.mode != ControlMode::OutOfControl {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Undefined,
            });
        }
        let index = self.original_path_index()?;
        self.resume_path(index);
        self.out_of_control = None;
        self.regenerate = false;
        self.mode = ControlMode::Undefined;
        Ok(())
    }

    /// Gives the train a new path. Its front must stand on the path's active leg.
    pub(crate) fn set_path(
        &mut self,
        path: TrainPath,
        network: &mut TrackNetwork,
    ) -> Result<(), AuthorityError> {
        if matches!(self.mode, ControlMode::OutOfControl | ControlMode::Turntable)
            || self.mode.is_manual()
        {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Undefined,
            });
        }
        let leg = path.active_leg().ok_or(AuthorityError::EmptyRoute)?;
        network.validate_route(leg)?;
        let index = leg
            .find_element_from(self.front.element, 0)
            .ok_or(AuthorityError::OffOriginalPath(self.number))?;
        self.release_forward(network);
        self.path = path;
        self.resume_path(index);
        if self.mode != ControlMode::Inactive {
            self.mode = ControlMode::Undefined;
        }
        Ok(())
    }

    /// Follows a route found after the train went out of control.
    pub(crate) fn adopt_route(&mut self, route: Route) {
        self.path = TrainPath::single(route);
        self.resume_path(0);
        self.out_of_control = None;
        self.regenerate = false;
        self.mode = ControlMode::Undefined;
        info!("train {} continues on a new route", self.number);
    }

    /// Stops looking for a new route.
    pub(crate) fn abandon_route_search(&mut self) {
        self.regenerate = false;
    }

    /// Parks the train on a turntable.
    pub(crate) fn enter_turntable(
        &mut self,
        network: &mut TrackNetwork,
    ) -> Result<(), AuthorityError> {
        if matches!(
            self.mode,
            ControlMode::OutOfControl | ControlMode::Inactive | ControlMode::Turntable
        ) || self.speed > 0.0
        {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Turntable,
            });
        }
        self.release_forward(network);
        self.authority = [Authority::NONE; 2];
        self.lookahead.clear();
        self.mode = ControlMode::Turntable;
        Ok(())
    }

    /// Leaves the turntable, resuming the path if the train still stands on it.
    pub(crate) fn leave_turntable(
        &mut self,
        network: &mut TrackNetwork,
    ) -> Result<(), AuthorityError> {
        if self.mode != ControlMode::Turntable {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Undefined,
            });
        }
        match self.original_path_index() {
            Ok(index) => {
                self.resume_path(index);
                self.mode = ControlMode::Undefined;
            }
            Err(_) if self.kind.capabilities().manual_control => {
                self.mode = ControlMode::Undefined;
                self.request_manual(false, network)?;
            }
            Err(_) => {
                self.mode = ControlMode::Undefined;
                self.set_out_of_control(OutOfControlReason::OutOfPath, network);
            }
        }
        Ok(())
    }

    /// Takes a standing train out of service, giving up everything it holds ahead.
    pub(crate) fn deactivate(&mut self, network: &mut TrackNetwork) -> Result<(), AuthorityError> {
        if matches!(
            self.mode,
            ControlMode::OutOfControl | ControlMode::Inactive | ControlMode::Turntable
        ) || self.speed > 0.0
        {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Inactive,
            });
        }
        self.release_forward(network);
        self.authority = [Authority::NONE; 2];
        self.lookahead.clear();
        info!("train {} taken out of service", self.number);
        self.mode = ControlMode::Inactive;
        Ok(())
    }

    /// Brings an inactive train into service.
    pub(crate) fn activate(&mut self) -> Result<(), AuthorityError> {
        if self.mode != ControlMode::Inactive || !self.kind.capabilities().moves {
            return Err(AuthorityError::ModeChangeRejected {
                from: self.mode,
                to: ControlMode::Undefined,
            });
        }
        let index = self.original_path_index()?;
        self.resume_path(index);
        self.mode = ControlMode::Undefined;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{ControlMode, TrainKind};

    #[test]
    fn capabilities_by_kind() {
        assert!(TrainKind::Player.capabilities().manual_control);
        assert!(TrainKind::Ai.capabilities().regenerates_route);
        assert!(!TrainKind::Static.capabilities().moves);
        assert!(!TrainKind::Remote.capabilities().deadlock_checks);
    }

    #[test]
    fn mode_groups() {
        assert!(ControlMode::AutoNode.is_auto());
        assert!(ControlMode::Explorer.is_manual());
        assert!(!ControlMode::OutOfControl.is_auto());
        assert_eq!(ControlMode::try_from(7), Ok(ControlMode::Undefined));
    }
}
