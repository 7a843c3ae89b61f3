//! Movement authority and deadlock avoidance for trains sharing a network
//! of track circuit sections.
//!
//! The [Simulation] owns a [TrackNetwork] and a set of [Train]s. Every call to
//! [Simulation::step] updates the trains one after the other: each train moves,
//! then works out how far it may safely proceed (its [Authority]) in its current
//! [ControlMode], reserving sections on the way. Trains whose routes overlap in
//! opposite directions are tracked through [DeadlockInfo] so that neither is given
//! authority into a section that would trap the other.

pub use authority::{Authority, EndAuthority};
pub use config::{AuthorityConfig, DeadlockResolution};
pub use deadlock::{DeadlockEntry, DeadlockInfo};
pub use error::AuthorityError;
pub use network::{
    Aspect, NextObject, PassingPath, Pin, SectionKind, Signal, SignalKind, TrackNetwork,
    TrackSection,
};
pub use route::{Direction, Route, RouteElement, TrainPath};
pub use simulation::Simulation;
pub use slotmap::{Key, KeyData};
pub use train::{
    Capabilities, ControlMode, OutOfControlReason, RouteSide, Train, TrainAttributes, TrainHandle,
    TrainKind, TrainNumber, TrainPosition,
};

use slotmap::{new_key_type, SlotMap};

mod authority;
mod config;
mod deadlock;
mod error;
mod network;
mod route;
mod simulation;
mod train;
mod util;

new_key_type! {
    /// Unique ID of a [TrackSection].
    pub struct SectionId;
    /// Unique ID of a [Signal] or speed post.
    pub struct SignalId;
    /// Unique ID of a [Train].
    pub struct TrainId;
}

type SectionSet = SlotMap<SectionId, TrackSection>;
type SignalSet = SlotMap<SignalId, Signal>;
type TrainSet = SlotMap<TrainId, Train>;
