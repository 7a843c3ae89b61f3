use crate::train::{ControlMode, TrainNumber};
use crate::{SectionId, TrainId};
use thiserror::Error;

/// An operation that was rejected without changing any state.
///
/// Problems that arise while trains are running are never reported this way;
/// they show up as a control mode or an [EndAuthority](crate::EndAuthority) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthorityError {
    #[error("unknown train {0:?}")]
    UnknownTrain(TrainId),

    #[error("unknown section {0:?}")]
    UnknownSection(SectionId),

    #[error("route is empty")]
    EmptyRoute,

    #[error("route is not contiguous between {from:?} and {to:?}")]
    DisjointRoute { from: SectionId, to: SectionId },

    #[error("train of length {length} cannot be placed at section {section:?}")]
    CannotPlace { section: SectionId, length: f64 },

    #[error("train {train} cannot leave {length} m behind")]
    CannotSplit { train: TrainNumber, length: f64 },

    #[error("trains {front} and {rear} are not standing together")]
    NotCoupled { front: TrainNumber, rear: TrainNumber },

    #[error("train {0} is not on its original path")]
    OffOriginalPath(TrainNumber),

    #[error("mode change from {from:?} to {to:?} is not permitted")]
    ModeChangeRejected { from: ControlMode, to: ControlMode },

    #[error("train {0} has no route to its destination")]
    NoRoute(TrainNumber),

    #[error("invalid {kind} discriminant {value}")]
    InvalidDiscriminant { kind: &'static str, value: u8 },
}
