use crate::util::u8_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a train's authority ends where it does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum EndAuthority {
    EndOfTrack = 0,
    EndOfPath = 1,
    ReservedSwitch = 2,
    TrainAhead = 3,
    MaxDistance = 4,
    Loop = 5,
    Signal = 6,
    EndOfAuthority = 7,
    NoPathReserved = 8,
}

u8_enum!(EndAuthority {
    EndOfTrack,
    EndOfPath,
    ReservedSwitch,
    TrainAhead,
    MaxDistance,
    Loop,
    Signal,
    EndOfAuthority,
    NoPathReserved,
});

/// How far a train may proceed in one direction, and why it may go no further.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Authority {
    pub kind: EndAuthority,
    /// Distance from the train's leading end in m.
    pub distance: f64,
}

impl Authority {
    /// No authority at all.
    pub const NONE: Authority = Authority {
        kind: EndAuthority::NoPathReserved,
        distance: 0.0,
    };

    pub fn new(kind: EndAuthority, distance: f64) -> Self {
        Self {
            kind,
            distance: f64::max(distance, 0.0),
        }
    }

    /// Whether any distance at all may be travelled.
    pub fn is_clear(&self) -> bool {
        self.distance > 0.0
    }
}

impl Default for Authority {
    fn default() -> Self {
        Self::NONE
    }
}
