use crate::route::RouteElement;
use crate::train::{TrainHandle, TrainNumber};
use crate::util::u8_enum;
use crate::{SectionId, SignalId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The kind of a trackside object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum SignalKind {
    /// A main signal protecting the block beyond it.
    Normal = 0,
    /// A repeater announcing the aspect of the next normal signal.
    Distant = 1,
    /// A speed limit board.
    SpeedPost = 2,
}

u8_enum!(SignalKind {
    Normal,
    Distant,
    SpeedPost
});

/// The aspect shown by a signal, most restrictive first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum Aspect {
    Stop = 0,
    StopAndProceed = 1,
    Restricting = 2,
    Approach1 = 3,
    Approach2 = 4,
    Approach3 = 5,
    Clear1 = 6,
    Clear2 = 7,
}

u8_enum!(Aspect {
    Stop,
    StopAndProceed,
    Restricting,
    Approach1,
    Approach2,
    Approach3,
    Clear1,
    Clear2,
});

impl Aspect {
    /// Whether a train must not pass the signal.
    pub fn is_stop(self) -> bool {
        self == Aspect::Stop
    }
}

/// A signal or speed post along the track.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    /// The signal ID.
    id: SignalId,
    /// The kind of object.
    kind: SignalKind,
    /// The section the object stands on and the direction of travel it faces.
    location: RouteElement,
    /// The distance from the entry of the section, in the facing direction, in m.
    offset: f64,
    /// The speed limit the object imposes, in m/s.
    speed_limit: Option<f64>,
    /// The aspect currently shown.
    aspect: Aspect,
    /// The train the signal is working for.
    enabled_train: Option<TrainHandle>,
    /// The sections reserved when the signal was last cleared.
    block: SmallVec<[SectionId; 4]>,
    /// A train allowed to pass the signal at danger.
    permission: Option<TrainNumber>,
    /// Kept at danger by the dispatcher.
    #[cfg_attr(feature = "serde", serde(default))]
    held: bool,
}

impl Signal {
    pub(crate) fn new(
        id: SignalId,
        kind: SignalKind,
        location: RouteElement,
        offset: f64,
        speed_limit: Option<f64>,
    ) -> Self {
        let aspect = match kind {
            SignalKind::Normal => Aspect::Stop,
            SignalKind::Distant => Aspect::Approach1,
            SignalKind::SpeedPost => Aspect::Clear2,
        };
        Self {
            id,
            kind,
            location,
            offset,
            speed_limit,
            aspect,
            enabled_train: None,
            block: SmallVec::new(),
            permission: None,
            held: false,
        }
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn is_normal(&self) -> bool {
        self.kind == SignalKind::Normal
    }

    pub fn location(&self) -> RouteElement {
        self.location
    }

    /// The distance from the entry of the section in m.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The speed limit in m/s.
    pub fn speed_limit(&self) -> Option<f64> {
        self.speed_limit
    }

    pub fn aspect(&self) -> Aspect {
        self.aspect
    }

    pub fn enabled_train(&self) -> Option<TrainHandle> {
        self.enabled_train
    }

    /// The sections reserved by the last clearance.
    pub fn block(&self) -> &[SectionId] {
        &self.block
    }

    /// Whether the train may pass the signal at danger.
    pub fn has_permission(&self, number: TrainNumber) -> bool {
        self.permission == Some(number)
    }

    /// Whether the dispatcher keeps the signal at danger.
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub(crate) fn set_held(&mut self, held: bool) {
        self.held = held;
    }

    pub(crate) fn set_aspect(&mut self, aspect: Aspect) {
        self.aspect = aspect;
    }

    pub(crate) fn enable(&mut self, handle: TrainHandle) {
        self.enabled_train = Some(handle);
    }

    pub(crate) fn set_block(&mut self, block: impl IntoIterator<Item = SectionId>) {
        self.block = block.into_iter().collect();
    }

    pub(crate) fn grant_permission(&mut self, number: TrainNumber) {
        self.permission = Some(number);
    }

    /// Returns the signal to danger, forgetting its train.
    pub(crate) fn reset(&mut self) {
        if self.kind == SignalKind::Normal {
            self.aspect = Aspect::Stop;
        }
        self.enabled_train = None;
        self.block.clear();
        self.permission = None;
    }
}
