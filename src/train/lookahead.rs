use crate::network::SignalKind;
use crate::SignalId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A signal or speed post found ahead of the train.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct ObjectItem {
    pub signal: SignalId,
    pub kind: SignalKind,
    /// Index of the route element the object stands on.
    pub route_index: usize,
    /// Offset of the object into that element in m.
    pub offset: f64,
    /// Odometer reading at which the train's front reaches the object, in m.
    pub at: f64,
}

/// A speed limit waiting for the train to reach the point where it takes effect.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct DeferredAction {
    /// The object imposing the limit.
    pub signal: SignalId,
    /// Odometer reading at which the limit applies, in m.
    pub trigger: f64,
    /// The new limit in m/s.
    pub speed_limit: f64,
}

/// The rolling window of objects ahead of a train, and the speed limits they impose.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct Lookahead {
    /// Objects ahead in travel order.
    items: VecDeque<ObjectItem>,
    /// Speed limits not yet in force, ordered by trigger.
    deferred: Vec<DeferredAction>,
    /// The speed limit of the line, if any has been seen.
    line_speed: Option<f64>,
}

impl Lookahead {
    pub fn items(&self) -> impl Iterator<Item = &ObjectItem> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&ObjectItem> {
        self.items.back()
    }

    pub fn push(&mut self, item: ObjectItem) {
        self.items.push_back(item);
    }

    /// Forgets the objects ahead; limits already scheduled stay.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Removes the objects the train's front has passed.
    pub fn pop_passed(&mut self, odometer: f64) -> Vec<ObjectItem> {
        let mut passed = vec![];
        while let Some(item) = self.items.front() {
            if item.at > odometer {
                break;
            }
            passed.extend(self.items.pop_front());
        }
        passed
    }

    /// Adjusts route indices after `count` elements were trimmed from the front of the route.
    pub fn shift_indices(&mut self, count: usize) {
        self.items.retain_mut(|item| {
            if item.route_index < count {
                false
            } else {
                item.route_index -= count;
                true
            }
        });
    }

    /// Schedules a speed limit, replacing any pending one from the same object.
    pub fn schedule(&mut self, action: DeferredAction) {
        self.deferred.retain(|a| a.signal != action.signal);
        let idx = self
            .deferred
            .iter()
            .position(|a| a.trigger > action.trigger)
            .unwrap_or(self.deferred.len());
        self.deferred.insert(idx, action);
    }

    /// Puts the limits whose trigger point has been reached into force.
    pub fn apply_due(&mut self, odometer: f64) -> usize {
        let due = self
            .deferred
            .iter()
            .take_while(|a| a.trigger <= odometer)
            .count();
        for action in self.deferred.drain(..due) {
            self.line_speed = Some(action.speed_limit);
        }
        due
    }

    /// The pending limits.
    pub fn deferred(&self) -> &[DeferredAction] {
        &self.deferred
    }

    pub fn line_speed(&self) -> Option<f64> {
        self.line_speed
    }
}
