use super::{RouteSide, Train};
use crate::network::TrackNetwork;
use crate::route::RouteElement;
use crate::util::DISTANCE_EPSILON;
use log::info;

/// The largest gap between two trains that can still be coupled, in m.
pub(crate) const COUPLING_DISTANCE: f64 = 1.0; // m

/// Where the rear portion of a split train stands.
pub(crate) struct RearPortion {
    /// The sections it covers, rear first.
    pub occupied: Vec<RouteElement>,
    /// How far its front is into the last of them, in m.
    pub front_offset: f64,
}

impl Train {
    /// Uncouples the last `rear_length` m of the train. The train keeps the front part,
    /// and gives up the sections only the rear part stands on.
    pub(crate) fn detach_rear(
        &mut self,
        rear_length: f64,
        network: &mut TrackNetwork,
    ) -> Option<RearPortion> {
        if rear_length <= DISTANCE_EPSILON || rear_length >= self.length - DISTANCE_EPSILON {
            return None;
        }

        let mut portion = Vec::new();
        let mut pos = self.rear.offset + rear_length;
        let mut front_offset = 0.0;
        for el in self.occupied.iter().copied() {
            portion.push(el);
            let length = network.length(el.section);
            if pos <= length + DISTANCE_EPSILON {
                front_offset = f64::min(pos, length);
                break;
            }
            pos -= length;
        }

        self.length -= rear_length;
        self.rear.offset += rear_length;
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
        self.trim_route();
        self.route_changed = true;
        info!("train {} leaves {:.1} m behind", self.number, rear_length);
        Some(RearPortion {
            occupied: portion,
            front_offset,
        })
    }

    /// The gap between this train's front and the rear of `ahead`, if they stand
    /// on the same or adjacent sections facing the same way.
    pub(crate) fn gap_to(&self, ahead: &Train, network: &TrackNetwork) -> Option<f64> {
        let front = self.front;
        let rear = ahead.rear;
        if front.element == rear.element {
            return Some(rear.offset - front.offset);
        }
        let next = network.next_element(None, front.element)?;
        (next == rear.element)
            .then(|| network.length(front.element.section) - front.offset + rear.offset)
    }

    /// Couples `rear`, which stands `gap` m behind this train, onto its rear.
    /// The rear train must already be released from the network.
    pub(crate) fn absorb(&mut self, rear: &Train, gap: f64, network: &mut TrackNetwork) {
        let mut added = 0;
        for el in rear.occupied.iter().rev().copied() {
            if self.occupied.front() == Some(&el) {
                continue;
            }
            self.occupied.push_front(el);
            added += 1;
        }
        let handle = self.handle(RouteSide::Ahead);
        for el in self.occupied.iter() {
            network.section_mut(el.section).set_occupied(handle);
        }

        let extra = self
            .occupied
            .iter()
            .take(added)
            .copied()
            .filter(|el| !self.routes[0].contains(el.section))
            .collect::<Vec<_>>();
        if !extra.is_empty() {
            self.routes[0].splice(0..0, &extra);
            self.front.route_index += extra.len();
        }

        self.rear = rear.rear;
        self.rear.route_index = 0;
        self.length += rear.length + f64::max(gap, 0.0);
        self.max_speed = f64::min(self.max_speed, rear.max_speed);
        self.route_changed = true;
        info!("train {} couples train {}", self.number, rear.number);
    }
}
