//! Routes: ordered sequences of sections a train travels through.

use crate::util::u8_enum;
use crate::SectionId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The direction in which a section is traversed.
///
/// `Forward` runs from end 0 of the section to end 1, `Reverse` from end 1 to end 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum Direction {
    Forward = 0,
    Reverse = 1,
}

u8_enum!(Direction { Forward, Reverse });

impl Direction {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// The index of the section end a train leaves through.
    pub fn exit_end(self) -> usize {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => 0,
        }
    }

    /// The index of the section end a train enters through.
    pub fn entry_end(self) -> usize {
        1 - self.exit_end()
    }

    /// The direction of travel of a train that enters a section through the given end.
    pub fn entering_at(end: usize) -> Self {
        if end == 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// One section of a route together with the direction it is traversed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteElement {
    pub section: SectionId,
    pub direction: Direction,
}

impl RouteElement {
    pub fn new(section: SectionId, direction: Direction) -> Self {
        Self { section, direction }
    }

    /// The same section traversed the other way.
    pub fn reversed(self) -> Self {
        Self {
            section: self.section,
            direction: self.direction.reverse(),
        }
    }
}

/// An ordered list of sections describing one continuous, reversal-free leg.
///
/// Index order is travel order: element `i + 1` is always entered directly
/// from element `i`. Every mutation below keeps that true.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Route {
    elements: Vec<RouteElement>,
}

impl Route {
    /// Creates a route from elements in travel order.
    pub fn new(elements: Vec<RouteElement>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<RouteElement> {
        self.elements.get(idx).copied()
    }

    pub fn first(&self) -> Option<RouteElement> {
        self.elements.first().copied()
    }

    pub fn last(&self) -> Option<RouteElement> {
        self.elements.last().copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = RouteElement> + ExactSizeIterator + '_ {
        self.elements.iter().copied()
    }

    pub fn as_slice(&self) -> &[RouteElement] {
        &self.elements
    }

    /// Finds the first occurrence of a section in the route.
    pub fn find(&self, section: SectionId) -> Option<usize> {
        self.find_from(section, 0)
    }

    /// Finds the first occurrence of a section at or after `start`.
    pub fn find_from(&self, section: SectionId, start: usize) -> Option<usize> {
        self.elements
            .iter()
            .skip(start)
            .position(|el| el.section == section)
            .map(|idx| idx + start)
    }

    /// Finds an element with matching section and direction at or after `start`.
    pub fn find_element_from(&self, element: RouteElement, start: usize) -> Option<usize> {
        self.elements
            .iter()
            .skip(start)
            .position(|el| *el == element)
            .map(|idx| idx + start)
    }

    pub fn contains(&self, section: SectionId) -> bool {
        self.find(section).is_some()
    }

    /// The index at which a section recurs within the route, closing a loop.
    pub fn loop_point(&self) -> Option<usize> {
        self.elements.iter().enumerate().find_map(|(idx, el)| {
            self.elements[..idx]
                .iter()
                .any(|prev| prev.section == el.section)
                .then_some(idx)
        })
    }

    /// Removes everything from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.elements.truncate(len);
    }

    /// Removes the first `count` elements.
    pub fn trim_front(&mut self, count: usize) {
        let count = usize::min(count, self.elements.len());
        self.elements.drain(..count);
    }

    /// Appends an element entered from the current last element.
    pub fn push(&mut self, element: RouteElement) {
        self.elements.push(element);
    }

    /// Replaces a range of elements, as when a passing path is substituted.
    pub fn splice(&mut self, range: Range<usize>, replacement: &[RouteElement]) {
        self.elements.splice(range, replacement.iter().copied());
    }

    /// The route travelled in the opposite direction.
    pub fn reversed(&self) -> Route {
        Route {
            elements: self.elements.iter().rev().map(|el| el.reversed()).collect(),
        }
    }

    /// The part of the route starting at `start`.
    pub fn tail(&self, start: usize) -> Route {
        Route {
            elements: self.elements.get(start..).unwrap_or_default().to_vec(),
        }
    }
}

impl FromIterator<RouteElement> for Route {
    fn from_iter<T: IntoIterator<Item = RouteElement>>(iter: T) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

/// A train's full path, as a sequence of reversal-free legs (sub-paths).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainPath {
    legs: Vec<Route>,
    active: usize,
}

impl TrainPath {
    /// Creates a path from its legs; a reversal happens between consecutive legs.
    pub fn new(legs: Vec<Route>) -> Self {
        Self { legs, active: 0 }
    }

    /// Creates a path made of a single leg.
    pub fn single(route: Route) -> Self {
        Self::new(vec![route])
    }

    /// The leg currently being travelled.
    pub fn active_leg(&self) -> Option<&Route> {
        self.legs.get(self.active)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn legs(&self) -> &[Route] {
        &self.legs
    }

    /// Whether there is another leg after the active one.
    pub fn has_next_leg(&self) -> bool {
        self.active + 1 < self.legs.len()
    }

    /// Moves on to the next leg, returning it.
    pub(crate) fn next_leg(&mut self) -> Option<&Route> {
        if self.has_next_leg() {
            self.active += 1;
        }
        self.legs.get(self.active)
    }

    /// The final section of the whole path.
    pub fn destination(&self) -> Option<RouteElement> {
        self.legs.last().and_then(|leg| leg.last())
    }
}

#[cfg(test)]
mod test {
    use super::{Direction, Route, RouteElement};
    use crate::SectionId;
    use slotmap::SlotMap;

    fn sections(n: usize) -> Vec<SectionId> {
        let mut map = SlotMap::<SectionId, ()>::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn route(ids: &[SectionId]) -> Route {
        ids.iter()
            .map(|id| RouteElement::new(*id, Direction::Forward))
            .collect()
    }

    #[test]
    fn loop_point_is_second_occurrence() {
        let s = sections(4);
        let r = route(&[s[0], s[1], s[2], s[3], s[1]]);
        assert_eq!(r.loop_point(), Some(4));
        assert_eq!(route(&s).loop_point(), None);
    }

    #[test]
    fn trimming_dissolves_loop() {
        let s = sections(4);
        let mut r = route(&[s[0], s[1], s[2], s[3], s[1]]);
        r.trim_front(2);
        assert_eq!(r.loop_point(), None);
        assert_eq!(r.find(s[1]), Some(2));
    }

    #[test]
    fn reversed_route() {
        let s = sections(3);
        let r = route(&s).reversed();
        assert_eq!(r.first(), Some(RouteElement::new(s[2], Direction::Reverse)));
        assert_eq!(r.last(), Some(RouteElement::new(s[0], Direction::Reverse)));
    }

    #[test]
    fn splice_keeps_order() {
        let s = sections(5);
        let mut r = route(&s[..4]);
        r.splice(2..3, &[RouteElement::new(s[4], Direction::Forward)]);
        let ids = r.iter().map(|el| el.section).collect::<Vec<_>>();
        assert_eq!(ids, vec![s[0], s[1], s[4], s[3]]);
    }
}
