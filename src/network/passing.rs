use crate::route::Route;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An alternative route, such as a passing loop or siding, running alongside
/// part of a main route so that one train can clear another.
///
/// Both routes run between the same pair of junctions, which are not part of either.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PassingPath {
    main: Route,
    alternative: Route,
    /// The usable length of the alternative route in m.
    length: f64,
}

impl PassingPath {
    pub(crate) fn new(main: Route, alternative: Route, length: f64) -> Self {
        Self {
            main,
            alternative,
            length,
        }
    }

    /// The section sequence of the main line.
    pub fn main(&self) -> &Route {
        &self.main
    }

    /// The section sequence that can be taken instead of the main line.
    pub fn alternative(&self) -> &Route {
        &self.alternative
    }

    /// The length of the alternative route in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The same passing path travelled the other way.
    pub(crate) fn reversed(&self) -> Self {
        Self {
            main: self.main.reversed(),
            alternative: self.alternative.reversed(),
            length: self.length,
        }
    }

    /// Whether `route` runs along the main line starting at `idx`.
    pub(crate) fn matches_at(&self, route: &Route, idx: usize) -> bool {
        self.main
            .iter()
            .enumerate()
            .all(|(i, el)| route.get(idx + i) == Some(el))
    }
}
