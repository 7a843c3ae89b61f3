use crate::util::u8_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How far ahead, in time at the allowed speed, signals and speed posts are looked up.
const LOOKAHEAD_TIME: f64 = 30.0; // s

/// The minimum distance the signal lookahead covers.
const MIN_CHECK_DISTANCE: f64 = 1000.0; // m

/// The minimum length of a route built in manual or explorer mode.
const MANUAL_MIN_DISTANCE: f64 = 1500.0; // m

/// The furthest a train in node control reserves ahead of its front.
const NODE_MAX_DISTANCE: f64 = 3000.0; // m

/// The deceleration applied when a train is out of control.
const EMERGENCY_DECELERATION: f64 = 1.5; // m/s^2

/// Below this speed a train is considered to be standing.
const STANDSTILL_SPEED: f64 = 0.1; // m/s

/// The tunable parameters of a [Simulation](crate::Simulation).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuthorityConfig {
    /// How far ahead, in seconds at the allowed speed, the lookahead reaches.
    pub lookahead_time: f64,
    /// The minimum lookahead distance in m.
    pub min_check_distance: f64,
    /// The minimum route length built in manual and explorer mode, in m.
    pub manual_min_distance: f64,
    /// The maximum reservation distance in node control, in m.
    pub node_max_distance: f64,
    /// The deceleration of a train that is out of control, in m/s^2.
    pub emergency_deceleration: f64,
    /// The speed below which a train counts as stopped, in m/s.
    pub standstill_speed: f64,
    /// The deadlock resolution strategy.
    pub deadlock_resolution: DeadlockResolution,
}

/// Selects how overlapping routes in opposite directions are turned into deadlock boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "u8", try_from = "u8")
)]
pub enum DeadlockResolution {
    /// Every opposite-direction overlap is a deadlock boundary.
    PathBased = 0,
    /// Only overlaps that can actually trap a train count, and passing paths
    /// inside an overlap split it into separate boundaries.
    #[default]
    LocationBased = 1,
}

u8_enum!(DeadlockResolution {
    PathBased,
    LocationBased
});

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            lookahead_time: LOOKAHEAD_TIME,
            min_check_distance: MIN_CHECK_DISTANCE,
            manual_min_distance: MANUAL_MIN_DISTANCE,
            node_max_distance: NODE_MAX_DISTANCE,
            emergency_deceleration: EMERGENCY_DECELERATION,
            standstill_speed: STANDSTILL_SPEED,
            deadlock_resolution: DeadlockResolution::default(),
        }
    }
}

impl AuthorityConfig {
    /// The distance covered by the lookahead window at the given allowed speed.
    pub fn lookahead_distance(&self, allowed_speed: f64) -> f64 {
        f64::max(allowed_speed * self.lookahead_time, self.min_check_distance)
    }
}

#[cfg(test)]
mod test {
    use super::{AuthorityConfig, DeadlockResolution};

    #[test]
    fn lookahead_has_a_floor() {
        let config = AuthorityConfig::default();
        assert_eq!(config.lookahead_distance(0.0), config.min_check_distance);
        assert_eq!(config.lookahead_distance(50.0), 50.0 * config.lookahead_time);
    }

    #[test]
    fn resolution_persists_as_integer() {
        assert_eq!(u8::from(DeadlockResolution::LocationBased), 1);
        assert_eq!(DeadlockResolution::try_from(0), Ok(DeadlockResolution::PathBased));
        assert!(DeadlockResolution::try_from(2).is_err());
    }
}
