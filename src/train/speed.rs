use std::cell::Cell;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The distance kept between a stopped train and the end of its authority, in m.
pub(crate) const STOP_MARGIN: f64 = 10.0; // m

/// Speeds within this band of a limit count as being at the limit, in m/s.
const SPEED_TOLERANCE: f64 = 0.05; // m/s

/// A simple speed controller: it accelerates towards the allowed speed and brakes so that
/// the train can always stop within its authority. Car-level physics are out of scope.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct SpeedController {
    /// The maximum acceleration in m/s^2.
    max_acc: f64,
    /// The service braking deceleration, a positive number in m/s^2.
    brake_dec: f64,
    /// The acceleration chosen for the current step.
    acc: Cell<f64>,
}

impl SpeedController {
    pub fn new(max_acc: f64, brake_dec: f64) -> Self {
        Self {
            max_acc,
            brake_dec,
            acc: Cell::new(0.0),
        }
    }

    pub fn max_acc(&self) -> f64 {
        self.max_acc
    }

    pub fn brake_dec(&self) -> f64 {
        self.brake_dec
    }

    /// Resets the controller. Use at the start of an update.
    pub fn reset(&self) {
        self.acc.set(self.max_acc);
    }

    /// Gets the chosen acceleration.
    pub fn acc(&self) -> f64 {
        self.acc.get()
    }

    /// Applies an emergency brake.
    pub fn emergency_stop(&self, deceleration: f64) {
        self.acc.set(-f64::max(deceleration, self.brake_dec));
    }

    /// Applies a speed limit that holds from the train's current position.
    pub fn apply_speed_limit(&self, vel: f64, limit: f64) {
        let acc = if limit <= 0.0 {
            if vel > 0.0 {
                -self.brake_dec
            } else {
                0.0
            }
        } else if vel < limit - SPEED_TOLERANCE {
            self.max_acc * (1.0 - (vel / limit).powi(4))
        } else if vel <= limit + SPEED_TOLERANCE {
            0.0
        } else {
            -self.brake_dec
        };
        self.limit_acc(acc);
    }

    /// Applies a speed limit that starts `dist` m ahead.
    pub fn apply_upcoming_speed_limit(&self, vel: f64, limit: f64, dist: f64) {
        let safe = (limit.powi(2) + 2.0 * self.brake_dec * f64::max(dist, 0.0)).sqrt();
        self.apply_speed_limit(vel, safe);
    }

    /// Brakes so that the train stops short of a point `dist` m ahead.
    pub fn stop_within(&self, vel: f64, dist: f64) {
        let safe = (2.0 * self.brake_dec * f64::max(dist - STOP_MARGIN, 0.0)).sqrt();
        self.apply_speed_limit(vel, safe);
    }

    fn limit_acc(&self, acc: f64) {
        self.acc.set(f64::min(self.acc.get(), acc));
    }
}

#[cfg(test)]
mod test {
    use super::{SpeedController, STOP_MARGIN};

    #[test]
    fn brakes_before_authority() {
        let c = SpeedController::new(0.5, 0.5);
        c.reset();
        c.stop_within(20.0, 100.0);
        assert_eq!(c.acc(), -0.5);

        c.reset();
        c.stop_within(5.0, 1000.0);
        assert!(c.acc() > 0.0);

        c.reset();
        c.stop_within(0.0, STOP_MARGIN);
        assert_eq!(c.acc(), 0.0);
    }

    #[test]
    fn emergency_is_at_least_service() {
        let c = SpeedController::new(0.5, 0.8);
        c.emergency_stop(0.3);
        assert_eq!(c.acc(), -0.8);
        c.emergency_stop(1.5);
        assert_eq!(c.acc(), -1.5);
    }
}
