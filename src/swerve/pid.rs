// Discrete PID with continuous (angle-wrapping) input for the steering loop

use serde::{Deserialize, Serialize};

use super::angle::{saturate_unit, shortest_delta_deg};

/// Steering loop construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PidError {
    #[error("Invalid steering gains: {0:?}")]
    InvalidGains(PidGains),

    #[error("Control period must be positive and finite, got {0} s")]
    InvalidPeriod(f64),
}

/// Steering loop gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Bound on the accumulated integral term (error * seconds)
    pub max_integral: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.075,
            ki: 0.0,
            kd: 0.0,
            max_integral: 100.0,
        }
    }
}

impl PidGains {
    pub fn is_valid(&self) -> bool {
        [self.kp, self.ki, self.kd].iter().all(|g| g.is_finite())
            && self.max_integral.is_finite()
            && self.max_integral >= 0.0
    }

    pub fn validate(&self) -> Result<(), PidError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PidError::InvalidGains(*self))
        }
    }
}

/// PID controller over an angle in degrees.
///
/// The error is always the shortest signed distance from the measurement to
/// the setpoint, so -179 and 179 are 2 degrees apart. Output is saturated to
/// [-1, 1]. The integrator and the previous error persist for the lifetime of
/// the controller.
#[derive(Debug, Clone)]
pub struct AnglePid {
    gains: PidGains,
    dt: f64,
    integral: f64,
    prev_err: Option<f64>,
}

impl AnglePid {
    /// Create a controller stepped every `dt` seconds
    pub fn new(gains: PidGains, dt: f64) -> Result<Self, PidError> {
        gains.validate()?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PidError::InvalidPeriod(dt));
        }

        Ok(Self {
            gains,
            dt,
            integral: 0.0,
            prev_err: None,
        })
    }

    /// Wrapped error in degrees, in (-180, 180]
    pub fn error(setpoint_deg: f64, measurement_deg: f64) -> f64 {
        shortest_delta_deg(measurement_deg, setpoint_deg)
    }

    /// Compute the actuator command for one cycle.
    ///
    /// Non-finite inputs leave the state untouched and return `None`.
    pub fn update(&mut self, setpoint_deg: f64, measurement_deg: f64) -> Option<f64> {
        if !setpoint_deg.is_finite() || !measurement_deg.is_finite() {
            return None;
        }

        let error = Self::error(setpoint_deg, measurement_deg);

        let limit = self.gains.max_integral;
        let integral = (self.integral + error * self.dt).clamp(-limit, limit);
        // No derivative kick on the first sample
        let derivative = self
            .prev_err
            .map_or(0.0, |prev| (error - prev) / self.dt);

        let output = saturate_unit(
            self.gains.kp * error + self.gains.ki * integral + self.gains.kd * derivative,
        )?;

        self.integral = integral;
        self.prev_err = Some(error);
        Some(output)
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}
