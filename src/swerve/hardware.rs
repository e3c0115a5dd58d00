// Hardware seam for the swerve modules
//
// Modules only talk to actuators and sensors through these traits. The runtime
// backs them with shared signal cells that it moves on and off the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A motor driven with a normalized percent output
pub trait MotorOutput {
    /// Command the motor, `value` in [-1, 1]
    fn set(&mut self, value: f64);
}

/// Anything that reports the steering angle of a module
pub trait HeadingSensor {
    /// Current steering angle in degrees (not necessarily wrapped)
    fn heading_deg(&mut self) -> f64;
}

/// Lock-free f64 shared between the control loop and the transport
#[derive(Debug, Clone, Default)]
pub struct SignalCell(Arc<AtomicU64>);

impl SignalCell {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(value.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Percent-output motor handle writing into a [`SignalCell`]
#[derive(Debug, Clone)]
pub struct PercentOutput {
    signal: SignalCell,
    inverted: bool,
}

impl PercentOutput {
    pub fn new(signal: SignalCell, inverted: bool) -> Self {
        Self { signal, inverted }
    }
}

impl MotorOutput for PercentOutput {
    fn set(&mut self, value: f64) {
        let value = if self.inverted { -value } else { value };
        self.signal.store(value);
    }
}

/// Steering encoder geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderScaling {
    pub pulses_per_rev: f64,
    /// Module revolutions per encoder shaft revolution
    pub gear_ratio: f64,
}

impl EncoderScaling {
    pub fn degrees_per_pulse(&self) -> f64 {
        360.0 * self.gear_ratio / self.pulses_per_rev
    }

    pub fn is_valid(&self) -> bool {
        let dpp = self.degrees_per_pulse();
        dpp.is_finite() && dpp != 0.0
    }
}

/// Quadrature encoder handle reading pulse counts from a [`SignalCell`]
#[derive(Debug, Clone)]
pub struct QuadratureEncoder {
    counts: SignalCell,
    degrees_per_pulse: f64,
    reversed: bool,
}

impl QuadratureEncoder {
    pub fn new(counts: SignalCell, scaling: EncoderScaling, reversed: bool) -> Self {
        Self {
            counts,
            degrees_per_pulse: scaling.degrees_per_pulse(),
            reversed,
        }
    }

    /// Pulse count that corresponds to `heading_deg`, used by the simulated plant
    pub fn counts_for(&self, heading_deg: f64) -> f64 {
        let counts = heading_deg / self.degrees_per_pulse;
        if self.reversed { -counts } else { counts }
    }
}

impl HeadingSensor for QuadratureEncoder {
    fn heading_deg(&mut self) -> f64 {
        let distance = self.counts.get() * self.degrees_per_pulse;
        if self.reversed { -distance } else { distance }
    }
}
