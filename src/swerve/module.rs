// One swerve module: steering motor, steering encoder and drive motor
//
// Handles the closed steering loop and the open-loop wheel speed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::angle::{saturate_unit, wrap_deg};
use super::hardware::{HeadingSensor, MotorOutput};
use super::kinematics::{ModulePosition, ModuleTarget};
use super::pid::{AnglePid, PidError, PidGains};

/// Beyond this distance the module flips its heading and reverses the wheel
pub const FLIP_THRESHOLD_DEG: f64 = 90.0;

/// Normalized actuator commands issued to one module in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleCommand {
    pub drive: f64,
    pub steer: f64,
}

/// Rewrite a target so the wheel turns the shorter way.
///
/// If the target heading is more than [`FLIP_THRESHOLD_DEG`] from the measured
/// heading, point the wheel the opposite way and run it backwards instead.
/// Exactly 90 degrees keeps the original target.
pub fn optimize(target: ModuleTarget, measured_deg: f64) -> ModuleTarget {
    let heading = wrap_deg(target.heading_deg);
    let current = wrap_deg(measured_deg);

    if (heading - current).abs() > FLIP_THRESHOLD_DEG {
        ModuleTarget::new(-target.speed, wrap_deg(heading + 180.0))
    } else {
        ModuleTarget::new(target.speed, heading)
    }
}

pub struct SwerveModule<D, T, S> {
    position: ModulePosition,
    drive: D,
    steer: T,
    sensor: S,
    pid: AnglePid,
    last_command: ModuleCommand,
    holding: bool,
}

impl<D, T, S> SwerveModule<D, T, S>
where
    D: MotorOutput,
    T: MotorOutput,
    S: HeadingSensor,
{
    /// Create a module from its hardware handles
    ///
    /// # Arguments
    /// * `drive` - Motor spinning the wheel
    /// * `steer` - Motor turning the module
    /// * `sensor` - Steering angle sensor
    /// * `gains` - Steering loop gains
    /// * `dt` - Control period in seconds, must be positive
    pub fn new(
        position: ModulePosition,
        drive: D,
        steer: T,
        sensor: S,
        gains: PidGains,
        dt: f64,
    ) -> Result<Self, PidError> {
        debug!("Creating {} module with gains {:?}", position, gains);
        Ok(Self {
            position,
            drive,
            steer,
            sensor,
            pid: AnglePid::new(gains, dt)?,
            last_command: ModuleCommand::default(),
            holding: false,
        })
    }

    /// Drive the module toward `target` for one cycle.
    ///
    /// Non-finite targets or sensor readings re-issue the previous command.
    pub fn set(&mut self, target: ModuleTarget) -> ModuleCommand {
        let measured = self.sensor.heading_deg();

        match self.compute(target, measured) {
            Some(command) => {
                if self.holding {
                    info!("{} module: input valid again, resuming control", self.position);
                    self.holding = false;
                }
                self.last_command = command;
            }
            None => {
                if !self.holding {
                    warn!(
                        "{} module: invalid input (target={:?}, measured={}), holding last command",
                        self.position, target, measured
                    );
                    self.holding = true;
                }
            }
        }

        self.drive.set(self.last_command.drive);
        self.steer.set(self.last_command.steer);
        self.last_command
    }

    fn compute(&mut self, target: ModuleTarget, measured: f64) -> Option<ModuleCommand> {
        if !target.speed.is_finite() || !target.heading_deg.is_finite() || !measured.is_finite() {
            return None;
        }

        let optimized = optimize(target, measured);
        let drive = saturate_unit(optimized.speed)?;
        let steer = self.pid.update(optimized.heading_deg, measured)?;

        Some(ModuleCommand { drive, steer })
    }

    pub fn position(&self) -> ModulePosition {
        self.position
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Read the steering sensor, wrapped into (-180, 180]
    pub fn measured_heading(&mut self) -> f64 {
        wrap_deg(self.sensor.heading_deg())
    }
}
