// Drive coordinator for the four-module swerve base
//
// Shapes the raw 3-axis request (deadzone, clamping, rotation scale), runs the
// kinematics and fans the targets out to the modules in a fixed order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::hardware::{HeadingSensor, MotorOutput};
use super::kinematics::{
    ChassisMotion, ModulePosition, ModuleTarget, NUM_MODULES, SwerveKinematics, WheelLayout,
};
use super::module::{ModuleCommand, SwerveModule};

/// Inputs below this magnitude are treated as zero
pub const DEFAULT_DEADZONE: f64 = 0.1;

/// Fraction of the rotation input passed on to the kinematics
pub const DEFAULT_ROTATION_SCALE: f64 = 0.2;

/// Errors raised while assembling the drive
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriveError {
    #[error("Deadzone must be in [0, 1), got {0}")]
    InvalidDeadzone(f64),

    #[error("Rotation scale must be in [0, 1], got {0}")]
    InvalidRotationScale(f64),

    #[error("Module in the {expected} slot reports position {found}")]
    ModuleOrder {
        expected: ModulePosition,
        found: ModulePosition,
    },
}

/// How raw axis input is conditioned before the kinematics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputShaping {
    pub deadzone: f64,
    pub rotation_scale: f64,
}

impl Default for InputShaping {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            rotation_scale: DEFAULT_ROTATION_SCALE,
        }
    }
}

impl InputShaping {
    pub fn validate(&self) -> Result<(), DriveError> {
        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(DriveError::InvalidDeadzone(self.deadzone));
        }
        if !(0.0..=1.0).contains(&self.rotation_scale) {
            return Err(DriveError::InvalidRotationScale(self.rotation_scale));
        }
        Ok(())
    }

    /// Condition one axis: non-finite to zero, clamp to [-1, 1], then deadzone
    pub fn axis(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let value = value.clamp(-1.0, 1.0);
        if value.abs() < self.deadzone { 0.0 } else { value }
    }

    /// Condition a full request into the motion handed to the kinematics
    pub fn shape(&self, forward: f64, strafe: f64, rotate: f64) -> ChassisMotion {
        ChassisMotion::new(
            self.axis(forward),
            self.axis(strafe),
            self.axis(rotate) * self.rotation_scale,
        )
    }
}

/// Convert a polar request into clamped (forward, strafe)
///
/// `direction_deg` uses the heading convention: 0 = forward, 90 = right.
pub fn polar_to_cartesian(direction_deg: f64, magnitude: f64) -> (f64, f64) {
    let (sin, cos) = direction_deg.to_radians().sin_cos();
    (
        (magnitude * cos).clamp(-1.0, 1.0),
        (magnitude * sin).clamp(-1.0, 1.0),
    )
}

/// The whole drivetrain: kinematics plus four modules
pub struct SwerveDrive<D, T, S> {
    kinematics: SwerveKinematics,
    modules: [SwerveModule<D, T, S>; NUM_MODULES],
    shaping: InputShaping,
    last_targets: [ModuleTarget; NUM_MODULES],
}

impl<D, T, S> SwerveDrive<D, T, S>
where
    D: MotorOutput,
    T: MotorOutput,
    S: HeadingSensor,
{
    /// Assemble the drive from four modules
    ///
    /// The order here is the order the layout, the kinematics output and the
    /// actuator fan-out all use. Each module must report the matching position.
    pub fn new(
        front_left: SwerveModule<D, T, S>,
        front_right: SwerveModule<D, T, S>,
        rear_right: SwerveModule<D, T, S>,
        rear_left: SwerveModule<D, T, S>,
        layout: WheelLayout,
        shaping: InputShaping,
    ) -> Result<Self, DriveError> {
        shaping.validate()?;

        let modules = [front_left, front_right, rear_right, rear_left];
        for (expected, module) in ModulePosition::ALL.into_iter().zip(&modules) {
            if module.position() != expected {
                return Err(DriveError::ModuleOrder {
                    expected,
                    found: module.position(),
                });
            }
        }

        info!(
            "Swerve drive ready: layout {:?}, deadzone {}, rotation scale {}",
            layout.offsets(),
            shaping.deadzone,
            shaping.rotation_scale
        );

        Ok(Self {
            kinematics: SwerveKinematics::new(layout),
            modules,
            shaping,
            last_targets: [ModuleTarget::default(); NUM_MODULES],
        })
    }

    /// Drive with raw axis input
    ///
    /// # Arguments
    /// * `forward` - Forward input, -1.0 to 1.0
    /// * `strafe` - Strafe input, -1.0 to 1.0 (positive = right)
    /// * `rotate` - Rotation input, -1.0 to 1.0 (positive = clockwise)
    pub fn drive(&mut self, forward: f64, strafe: f64, rotate: f64) -> [ModuleCommand; NUM_MODULES] {
        let motion = self.shaping.shape(forward, strafe, rotate);
        self.drive_motion(motion)
    }

    /// Drive with a direction, a magnitude and a rotation, for scripted motion
    ///
    /// e.g. `drive_polar(45.0, 1.0, 0.0)` runs diagonally forward-right at full speed.
    pub fn drive_polar(
        &mut self,
        direction_deg: f64,
        magnitude: f64,
        rotate: f64,
    ) -> [ModuleCommand; NUM_MODULES] {
        let (forward, strafe) = polar_to_cartesian(direction_deg, magnitude);
        self.drive(forward, strafe, rotate.clamp(-1.0, 1.0))
    }

    /// Zero every wheel speed, keeping the current headings
    pub fn stop(&mut self) -> [ModuleCommand; NUM_MODULES] {
        self.drive_motion(ChassisMotion::zero())
    }

    /// Run already-shaped motion through the kinematics and the modules
    pub fn drive_motion(&mut self, motion: ChassisMotion) -> [ModuleCommand; NUM_MODULES] {
        let held = self.last_targets.map(|t| t.heading_deg);
        let targets = self.kinematics.to_module_targets(motion, held);
        self.last_targets = targets;

        let mut commands = [ModuleCommand::default(); NUM_MODULES];
        for ((module, target), command) in self.modules.iter_mut().zip(targets).zip(&mut commands) {
            *command = module.set(target);
        }

        debug!("Motion {:?} -> commands {:?}", motion, commands);
        commands
    }

    pub fn module_mut(&mut self, position: ModulePosition) -> &mut SwerveModule<D, T, S> {
        &mut self.modules[position.index()]
    }

    /// Targets computed on the last cycle, before per-module optimization
    pub fn last_targets(&self) -> &[ModuleTarget; NUM_MODULES] {
        &self.last_targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swerve::hardware::{PercentOutput, SignalCell};
    use crate::swerve::pid::PidGains;

    struct FakeSensor(SignalCell);

    impl HeadingSensor for FakeSensor {
        fn heading_deg(&mut self) -> f64 {
            self.0.get()
        }
    }

    type TestDrive = SwerveDrive<PercentOutput, PercentOutput, FakeSensor>;

    struct Rig {
        drive: TestDrive,
        drive_out: [SignalCell; NUM_MODULES],
        headings: [SignalCell; NUM_MODULES],
    }

    fn build_module(
        position: ModulePosition,
        drive: &SignalCell,
        heading: &SignalCell,
    ) -> SwerveModule<PercentOutput, PercentOutput, FakeSensor> {
        SwerveModule::new(
            position,
            PercentOutput::new(drive.clone(), false),
            PercentOutput::new(SignalCell::default(), false),
            FakeSensor(heading.clone()),
            PidGains::default(),
            0.02,
        )
        .unwrap()
    }

    fn rig() -> Rig {
        let drive_out: [SignalCell; NUM_MODULES] = Default::default();
        let headings: [SignalCell; NUM_MODULES] = Default::default();
        let [fl, fr, rr, rl] =
            ModulePosition::ALL.map(|p| build_module(p, &drive_out[p.index()], &headings[p.index()]));

        let drive = SwerveDrive::new(
            fl,
            fr,
            rr,
            rl,
            WheelLayout::rectangular(1.0, 1.0).unwrap(),
            InputShaping::default(),
        )
        .unwrap();

        Rig {
            drive,
            drive_out,
            headings,
        }
    }

    #[test]
    fn test_deadzone_threshold() {
        let shaping = InputShaping::default();
        assert_eq!(shaping.axis(0.09), 0.0);
        assert_eq!(shaping.axis(-0.09), 0.0);
        assert_eq!(shaping.axis(0.11), 0.11);
        assert_eq!(shaping.axis(-0.11), -0.11);
    }

    #[test]
    fn test_shape_clamps_and_scales_rotation() {
        let shaping = InputShaping::default();
        let motion = shaping.shape(2.0, -3.0, 1.0);
        assert_eq!(motion, ChassisMotion::new(1.0, -1.0, 0.2));

        // Deadzone applies to the raw rotation input, before scaling
        let motion = shaping.shape(0.0, 0.0, 0.3);
        assert!((motion.rotate - 0.06).abs() < 1e-12);
        assert_eq!(shaping.shape(0.0, 0.0, 0.05).rotate, 0.0);
    }

    #[test]
    fn test_shape_non_finite_is_zero() {
        let shaping = InputShaping::default();
        let motion = shaping.shape(f64::NAN, f64::INFINITY, f64::NEG_INFINITY);
        assert!(motion.is_zero());
    }

    #[test]
    fn test_custom_shaping() {
        let shaping = InputShaping {
            deadzone: 0.05,
            rotation_scale: 1.0,
        };
        assert_eq!(shaping.shape(0.07, 0.0, 0.5), ChassisMotion::new(0.07, 0.0, 0.5));
    }

    #[test]
    fn test_invalid_shaping_rejected() {
        let bad = InputShaping {
            deadzone: 1.5,
            ..InputShaping::default()
        };
        assert_eq!(bad.validate(), Err(DriveError::InvalidDeadzone(1.5)));

        let bad = InputShaping {
            rotation_scale: f64::NAN,
            ..InputShaping::default()
        };
        assert!(matches!(bad.validate(), Err(DriveError::InvalidRotationScale(_))));
    }

    #[test]
    fn test_forward_full_speed_end_to_end() {
        let mut rig = rig();
        let commands = rig.drive.drive(1.0, 0.0, 0.0);

        for position in ModulePosition::ALL {
            let i = position.index();
            assert!((commands[i].drive - 1.0).abs() < 1e-12);
            assert!(commands[i].steer.abs() < 1e-12);
            assert!((rig.drive_out[i].get() - 1.0).abs() < 1e-12);
            assert!(rig.drive.last_targets()[i].heading_deg.abs() < 1e-12);
        }
    }

    #[test]
    fn test_fan_out_order() {
        let mut rig = rig();
        // Full rotation input, scaled to 0.2
        rig.drive.drive(0.0, 0.0, 1.0);
        let targets = rig.drive.last_targets();

        let expected = [45.0, 135.0, -135.0, -45.0];
        for position in ModulePosition::ALL {
            let heading = targets[position.index()].heading_deg;
            assert!(
                (heading - expected[position.index()]).abs() < 1e-9,
                "{} heading was {}",
                position,
                heading
            );
        }
    }

    #[test]
    fn test_zero_command_holds_headings() {
        let mut rig = rig();
        for cell in &rig.headings {
            cell.store(40.0);
        }
        rig.drive.drive(0.5, 0.5, 0.0);
        let before = *rig.drive.last_targets();

        let commands = rig.drive.drive(0.0, 0.0, 0.0);
        for position in ModulePosition::ALL {
            let i = position.index();
            assert_eq!(commands[i].drive, 0.0);
            assert_eq!(rig.drive_out[i].get(), 0.0);
            assert_eq!(rig.drive.last_targets()[i].speed, 0.0);
            assert_eq!(rig.drive.last_targets()[i].heading_deg, before[i].heading_deg);
        }

        // Inputs inside the deadzone behave the same
        let commands = rig.drive.drive(0.05, -0.05, 0.09);
        assert!(commands.iter().all(|c| c.drive == 0.0));
        assert_eq!(rig.drive.last_targets()[0].heading_deg, before[0].heading_deg);
    }

    #[test]
    fn test_stop_keeps_headings() {
        let mut rig = rig();
        rig.drive.drive(0.0, 0.8, 0.0);
        let commands = rig.drive.stop();
        assert!(commands.iter().all(|c| c.drive == 0.0));
        assert!(
            rig.drive
                .last_targets()
                .iter()
                .all(|t| (t.heading_deg - 90.0).abs() < 1e-9)
        );
    }

    #[test]
    fn test_polar_forward_matches_cartesian() {
        let (forward, strafe) = polar_to_cartesian(0.0, 1.0);
        assert_eq!(forward, 1.0);
        assert_eq!(strafe, 0.0);

        let mut polar_rig = rig();
        let mut cartesian_rig = rig();
        let polar = polar_rig.drive.drive_polar(0.0, 1.0, 0.0);
        let cartesian = cartesian_rig.drive.drive(1.0, 0.0, 0.0);
        assert_eq!(polar, cartesian);
    }

    #[test]
    fn test_polar_right_strafe() {
        let (forward, strafe) = polar_to_cartesian(90.0, 0.5);
        assert!(forward.abs() < 1e-12);
        assert!((strafe - 0.5).abs() < 1e-12);

        let mut rig = rig();
        rig.drive.drive_polar(90.0, 0.5, 0.0);
        for target in rig.drive.last_targets() {
            assert!((target.heading_deg - 90.0).abs() < 1e-9);
            assert!((target.speed - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_polar_clamps_axes() {
        let (forward, strafe) = polar_to_cartesian(45.0, 5.0);
        assert_eq!(forward, 1.0);
        assert_eq!(strafe, 1.0);
    }

    #[test]
    fn test_module_order_enforced() {
        let cell = SignalCell::default();
        let modules = [
            ModulePosition::FrontRight,
            ModulePosition::FrontLeft,
            ModulePosition::RearRight,
            ModulePosition::RearLeft,
        ]
        .map(|p| build_module(p, &cell, &cell));
        let [a, b, c, d] = modules;

        let result = SwerveDrive::new(
            a,
            b,
            c,
            d,
            WheelLayout::rectangular(1.0, 1.0).unwrap(),
            InputShaping::default(),
        );
        assert!(matches!(
            result,
            Err(DriveError::ModuleOrder {
                expected: ModulePosition::FrontLeft,
                found: ModulePosition::FrontRight,
            })
        ));
    }
}
