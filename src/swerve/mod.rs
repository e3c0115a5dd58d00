// Swerve drive control for a four-module base
//
// Provides:
// - Swerve inverse kinematics (chassis motion -> module speed and heading)
// - Per-module steering loop with angle optimization
// - Drive coordinator with deadzone, rotation scaling and polar input
// - Hardware traits the modules are wired through

pub mod angle;
mod drive;
pub mod hardware;
pub mod kinematics;
mod module;
pub mod pid;

pub use drive::{
    DEFAULT_DEADZONE, DEFAULT_ROTATION_SCALE, DriveError, InputShaping, SwerveDrive,
    polar_to_cartesian,
};
pub use hardware::{
    EncoderScaling, HeadingSensor, MotorOutput, PercentOutput, QuadratureEncoder, SignalCell,
};
pub use kinematics::{
    ChassisMotion, KinematicsError, ModulePosition, ModuleTarget, NUM_MODULES, SwerveKinematics,
    WheelLayout, WheelOffset,
};
pub use module::{FLIP_THRESHOLD_DEG, ModuleCommand, SwerveModule, optimize};
pub use pid::{AnglePid, PidError, PidGains};
