// Swerve inverse kinematics for a four-module base
// Converts body-frame motion (forward, strafe, rotate) into a speed and heading per module.
//
// Frame: x forward, y to the right, headings in degrees with 0 = forward and
// positive = clockwise. Positive strafe moves right, positive rotate turns clockwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::angle::wrap_deg;

/// Number of modules on the base
pub const NUM_MODULES: usize = 4;

/// Relative tolerance for the collinear layout check
const COLLINEAR_EPSILON: f64 = 1e-9;

/// Module positions, in the order used for layouts, targets and actuator fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModulePosition {
    FrontLeft = 0,
    FrontRight = 1,
    RearRight = 2,
    RearLeft = 3,
}

impl ModulePosition {
    pub const ALL: [ModulePosition; NUM_MODULES] = [
        ModulePosition::FrontLeft,
        ModulePosition::FrontRight,
        ModulePosition::RearRight,
        ModulePosition::RearLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ModulePosition::FrontLeft => "front-left",
            ModulePosition::FrontRight => "front-right",
            ModulePosition::RearRight => "rear-right",
            ModulePosition::RearLeft => "rear-left",
        }
    }
}

impl fmt::Display for ModulePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Layout errors, raised when the kinematics are constructed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KinematicsError {
    #[error("Wheel offset for {position} is not finite: ({x}, {y})")]
    NonFiniteOffset {
        position: ModulePosition,
        x: f64,
        y: f64,
    },

    #[error("Wheel contact points are collinear, rotation is indeterminate")]
    Collinear,

    #[error("Wheelbase dimensions must be positive, got length {length}, width {width}")]
    InvalidDimensions { length: f64, width: f64 },
}

/// Requested chassis motion, each axis normalized to [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisMotion {
    pub forward: f64,
    pub strafe: f64,
    pub rotate: f64,
}

impl ChassisMotion {
    pub fn new(forward: f64, strafe: f64, rotate: f64) -> Self {
        Self {
            forward,
            strafe,
            rotate,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.forward == 0.0 && self.strafe == 0.0 && self.rotate == 0.0
    }
}

/// Desired speed and heading for one module
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleTarget {
    pub speed: f64,
    /// Heading in (-180, 180], 0 = forward, positive = clockwise
    pub heading_deg: f64,
}

impl ModuleTarget {
    pub fn new(speed: f64, heading_deg: f64) -> Self {
        Self { speed, heading_deg }
    }
}

/// Contact point of a module relative to the robot center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelOffset {
    /// Longitudinal, positive forward
    pub x: f64,
    /// Lateral, positive right
    pub y: f64,
}

impl WheelOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fixed geometry of the four modules, indexed by [`ModulePosition`]
#[derive(Debug, Clone, PartialEq)]
pub struct WheelLayout {
    offsets: [WheelOffset; NUM_MODULES],
}

impl WheelLayout {
    /// Build a layout from offsets in [`ModulePosition::ALL`] order
    pub fn new(offsets: [WheelOffset; NUM_MODULES]) -> Result<Self, KinematicsError> {
        for position in ModulePosition::ALL {
            let WheelOffset { x, y } = offsets[position.index()];
            if !x.is_finite() || !y.is_finite() {
                return Err(KinematicsError::NonFiniteOffset { position, x, y });
            }
        }

        if is_collinear(&offsets) {
            return Err(KinematicsError::Collinear);
        }

        Ok(Self { offsets })
    }

    /// Rectangular wheelbase centred on the robot
    ///
    /// # Arguments
    /// * `length` - Front to back distance between wheel centres
    /// * `width` - Left to right distance between wheel centres
    pub fn rectangular(length: f64, width: f64) -> Result<Self, KinematicsError> {
        // Non-positive sides would mirror corners into the wrong slots
        if !(length.is_finite() && length > 0.0 && width.is_finite() && width > 0.0) {
            return Err(KinematicsError::InvalidDimensions { length, width });
        }

        let (hl, hw) = (length / 2.0, width / 2.0);
        Self::new([
            WheelOffset::new(hl, -hw),
            WheelOffset::new(hl, hw),
            WheelOffset::new(-hl, hw),
            WheelOffset::new(-hl, -hw),
        ])
    }

    pub fn offsets(&self) -> &[WheelOffset; NUM_MODULES] {
        &self.offsets
    }
}

/// True when every contact point lies on one line (coincident points included)
fn is_collinear(offsets: &[WheelOffset; NUM_MODULES]) -> bool {
    let origin = offsets[0];
    let spread = offsets
        .iter()
        .map(|o| (o.x - origin.x).hypot(o.y - origin.y))
        .fold(0.0f64, f64::max);

    if spread == 0.0 {
        return true;
    }

    let tolerance = COLLINEAR_EPSILON * spread * spread;
    for i in 1..NUM_MODULES {
        for j in (i + 1)..NUM_MODULES {
            let (ax, ay) = (offsets[i].x - origin.x, offsets[i].y - origin.y);
            let (bx, by) = (offsets[j].x - origin.x, offsets[j].y - origin.y);
            if (ax * by - ay * bx).abs() > tolerance {
                return false;
            }
        }
    }
    true
}

/// Inverse kinematics over a fixed [`WheelLayout`]
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    layout: WheelLayout,
}

impl SwerveKinematics {
    pub fn new(layout: WheelLayout) -> Self {
        Self { layout }
    }

    /// Convert chassis motion into per-module targets
    ///
    /// # Arguments
    /// * `motion` - Requested chassis motion
    /// * `held_headings` - Headings to report for any wheel left stationary, usually
    ///   the previous cycle's headings, so those wheels are not swung around
    ///
    /// # Returns
    /// One target per module, in [`ModulePosition::ALL`] order
    pub fn to_module_targets(
        &self,
        motion: ChassisMotion,
        held_headings: [f64; NUM_MODULES],
    ) -> [ModuleTarget; NUM_MODULES] {
        if motion.is_zero() {
            return held_headings.map(|heading| ModuleTarget::new(0.0, heading));
        }

        let mut targets = [ModuleTarget::default(); NUM_MODULES];
        for ((target, &WheelOffset { x, y }), held) in
            targets.iter_mut().zip(&self.layout.offsets).zip(held_headings)
        {
            // Rotation adds a tangential component scaled by the distance from centre
            let vx = motion.forward - motion.rotate * y;
            let vy = motion.strafe + motion.rotate * x;
            let speed = vx.hypot(vy);

            // A wheel on the centre of rotation has no direction to point in
            *target = if speed == 0.0 {
                ModuleTarget::new(0.0, held)
            } else {
                ModuleTarget::new(speed, wrap_deg(vy.atan2(vx).to_degrees()))
            };
        }
        targets
    }
}
