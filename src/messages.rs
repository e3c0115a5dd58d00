// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::swerve::NUM_MODULES;

// Command from teleop/scripts -> runtime
// Tagged by "mode", e.g. {"mode": "cartesian", "forward": 0.5, "strafe": 0.0, "rotate": 0.0}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DriveCommand {
    Cartesian {
        forward: f64,
        strafe: f64,
        rotate: f64,
    },
    Polar {
        direction_deg: f64,
        magnitude: f64,
        #[serde(default)]
        rotate: f64,
    },
    Stop,
}

// Steering encoder counts from the hardware bridge -> runtime
// Module order: front-left, front-right, rear-right, rear-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteerFeedback {
    pub counts: [f64; NUM_MODULES],
}

// Actuation output from runtime -> hardware bridge
// Normalized motor outputs, same module order as SteerFeedback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ModuleActuation {
    pub drive: [f64; NUM_MODULES],
    pub steer: [f64; NUM_MODULES],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
