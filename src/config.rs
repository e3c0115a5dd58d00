// Timeouts, topics, drive configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::swerve::{
    DriveError, EncoderScaling, InputShaping, KinematicsError, NUM_MODULES, PidError, PidGains,
    WheelLayout,
};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;
pub const MAX_LOOP_HZ: u64 = 1000;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "swerve/cmd/drive"; // commands
pub const TOPIC_STATE_STEER: &str = "swerve/state/steer"; // steering encoder counts
pub const TOPIC_RT_MODULES: &str = "swerve/rt/modules"; // actuation
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

// Steering hardware: 71:1 reduction, 40 to 48 increase, 7 pulse encoder
pub const STEER_GEAR_RATIO: f64 = (1.0 / 71.0) * (48.0 / 40.0);
pub const ENCODER_PULSES_PER_REV: f64 = 7.0;

// Top steering rate of the simulated plant at full output
pub const SIM_MAX_STEER_RATE_DEG_S: f64 = 360.0;

/// Configuration errors, all raised before the loop starts
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid wheel layout: {0}")]
    Layout(#[from] KinematicsError),

    #[error("Invalid drive setup: {0}")]
    Drive(#[from] DriveError),

    #[error("Invalid steering loop: {0}")]
    Steering(#[from] PidError),

    #[error("Invalid encoder scaling: {pulses_per_rev} pulses/rev, gear ratio {gear_ratio}")]
    Encoder { pulses_per_rev: f64, gear_ratio: f64 },

    #[error("Loop rate must be between 1 and {max} Hz, got {0} Hz", max = MAX_LOOP_HZ)]
    LoopRate(u64),
}

/// Per-module wiring flags
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleWiring {
    pub drive_inverted: bool,
    pub steer_inverted: bool,
    pub encoder_reversed: bool,
}

/// Robot-specific drive parameters, fixed once the drive is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Left to right distance between wheel centres
    pub robot_width: f64,
    /// Front to back distance between wheel centres
    pub robot_length: f64,
    pub steering: PidGains,
    pub shaping: InputShaping,
    pub encoder_pulses_per_rev: f64,
    pub steer_gear_ratio: f64,
    /// Front-left, front-right, rear-right, rear-left
    pub modules: [ModuleWiring; NUM_MODULES],
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            robot_width: 1.0,
            robot_length: 1.0,
            steering: PidGains::default(),
            shaping: InputShaping::default(),
            encoder_pulses_per_rev: ENCODER_PULSES_PER_REV,
            steer_gear_ratio: STEER_GEAR_RATIO,
            modules: [ModuleWiring::default(); NUM_MODULES],
        }
    }
}

impl DriveConfig {
    /// Load a JSON config; missing fields fall back to the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout()?;
        self.shaping.validate()?;
        self.steering.validate()?;
        if !self.encoder_scaling().is_valid() {
            return Err(ConfigError::Encoder {
                pulses_per_rev: self.encoder_pulses_per_rev,
                gear_ratio: self.steer_gear_ratio,
            });
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<WheelLayout, KinematicsError> {
        WheelLayout::rectangular(self.robot_length, self.robot_width)
    }

    pub fn encoder_scaling(&self) -> EncoderScaling {
        EncoderScaling {
            pulses_per_rev: self.encoder_pulses_per_rev,
            gear_ratio: self.steer_gear_ratio,
        }
    }
}
