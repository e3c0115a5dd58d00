// Fixed-rate control loop with watchdog
// Note: a watchdog is a safety mechanism that triggers a safe action if something goes wrong
// Eg. without it if teleop crashes and stops sending commands, the base would keep driving on the last one

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

// local imports
use crate::config::{
    ConfigError, DriveConfig, MAX_LOOP_HZ, SIM_MAX_STEER_RATE_DEG_S, TOPIC_CMD_DRIVE, TOPIC_HEALTH,
    TOPIC_RT_MODULES, TOPIC_STATE_STEER,
};
use crate::messages::{DriveCommand, ModuleActuation, RuntimeHealth, SteerFeedback};
use crate::sim::SteeringPlant;
use crate::swerve::{
    ModulePosition, NUM_MODULES, PercentOutput, QuadratureEncoder, SignalCell, SwerveDrive,
    SwerveModule,
};

/// Drive wired to the runtime's signal cells
pub type RuntimeDrive = SwerveDrive<PercentOutput, PercentOutput, QuadratureEncoder>;

/// Signal cells shared between the modules and the transport
#[derive(Debug, Clone, Default)]
pub struct ModuleIo {
    pub drive: [SignalCell; NUM_MODULES],
    pub steer: [SignalCell; NUM_MODULES],
    pub counts: [SignalCell; NUM_MODULES],
}

impl ModuleIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what the modules last wrote to their motors
    pub fn actuation(&self) -> ModuleActuation {
        ModuleActuation {
            drive: self.drive.each_ref().map(SignalCell::get),
            steer: self.steer.each_ref().map(SignalCell::get),
        }
    }

    pub fn apply_feedback(&self, feedback: &SteerFeedback) {
        for (cell, &counts) in self.counts.iter().zip(&feedback.counts) {
            cell.store(counts);
        }
    }
}

/// Build the four modules and the drive on top of `io`
pub fn build_drive(config: &DriveConfig, io: &ModuleIo, dt: f64) -> Result<RuntimeDrive, ConfigError> {
    config.validate()?;
    let scaling = config.encoder_scaling();

    let [front_left, front_right, rear_right, rear_left] = ModulePosition::ALL.map(|position| {
        let i = position.index();
        let wiring = config.modules[i];
        SwerveModule::new(
            position,
            PercentOutput::new(io.drive[i].clone(), wiring.drive_inverted),
            PercentOutput::new(io.steer[i].clone(), wiring.steer_inverted),
            QuadratureEncoder::new(io.counts[i].clone(), scaling, wiring.encoder_reversed),
            config.steering,
            dt,
        )
    });

    Ok(SwerveDrive::new(
        front_left?,
        front_right?,
        rear_right?,
        rear_left?,
        config.layout()?,
        config.shaping,
    )?)
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub loop_hz: u64,
    pub cmd_timeout: Duration,
    /// Close the steering loop through the simulated plant instead of the bridge
    pub simulate: bool,
}

pub struct Runtime {
    drive: RuntimeDrive,
    io: ModuleIo,
    plant: Option<SteeringPlant>,
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    cmd_timeout: Duration,
    health: RuntimeHealth,
    dt: f64,
    period: Duration,
}

impl Runtime {
    pub fn new(config: &DriveConfig, options: RuntimeOptions) -> Result<Self, ConfigError> {
        if !(1..=MAX_LOOP_HZ).contains(&options.loop_hz) {
            return Err(ConfigError::LoopRate(options.loop_hz));
        }
        let dt = 1.0 / options.loop_hz as f64;
        // The tick must match the step size the steering loop integrates with
        let period = Duration::from_secs_f64(dt);

        let io = ModuleIo::new();
        let plant = options
            .simulate
            .then(|| SteeringPlant::new(config, &io, SIM_MAX_STEER_RATE_DEG_S));
        let drive = build_drive(config, &io, dt)?;

        Ok(Self {
            drive,
            io,
            plant,
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            cmd_timeout: options.cmd_timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
            dt,
            period,
        })
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: DriveCommand) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Process steering feedback from the hardware bridge
    fn on_feedback(&mut self, feedback: SteerFeedback) {
        if self.plant.is_some() {
            return;
        }
        self.io.apply_feedback(&feedback);
    }

    /// Run one control cycle and return what was written to the motors
    pub fn step(&mut self) -> ModuleActuation {
        let cmd_age = self.cmd_received_at.elapsed();

        let cmd = match self.latest_cmd {
            Some(cmd) if cmd_age <= self.cmd_timeout => {
                if self.health != RuntimeHealth::Ok {
                    info!("Commands flowing, driving");
                }
                self.health = RuntimeHealth::Ok;
                cmd
            }
            latest => {
                // Watchdog triggered (or nothing received yet) - stop the wheels
                if self.health != RuntimeHealth::CmdStale && latest.is_some() {
                    warn!("Command stale ({:?} old), stopping robot", cmd_age);
                }
                self.health = RuntimeHealth::CmdStale;
                DriveCommand::Stop
            }
        };

        match cmd {
            DriveCommand::Cartesian {
                forward,
                strafe,
                rotate,
            } => self.drive.drive(forward, strafe, rotate),
            DriveCommand::Polar {
                direction_deg,
                magnitude,
                rotate,
            } => self.drive.drive_polar(direction_deg, magnitude, rotate),
            DriveCommand::Stop => self.drive.stop(),
        };

        if let Some(plant) = self.plant.as_mut() {
            plant.step(self.dt);
        }

        self.io.actuation()
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Wall-clock period of one control cycle
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn drive_mut(&mut self) -> &mut RuntimeDrive {
        &mut self.drive
    }
}

pub async fn run(
    config: DriveConfig,
    options: RuntimeOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut runtime = Runtime::new(&config, options)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_steer = session.declare_subscriber(TOPIC_STATE_STEER).await?;
    let pub_actuation = session.declare_publisher(TOPIC_RT_MODULES).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(runtime.period());

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, {}",
        options.loop_hz,
        options.cmd_timeout.as_millis(),
        if options.simulate {
            "simulated steering"
        } else {
            "hardware steering"
        }
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_DRIVE, TOPIC_STATE_STEER);
    info!("Publishing to: {}, {}", TOPIC_RT_MODULES, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain pending steering feedback, keep latest
        while let Ok(Some(sample)) = sub_steer.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<SteerFeedback>(&payload) {
                Ok(feedback) => runtime.on_feedback(feedback),
                Err(e) => warn!("Failed to parse steering feedback: {}", e),
            }
        }

        // 2. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 3. Run the drive (includes watchdog logic)
        let actuation = runtime.step();

        // 4. Publish actuation
        let actuation_json = serde_json::to_string(&actuation)?;
        pub_actuation.put(actuation_json).await?;

        // 5. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CMD_TIMEOUT, LOOP_HZ, ModuleWiring};

    fn options(simulate: bool) -> RuntimeOptions {
        RuntimeOptions {
            loop_hz: LOOP_HZ,
            cmd_timeout: CMD_TIMEOUT,
            simulate,
        }
    }

    #[test]
    fn test_no_command_stays_stopped() {
        let mut runtime = Runtime::new(&DriveConfig::default(), options(false)).unwrap();
        let actuation = runtime.step();
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
        assert_eq!(actuation.drive, [0.0; NUM_MODULES]);
    }

    #[test]
    fn test_fresh_command_drives() {
        let mut runtime = Runtime::new(&DriveConfig::default(), options(false)).unwrap();
        runtime.on_command(DriveCommand::Cartesian {
            forward: 1.0,
            strafe: 0.0,
            rotate: 0.0,
        });
        let actuation = runtime.step();
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
        for drive in actuation.drive {
            assert!((drive - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_stale_command_stops() {
        let mut runtime = Runtime::new(&DriveConfig::default(), options(false)).unwrap();
        runtime.on_command(DriveCommand::Cartesian {
            forward: 0.5,
            strafe: 0.0,
            rotate: 0.0,
        });
        runtime.step();

        runtime.cmd_received_at = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap();
        let actuation = runtime.step();
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
        assert_eq!(actuation.drive, [0.0; NUM_MODULES]);
    }

    #[test]
    fn test_feedback_reaches_modules() {
        let config = DriveConfig::default();
        let mut runtime = Runtime::new(&config, options(false)).unwrap();
        let dpp = config.encoder_scaling().degrees_per_pulse();

        runtime.on_feedback(SteerFeedback {
            counts: [30.0 / dpp, 0.0, 0.0, -45.0 / dpp],
        });
        let drive = runtime.drive_mut();
        let fl = drive.module_mut(ModulePosition::FrontLeft).measured_heading();
        let rl = drive.module_mut(ModulePosition::RearLeft).measured_heading();
        assert!((fl - 30.0).abs() < 1e-9);
        assert!((rl + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_drive_motor() {
        let mut config = DriveConfig::default();
        config.modules[1] = ModuleWiring {
            drive_inverted: true,
            ..ModuleWiring::default()
        };
        let mut runtime = Runtime::new(&config, options(false)).unwrap();
        runtime.on_command(DriveCommand::Cartesian {
            forward: 0.5,
            strafe: 0.0,
            rotate: 0.0,
        });
        let actuation = runtime.step();
        assert_eq!(actuation.drive, [0.5, -0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_zero_loop_rate_rejected() {
        let opts = RuntimeOptions {
            loop_hz: 0,
            ..options(false)
        };
        assert!(matches!(
            Runtime::new(&DriveConfig::default(), opts),
            Err(ConfigError::LoopRate(0))
        ));
    }

    #[test]
    fn test_tick_period_matches_step_size() {
        for loop_hz in [50, 300, 600, MAX_LOOP_HZ] {
            let opts = RuntimeOptions {
                loop_hz,
                ..options(false)
            };
            let runtime = Runtime::new(&DriveConfig::default(), opts).unwrap();
            let expected = 1.0 / loop_hz as f64;
            assert!(
                (runtime.period().as_secs_f64() - expected).abs() < 1e-9,
                "{} Hz ticks every {:?}",
                loop_hz,
                runtime.period()
            );
            assert_eq!(runtime.dt, expected);
        }
    }

    #[test]
    fn test_simulated_modules_converge() {
        let mut config = DriveConfig::default();
        config.modules[3] = ModuleWiring {
            steer_inverted: true,
            encoder_reversed: true,
            drive_inverted: false,
        };
        let mut runtime = Runtime::new(&config, options(true)).unwrap();

        for _ in 0..100 {
            runtime.on_command(DriveCommand::Polar {
                direction_deg: 60.0,
                magnitude: 0.5,
                rotate: 0.0,
            });
            runtime.step();
        }

        for position in ModulePosition::ALL {
            let heading = runtime.drive_mut().module_mut(position).measured_heading();
            assert!(
                (heading - 60.0).abs() < 0.01,
                "{} settled at {}",
                position,
                heading
            );
        }
    }
}
