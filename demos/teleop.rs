// Keyboard teleop: WASD move, Z/X rotate, R/F speed, Space stop, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use swerve_zenoh_runtime::config::TOPIC_CMD_DRIVE;
use swerve_zenoh_runtime::messages::DriveCommand;

const SPEEDS: [f64; 3] = [0.3, 0.6, 1.0]; // normalized axis input
const INPUT_TIMEOUT_MS: u64 = 100; // Reset axes after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, Space=stop, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent axis state
    let mut forward = 0.0;
    let mut strafe = 0.0;
    let mut rotate = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let speed = SPEEDS[speed_idx];

                match code {
                    KeyCode::Char('w') if pressed => {
                        forward = speed;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        forward = -speed;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        strafe = -speed;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        strafe = speed;
                        last_movement_input = Instant::now();
                    }

                    // Rotation (the runtime scales this axis down)
                    KeyCode::Char('z') if pressed => {
                        rotate = -1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        rotate = 1.0;
                        last_movement_input = Instant::now();
                    }

                    KeyCode::Char(' ') if pressed => {
                        publisher.put(serde_json::to_string(&DriveCommand::Stop)?).await?;
                        forward = 0.0;
                        strafe = 0.0;
                        rotate = 0.0;
                        continue;
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(SPEEDS.len() - 1);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset axes if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            forward = 0.0;
            strafe = 0.0;
            rotate = 0.0;
        }

        // Always publish at ~50Hz
        let cmd = DriveCommand::Cartesian {
            forward,
            strafe,
            rotate,
        };
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
