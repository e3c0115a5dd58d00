// Simulated steering plant
//
// Stands in for the steering hardware when no bridge is attached: integrates
// each steer motor's output into a module angle and writes the matching
// encoder counts back, honouring the configured inversion flags.

use crate::config::DriveConfig;
use crate::runtime::ModuleIo;
use crate::swerve::{NUM_MODULES, QuadratureEncoder, SignalCell};

struct SimModule {
    heading_deg: f64,
    steer: SignalCell,
    counts: SignalCell,
    steer_inverted: bool,
    encoder: QuadratureEncoder,
}

pub struct SteeringPlant {
    modules: Vec<SimModule>,
    max_rate_deg_s: f64,
}

impl SteeringPlant {
    pub fn new(config: &DriveConfig, io: &ModuleIo, max_rate_deg_s: f64) -> Self {
        let scaling = config.encoder_scaling();
        let modules = (0..NUM_MODULES)
            .map(|i| {
                let wiring = config.modules[i];
                let encoder =
                    QuadratureEncoder::new(io.counts[i].clone(), scaling, wiring.encoder_reversed);
                io.counts[i].store(encoder.counts_for(0.0));
                SimModule {
                    heading_deg: 0.0,
                    steer: io.steer[i].clone(),
                    counts: io.counts[i].clone(),
                    steer_inverted: wiring.steer_inverted,
                    encoder,
                }
            })
            .collect();

        Self {
            modules,
            max_rate_deg_s,
        }
    }

    /// Advance every module by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        for module in &mut self.modules {
            let output = module.steer.get().clamp(-1.0, 1.0);
            // An inverted motor is wired backwards, so the physical turn undoes the flip
            let output = if module.steer_inverted { -output } else { output };
            module.heading_deg += output * self.max_rate_deg_s * dt;
            module.counts.store(module.encoder.counts_for(module.heading_deg));
        }
    }

    /// Simulated (unwrapped) module angles
    pub fn headings(&self) -> Vec<f64> {
        self.modules.iter().map(|m| m.heading_deg).collect()
    }
}
