use std::{collections::VecDeque, convert::Infallible, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use embassy_time::Delay;
use embedded_hal::{digital, pwm};
use nanorand::{Rng, WyRand};
use oab_core::utils::{
    control::AvoidanceConfig,
    controllers::{DifferentialDrive, DriveTrain, Motor, ServoBuilder},
    sensors::{DistanceReading, RangeSensor},
    AvoidancePolicy, ChannelSink, TELEMETRY_CHANNEL,
};
use tracing::{error, info, trace};

#[derive(Parser)]
#[command(version = "1.0")]
struct Opts {
    /// JSON file with an `AvoidanceConfig`; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of control cycles to run
    #[arg(long, default_value_t = 20)]
    cycles: u32,
    /// Readings in cm consumed before the simulated room takes over, e.g. 25,18,10,8,22
    #[arg(long, value_delimiter = ',')]
    script: Vec<f32>,
    /// Seed for the simulated room
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Override the blocked limit (cm)
    #[arg(long)]
    blocked_cm: Option<f32>,
    /// Override the slow limit (cm)
    #[arg(long)]
    slow_cm: Option<f32>,
    /// Publish turn messages
    #[arg(long)]
    telemetry: bool,
}

/// Range sensor stand-in: replays the script, then draws random distances.
/// Roughly one draw in ten simulates a missing echo.
struct SimulatedRoom {
    script: VecDeque<f32>,
    rng: WyRand,
}

impl RangeSensor for SimulatedRoom {
    fn measure(&mut self) -> DistanceReading {
        if let Some(cm) = self.script.pop_front() {
            return DistanceReading::Measured(cm);
        }
        match self.rng.generate_range(2_u32..=100) {
            cm if cm > 90 => DistanceReading::OutOfRange,
            cm => DistanceReading::Measured(cm as f32),
        }
    }
}

/// Output pin that logs its level.
struct LogPin(&'static str);

impl digital::ErrorType for LogPin {
    type Error = Infallible;
}

impl digital::OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        trace!(pin = self.0, "low");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        trace!(pin = self.0, "high");
        Ok(())
    }
}

/// PWM channel that logs its duty cycle.
struct LogPwm {
    name: &'static str,
    max: u16,
}

impl pwm::ErrorType for LogPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for LogPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        trace!(pwm = self.name, duty, "duty");
        Ok(())
    }
}

fn load_config(opts: &Opts) -> Result<AvoidanceConfig> {
    let mut config = match &opts.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AvoidanceConfig::default(),
    };
    if let Some(cm) = opts.blocked_cm {
        config.thresholds.blocked_cm = cm;
    }
    if let Some(cm) = opts.slow_cm {
        config.thresholds.slow_cm = cm;
    }
    if opts.telemetry {
        config.telemetry.enabled = true;
    }
    Ok(config)
}

/// Stand-in for the network publisher: drain queued turn messages.
fn publish_pending(topic: &str) {
    while let Ok(payload) = TELEMETRY_CHANNEL.try_receive() {
        info!(topic, %payload, "publish");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let config = load_config(&opts)?;
    info!(?config, "starting obstacle avoidance simulation");

    let room = SimulatedRoom {
        script: opts.script.iter().copied().collect(),
        rng: WyRand::new_seed(opts.seed),
    };

    let mut servo = ServoBuilder::new(
        LogPwm {
            name: "servo",
            max: 4095,
        },
        Delay,
    )
    .set_settle_delays(config.timing.settle_delays())
    .build()
    .context("servo calibration")?;
    servo.home().context("centering sensor mount")?;

    let drive = DifferentialDrive::new(
        Motor::new(
            LogPin("in1"),
            LogPin("in2"),
            LogPwm {
                name: "en_left",
                max: 255,
            },
        ),
        Motor::new(
            LogPin("in3"),
            LogPin("in4"),
            LogPwm {
                name: "en_right",
                max: 255,
            },
        ),
        config.speeds,
    );

    let topic = config.telemetry.topic.clone();
    let mut policy = AvoidancePolicy::new(room, servo, drive, Delay, config)
        .context("invalid configuration")?
        .with_telemetry(ChannelSink);

    for cycle in 0..opts.cycles {
        match policy.run_cycle() {
            Ok(report) => info!(
                cycle,
                forward_cm = report.forward.centimeters(),
                no_echo = report.forward.is_out_of_range(),
                regime = ?report.regime,
                maneuver = ?report.maneuver,
                drive = ?policy.drive().current(),
                "cycle"
            ),
            Err(e) => error!(cycle, "cycle failed: {}", e),
        }
        publish_pending(&topic);
    }

    Ok(())
}
