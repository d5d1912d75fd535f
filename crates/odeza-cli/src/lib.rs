//! # Odeza Warper CLI
//!
//! Command-line driver for the Odeza root-motion warping engine.
//!
//! ## Commands
//! - `simulate` - Play a scenario tick by tick and print the final placement
//! - `validate` - Check a scenario and list its warp windows

pub mod scenario;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use odeza_core::Transform;
use odeza_warp::{ModifierConfig, MotionWarper, TickInput, WarpConfig};
use serde::Serialize;

pub use scenario::Scenario;

/// Odeza root-motion warping simulator
#[derive(Parser)]
#[command(name = "odeza-warper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario through the warper
    Simulate {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Engine configuration file (JSON), overriding the scenario's own
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Include every tick in the output
        #[arg(long)]
        trace: bool,
    },

    /// Validate a scenario without running it
    Validate {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

/// One simulated tick
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub time: f32,
    pub original: Transform,
    pub warped: Transform,
    pub actor: Transform,
    pub visual_root: Vec3,
}

/// Outcome of a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: usize,
    pub final_actor: Transform,
    pub final_visual_root: Vec3,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TickRecord>,
}

fn load_config(path: &Path) -> Result<WarpConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Play `scenario` from its start to its end time
pub fn run_simulation(scenario: &Scenario, config: WarpConfig, trace: bool) -> Result<SimulationReport> {
    scenario.validate()?;
    let clip = scenario.build_clip()?;
    let scene = scenario.build_scene();

    let mut warper = MotionWarper::new(config).context("Invalid warp configuration")?;
    for target in scenario.build_targets(&scene)? {
        warper.add_or_update_warp_target(target);
    }

    let mut avatar = scenario.avatar.clone();
    let delta_seconds = 1.0 / scenario.tick_rate;
    let step = delta_seconds * scenario.play_rate;
    let end = scenario.end_time();
    let mut previous = scenario.start_time;
    let mut ticks = 0usize;
    let mut records = Vec::new();

    while previous < end {
        // Positions are computed from the start so rounding does not accumulate
        let current = (scenario.start_time + (ticks + 1) as f32 * step).min(end);
        let input = TickInput::playing(&clip, previous, current, delta_seconds).with_play_rate(scenario.play_rate);
        let output = warper.tick(&input, avatar.as_avatar(), &scene);
        avatar.apply_local_root_motion(&output.root_motion);
        ticks += 1;

        if trace {
            records.push(TickRecord {
                time: current,
                original: output.original,
                warped: output.root_motion,
                actor: avatar.as_avatar().actor_transform(),
                visual_root: avatar.as_avatar().visual_root_location(),
            });
        }
        previous = current;
    }

    let placed = avatar.as_avatar();
    Ok(SimulationReport {
        ticks,
        final_actor: placed.actor_transform(),
        final_visual_root: placed.visual_root_location(),
        trace: records,
    })
}

fn validate_scenario(scenario: &Scenario) -> Result<()> {
    scenario.validate()?;
    let clip = scenario.build_clip()?;
    let scene = scenario.build_scene();
    let targets = scenario.build_targets(&scene)?;

    log::info!(
        "Clip '{}': {:.3}s, {} warp window(s)",
        clip.name(),
        clip.length(),
        clip.warp_windows().len()
    );
    for window in clip.warp_windows() {
        let (start, end) = window.clamped(clip.length());
        match &window.modifier {
            Some(ModifierConfig::Warp(settings)) => {
                log::info!("  [{start:.3}, {end:.3}] warp -> '{}'", settings.target_name);
                if !targets.iter().any(|target| target.name() == settings.target_name) {
                    log::warn!("  Warp target '{}' is not registered by the scenario", settings.target_name);
                }
            }
            Some(ModifierConfig::Scale(settings)) => log::info!("  [{start:.3}, {end:.3}] scale {}", settings.scale),
            None => log::warn!("  [{start:.3}, {end:.3}] has no modifier configured"),
        }
    }
    log::info!("Scenario is valid");
    Ok(())
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match cli.command {
        Commands::Simulate {
            scenario,
            config,
            trace,
        } => {
            let loaded = Scenario::load(&scenario)?;
            let config = match config {
                Some(path) => load_config(&path)?,
                None => loaded.config.clone().unwrap_or_default(),
            };
            log::info!("Simulating {}...", scenario.display());
            let report = run_simulation(&loaded, config, trace)?;
            log::info!("Simulated {} tick(s)", report.ticks);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Validate { scenario } => {
            let loaded = Scenario::load(&scenario)?;
            validate_scenario(&loaded)?;
        }
    }

    Ok(())
}
