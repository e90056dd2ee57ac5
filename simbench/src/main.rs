use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use simbench::{SimConfig, Simulation, Summary};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wire::InfoProtocol;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Protocol {
    Player,
    Npc,
    WorldEntity,
}

impl From<Protocol> for InfoProtocol {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Player => Self::Player,
            Protocol::Npc => Self::Npc,
            Protocol::WorldEntity => Self::WorldEntity,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "simbench",
    version,
    about = "infosync crowd simulation benchmark harness"
)]
struct Cli {
    /// JSON file with a full simulation config. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Info protocol to simulate.
    #[arg(long, value_enum)]
    protocol: Option<Protocol>,
    /// Number of avatars in the world.
    #[arg(long)]
    avatars: Option<u16>,
    /// Number of observers.
    #[arg(long)]
    observers: Option<u16>,
    /// Number of ticks to simulate.
    #[arg(long)]
    ticks: Option<u32>,
    /// RNG seed for deterministic results.
    #[arg(long)]
    seed: Option<u64>,
    /// Output directory for summary.json.
    #[arg(long, default_value = "target/simbench")]
    out_dir: PathBuf,
    /// Fail if p95 packet size exceeds this value.
    #[arg(long)]
    max_p95_packet_bytes: Option<u64>,
    /// Fail if average packet size exceeds this value.
    #[arg(long)]
    max_avg_packet_bytes: Option<u64>,
}

impl Cli {
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("parse config {}", path.display()))?
            }
            None => SimConfig::default(),
        };
        if let Some(protocol) = self.protocol {
            config.protocol = protocol.into();
        }
        if let Some(avatars) = self.avatars {
            config.avatars = avatars;
        }
        if let Some(observers) = self.observers {
            config.observers = observers;
        }
        if let Some(ticks) = self.ticks {
            config.ticks = ticks;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.sim_config()?;
    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create output dir {}", cli.out_dir.display()))?;

    let mut sim = Simulation::new(config).context("build simulation")?;
    let summary = sim.run().context("run simulation")?;

    write_summary_json(&cli.out_dir, &summary)?;
    assert_budgets(&summary, cli.max_p95_packet_bytes, cli.max_avg_packet_bytes)?;

    let limit = sim.engine().revision().max_packet_bytes as u64;
    if summary.max_packet_bytes > limit {
        anyhow::bail!(
            "largest packet {} exceeds the revision limit {}",
            summary.max_packet_bytes,
            limit
        );
    }
    info!(out_dir = %cli.out_dir.display(), "summary written");
    Ok(())
}

fn write_summary_json(out_dir: &Path, summary: &Summary) -> Result<()> {
    let path = out_dir.join("summary.json");
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn assert_budgets(summary: &Summary, max_p95: Option<u64>, max_avg: Option<u64>) -> Result<()> {
    if let Some(max_p95) = max_p95 {
        if summary.p95_packet_bytes > max_p95 {
            anyhow::bail!(
                "p95 packet bytes {} exceeds budget {}",
                summary.p95_packet_bytes,
                max_p95
            );
        }
    }
    if let Some(max_avg) = max_avg {
        if summary.avg_packet_bytes > max_avg {
            anyhow::bail!(
                "avg packet bytes {} exceeds budget {}",
                summary.avg_packet_bytes,
                max_avg
            );
        }
    }
    Ok(())
}
