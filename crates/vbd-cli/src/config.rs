use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use vbd_storage::DeviceConfig;

use crate::workload::WorkloadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "vbd",
    version,
    about = "Latency-simulating virtual block device driven by a synthetic request stream",
    group(ArgGroup::new("read_latency").args(["read_latency_us", "read_latency_ms"])),
    group(ArgGroup::new("write_latency").args(["write_latency_us", "write_latency_ms"]))
)]
pub struct Args {
    /// JSON file with device parameters (`block_size_bytes`, `total_sectors`,
    /// `target_read_latency_us`, `target_write_latency_us`, `tolerance_percent`).
    ///
    /// Flags given on the command line override values from the file.
    #[arg(long, env = "VBD_CONFIG")]
    config: Option<PathBuf>,

    /// Sector size in bytes.
    #[arg(long, env = "VBD_BLOCK_SIZE")]
    block_size: Option<u32>,

    /// Number of sectors on the device.
    #[arg(long, env = "VBD_SECTORS")]
    sectors: Option<u64>,

    /// Target read latency in microseconds.
    #[arg(long, env = "VBD_READ_LATENCY_US")]
    read_latency_us: Option<u64>,

    /// Target read latency in milliseconds.
    #[arg(long, env = "VBD_READ_LATENCY_MS")]
    read_latency_ms: Option<u64>,

    /// Target write latency in microseconds.
    #[arg(long, env = "VBD_WRITE_LATENCY_US")]
    write_latency_us: Option<u64>,

    /// Target write latency in milliseconds.
    #[arg(long, env = "VBD_WRITE_LATENCY_MS")]
    write_latency_ms: Option<u64>,

    /// Confidence band half-width as a percentage of the target latency.
    #[arg(long, env = "VBD_TOLERANCE_PERCENT")]
    tolerance_percent: Option<u32>,

    /// Number of requests to issue.
    #[arg(long, default_value_t = 100, env = "VBD_OPS")]
    ops: u64,

    /// Share of transfers that are reads (0-100).
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    read_percent: u8,

    /// Largest transfer size in sectors.
    #[arg(long, default_value_t = 8)]
    max_request_sectors: u64,

    /// Share of requests deliberately addressed past the end of the device (0-100).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    beyond_capacity_percent: u8,

    /// Seed for the request generator.
    #[arg(long, default_value_t = 0, env = "VBD_SEED")]
    seed: u64,

    /// Output format of the final report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log filter (tracing-subscriber EnvFilter syntax).
    #[arg(long, env = "VBD_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    pub workload: WorkloadConfig,
    pub format: OutputFormat,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        let mut device = match &args.config {
            Some(path) => load_device_config(path)?,
            None => DeviceConfig::default(),
        };

        if let Some(block_size) = args.block_size {
            device.block_size_bytes = block_size;
        }
        if let Some(sectors) = args.sectors {
            device.total_sectors = sectors;
        }
        if let Some(us) = latency_us(args.read_latency_us, args.read_latency_ms)? {
            device.target_read_latency_us = us;
        }
        if let Some(us) = latency_us(args.write_latency_us, args.write_latency_ms)? {
            device.target_write_latency_us = us;
        }
        if let Some(tolerance) = args.tolerance_percent {
            device.tolerance_percent = tolerance;
        }

        if args.max_request_sectors == 0 {
            bail!("--max-request-sectors must be > 0");
        }

        Ok(Self {
            device,
            workload: WorkloadConfig {
                ops: args.ops,
                read_percent: args.read_percent,
                max_request_sectors: args.max_request_sectors,
                beyond_capacity_percent: args.beyond_capacity_percent,
                seed: args.seed,
            },
            format: args.format,
            log_level: args.log_level.unwrap_or_else(|| "info".to_string()),
            log_json: args.log_json,
        })
    }
}

fn load_device_config(path: &Path) -> Result<DeviceConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read device config {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse device config {}", path.display()))
}

fn latency_us(us: Option<u64>, ms: Option<u64>) -> Result<Option<u64>> {
    match (us, ms) {
        (Some(us), _) => Ok(Some(us)),
        (None, Some(ms)) => ms
            .checked_mul(1000)
            .map(Some)
            .context("latency in milliseconds overflows microseconds"),
        (None, None) => Ok(None),
    }
}
