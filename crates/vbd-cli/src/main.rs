#![forbid(unsafe_code)]

mod config;
mod workload;

use anyhow::{Context, Result};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use vbd_storage::{Clock, Direction, LatencyDevice};

use crate::config::{Config, OutputFormat};
use crate::workload::WorkloadSummary;

fn main() -> Result<()> {
    let cfg = Config::load()?;
    init_tracing(&cfg)?;

    let device = LatencyDevice::new(cfg.device).context("failed to initialize device")?;
    let summary = workload::run(&device, &cfg.workload);

    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        overdue = summary.overdue,
        "workload finished"
    );

    print!("{}", render_report(&device, &summary, cfg.format)?);
    Ok(())
}

fn init_tracing(cfg: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&cfg.log_level)
        .with_context(|| format!("invalid log filter `{}`", cfg.log_level))?;
    // Logs go to stderr so stdout carries only the report.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn render_report<C: Clock>(
    device: &LatencyDevice<C>,
    summary: &WorkloadSummary,
    format: OutputFormat,
) -> Result<String> {
    // One snapshot feeds the whole report.
    let stats = device.stats();
    let geometry = device.geometry();
    let classifier = device.classifier();

    match format {
        OutputFormat::Text => {
            let read = classifier.band(Direction::Read);
            let write = classifier.band(Direction::Write);
            let mut out = stats.to_string();
            out.push_str(&format!(
                "\n# geometry: cylinders={} heads={} sectors={} start={}\n",
                geometry.cylinders, geometry.heads, geometry.sectors_per_track, geometry.start
            ));
            out.push_str(&format!(
                "# bands: read=({}, {}) us write=({}, {}) us\n",
                read.lower_us, read.upper_us, write.lower_us, write.upper_us
            ));
            out.push_str(&format!(
                "# requests: completed={} failed={} beyond_capacity={} overdue={}\n",
                summary.completed, summary.failed, summary.beyond_capacity, summary.overdue
            ));
            Ok(out)
        }
        OutputFormat::Json => {
            let value = json!({
                "stats": stats,
                "geometry": {
                    "cylinders": geometry.cylinders,
                    "heads": geometry.heads,
                    "sectors": geometry.sectors_per_track,
                    "start": geometry.start,
                },
                "config": device.config(),
                "workload": summary.to_json(),
            });
            let mut out = serde_json::to_string_pretty(&value)?;
            out.push('\n');
            Ok(out)
        }
    }
}
