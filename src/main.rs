//! Navigation test tool: run the runtime over the loopback transport,
//! build spatial memory, answer semantic queries and drive to goals.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waymark::{load_config, LoopbackTransport, Robot};
use waymark_skills::RobotHandle;
use waymark_world::Vector;

#[derive(Parser, Debug)]
#[command(name = "waymark", about = "Mobile-robot autonomy runtime")]
struct Args {
    /// Wipe spatial memory on start.
    #[arg(long)]
    new_memory: bool,

    /// Root directory of persisted spatial-memory state.
    #[arg(long)]
    spatial_memory_dir: Option<PathBuf>,

    /// Issue one semantic query, then navigate to the best match.
    #[arg(long)]
    query: Option<String>,

    /// Do not start spatial-memory ingestion.
    #[arg(long)]
    skip_build: bool,

    /// Navigate directly to odom-frame coordinates "x,y[,theta]".
    #[arg(long)]
    justgo: Option<String>,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Navigation timeout in seconds.
    #[arg(long, default_value_t = 120.0)]
    timeout: f64,
}

fn parse_justgo(raw: &str) -> anyhow::Result<(f64, f64, Option<f64>)> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        bail!("--justgo expects 'x,y' or 'x,y,theta', got '{raw}'");
    }
    let x: f64 = parts[0].parse().context("invalid x")?;
    let y: f64 = parts[1].parse().context("invalid y")?;
    let theta = match parts.get(2) {
        Some(raw_theta) => Some(raw_theta.parse::<f64>().context("invalid theta")?),
        None => None,
    };
    Ok((x, y, theta))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(dir) = &args.spatial_memory_dir {
        config.spatial_memory_dir = dir.clone();
    }

    let runtime = waymark_stream::build_runtime()?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: waymark::RuntimeConfig) -> anyhow::Result<()> {
    let transport = LoopbackTransport::new();
    let robot = Robot::start(
        config,
        &transport,
        None,
        args.new_memory,
        args.skip_build,
    )?;
    let timeout = Duration::from_secs_f64(args.timeout);

    if let Some(raw) = &args.justgo {
        let (x, y, theta) = parse_justgo(raw)?;
        info!(x, y, ?theta, "navigating directly to goal");
        let reached = robot.navigate_to(Vector::xy(x, y), theta, timeout).await;
        if reached {
            info!("goal reached");
        } else {
            warn!("goal was not reached");
        }
    } else if let Some(query) = &args.query {
        let hits = robot.memory().query_by_text(query, 5).await?;
        if hits.is_empty() {
            warn!(%query, "no matches in spatial memory");
        } else {
            for hit in &hits {
                info!(
                    id = %hit.id,
                    x = hit.metadata.pos_x,
                    y = hit.metadata.pos_y,
                    distance = hit.distance,
                    "match"
                );
            }
            let best = &hits[0];
            let goal = Vector::xy(best.metadata.pos_x, best.metadata.pos_y);
            let reached = robot
                .navigate_to(goal, Some(best.metadata.rot_z), timeout)
                .await;
            info!(reached, "semantic navigation finished");
        }
    } else {
        info!("running until interrupted; building spatial memory");
        tokio::signal::ctrl_c().await?;
        info!("interrupt received");
    }

    robot.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn justgo_parses_two_and_three_fields() {
        assert_eq!(parse_justgo("1.5,2.0").unwrap(), (1.5, 2.0, None));
        assert_eq!(
            parse_justgo("1.5, 2.0, 0.7").unwrap(),
            (1.5, 2.0, Some(0.7))
        );
        assert!(parse_justgo("1.5").is_err());
        assert!(parse_justgo("a,b").is_err());
    }
}
