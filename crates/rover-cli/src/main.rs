mod render;
mod sim;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use rover_console::history::HistoryConfig;
use rover_console::{doctor, CommandRouter, ConsoleConfig, Connector, LinkConfig, Response, ScanConfig, SerialConnector};
use rover_fw::sim::SimConfig;
use rover_fw::FwConfig;

use crate::sim::SimConnector;

#[derive(Debug, Parser)]
#[command(name = "rover", version, about = "Ground console for the scanning rover")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Operate the rover over the configured serial device.
    Console,
    /// Operate a simulated rover running in this process.
    Sim,
    /// Check the configuration and exit.
    Doctor,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    link: LinkConfig,
    scan: ScanConfig,
    history: HistoryConfig,

    sim: SimConfig,
    firmware: FwConfig,
}

impl Config {
    fn console(&self) -> ConsoleConfig {
        ConsoleConfig { link: self.link.clone(), scan: self.scan.clone(), history: self.history }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor_cmd(&cfg),
        Command::Console => {
            let connector = SerialConnector { device: cfg.link.device.clone(), baud: cfg.link.baud };
            operate(CommandRouter::new(connector, cfg.console())).await
        }
        Command::Sim => {
            let connector = SimConnector::new(cfg.sim.clone(), cfg.firmware.clone());
            operate(CommandRouter::new(connector, cfg.console())).await
        }
    }
}

fn doctor_cmd(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    doctor::check_all(&cfg.console())?;
    anyhow::ensure!(cfg.firmware.motion.drive_poll_ms > 0, "firmware.motion.drive_poll_ms must be > 0");
    anyhow::ensure!(cfg.firmware.motion.rotate_poll_ms > 0, "firmware.motion.rotate_poll_ms must be > 0");
    for o in &cfg.sim.obstacles {
        anyhow::ensure!(o.center_deg < 180, "sim obstacle center_deg {} outside the sweep", o.center_deg);
    }
    info!("doctor: OK");
    println!("OK");
    Ok(())
}

/// The operator loop: one line in, one command run to completion, output out.
async fn operate<C: Connector>(mut router: CommandRouter<C>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(b"type `help` for commands\n").await?;
    loop {
        stdout.write_all(prompt(&router).as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("read operator input")? else {
            info!("input closed");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let out = match router.execute_line(&line).await {
            Ok(Response::Quit) => return Ok(()),
            Ok(resp) => render::response(&resp, router.timer()),
            Err(e) => {
                warn!("{}", e);
                render::error(&e)
            }
        };
        stdout.write_all(out.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
}

fn prompt<C: Connector>(router: &CommandRouter<C>) -> String {
    let timer = router.timer();
    if timer.is_running() {
        format!("[{}] {}> ", timer, router.history().next_index())
    } else {
        format!("{}> ", router.history().next_index())
    }
}
