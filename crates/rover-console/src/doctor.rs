use anyhow::Result;

use crate::{ConsoleConfig, LinkConfig, ScanConfig};
use crate::history::HistoryConfig;

pub fn check_link(link: &LinkConfig) -> Result<()> {
    anyhow::ensure!(!link.device.trim().is_empty(), "link.device missing");
    anyhow::ensure!(link.baud > 0, "link.baud invalid");
    if link.baud != 57_600 {
        tracing::warn!(baud = link.baud, "rover firmware runs at 57600 baud");
    }
    anyhow::ensure!(!link.handshake_timeout.is_zero(), "link.handshake_timeout_ms must be > 0");
    anyhow::ensure!(!link.response_timeout.is_zero(), "link.response_timeout_ms must be > 0");
    Ok(())
}

pub fn check_scan(scan: &ScanConfig) -> Result<()> {
    let t = &scan.timeouts;
    anyhow::ensure!(!t.idle.is_zero(), "scan.idle_timeout_ms must be > 0");
    anyhow::ensure!(t.idle < t.total, "scan.idle_timeout_ms must be shorter than scan.total_timeout_ms");
    anyhow::ensure!((1..=9).contains(&scan.default_averages), "scan.default_averages should be 1..9");
    Ok(())
}

pub fn check_history(history: &HistoryConfig) -> Result<()> {
    anyhow::ensure!(history.capacity >= 10, "history.capacity too small");
    Ok(())
}

pub fn check_all(cfg: &ConsoleConfig) -> Result<()> {
    check_link(&cfg.link)?;
    check_scan(&cfg.scan)?;
    check_history(&cfg.history)?;
    Ok(())
}
