//! Scan reception: bytes are collected one at a time until the end byte, an
//! idle gap, or the overall deadline, whichever comes first.
//!
//! The rover stays silent for the whole sweep and only then streams its
//! records, so the idle clock starts with the first byte. Until then only the
//! overall deadline applies.

use std::io;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use rover_proto::{decode, Decoded, SCAN_END};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};
use tracing::{info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReceiveTimeouts {
    /// Longest gap between two bytes, once the first one has arrived.
    #[serde(rename = "idle_timeout_ms", with = "millis")]
    pub idle: Duration,
    /// Hard limit on the whole reception, measured from its start.
    #[serde(rename = "total_timeout_ms", with = "millis")]
    pub total: Duration,
}

impl Default for ReceiveTimeouts {
    fn default() -> Self {
        Self { idle: Duration::from_secs(1), total: Duration::from_secs(11) }
    }
}

/// Why reception stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    Terminator,
    IdleTimeout,
    TotalTimeout,
    LinkClosed,
}

#[derive(Debug, Clone)]
pub struct ScanCapture {
    /// Everything received, the end byte included when it arrived.
    pub raw: BytesMut,
    pub end: ScanEnd,
    pub elapsed: Duration,
}

impl ScanCapture {
    /// Run the record tokenizer over the buffer, however reception ended.
    pub fn decode(&self) -> Decoded {
        decode(&self.raw)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

pub async fn receive_scan<R>(io: &mut R, timeouts: ReceiveTimeouts) -> io::Result<ScanCapture>
where
    R: AsyncRead + Unpin,
{
    let start = Instant::now();
    let hard_deadline = start + timeouts.total;
    let mut raw = BytesMut::with_capacity(128);
    let mut last_byte: Option<Instant> = None;

    let end = loop {
        let deadline = last_byte.map_or(hard_deadline, |t| (t + timeouts.idle).min(hard_deadline));
        match timeout_at(deadline, io.read_u8()).await {
            Ok(Ok(b)) => {
                raw.put_u8(b);
                if b == SCAN_END {
                    break ScanEnd::Terminator;
                }
                let now = Instant::now();
                last_byte = Some(now);
                if now >= hard_deadline {
                    break ScanEnd::TotalTimeout;
                }
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break ScanEnd::LinkClosed,
            Ok(Err(e)) => return Err(e),
            Err(_) if Instant::now() >= hard_deadline => break ScanEnd::TotalTimeout,
            Err(_) => break ScanEnd::IdleTimeout,
        }
    };

    let elapsed = start.elapsed();
    trace!(raw = %hex::encode(&raw), "scan bytes");
    match end {
        ScanEnd::Terminator => info!(bytes = raw.len(), ?elapsed, "scan received"),
        other => warn!(bytes = raw.len(), ?elapsed, "scan reception ended by {:?}", other),
    }
    Ok(ScanCapture { raw, end, elapsed })
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test(start_paused = true)]
    async fn end_byte_stops_reception() {
        let (mut rover, mut console) = duplex(256);
        rover.write_all(b"o1d30s10e20qzjunk").await.unwrap();
        let cap = receive_scan(&mut console, ReceiveTimeouts::default()).await.unwrap();
        assert_eq!(cap.end, ScanEnd::Terminator);
        assert_eq!(&cap.raw[..], b"o1d30s10e20qz");
        assert_eq!(cap.decode().objects.len(), 1);
        // nothing past the end byte was consumed
        let mut rest = [0u8; 4];
        console.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"junk");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gap_returns_what_arrived() {
        let (mut rover, mut console) = duplex(256);
        let writer = tokio::spawn(async move {
            rover.write_all(b"o1d30s10e20q").await.unwrap();
            tokio::time::sleep(Duration::from_millis(800)).await;
            rover.write_all(b"o2d4").await.unwrap();
            // stay open but silent
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(rover);
        });
        let cap = receive_scan(&mut console, ReceiveTimeouts::default()).await.unwrap();
        assert_eq!(cap.end, ScanEnd::IdleTimeout);
        assert_eq!(&cap.raw[..], b"o1d30s10e20qo2d4");
        // idle is measured from the last byte, not from the start
        assert!(cap.elapsed >= Duration::from_millis(1800), "{:?}", cap.elapsed);
        assert!(cap.elapsed < Duration::from_secs(2));
        let d = cap.decode();
        assert_eq!(d.objects.len(), 1);
        assert!(!d.terminated);
        writer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn total_deadline_wins_over_a_trickle() {
        let (mut rover, mut console) = duplex(256);
        let writer = tokio::spawn(async move {
            loop {
                if rover.write_all(b"o").await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });
        let cap = receive_scan(&mut console, ReceiveTimeouts::default()).await.unwrap();
        assert_eq!(cap.end, ScanEnd::TotalTimeout);
        assert!(cap.elapsed >= Duration::from_secs(11));
        assert!(cap.elapsed < Duration::from_secs(12));
        assert!(cap.raw.len() >= 22);
        writer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_rover_waits_for_the_total_deadline() {
        let (_rover, mut console) = duplex(256);
        let cap = receive_scan(&mut console, ReceiveTimeouts::default()).await.unwrap();
        assert_eq!(cap.end, ScanEnd::TotalTimeout);
        assert!(cap.raw.is_empty());
        assert!(cap.elapsed >= Duration::from_secs(11));
        assert!(cap.elapsed < Duration::from_millis(11_100));
    }

    #[tokio::test(start_paused = true)]
    async fn long_sweep_before_the_first_byte_is_not_idle() {
        let (mut rover, mut console) = duplex(256);
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            rover.write_all(b"o1d30s10e20qz").await.unwrap();
            rover
        });
        let cap = receive_scan(&mut console, ReceiveTimeouts::default()).await.unwrap();
        assert_eq!(cap.end, ScanEnd::Terminator);
        assert!(cap.elapsed >= Duration::from_secs(3));
        let d = cap.decode();
        assert!(d.terminated);
        assert_eq!(d.objects.len(), 1);
        drop(writer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_ends_reception() {
        let (rover, mut console) = duplex(256);
        drop(rover);
        let cap = receive_scan(&mut console, ReceiveTimeouts::default()).await.unwrap();
        assert_eq!(cap.end, ScanEnd::LinkClosed);
    }
}
