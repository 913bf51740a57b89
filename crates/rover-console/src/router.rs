//! Operator commands in, wire messages out.
//!
//! One command runs at a time and holds the link for its whole duration. Each
//! wire message knows what answer to expect, and the router waits for exactly
//! that: one outcome byte, a record stream, or nothing.

use std::future::Future;

use rover_proto::{decode, Decoded, MoveDirection, MotionOutcome, ResponseShape, ScanMode, WireMessage, MAX_MAGNITUDE};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialStream;
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::history::{EntryKind, HistoryEntry, HistoryLog};
use crate::link::{open_serial, RoverLink};
use crate::receive::ScanEnd;
use crate::timer::MissionTimer;
use crate::ConsoleConfig;

/// How many entries `history` lists.
pub const HISTORY_PAGE: usize = 20;

pub const HELP: &str = "\
connect            open the link and handshake with the rover
forward ###        drive forward ### cm, stops on any trip sensor
reverse ###        back up ### cm, ignores trip sensors
left ###           turn ### degrees counter-clockwise
right ###          turn ### degrees clockwise
scan [#|f]         full scan with # averages (default from config), f for IR-only
printscan N        redraw the scan stored at history entry N
victory            play the completion tune
history            list recent history
clearbuff          discard anything waiting on the link
start              start the 15 minute mission timer
clear              clear the screen
help               this text
quit               leave";

/// Opens the byte stream the router talks over.
pub trait Connector {
    type Io: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&mut self) -> impl Future<Output = Result<Self::Io, ConsoleError>> + Send;

    /// Shown in logs and error messages.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub device: String,
    pub baud: u32,
}

impl Connector for SerialConnector {
    type Io = SerialStream;

    async fn connect(&mut self) -> Result<SerialStream, ConsoleError> {
        open_serial(&self.device, self.baud)
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.device, self.baud)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Connect,
    Move { direction: MoveDirection, magnitude: u16 },
    /// `averages: None` means the configured default.
    Scan { mode: ScanMode, averages: Option<u8> },
    PrintScan(usize),
    Victory,
    History,
    ClearBuffer,
    Start,
    Clear,
    Help,
    Quit,
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ConsoleError::UnknownCommand(String::new()));
        };
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(ConsoleError::UnknownCommand(format!("{line} ({extra:?} unexpected)")));
        }

        let cmd = match (verb, arg) {
            ("connect", None) => OperatorCommand::Connect,
            ("forward", a) => move_cmd("forward", MoveDirection::Forward, a)?,
            ("reverse", a) => move_cmd("reverse", MoveDirection::Reverse, a)?,
            ("left", a) => move_cmd("left", MoveDirection::RotateLeft, a)?,
            ("right", a) => move_cmd("right", MoveDirection::RotateRight, a)?,
            ("scan", None) => OperatorCommand::Scan { mode: ScanMode::Full, averages: None },
            ("scan", Some("f")) => OperatorCommand::Scan { mode: ScanMode::Fast, averages: Some(1) },
            ("scan", Some(a)) => match a.parse::<u8>() {
                Ok(n) if n <= 9 => OperatorCommand::Scan { mode: ScanMode::Full, averages: Some(n) },
                _ => return Err(usage("scan", "expects a single digit or `f`")),
            },
            ("printscan", Some(a)) => {
                OperatorCommand::PrintScan(a.parse().map_err(|_| usage("printscan", "expects an entry number"))?)
            }
            ("printscan", None) => return Err(usage("printscan", "expects an entry number")),
            ("victory", None) => OperatorCommand::Victory,
            ("history", None) => OperatorCommand::History,
            ("clearbuff", None) => OperatorCommand::ClearBuffer,
            ("start", None) => OperatorCommand::Start,
            ("clear", None) => OperatorCommand::Clear,
            ("help", None) => OperatorCommand::Help,
            ("quit", None) => OperatorCommand::Quit,
            _ => return Err(ConsoleError::UnknownCommand(line.trim().to_string())),
        };
        Ok(cmd)
    }
}

fn usage(command: &'static str, reason: &str) -> ConsoleError {
    ConsoleError::Usage { command, reason: reason.to_string() }
}

fn move_cmd(name: &'static str, direction: MoveDirection, arg: Option<&str>) -> Result<OperatorCommand, ConsoleError> {
    let arg = arg.ok_or_else(|| usage(name, "expects a distance or angle"))?;
    let magnitude = arg
        .parse::<u16>()
        .ok()
        .filter(|m| *m <= MAX_MAGNITUDE)
        .ok_or_else(|| usage(name, "expects a number from 0 to 999"))?;
    Ok(OperatorCommand::Move { direction, magnitude })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    /// Open, but the rover never acknowledged the handshake.
    Degraded,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub mode: ScanMode,
    pub end: ScanEnd,
    pub decoded: Decoded,
    /// History entry holding the raw text.
    pub entry: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum Response {
    Connected,
    /// Sent, nothing to wait for.
    Sent(WireMessage),
    Moved { direction: MoveDirection, outcome: MotionOutcome },
    Scan(ScanReport),
    Replay { entry: usize, decoded: Decoded },
    History(Vec<HistoryEntry>),
    Flushed(usize),
    TimerStarted,
    Clear,
    Help,
    Quit,
}

pub struct CommandRouter<C: Connector> {
    connector: C,
    link: Option<RoverLink<C::Io>>,
    state: LinkState,
    config: ConsoleConfig,
    history: HistoryLog,
    timer: MissionTimer,
}

impl<C: Connector> CommandRouter<C> {
    pub fn new(connector: C, config: ConsoleConfig) -> Self {
        let history = HistoryLog::with_capacity(config.history.capacity);
        Self { connector, link: None, state: LinkState::Disconnected, config, history, timer: MissionTimer::default() }
    }

    pub fn link_state(&self) -> LinkState {
        self.state
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn timer(&self) -> &MissionTimer {
        &self.timer
    }

    /// Record the operator's line, then parse and run it.
    pub async fn execute_line(&mut self, line: &str) -> Result<Response, ConsoleError> {
        let line = line.trim();
        self.record(EntryKind::Command, line);
        let cmd = OperatorCommand::parse(line)?;
        self.execute(cmd).await
    }

    pub async fn execute(&mut self, cmd: OperatorCommand) -> Result<Response, ConsoleError> {
        debug!(?cmd, "execute");
        match cmd {
            OperatorCommand::Connect => self.connect().await,
            OperatorCommand::Move { direction, magnitude } => {
                self.send_and_await(WireMessage::Move { direction, magnitude }).await
            }
            OperatorCommand::Scan { mode, averages } => {
                let averages = averages.unwrap_or(self.config.scan.default_averages);
                self.send_and_await(WireMessage::ScanRequest { mode, averages }).await
            }
            OperatorCommand::Victory => self.send_and_await(WireMessage::Tone).await,
            OperatorCommand::PrintScan(n) => self.replay(n),
            OperatorCommand::History => Ok(Response::History(self.history.recent(HISTORY_PAGE).cloned().collect())),
            OperatorCommand::ClearBuffer => Ok(Response::Flushed(self.link()?.drain().await?)),
            OperatorCommand::Start => {
                self.timer.start();
                info!("mission timer started");
                Ok(Response::TimerStarted)
            }
            OperatorCommand::Clear => Ok(Response::Clear),
            OperatorCommand::Help => Ok(Response::Help),
            OperatorCommand::Quit => Ok(Response::Quit),
        }
    }

    async fn connect(&mut self) -> Result<Response, ConsoleError> {
        self.link = None;
        self.state = LinkState::Disconnected;
        let target = self.connector.describe();
        let io = self.connector.connect().await.map_err(|e| {
            warn!(%target, "connect failed: {}", e);
            e
        })?;
        let mut link = RoverLink::new(io);
        let res = link.handshake(self.config.link.handshake_timeout).await;
        self.link = Some(link);
        match res {
            Ok(()) => {
                self.state = LinkState::Connected;
                info!(%target, "connected");
                Ok(Response::Connected)
            }
            Err(e @ ConsoleError::Handshake { .. }) => {
                self.state = LinkState::Degraded;
                Err(e)
            }
            Err(e) => {
                self.link = None;
                Err(e)
            }
        }
    }

    fn link(&mut self) -> Result<&mut RoverLink<C::Io>, ConsoleError> {
        self.link.as_mut().ok_or(ConsoleError::NotConnected)
    }

    async fn send_and_await(&mut self, msg: WireMessage) -> Result<Response, ConsoleError> {
        let response_timeout = self.config.link.response_timeout;
        let scan_timeouts = self.config.scan.timeouts;
        let link = self.link()?;
        link.send(&msg).await?;

        match (msg.response_shape(), msg) {
            (ResponseShape::Nothing, msg) => Ok(Response::Sent(msg)),
            (ResponseShape::SingleByte, WireMessage::Move { direction, .. }) => {
                let code = link.read_byte(response_timeout).await?.ok_or(ConsoleError::ResponseTimeout(response_timeout))?;
                let outcome = MotionOutcome::from_code(code)?;
                if outcome.is_success() {
                    info!(?direction, "move complete");
                } else {
                    warn!(?direction, code, "move ended: {}", outcome);
                    self.record(EntryKind::Outcome, outcome.label());
                }
                Ok(Response::Moved { direction, outcome })
            }
            (ResponseShape::RecordStream, WireMessage::ScanRequest { mode, .. }) => {
                let capture = link.receive_scan(scan_timeouts).await?;
                if matches!(capture.end, ScanEnd::IdleTimeout | ScanEnd::TotalTimeout) {
                    let dropped = link.discard_scan_tail(scan_timeouts.idle).await?;
                    if dropped > 0 {
                        warn!(bytes = dropped, "late scan bytes discarded");
                    }
                }
                let decoded = capture.decode();
                for err in &decoded.errors {
                    warn!("scan frame: {}", err);
                }
                let entry = self.record(EntryKind::ScanText, capture.text());
                Ok(Response::Scan(ScanReport { mode, end: capture.end, decoded, entry }))
            }
            (shape, msg) => {
                warn!(?shape, ?msg, "no handler for this response shape");
                Ok(Response::Sent(msg))
            }
        }
    }

    // Entry N is valid when it precedes the `printscan` line itself.
    fn replay(&self, n: usize) -> Result<Response, ConsoleError> {
        let current = self.history.next_index().saturating_sub(1);
        if n == 0 || n >= current {
            return Err(ConsoleError::NoSuchEntry(n));
        }
        let entry = self.history.get(n).ok_or(ConsoleError::NoSuchEntry(n))?;
        Ok(Response::Replay { entry: n, decoded: decode(entry.text.as_bytes()) })
    }

    fn record(&mut self, kind: EntryKind, text: impl Into<String>) -> Option<usize> {
        match self.history.append(kind, text) {
            Ok(i) => Some(i),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}
