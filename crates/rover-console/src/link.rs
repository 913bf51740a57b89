use std::io;
use std::time::Duration;

use rover_proto::{WireMessage, HANDSHAKE_ACK, SCAN_END};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, trace, warn};

use crate::error::ConsoleError;
use crate::receive::{self, ReceiveTimeouts, ScanCapture};

// how long `drain` waits for more bytes before deciding the line is quiet
const DRAIN_QUIET: Duration = Duration::from_millis(50);

/// Open the rover's serial port, 8 data bits, no parity, 1 stop bit.
pub fn open_serial(device: &str, baud: u32) -> Result<SerialStream, ConsoleError> {
    tokio_serial::new(device, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()
        .map_err(|e| ConsoleError::Transport { target: device.to_string(), source: e.into() })
}

/// Console end of the serial link. Owned by whichever command is running.
#[derive(Debug)]
pub struct RoverLink<T> {
    io: T,
}

impl<T> RoverLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T) -> Self {
        Self { io }
    }

    pub async fn send(&mut self, msg: &WireMessage) -> Result<(), ConsoleError> {
        let bytes = msg.to_bytes()?;
        trace!(bytes = %hex::encode(&bytes), "tx");
        self.io.write_all(&bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// One byte, or `None` when nothing arrives within `wait`.
    pub async fn read_byte(&mut self, wait: Duration) -> Result<Option<u8>, ConsoleError> {
        match timeout(wait, self.io.read_u8()).await {
            Ok(Ok(b)) => {
                trace!(byte = b, "rx");
                Ok(Some(b))
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ConsoleError::LinkClosed),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }

    /// Send `a\r` and wait for the rover to echo `a`.
    pub async fn handshake(&mut self, wait: Duration) -> Result<(), ConsoleError> {
        self.send(&WireMessage::Handshake).await?;
        match self.read_byte(wait).await? {
            Some(HANDSHAKE_ACK) => {
                info!("rover acknowledged");
                Ok(())
            }
            got => {
                warn!(?got, "handshake not acknowledged, continuing without ack");
                Err(ConsoleError::Handshake { got })
            }
        }
    }

    pub async fn receive_scan(&mut self, timeouts: ReceiveTimeouts) -> Result<ScanCapture, ConsoleError> {
        Ok(receive::receive_scan(&mut self.io, timeouts).await?)
    }

    /// Discard the rest of a scan that was cut short, up to and including its
    /// end byte, or until the line has been quiet for `quiet`. Leaves the link
    /// aligned for the next command's reply.
    pub async fn discard_scan_tail(&mut self, quiet: Duration) -> Result<usize, ConsoleError> {
        let mut total = 0;
        loop {
            match self.read_byte(quiet).await {
                Ok(Some(b)) => {
                    total += 1;
                    if b == SCAN_END {
                        break;
                    }
                }
                Ok(None) => break,
                Err(ConsoleError::LinkClosed) => {
                    warn!("link closed while discarding a partial scan");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        debug!(bytes = total, "scan tail discarded");
        Ok(total)
    }

    /// Throw away whatever is waiting on the line. Returns the number of bytes
    /// discarded.
    pub async fn drain(&mut self) -> Result<usize, ConsoleError> {
        let mut buf = [0u8; 64];
        let mut total = 0;
        loop {
            match timeout(DRAIN_QUIET, self.io.read(&mut buf)).await {
                Ok(Ok(0)) => return Err(ConsoleError::LinkClosed),
                Ok(Ok(n)) => total += n,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        debug!(bytes = total, "drained");
        Ok(total)
    }
}
