//! In-process rover: the firmware command loop on simulated hardware, wired to
//! the console through an in-memory pipe.

use rover_console::{ConsoleError, Connector};
use rover_fw::sim::{SimConfig, SimHardware};
use rover_fw::{FwConfig, LinkError, Rover, SerialLink};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tracing::{info, warn};

const PIPE_CAPACITY: usize = 4096;

/// Blocking view of the rover's end of the pipe, for the firmware thread.
pub struct DuplexLink {
    io: DuplexStream,
    handle: Handle,
}

impl DuplexLink {
    pub fn new(io: DuplexStream, handle: Handle) -> Self {
        Self { io, handle }
    }
}

impl SerialLink for DuplexLink {
    fn read_byte(&mut self) -> Result<u8, LinkError> {
        match self.handle.block_on(self.io.read_u8()) {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(LinkError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let io = &mut self.io;
        self.handle.block_on(async move {
            io.write_all(bytes).await?;
            io.flush().await
        })?;
        Ok(())
    }
}

/// Every `connect` powers up a fresh simulated rover.
pub struct SimConnector {
    sim: SimConfig,
    firmware: FwConfig,
}

impl SimConnector {
    pub fn new(sim: SimConfig, firmware: FwConfig) -> Self {
        Self { sim, firmware }
    }
}

impl Connector for SimConnector {
    type Io = DuplexStream;

    async fn connect(&mut self) -> Result<DuplexStream, ConsoleError> {
        let (console, rover_end) = duplex(PIPE_CAPACITY);
        let handle = Handle::current();
        let hw = SimHardware::new(self.sim.clone());
        let firmware = self.firmware.clone();
        tokio::task::spawn_blocking(move || {
            let mut rover = Rover::new(hw, DuplexLink::new(rover_end, handle), firmware);
            match rover.run() {
                Ok(()) => info!("simulated rover powered down"),
                Err(e) => warn!("simulated rover stopped: {}", e),
            }
        });
        Ok(console)
    }

    fn describe(&self) -> String {
        format!("simulated rover (seed {})", self.sim.seed)
    }
}
