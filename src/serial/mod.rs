//! # Serial Communication Module
//!
//! Handles the physical CI-V buses.
//!
//! This module handles:
//! - Opening one or two buses at the configured baud rate (8N1, no flow control)
//! - Reading raw byte chunks into the processing task
//! - Writing reply frames back onto a bus

pub mod port_trait;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadHalf};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::civ::forward::BusId;
use crate::error::{CivError, Result};
use port_trait::{SerialPortIO, TokioSerialPort};

/// Size of one read from the bus
const READ_CHUNK: usize = 256;

/// One open CI-V bus
pub struct CivSerial {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    /// Which bus this is
    bus: BusId,
}

impl std::fmt::Debug for CivSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CivSerial")
            .field("device_path", &self.device_path)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl CivSerial {
    /// Open one bus
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Bus speed
    /// * `bus` - Which bus this is
    ///
    /// # Errors
    ///
    /// Returns [`CivError::Serial`] if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shackmate_civ::civ::forward::BusId;
    /// use shackmate_civ::serial::CivSerial;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = CivSerial::open("/dev/ttyUSB0", 19200, BusId::Primary)?;
    ///     println!("Connected to {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32, bus: BusId) -> Result<Self> {
        let port = Self::open_port(path, baud_rate)?;
        info!("{}: opened {} at {} baud", bus, path, baud_rate);
        Ok(Self {
            port,
            device_path: path.to_string(),
            bus,
        })
    }

    /// Open every configured bus
    ///
    /// Buses that fail to open are logged and skipped; the bus number follows
    /// the position in `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`CivError::SerialPortNotFound`] if no bus could be opened
    pub fn open_buses(paths: &[String], baud_rate: u32) -> Result<Vec<Self>> {
        let mut buses = Vec::with_capacity(paths.len());

        for (index, path) in paths.iter().enumerate() {
            let bus = BusId::from_index(index);
            debug!("{}: trying serial port {}", bus, path);

            match Self::open(path, baud_rate, bus) {
                Ok(serial) => buses.push(serial),
                Err(e) => warn!("{}: {}", bus, e),
            }
        }

        if buses.is_empty() {
            return Err(CivError::SerialPortNotFound(paths.join(", ")));
        }
        Ok(buses)
    }

    /// Open a specific serial port with CI-V settings
    fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| CivError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Device path of the opened port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Which bus this is
    pub fn bus(&self) -> BusId {
        self.bus
    }

    /// Split into a read half for the reader task and a frame writer
    pub fn into_split(self) -> (ReadHalf<SerialStream>, BusWriter<TokioSerialPort>) {
        let (reader, writer) = tokio::io::split(self.port);
        (reader, BusWriter::new(self.bus, TokioSerialPort::new(writer)))
    }
}

/// Bytes received on one bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusChunk {
    /// Bus the bytes came from
    pub bus: BusId,
    /// Raw bytes as read
    pub bytes: Bytes,
}

/// Forward everything read from a bus into the processing task
///
/// Runs until the bus reaches end of stream or the receiver is dropped.
///
/// # Errors
///
/// Returns [`CivError::Serial`] if a read fails
pub async fn read_loop<R>(bus: BusId, mut reader: R, tx: mpsc::Sender<BusChunk>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| CivError::Serial(format!("{}: read failed: {}", bus, e)))?;

        if n == 0 {
            info!("{}: end of stream", bus);
            return Ok(());
        }

        let chunk = BusChunk {
            bus,
            bytes: Bytes::copy_from_slice(&buf[..n]),
        };
        if tx.send(chunk).await.is_err() {
            debug!("{}: processing task gone, stopping reader", bus);
            return Ok(());
        }
    }
}

/// Frame writer for one bus
pub struct BusWriter<P: SerialPortIO> {
    bus: BusId,
    port: P,
    frames_sent: u64,
}

impl<P: SerialPortIO> BusWriter<P> {
    /// Create a writer for one bus
    ///
    /// # Arguments
    ///
    /// * `bus` - Which bus the port is attached to
    /// * `port` - Write half of the serial port
    pub fn new(bus: BusId, port: P) -> Self {
        Self {
            bus,
            port,
            frames_sent: 0,
        }
    }

    /// Which bus this writes to
    pub fn bus(&self) -> BusId {
        self.bus
    }

    /// Frames written so far
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Write one complete frame and flush
    ///
    /// # Errors
    ///
    /// Returns [`CivError::Serial`] if the write or flush fails
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.port
            .write_all(frame)
            .await
            .map_err(|e| CivError::Serial(format!("{}: failed to write frame: {}", self.bus, e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| CivError::Serial(format!("{}: failed to flush: {}", self.bus, e)))?;

        self.frames_sent += 1;
        debug!("{}: sent {:02X?}", self.bus, frame);
        Ok(())
    }
}

/// The writers of every open bus
pub struct BusSet<P: SerialPortIO> {
    writers: Vec<BusWriter<P>>,
}

impl<P: SerialPortIO> Default for BusSet<P> {
    fn default() -> Self {
        Self { writers: Vec::new() }
    }
}

impl<P: SerialPortIO> BusSet<P> {
    /// Create an empty set; add buses with [`BusSet::push`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bus
    pub fn push(&mut self, writer: BusWriter<P>) {
        self.writers.push(writer);
    }

    /// Number of buses
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Whether no bus is open
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Send a frame on one bus
    ///
    /// # Errors
    ///
    /// Returns [`CivError::NoTransport`] if that bus is not open, or the
    /// write error of the bus
    pub async fn send(&mut self, bus: BusId, frame: &[u8]) -> Result<()> {
        let writer = self
            .writers
            .iter_mut()
            .find(|w| w.bus() == bus)
            .ok_or(CivError::NoTransport)?;
        writer.send_frame(frame).await
    }

    /// Send a frame on every bus
    ///
    /// Every bus is attempted even if an earlier one fails; the first error
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CivError::NoTransport`] if no bus is open
    pub async fn send_all(&mut self, frame: &[u8]) -> Result<()> {
        if self.writers.is_empty() {
            return Err(CivError::NoTransport);
        }

        let mut first_error = None;
        for writer in &mut self.writers {
            if let Err(e) = writer.send_frame(frame).await {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::port_trait::mocks::MockSerialPort;
    use super::*;
    use std::io;

    const FRAME: &[u8] = &[0xFE, 0xFE, 0xEE, 0xB0, 0x34, 0x01, 0xFD];

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let paths = vec!["/dev/nonexistent0".to_string(), "/dev/nonexistent1".to_string()];
        let result = CivSerial::open_buses(&paths, 19200);

        match result {
            Err(CivError::SerialPortNotFound(msg)) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_no_paths_returns_error() {
        let result = CivSerial::open_buses(&[], 19200);
        assert!(matches!(result, Err(CivError::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = CivSerial::open_port("/dev/nonexistent_civ_bus_12345", 19200);

        match result {
            Err(CivError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_civ_bus_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_loop_forwards_chunks_until_eof() {
        let reader = tokio_test::io::Builder::new()
            .read(&[0xFE, 0xFE, 0xB0])
            .read(&[0xEE, 0x34, 0xFD])
            .build();
        let (tx, mut rx) = mpsc::channel(8);

        read_loop(BusId::Secondary, reader, tx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.bus, BusId::Secondary);
        assert_eq!(&first.bytes[..], &[0xFE, 0xFE, 0xB0]);

        let second = rx.recv().await.unwrap();
        assert_eq!(&second.bytes[..], &[0xEE, 0x34, 0xFD]);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_read_loop_reports_read_error() {
        let reader = tokio_test::io::Builder::new()
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
            .build();
        let (tx, _rx) = mpsc::channel(8);

        let result = read_loop(BusId::Primary, reader, tx).await;
        assert!(matches!(result, Err(CivError::Serial(msg)) if msg.contains("bus1")));
    }

    #[tokio::test]
    async fn test_read_loop_stops_when_receiver_dropped() {
        let reader = tokio_test::io::Builder::new().read(&[0x00]).build();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert!(read_loop(BusId::Primary, reader, tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_frame_writes_and_flushes() {
        let port = MockSerialPort::new();
        let mut writer = BusWriter::new(BusId::Primary, port.clone());

        writer.send_frame(FRAME).await.unwrap();

        assert_eq!(port.frames(), vec![FRAME.to_vec()]);
        assert_eq!(port.flushes(), 1);
        assert_eq!(writer.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_send_frame_write_error() {
        let port = MockSerialPort::new();
        port.fail_writes(io::ErrorKind::TimedOut);
        let mut writer = BusWriter::new(BusId::Primary, port);

        let result = writer.send_frame(FRAME).await;
        assert!(matches!(result, Err(CivError::Serial(_))));
        assert_eq!(writer.frames_sent(), 0);
    }

    #[tokio::test]
    async fn test_bus_set_routes_by_bus() {
        let first = MockSerialPort::new();
        let second = MockSerialPort::new();
        let mut buses = BusSet::new();
        buses.push(BusWriter::new(BusId::Primary, first.clone()));
        buses.push(BusWriter::new(BusId::Secondary, second.clone()));

        buses.send(BusId::Secondary, FRAME).await.unwrap();
        assert!(first.frames().is_empty());
        assert_eq!(second.frames().len(), 1);

        buses.send_all(FRAME).await.unwrap();
        assert_eq!(first.frames().len(), 1);
        assert_eq!(second.frames().len(), 2);
    }

    #[tokio::test]
    async fn test_bus_set_without_bus_is_no_transport() {
        let mut buses: BusSet<MockSerialPort> = BusSet::new();
        assert!(matches!(buses.send_all(FRAME).await, Err(CivError::NoTransport)));

        buses.push(BusWriter::new(BusId::Primary, MockSerialPort::new()));
        assert!(matches!(
            buses.send(BusId::Secondary, FRAME).await,
            Err(CivError::NoTransport)
        ));
    }

    #[tokio::test]
    async fn test_bus_set_send_all_continues_after_failure() {
        let broken = MockSerialPort::new();
        broken.fail_writes(io::ErrorKind::BrokenPipe);
        let healthy = MockSerialPort::new();

        let mut buses = BusSet::new();
        buses.push(BusWriter::new(BusId::Primary, broken));
        buses.push(BusWriter::new(BusId::Secondary, healthy.clone()));

        assert!(buses.send_all(FRAME).await.is_err());
        assert_eq!(healthy.frames(), vec![FRAME.to_vec()]);
    }

    // Integration test - only runs if a CI-V interface is connected
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        match CivSerial::open("/dev/ttyUSB0", 19200, BusId::Primary) {
            Ok(serial) => println!("Opened CI-V bus at {}", serial.device_path()),
            Err(e) => println!("No CI-V interface detected: {}", e),
        }
    }
}
