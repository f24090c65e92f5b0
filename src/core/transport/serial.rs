//! Serial port transport implementation

use super::{TransportError, TransportTrait, TransportType};
use crate::config::LineEnding;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Largest chunk returned by one capture
const READ_CHUNK: usize = 1000;

/// Serial port flow control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialFlowControl {
    /// No flow control
    #[default]
    None,
    /// Hardware flow control (RTS/CTS)
    Hardware,
    /// Software flow control (XON/XOFF)
    Software,
}

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/ttyACM0, COM3)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Flow control
    pub flow_control: SerialFlowControl,
    /// Terminator appended to every command
    pub line_ending: LineEnding,
    /// Read timeout for one capture
    pub read_timeout: Duration,
    /// Wait between send and read
    pub response_delay: Duration,
}

impl SerialConfig {
    /// Create a new serial configuration with default settings
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: SerialFlowControl::None,
            line_ending: LineEnding::CrLf,
            read_timeout: Duration::from_secs(1),
            response_delay: Duration::ZERO,
        }
    }

    /// Set line ending
    #[must_use]
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Set read timeout
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    /// Set flow control
    #[must_use]
    pub fn flow_control(mut self, flow: SerialFlowControl) -> Self {
        self.flow_control = flow;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyACM0", 115_200)
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    port: Mutex<Option<Box<dyn SerialPort + Send>>>,
}

impl SerialTransport {
    /// Create a new serial transport; the port is opened by [`TransportTrait::open`]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: Mutex::new(None),
        }
    }

    /// Line settings summary, e.g. `/dev/ttyACM0 @ 115200 baud (8N1)`
    pub fn connection_info(&self) -> String {
        format!(
            "{} @ {} baud ({}{}{})",
            self.config.port,
            self.config.baud_rate,
            self.config.data_bits,
            match self.config.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.config.stop_bits,
        )
    }
}

#[async_trait]
impl TransportTrait for SerialTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let data_bits = match self.config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };

        let stop_bits = match self.config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let parity = match self.config.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let flow_control = match self.config.flow_control {
            SerialFlowControl::Hardware => FlowControl::Hardware,
            SerialFlowControl::Software => FlowControl::Software,
            SerialFlowControl::None => FlowControl::None,
        };

        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(self.config.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    TransportError::PortNotFound(self.config.port.clone())
                }
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::NotFound => {
                        TransportError::PortNotFound(self.config.port.clone())
                    }
                    std::io::ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(self.config.port.clone())
                    }
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        port.clear(ClearBuffer::All)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        tracing::debug!("Opened {}", self.connection_info());
        *self.port.lock() = Some(port);
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut port_guard = self.port.lock();
        let port = port_guard.as_mut().ok_or(TransportError::NotConnected)?;

        let mut data = text.as_bytes().to_vec();
        data.extend_from_slice(self.config.line_ending.bytes());

        port.write_all(&data)
            .and_then(|()| port.flush())
            .map_err(|e| TransportError::Write(e.to_string()))?;

        tracing::trace!("Sent {} bytes to {}", data.len(), self.config.port);
        Ok(())
    }

    async fn capture(&mut self) -> Result<String, TransportError> {
        let mut port_guard = self.port.lock();
        let port = port_guard.as_mut().ok_or(TransportError::NotConnected)?;

        let mut buffer = vec![0u8; READ_CHUNK];

        match port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(String::from_utf8_lossy(&buffer).into_owned())
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // No data within the timeout
                Ok(String::new())
            }
            Err(e) => Err(TransportError::Read(e.to_string())),
        }
    }

    async fn close(&mut self) {
        if self.port.lock().take().is_some() {
            tracing::debug!("Closed {}", self.config.port);
        }
    }

    fn is_open(&self) -> bool {
        self.port.lock().is_some()
    }

    fn response_delay(&self) -> Duration {
        self.config.response_delay
    }

    fn endpoint(&self) -> &str {
        &self.config.port
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info() {
        let transport = SerialTransport::new(SerialConfig::new("/dev/ttyCliServer", 115_200));
        assert_eq!(transport.connection_info(), "/dev/ttyCliServer @ 115200 baud (8N1)");
    }

    #[tokio::test]
    async fn test_missing_device_is_connection_error() {
        let mut transport =
            SerialTransport::new(SerialConfig::new("/dev/cliprobe-does-not-exist", 115_200));
        let err = transport.open().await.unwrap_err();
        assert!(err.is_connection_error(), "unexpected error: {err}");
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_send_before_open() {
        let mut transport = SerialTransport::new(SerialConfig::default());
        assert!(matches!(
            transport.send("state").await,
            Err(TransportError::NotConnected)
        ));
        transport.close().await;
        transport.close().await;
    }
}
