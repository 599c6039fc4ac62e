//! Serial port communication implementation
//!
//! Provides serial port operations for direct hardware connection to the
//! table's microcontroller via USB.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - Non-blocking polled reads with a short timeout

use crate::communication::{Communicator, ConnectionParams};
use psamathe_core::{LinkError, Result};
use std::io::{Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,
}

/// List available serial ports on the system
///
/// Returns candidate ports for the table's controller board:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let infos = ports
                .iter()
                .filter(|port| is_candidate_port(&port.port_name))
                .map(|port| {
                    let (description, manufacturer, serial_number) = match &port.port_type {
                        serialport::SerialPortType::UsbPort(usb) => (
                            format!(
                                "USB {} {}",
                                usb.manufacturer.as_deref().unwrap_or("Device"),
                                usb.product.as_deref().unwrap_or("Serial Port")
                            ),
                            usb.manufacturer.clone(),
                            usb.serial_number.clone(),
                        ),
                        serialport::SerialPortType::BluetoothPort => {
                            ("Bluetooth Serial".to_string(), None, None)
                        }
                        serialport::SerialPortType::PciPort => {
                            ("PCI Serial".to_string(), None, None)
                        }
                        _ => ("Serial Port".to_string(), None, None),
                    };
                    SerialPortInfo {
                        port_name: port.port_name.clone(),
                        description,
                        manufacturer,
                        serial_number,
                    }
                })
                .collect();
            Ok(infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(LinkError::Io {
                reason: format!("Failed to enumerate ports: {}", e),
            }
            .into())
        }
    }
}

/// Check if a port name matches controller board patterns
fn is_candidate_port(port_name: &str) -> bool {
    // Windows COM ports
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Serial transport backed by the `serialport` crate
///
/// Reads use a short timeout so the control loop can keep spinning; a
/// timed-out read reports "no data" rather than an error.
#[derive(Default)]
pub struct SerialCommunicator {
    port: Option<Box<dyn serialport::SerialPort>>,
    params: Option<ConnectionParams>,
}

impl SerialCommunicator {
    /// Create a new, unconnected serial communicator
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for SerialCommunicator {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.timeout_ms))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => {
                self.port = Some(port);
                self.params = Some(params.clone());
                tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                Err(LinkError::FailedToOpen {
                    port: params.port.clone(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(params) = &self.params {
            tracing::info!("Closing {}", params.port);
        }
        self.port = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        port.write_all(data).map_err(|e| LinkError::Io {
            reason: e.to_string(),
        })?;
        Ok(data.len())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        let mut buf = [0u8; 256];
        match port.read(&mut buf) {
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(Vec::new()),
            Err(e) => Err(LinkError::Io {
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_port_patterns() {
        assert!(is_candidate_port("COM3"));
        assert!(is_candidate_port("/dev/ttyUSB0"));
        assert!(is_candidate_port("/dev/ttyACM1"));
        assert!(is_candidate_port("/dev/cu.usbmodem14101"));
        assert!(!is_candidate_port("COMX"));
        assert!(!is_candidate_port("/dev/ttyS0"));
        assert!(!is_candidate_port("/dev/random"));
    }

    #[test]
    fn test_send_without_connection() {
        let mut comm = SerialCommunicator::new();
        assert!(!comm.is_connected());
        assert!(comm.send(b"N1 R0 I0*00\n").is_err());
        assert!(comm.receive().is_err());
        // Disconnecting an unopened channel is safe
        comm.disconnect().unwrap();
    }
}
