//! Serial endpoint discovery and opening.

use std::io::Write;

use log::debug;

use crate::config::DeviceSettings;
use crate::error::Result;

/// Finds and opens the board's serial endpoint.
pub trait SerialConnector {
    /// Names of candidate ports, in discovery order.
    fn candidates(&self) -> Result<Vec<String>>;

    /// Open a port for writing. The port closes when the writer is dropped.
    fn open(&self, port: &str) -> Result<Box<dyn Write + Send>>;
}

/// Connector backed by the operating system's serial ports.
#[derive(Debug, Clone, Default)]
pub struct SerialPortConnector {
    settings: DeviceSettings,
}

impl SerialPortConnector {
    pub fn new(settings: DeviceSettings) -> Self {
        Self { settings }
    }
}

impl SerialConnector for SerialPortConnector {
    fn candidates(&self) -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        debug!("Found {} serial ports", ports.len());
        Ok(ports
            .into_iter()
            .map(|info| info.port_name)
            .filter(|name| self.settings.is_candidate(name))
            .collect())
    }

    fn open(&self, port: &str) -> Result<Box<dyn Write + Send>> {
        let port = serialport::new(port, self.settings.baud_rate)
            .timeout(self.settings.read_timeout())
            .open()?;
        Ok(Box::new(port))
    }
}
