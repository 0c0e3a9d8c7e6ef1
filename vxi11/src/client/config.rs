use std::time::Duration;

use crate::common::portmapper::PORTMAPPER_PORT;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Port the portmapper is queried on
    pub portmapper_port: u16,
    /// Upper bound for a single call, `None` waits for as long as the instrument takes
    pub io_timeout: Option<Duration>,
    /// Largest reply record accepted
    pub max_record_size: usize,
}

impl ClientConfig {
    pub fn portmapper_port(mut self, port: u16) -> Self {
        self.portmapper_port = port;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    pub fn no_io_timeout(mut self) -> Self {
        self.io_timeout = None;
        self
    }

    pub fn max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            portmapper_port: PORTMAPPER_PORT,
            io_timeout: None,
            max_record_size: 1024 * 1024,
        }
    }
}
