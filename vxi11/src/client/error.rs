use std::{fmt, io};

use crate::common::{
    onc_rpc::RpcError,
    vxi11::{xdr::DeviceErrorCode, Channel},
};

/// Error returned by the VXI-11 client
#[derive(Debug)]
pub enum Error {
    /// Looking up the port of `channel` with the portmapper failed
    Discovery { channel: Channel, cause: RpcError },
    /// Connecting, talking to or decoding replies from the instrument failed
    Transport(RpcError),
    /// Instrument answered with a non-zero error code
    Device(DeviceErrorCode),
}

impl Error {
    /// Instrument error code, if the instrument reported one
    pub fn device_code(&self) -> Option<i32> {
        match self {
            Error::Device(code) => Some(code.code()),
            _ => None,
        }
    }
}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        Self::Transport(err)
    }
}

impl From<DeviceErrorCode> for Error {
    fn from(code: DeviceErrorCode) -> Self {
        Self::Device(code)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Transport(RpcError::Io(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Discovery { channel, cause } => {
                write!(f, "failed to find {} channel port: {}", channel, cause)
            }
            Error::Transport(err) => write!(f, "transport error: {}", err),
            Error::Device(code) => write!(f, "device error: {}", code),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Discovery { cause, .. } => Some(cause),
            Error::Transport(err) => Some(err),
            Error::Device(_) => None,
        }
    }
}
