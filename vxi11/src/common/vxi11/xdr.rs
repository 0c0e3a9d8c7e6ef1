use std::{
    fmt,
    io::{Read, Result, Write},
};

use crate::common::xdr::prelude::*;

/// Link identifier assigned by the instrument in `create_link`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceLink(pub i32);

impl From<i32> for DeviceLink {
    fn from(x: i32) -> Self {
        DeviceLink(x)
    }
}

impl fmt::Display for DeviceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl XdrEncode for DeviceLink {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.0.write_xdr(writer)
    }
}

impl XdrDecode for DeviceLink {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.0.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFlags(pub i32);

impl DeviceFlags {
    pub const WAITLOCK: i32 = 0x01;
    pub const END: i32 = 0x08;
    pub const TERMCHRSET: i32 = 0x80;

    pub fn is_waitlock(&self) -> bool {
        (self.0 & Self::WAITLOCK) != 0
    }

    pub fn is_end(&self) -> bool {
        (self.0 & Self::END) != 0
    }

    pub fn is_termchrset(&self) -> bool {
        (self.0 & Self::TERMCHRSET) != 0
    }

    pub fn waitlock(self, wait: bool) -> Self {
        self.set(Self::WAITLOCK, wait)
    }

    fn set(self, bit: i32, on: bool) -> Self {
        if on {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }
}

impl fmt::Display for DeviceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = if self.is_waitlock() { 'w' } else { '-' };
        let e = if self.is_end() { 'e' } else { '-' };
        let t = if self.is_termchrset() { 't' } else { '-' };
        write!(f, "{}{}{}", w, e, t)
    }
}

impl XdrEncode for DeviceFlags {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.0.write_xdr(writer)
    }
}

impl XdrDecode for DeviceFlags {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.0.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    #[default]
    NoError,
    SyntaxError,
    DeviceNotAccessible,
    InvalidLinkIdentifier,
    ParameterError,
    ChannelNotEstablished,
    OperationNotSupported,
    OutOfResources,
    DeviceLockedByAnotherLink,
    NoLockHeldByThisLink,
    IoTimeout,
    IoError,
    InvalidAddress,
    Abort,
    ChannelAlreadyEstablished,

    /// Used for reserved/unknown error codes
    Reserved(i32),
}

impl DeviceErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => DeviceErrorCode::NoError,
            1 => DeviceErrorCode::SyntaxError,
            3 => DeviceErrorCode::DeviceNotAccessible,
            4 => DeviceErrorCode::InvalidLinkIdentifier,
            5 => DeviceErrorCode::ParameterError,
            6 => DeviceErrorCode::ChannelNotEstablished,
            8 => DeviceErrorCode::OperationNotSupported,
            9 => DeviceErrorCode::OutOfResources,
            11 => DeviceErrorCode::DeviceLockedByAnotherLink,
            12 => DeviceErrorCode::NoLockHeldByThisLink,
            15 => DeviceErrorCode::IoTimeout,
            17 => DeviceErrorCode::IoError,
            21 => DeviceErrorCode::InvalidAddress,
            23 => DeviceErrorCode::Abort,
            29 => DeviceErrorCode::ChannelAlreadyEstablished,
            x => DeviceErrorCode::Reserved(x),
        }
    }

    /// Numeric code as sent on the wire
    pub fn code(&self) -> i32 {
        match self {
            DeviceErrorCode::NoError => 0,
            DeviceErrorCode::SyntaxError => 1,
            DeviceErrorCode::DeviceNotAccessible => 3,
            DeviceErrorCode::InvalidLinkIdentifier => 4,
            DeviceErrorCode::ParameterError => 5,
            DeviceErrorCode::ChannelNotEstablished => 6,
            DeviceErrorCode::OperationNotSupported => 8,
            DeviceErrorCode::OutOfResources => 9,
            DeviceErrorCode::DeviceLockedByAnotherLink => 11,
            DeviceErrorCode::NoLockHeldByThisLink => 12,
            DeviceErrorCode::IoTimeout => 15,
            DeviceErrorCode::IoError => 17,
            DeviceErrorCode::InvalidAddress => 21,
            DeviceErrorCode::Abort => 23,
            DeviceErrorCode::ChannelAlreadyEstablished => 29,
            DeviceErrorCode::Reserved(x) => *x,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceErrorCode::NoError => "no error",
            DeviceErrorCode::SyntaxError => "syntax error",
            DeviceErrorCode::DeviceNotAccessible => "device not accessible",
            DeviceErrorCode::InvalidLinkIdentifier => "invalid link identifier",
            DeviceErrorCode::ParameterError => "parameter error",
            DeviceErrorCode::ChannelNotEstablished => "channel not established",
            DeviceErrorCode::OperationNotSupported => "operation not supported",
            DeviceErrorCode::OutOfResources => "out of resources",
            DeviceErrorCode::DeviceLockedByAnotherLink => "device locked by another link",
            DeviceErrorCode::NoLockHeldByThisLink => "no lock held by this link",
            DeviceErrorCode::IoTimeout => "I/O timeout",
            DeviceErrorCode::IoError => "I/O error",
            DeviceErrorCode::InvalidAddress => "invalid address",
            DeviceErrorCode::Abort => "abort",
            DeviceErrorCode::ChannelAlreadyEstablished => "channel already established",
            DeviceErrorCode::Reserved(_) => "reserved error",
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl XdrEncode for DeviceErrorCode {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.code().write_xdr(writer)
    }
}

impl XdrDecode for DeviceErrorCode {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = DeviceErrorCode::from_code(reader.read_i32::<NetworkEndian>()?);
        Ok(())
    }
}

/// A response carrying an instrument error code
pub trait DeviceResponse {
    fn error(&self) -> DeviceErrorCode;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceError {
    pub error: DeviceErrorCode,
}

impl DeviceResponse for DeviceError {
    fn error(&self) -> DeviceErrorCode {
        self.error
    }
}

impl XdrEncode for DeviceError {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.error.write_xdr(writer)
    }
}

impl XdrDecode for DeviceError {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.error.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreateLinkParms {
    pub client_id: i32,
    pub lock_device: bool,
    pub lock_timeout: u32,
    pub device: String,
}

impl XdrEncode for CreateLinkParms {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.client_id.write_xdr(writer)?;
        self.lock_device.write_xdr(writer)?;
        self.lock_timeout.write_xdr(writer)?;
        self.device.write_xdr(writer)
    }
}

impl XdrDecode for CreateLinkParms {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.client_id.read_xdr(reader)?;
        self.lock_device.read_xdr(reader)?;
        self.lock_timeout.read_xdr(reader)?;
        self.device.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CreateLinkResp {
    pub error: DeviceErrorCode,
    pub lid: DeviceLink,
    pub abort_port: u16,
    pub max_recv_size: u32,
}

impl DeviceResponse for CreateLinkResp {
    fn error(&self) -> DeviceErrorCode {
        self.error
    }
}

impl XdrEncode for CreateLinkResp {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.error.write_xdr(writer)?;
        self.lid.write_xdr(writer)?;
        self.abort_port.write_xdr(writer)?;
        self.max_recv_size.write_xdr(writer)
    }
}

impl XdrDecode for CreateLinkResp {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.error.read_xdr(reader)?;
        self.lid.read_xdr(reader)?;
        self.abort_port.read_xdr(reader)?;
        self.max_recv_size.read_xdr(reader)
    }
}

/// Arguments shared by trigger, clear, remote, local and readstb
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGenericParms {
    pub lid: DeviceLink,
    pub flags: DeviceFlags,
    pub lock_timeout: u32,
    pub io_timeout: u32,
}

impl XdrEncode for DeviceGenericParms {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.lid.write_xdr(writer)?;
        self.flags.write_xdr(writer)?;
        self.lock_timeout.write_xdr(writer)?;
        self.io_timeout.write_xdr(writer)
    }
}

impl XdrDecode for DeviceGenericParms {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.lid.read_xdr(reader)?;
        self.flags.read_xdr(reader)?;
        self.lock_timeout.read_xdr(reader)?;
        self.io_timeout.read_xdr(reader)
    }
}
