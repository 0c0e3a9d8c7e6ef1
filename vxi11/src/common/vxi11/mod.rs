//! VXI-11 program numbers, procedures and XDR types

use std::fmt;

use super::onc_rpc::Procedure;

pub mod xdr;

/// VXI-11 core channel program number
pub const DEVICE_CORE: u32 = 0x0607AF;
/// VXI-11 core channel program version
pub const DEVICE_CORE_VERSION: u32 = 1;
// Core channel procedures
pub const CREATE_LINK: Procedure = Procedure::new("create_link", 10);
pub const DEVICE_WRITE: Procedure = Procedure::new("device_write", 11);
pub const DEVICE_READ: Procedure = Procedure::new("device_read", 12);
pub const DEVICE_READSTB: Procedure = Procedure::new("device_readstb", 13);
pub const DEVICE_TRIGGER: Procedure = Procedure::new("device_trigger", 14);
pub const DEVICE_CLEAR: Procedure = Procedure::new("device_clear", 15);
pub const DEVICE_REMOTE: Procedure = Procedure::new("device_remote", 16);
pub const DEVICE_LOCAL: Procedure = Procedure::new("device_local", 17);
pub const DEVICE_LOCK: Procedure = Procedure::new("device_lock", 18);
pub const DEVICE_UNLOCK: Procedure = Procedure::new("device_unlock", 19);
pub const DESTROY_LINK: Procedure = Procedure::new("destroy_link", 23);

/// Procedures a [crate::client::Client] registers when it is opened
pub const LINK_PROCEDURES: &[Procedure] = &[CREATE_LINK, DESTROY_LINK];

/// VXI-11 abort channel program number
pub const DEVICE_ASYNC: u32 = 0x0607B0;
/// VXI-11 abort channel program version
pub const DEVICE_ASYNC_VERSION: u32 = 1;

/// VXI-11 interrupt channel program number
pub const DEVICE_INTR: u32 = 0x0607B1;
/// VXI-11 interrupt channel program version
pub const DEVICE_INTR_VERSION: u32 = 1;

/// One of the three RPC programs an instrument registers with its portmapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Core,
    Abort,
    Interrupt,
}

impl Channel {
    /// In the order ports are resolved
    pub const ALL: [Channel; 3] = [Channel::Core, Channel::Abort, Channel::Interrupt];

    pub fn program(&self) -> u32 {
        match self {
            Channel::Core => DEVICE_CORE,
            Channel::Abort => DEVICE_ASYNC,
            Channel::Interrupt => DEVICE_INTR,
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Channel::Core => DEVICE_CORE_VERSION,
            Channel::Abort => DEVICE_ASYNC_VERSION,
            Channel::Interrupt => DEVICE_INTR_VERSION,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Core => write!(f, "core"),
            Channel::Abort => write!(f, "abort"),
            Channel::Interrupt => write!(f, "interrupt"),
        }
    }
}
