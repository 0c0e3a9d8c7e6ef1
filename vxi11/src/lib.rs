//! Client side of the VXI-11 instrument control protocol.
//!
//! [client::find_ports] resolves the channel ports of an instrument through its
//! portmapper, [client::Client] talks to the core channel and hands out
//! [client::Link]s.

pub mod client;
pub mod common;

pub use client::{find_ports, ChannelPorts, Client, ClientConfig, Error, Link};
