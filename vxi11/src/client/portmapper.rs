//! Portmapper client and VXI-11 port discovery

use std::fmt;

use async_std::net::{TcpStream, ToSocketAddrs};
use futures::{AsyncRead, AsyncWrite};

use crate::{
    client::{ClientConfig, Error},
    common::{
        onc_rpc::prelude::*,
        portmapper::{
            xdr::{Mapping, MappingList},
            PORTMAPPER_PROCEDURES, PORTMAPPER_PROG, PORTMAPPER_PROT_TCP, PORTMAPPER_VERS,
        },
        vxi11::Channel,
    },
};

pub mod prelude {
    pub use super::{find_ports, find_ports_at, ChannelPorts, PortMapperClient};
    pub use crate::common::portmapper::{
        xdr::Mapping, PORTMAPPER_PORT, PORTMAPPER_PROG, PORTMAPPER_PROT_TCP, PORTMAPPER_VERS,
    };
}

pub struct PortMapperClient<IO>(RpcConnection<IO>);

impl PortMapperClient<TcpStream> {
    pub async fn connect_tcp(
        addrs: impl ToSocketAddrs,
        config: &ClientConfig,
    ) -> Result<Self, RpcError> {
        let io = TcpStream::connect(addrs).await?;
        let peer = io.peer_addr()?.to_string();
        Self::new(io, peer, config)
    }
}

impl<IO> PortMapperClient<IO>
where
    IO: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(io: IO, peer: impl Into<String>, config: &ClientConfig) -> Result<Self, RpcError> {
        // Portmapper connections are short lived, nobody listens for disconnects
        let (mut connection, _) = RpcConnection::open(io, peer, config);
        connection.register(PORTMAPPER_PROG, PORTMAPPER_VERS, PORTMAPPER_PROCEDURES)?;
        Ok(Self(connection))
    }

    pub async fn null(&mut self) -> Result<(), RpcError> {
        self.0.call("pmap_null", ()).await
    }

    /// Port `mapping` is registered on, 0 if it is not registered
    pub async fn getport(&mut self, mapping: Mapping) -> Result<u16, RpcError> {
        self.0.call("pmap_getport", mapping).await
    }

    pub async fn dump(&mut self) -> Result<Vec<Mapping>, RpcError> {
        let list: MappingList = self.0.call("pmap_dump", ()).await?;
        Ok(list.0)
    }

    pub async fn close(mut self) -> Result<(), RpcError> {
        self.0.close().await
    }
}

/// TCP ports of the three VXI-11 channels of one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPorts {
    pub core: u16,
    pub abort: u16,
    pub irq: u16,
}

impl ChannelPorts {
    pub fn as_array(&self) -> [u16; 3] {
        [self.core, self.abort, self.irq]
    }
}

impl fmt::Display for ChannelPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Core: {}, Abort: {}, IRQ: {}",
            self.core, self.abort, self.irq
        )
    }
}

/// Ask the portmapper on `host` for the core, abort and interrupt channel ports.
///
/// Channels are queried one at a time, each over a fresh connection. The first
/// failure is returned and the remaining channels are not queried.
pub async fn find_ports(host: &str, config: &ClientConfig) -> Result<ChannelPorts, Error> {
    find_ports_at((host, config.portmapper_port), config).await
}

/// Same as [find_ports] with an explicit portmapper address
pub async fn find_ports_at<A>(addrs: A, config: &ClientConfig) -> Result<ChannelPorts, Error>
where
    A: ToSocketAddrs + Clone,
{
    let mut ports = [0u16; 3];
    for (channel, port) in Channel::ALL.into_iter().zip(ports.iter_mut()) {
        *port = getport(addrs.clone(), channel, config)
            .await
            .map_err(|cause| Error::Discovery { channel, cause })?;
        log::debug!("{} channel @ port {}", channel, port);
    }
    let [core, abort, irq] = ports;
    Ok(ChannelPorts { core, abort, irq })
}

async fn getport<A>(addrs: A, channel: Channel, config: &ClientConfig) -> Result<u16, RpcError>
where
    A: ToSocketAddrs,
{
    let mut portmap = PortMapperClient::connect_tcp(addrs, config).await?;
    let res = portmap
        .getport(Mapping::new(
            channel.program(),
            channel.version(),
            PORTMAPPER_PROT_TCP,
            0,
        ))
        .await;
    if let Err(err) = portmap.close().await {
        log::debug!("Closing portmapper connection failed: {}", err);
    }
    match res? {
        0 => Err(RpcError::ProgUnavail),
        port => Ok(port),
    }
}
