use async_std::{
    channel::Receiver,
    net::TcpStream,
    task::{self, JoinHandle},
};

use crate::{client::ClientConfig, common::onc_rpc::prelude::*};

/// An open RPC connection and the task draining its disconnect notifications
pub struct Transport {
    pub connection: RpcConnection<TcpStream>,
    pub drain: JoinHandle<()>,
}

/// Connect to `address:port` over TCP.
pub async fn connect(
    address: &str,
    port: u16,
    config: &ClientConfig,
) -> Result<Transport, RpcError> {
    let stream = TcpStream::connect((address, port)).await?;
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| format!("{}:{}", address, port));
    log::debug!("Connected to {}", peer);

    let (connection, notifications) = RpcConnection::open(stream, peer, config);
    let drain = task::spawn(drain(notifications));
    Ok(Transport { connection, drain })
}

/// Runs until the reader task of the connection exits
async fn drain(notifications: Receiver<Disconnect>) {
    while let Ok(disconnect) = notifications.recv().await {
        log::warn!("{}", disconnect);
    }
}
