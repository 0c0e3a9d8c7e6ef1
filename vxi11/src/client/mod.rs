//! VXI-11 client.
//!
//! A [Client] owns the core channel connection to one instrument. Links created
//! through it refer back to the client without keeping it alive; once the client
//! is closed or dropped every call through a [Link] fails with a transport error.

use std::sync::{Arc, Weak};

use async_std::{net::TcpStream, sync::Mutex, task::JoinHandle};

use crate::common::{
    onc_rpc::prelude::*,
    vxi11::{
        xdr::{
            CreateLinkParms, CreateLinkResp, DeviceError, DeviceErrorCode, DeviceLink,
            DeviceResponse,
        },
        DEVICE_CORE, DEVICE_CORE_VERSION, LINK_PROCEDURES,
    },
    xdr::prelude::*,
};

pub mod config;
pub mod error;
pub mod portmapper;
pub mod transport;

pub use config::ClientConfig;
pub use error::Error;
pub use portmapper::{find_ports, find_ports_at, ChannelPorts};

struct ClientInner {
    peer: String,
    core: Mutex<RpcConnection<TcpStream>>,
    shutdown: ShutdownHandle,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    async fn call_device<ARGS, RET>(&self, name: &str, args: ARGS) -> Result<RET, Error>
    where
        ARGS: XdrEncode,
        RET: XdrDecode + Default + DeviceResponse,
    {
        let resp: RET = self.core.lock().await.call(name, args).await?;
        match resp.error() {
            DeviceErrorCode::NoError => Ok(resp),
            code => {
                log::error!("{} on {} returned error: {}", name, self.peer, code);
                Err(Error::Device(code))
            }
        }
    }
}

/// Connection to the core channel of one instrument
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Look up the core channel of `host` with its portmapper and connect to it.
    pub async fn connect(host: &str, config: &ClientConfig) -> Result<Self, Error> {
        let ports = find_ports(host, config).await?;
        Self::open(host, ports.core, config).await
    }

    /// Connect to a core channel listening on a known port.
    pub async fn open(address: &str, port: u16, config: &ClientConfig) -> Result<Self, Error> {
        let transport::Transport {
            mut connection,
            drain,
        } = transport::connect(address, port, config).await?;

        if let Err(err) = connection.register(DEVICE_CORE, DEVICE_CORE_VERSION, LINK_PROCEDURES) {
            if let Err(close_err) = connection.close().await {
                log::debug!("Closing {} failed: {}", connection.peer(), close_err);
            }
            drain.await;
            return Err(err.into());
        }

        let inner = ClientInner {
            peer: connection.peer().to_string(),
            shutdown: connection.shutdown_handle(),
            core: Mutex::new(connection),
            drain: Mutex::new(Some(drain)),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    /// Register further core channel procedures for [Client::call_device]
    pub async fn register(&self, procedures: &[Procedure]) -> Result<(), Error> {
        self.inner
            .core
            .lock()
            .await
            .register(DEVICE_CORE, DEVICE_CORE_VERSION, procedures)
            .map_err(Error::Transport)
    }

    /// Call a registered core channel procedure.
    ///
    /// A non-zero error code in the response is returned as [Error::Device].
    pub async fn call_device<ARGS, RET>(&self, name: &str, args: ARGS) -> Result<RET, Error>
    where
        ARGS: XdrEncode,
        RET: XdrDecode + Default + DeviceResponse,
    {
        self.inner.call_device(name, args).await
    }

    /// Open a link to `device` (e.g. `inst0`)
    pub async fn create_link(
        &self,
        device: &str,
        client_id: i32,
        lock_device: bool,
        lock_timeout: u32,
    ) -> Result<Link, Error> {
        let parms = CreateLinkParms {
            client_id,
            lock_device,
            lock_timeout,
            device: device.to_string(),
        };
        let resp: CreateLinkResp = self.call_device("create_link", parms).await?;
        log::debug!(
            "Created link {} to {} on {}",
            resp.lid,
            device,
            self.inner.peer
        );

        Ok(Link {
            client: Arc::downgrade(&self.inner),
            lid: resp.lid,
            abort_port: resp.abort_port,
            max_recv_size: resp.max_recv_size,
        })
    }

    /// Destroy link `lid`. Destroying a link twice is reported by the instrument.
    pub async fn destroy_link(&self, lid: DeviceLink) -> Result<(), Error> {
        let _: DeviceError = self.call_device("destroy_link", lid).await?;
        log::debug!("Destroyed link {} on {}", lid, self.inner.peer);
        Ok(())
    }

    /// Close the connection and wait for its background tasks.
    ///
    /// Calls in flight fail with a transport error. Closing again does nothing.
    pub async fn close(&self) -> Result<(), Error> {
        self.inner.shutdown.shutdown().await;
        let res = self.inner.core.lock().await.close().await;
        if let Some(drain) = self.inner.drain.lock().await.take() {
            drain.await;
        }
        res.map_err(Error::Transport)
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.shutdown.is_closed().await
    }
}

/// A link to a device, created by [Client::create_link]
#[derive(Debug, Clone)]
pub struct Link {
    client: Weak<ClientInner>,
    lid: DeviceLink,
    abort_port: u16,
    max_recv_size: u32,
}

impl Link {
    pub fn lid(&self) -> DeviceLink {
        self.lid
    }

    /// Port of the abort channel
    pub fn abort_port(&self) -> u16 {
        self.abort_port
    }

    /// Largest write the instrument accepts
    pub fn max_recv_size(&self) -> u32 {
        self.max_recv_size
    }

    pub async fn destroy(&self) -> Result<(), Error> {
        let client = self
            .client
            .upgrade()
            .ok_or(Error::Transport(RpcError::Disconnected))?;
        let _: DeviceError = client.call_device("destroy_link", self.lid).await?;
        log::debug!("Destroyed link {} on {}", self.lid, client.peer);
        Ok(())
    }
}
