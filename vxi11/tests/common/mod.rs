//! Simulated portmapper and instrument listening on localhost

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    io::Cursor,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_listen::ListenExt;
use async_std::{
    net::{TcpListener, TcpStream},
    stream::StreamExt,
    task,
};

use testlab_vxi11::common::{
    onc_rpc::{
        read_record, write_record,
        xdr::{AcceptStat, Callbody, MsgType, RpcMessage},
    },
    portmapper::{xdr::Mapping, PORTMAPPER_PROG},
    vxi11::{
        xdr::{CreateLinkParms, CreateLinkResp, DeviceError, DeviceErrorCode, DeviceLink},
        DEVICE_ASYNC, DEVICE_CORE, DEVICE_INTR,
    },
    xdr::prelude::*,
};

pub const CORE_PORT: u32 = 1024;
pub const ABORT_PORT: u32 = 1025;
pub const IRQ_PORT: u32 = 1026;

pub fn init_logging() {
    femme::with_level(log::LevelFilter::Debug);
}

/// Handles one call. Results are written to the second cursor.
pub type Handler =
    dyn Fn(&Callbody, &mut Cursor<Vec<u8>>, &mut Cursor<Vec<u8>>) -> AcceptStat + Send + Sync;

/// Accept connections on a fresh localhost port and answer calls with `handler`
pub async fn spawn_server(handler: Arc<Handler>) -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    task::spawn(async move {
        let mut incoming = listener
            .incoming()
            .log_warnings(|warn| log::warn!("Listening error: {}", warn))
            .handle_errors(Duration::from_millis(100))
            .backpressure(10);

        while let Some((token, stream)) = incoming.next().await {
            let handler = handler.clone();
            task::spawn(async move {
                serve_stream(stream, handler).await;
                drop(token);
            });
        }
    });
    port
}

async fn serve_stream(mut stream: TcpStream, handler: Arc<Handler>) {
    while let Ok(record) = read_record(&mut stream, 64 * 1024).await {
        let mut args = Cursor::new(record);
        let mut msg = RpcMessage::default();
        if msg.read_xdr(&mut args).is_err() {
            return;
        }
        let call = match msg.mtype {
            MsgType::Call(call) => call,
            MsgType::Reply(_) => return,
        };

        let mut ret = Cursor::new(Vec::new());
        let stat = handler(&call, &mut args, &mut ret);
        let success = stat == AcceptStat::Success;

        let mut reply = Cursor::new(Vec::new());
        RpcMessage::accepted(msg.xid, stat)
            .write_xdr(&mut reply)
            .unwrap();
        if success {
            reply.get_mut().extend_from_slice(ret.get_ref());
        }
        if write_record(&mut stream, reply.get_ref()).await.is_err() {
            return;
        }
    }
}

/// Portmapper which records the programs it was asked about
pub struct Portmap {
    pub port: u16,
    pub queried: Arc<Mutex<Vec<u32>>>,
}

/// Programs in `ports` are mapped, programs in `broken` get `SYSTEM_ERR`,
/// everything else reports port 0.
pub async fn spawn_portmap(ports: HashMap<u32, u32>, broken: HashSet<u32>) -> Portmap {
    let queried = Arc::new(Mutex::new(Vec::new()));
    let log = queried.clone();
    let handler = move |call: &Callbody, args: &mut Cursor<Vec<u8>>, ret: &mut Cursor<Vec<u8>>| {
        if call.prog != PORTMAPPER_PROG {
            return AcceptStat::ProgUnavail;
        }
        match call.proc {
            0 => AcceptStat::Success,
            3 => {
                let mut mapping = Mapping::default();
                if mapping.read_xdr(args).is_err() {
                    return AcceptStat::GarbageArgs;
                }
                log.lock().unwrap().push(mapping.prog);
                if broken.contains(&mapping.prog) {
                    return AcceptStat::SystemErr;
                }
                let port = ports.get(&mapping.prog).copied().unwrap_or(0);
                port.write_xdr(ret).unwrap();
                AcceptStat::Success
            }
            _ => AcceptStat::ProcUnavail,
        }
    };
    let port = spawn_server(Arc::new(handler)).await;
    Portmap { port, queried }
}

pub fn vxi11_ports() -> HashMap<u32, u32> {
    HashMap::from([
        (DEVICE_CORE, CORE_PORT),
        (DEVICE_ASYNC, ABORT_PORT),
        (DEVICE_INTR, IRQ_PORT),
    ])
}

/// Instrument core channel state
pub struct Instrument {
    /// Error returned by every create_link, 0 to accept them
    pub create_error: i32,
    next_lid: i32,
    links: HashSet<i32>,
    pub created: Vec<CreateLinkParms>,
}

impl Instrument {
    pub fn new() -> Self {
        Self {
            create_error: 0,
            next_lid: 7,
            links: HashSet::new(),
            created: Vec::new(),
        }
    }

    pub fn failing(code: DeviceErrorCode) -> Self {
        Self {
            create_error: code.code(),
            ..Self::new()
        }
    }

    pub fn open_links(&self) -> usize {
        self.links.len()
    }

    fn create_link(&mut self, parms: CreateLinkParms) -> CreateLinkResp {
        self.created.push(parms);
        if self.create_error != 0 {
            return CreateLinkResp {
                error: DeviceErrorCode::from_code(self.create_error),
                ..Default::default()
            };
        }
        let lid = self.next_lid;
        self.next_lid += 1;
        self.links.insert(lid);
        CreateLinkResp {
            error: DeviceErrorCode::NoError,
            lid: DeviceLink(lid),
            abort_port: ABORT_PORT as u16,
            max_recv_size: 4096,
        }
    }

    fn destroy_link(&mut self, lid: DeviceLink) -> DeviceError {
        let error = if self.links.remove(&lid.0) {
            DeviceErrorCode::NoError
        } else {
            DeviceErrorCode::InvalidLinkIdentifier
        };
        DeviceError { error }
    }
}

/// Serve `instrument` as a core channel, returns the port it listens on
pub async fn spawn_instrument(instrument: Arc<Mutex<Instrument>>) -> u16 {
    let handler = move |call: &Callbody, args: &mut Cursor<Vec<u8>>, ret: &mut Cursor<Vec<u8>>| {
        if call.prog != DEVICE_CORE {
            return AcceptStat::ProgUnavail;
        }
        let mut instrument = instrument.lock().unwrap();
        match call.proc {
            10 => {
                let mut parms = CreateLinkParms::default();
                if parms.read_xdr(args).is_err() {
                    return AcceptStat::GarbageArgs;
                }
                instrument.create_link(parms).write_xdr(ret).unwrap();
            }
            23 => {
                let mut lid = DeviceLink::default();
                if lid.read_xdr(args).is_err() {
                    return AcceptStat::GarbageArgs;
                }
                instrument.destroy_link(lid).write_xdr(ret).unwrap();
            }
            // device_trigger, always answered with "operation not supported"
            14 => DeviceError {
                error: DeviceErrorCode::OperationNotSupported,
            }
            .write_xdr(ret)
            .unwrap(),
            _ => return AcceptStat::ProcUnavail,
        }
        AcceptStat::Success
    };
    spawn_server(Arc::new(handler)).await
}

/// Accepts connections and closes them after `delay`
pub async fn spawn_hangup(delay: Duration) -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    task::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            task::spawn(async move {
                task::sleep(delay).await;
                drop(stream);
            });
        }
    });
    port
}
