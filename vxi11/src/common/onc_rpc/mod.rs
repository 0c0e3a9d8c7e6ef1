//! ONC-RPC over stream transports.
//!
//! An [RpcConnection] owns one stream. Calls are written by the caller, replies
//! are read by a background task which hands each record to the call waiting for
//! that xid. When the peer goes away the task publishes a [Disconnect] on the
//! channel returned by [RpcConnection::open] and fails every outstanding call.

use std::{
    collections::HashMap,
    fmt,
    io::{self, Cursor, ErrorKind},
    sync::Arc,
    time::Duration,
};

use async_std::{
    channel::{self, Receiver, Sender},
    future,
    sync::Mutex,
    task::{self, JoinHandle},
};
use byteorder::{ByteOrder, NetworkEndian};
use futures::{
    channel::oneshot,
    future::{select, Either},
    io::{ReadHalf, WriteHalf},
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
};

use crate::{client::ClientConfig, common::xdr::prelude::*};

use self::xdr::{AcceptStat, AuthStat, MismatchInfo, MsgType, RejectStat, ReplyStat, RpcMessage};

pub mod record;
pub mod registry;
pub mod xdr;

pub use record::{read_record, write_record};
pub use registry::{Procedure, ProcedureId, ProcedureRegistry};

pub mod prelude {
    pub use super::{
        xdr::MismatchInfo, Disconnect, Procedure, ProcedureId, ProcedureRegistry, RpcConnection,
        RpcError, ShutdownHandle,
    };
}

/// An error which occured during an RPC call
#[derive(Debug)]
pub enum RpcError {
    /// Program not available
    ProgUnavail,
    /// Program version not available (see accepted version low-high in [MismatchInfo])
    ProgMismatch(MismatchInfo),
    /// Procedure not available
    ProcUnavail,
    /// Arguments have too many or too few bytes to deserialize
    GarbageArgs,
    /// Internal error
    SystemErr,
    /// RPC version not supported
    RpcMismatch(MismatchInfo),
    /// Error during RPC authentication
    AuthError(AuthStat),
    /// Peer answered with something that is not a reply
    UnexpectedReply,
    /// No procedure with this name has been registered on the connection
    ProcedureNotRegistered(String),
    /// Name is already registered with a different program, version or procedure
    ConflictingProcedure {
        name: &'static str,
        registered: ProcedureId,
        requested: ProcedureId,
    },
    /// Connection was closed, locally or by the peer
    Disconnected,
    /// (De-)serialization or I/O error on RPC channel
    Io(io::Error),
}

impl From<io::Error> for RpcError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::ProgUnavail => write!(f, "program unavailable"),
            RpcError::ProgMismatch(m) => {
                write!(f, "program version mismatch (supported {}-{})", m.low, m.high)
            }
            RpcError::ProcUnavail => write!(f, "procedure unavailable"),
            RpcError::GarbageArgs => write!(f, "server could not decode arguments"),
            RpcError::SystemErr => write!(f, "remote system error"),
            RpcError::RpcMismatch(m) => {
                write!(f, "RPC version mismatch (supported {}-{})", m.low, m.high)
            }
            RpcError::AuthError(stat) => write!(f, "authentication error {:?}", stat),
            RpcError::UnexpectedReply => write!(f, "unexpected reply"),
            RpcError::ProcedureNotRegistered(name) => {
                write!(f, "procedure {} is not registered", name)
            }
            RpcError::ConflictingProcedure {
                name,
                registered,
                requested,
            } => write!(
                f,
                "procedure {} already registered as {}, cannot register as {}",
                name, registered, requested
            ),
            RpcError::Disconnected => write!(f, "connection closed"),
            RpcError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Published when the peer closes the connection or reading from it fails
#[derive(Debug)]
pub struct Disconnect {
    pub peer: String,
    /// `None` for an orderly close
    pub cause: Option<io::Error>,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(err) => write!(f, "Server {} disconnected: {}", self.peer, err),
            None => write!(f, "Server {} disconnected", self.peer),
        }
    }
}

#[derive(Default)]
struct Pending {
    closed: bool,
    calls: HashMap<u32, oneshot::Sender<Vec<u8>>>,
}

impl Pending {
    /// Fail outstanding calls and refuse new ones
    fn close(&mut self) -> bool {
        let was_closed = self.closed;
        self.closed = true;
        self.calls.clear();
        was_closed
    }
}

/// Closes an [RpcConnection] without waiting for calls in flight to finish
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Mutex<Pending>>);

impl ShutdownHandle {
    /// Calls in flight fail with [RpcError::Disconnected], including one blocked
    /// on a write the peer does not read
    pub async fn shutdown(&self) {
        self.0.lock().await.close();
    }

    pub async fn is_closed(&self) -> bool {
        self.0.lock().await.closed
    }
}

pub struct RpcConnection<IO> {
    xid: u32,
    peer: String,
    registry: ProcedureRegistry,
    writer: WriteHalf<IO>,
    pending: Arc<Mutex<Pending>>,
    reader: Option<JoinHandle<()>>,
    /// Dropping it stops the reader
    stop: Option<oneshot::Sender<()>>,
    io_timeout: Option<Duration>,
}

impl<IO> RpcConnection<IO>
where
    IO: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Start a connection over `io`. `peer` is only used for logging.
    pub fn open(
        io: IO,
        peer: impl Into<String>,
        config: &ClientConfig,
    ) -> (Self, Receiver<Disconnect>) {
        let peer = peer.into();
        let (reader, writer) = io.split();
        // At most one disconnect is ever published
        let (notify, notifications) = channel::bounded(1);
        let (stop, stopped) = oneshot::channel();
        let pending = Arc::new(Mutex::new(Pending::default()));

        let reader = task::spawn(read_replies(
            reader,
            pending.clone(),
            stopped,
            notify,
            peer.clone(),
            config.max_record_size,
        ));

        let connection = Self {
            xid: 0,
            peer,
            registry: ProcedureRegistry::new(),
            writer,
            pending,
            reader: Some(reader),
            stop: Some(stop),
            io_timeout: config.io_timeout,
        };
        (connection, notifications)
    }
}

impl<IO> RpcConnection<IO>
where
    IO: AsyncWrite,
{
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn registry(&self) -> &ProcedureRegistry {
        &self.registry
    }

    pub fn register(
        &mut self,
        prog: u32,
        vers: u32,
        procedures: &[Procedure],
    ) -> Result<(), RpcError> {
        self.registry.register(prog, vers, procedures)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.pending.clone())
    }

    /// Call the registered procedure `name`. Returns `Ok(RET)` if successfull.
    pub async fn call<ARGS, RET>(&mut self, name: &str, args: ARGS) -> Result<RET, RpcError>
    where
        ARGS: XdrEncode,
        RET: XdrDecode + Default,
    {
        let id = self.registry.lookup(name)?;
        self.call_proc(id, args).await
    }

    /// Call procedure `id` with arguments of type `ARGS`. Returns `Ok(RET)` if successfull.
    ///
    /// The optional I/O timeout covers sending the call as well as waiting for the
    /// reply. A call abandoned halfway through sending leaves a partial record on
    /// the stream, so the connection is closed.
    pub async fn call_proc<ARGS, RET>(
        &mut self,
        id: ProcedureId,
        args: ARGS,
    ) -> Result<RET, RpcError>
    where
        ARGS: XdrEncode,
        RET: XdrDecode + Default,
    {
        self.xid = self.xid.wrapping_add(1);
        let xid = self.xid;

        let mut message = Cursor::new(Vec::new());
        RpcMessage::call(xid, id.prog, id.vers, id.proc).write_xdr(&mut message)?;
        args.write_xdr(&mut message)?;

        let (reply, mut replied) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(RpcError::Disconnected);
            }
            pending.calls.insert(xid, reply);
        }

        log::trace!("-> {} xid={} to {}", id, xid, self.peer);
        let writer = &mut self.writer;
        let mut sent = false;
        let exchange = async {
            // Shutting down drops the reply sender, which also aborts the write
            let write = Box::pin(write_record(&mut *writer, message.get_ref()));
            match select(write, &mut replied).await {
                Either::Left((Ok(()), _)) => {
                    sent = true;
                    (&mut replied).await.map_err(|_| RpcError::Disconnected)
                }
                Either::Left((Err(err), _)) => Err(RpcError::Io(err)),
                Either::Right((record, _)) => record.map_err(|_| RpcError::Disconnected),
            }
        };

        let res = match self.io_timeout {
            Some(limit) => future::timeout(limit, exchange)
                .await
                .unwrap_or_else(|_| {
                    Err(RpcError::Io(io::Error::new(
                        ErrorKind::TimedOut,
                        format!("call xid {} not completed within {:?}", xid, limit),
                    )))
                }),
            None => exchange.await,
        };

        match res {
            Ok(record) => parse_reply(xid, record),
            Err(err) => {
                let mut pending = self.pending.lock().await;
                pending.calls.remove(&xid);
                if !sent && !pending.close() {
                    log::debug!("Closed connection to {} after incomplete call", self.peer);
                }
                Err(err)
            }
        }
    }

    /// Stop the reader task, shut down the write side and wait for the task to exit.
    ///
    /// Calling close more than once is fine. Errors from shutting down a stream the
    /// peer already closed are ignored.
    pub async fn close(&mut self) -> Result<(), RpcError> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => return Ok(()),
        };
        let was_closed = self.pending.lock().await.close();
        self.stop.take();
        let res = self.writer.close().await;
        reader.await;
        log::debug!("Closed connection to {}", self.peer);

        match res {
            Err(err) if !was_closed => Err(err.into()),
            _ => Ok(()),
        }
    }
}

fn parse_reply<RET>(xid: u32, record: Vec<u8>) -> Result<RET, RpcError>
where
    RET: XdrDecode + Default,
{
    let mut cursor = Cursor::new(record);
    let mut reply = RpcMessage::default();
    reply.read_xdr(&mut cursor)?;
    log::trace!("<- {:?}", reply);

    if reply.xid != xid {
        return Err(RpcError::UnexpectedReply);
    }
    match reply.mtype {
        MsgType::Reply(body) => match body.stat {
            ReplyStat::Accepted(accepted) => match accepted.stat {
                AcceptStat::Success => {
                    let mut ret = RET::default();
                    ret.read_xdr(&mut cursor)?;
                    Ok(ret)
                }
                AcceptStat::ProgUnavail => Err(RpcError::ProgUnavail),
                AcceptStat::ProgMismatch(m) => Err(RpcError::ProgMismatch(m)),
                AcceptStat::ProcUnavail => Err(RpcError::ProcUnavail),
                AcceptStat::GarbageArgs => Err(RpcError::GarbageArgs),
                AcceptStat::SystemErr => Err(RpcError::SystemErr),
            },
            ReplyStat::Denied(rejected) => match rejected.stat {
                RejectStat::RpcMismatch(m) => Err(RpcError::RpcMismatch(m)),
                RejectStat::AuthError(stat) => Err(RpcError::AuthError(stat)),
            },
        },
        MsgType::Call(..) => Err(RpcError::UnexpectedReply),
    }
}

async fn read_replies<IO>(
    mut reader: ReadHalf<IO>,
    pending: Arc<Mutex<Pending>>,
    mut stopped: oneshot::Receiver<()>,
    notify: Sender<Disconnect>,
    peer: String,
    maxlen: usize,
) where
    IO: AsyncRead,
{
    let cause = loop {
        let read = Box::pin(read_record(&mut reader, maxlen));
        let record = match select(read, &mut stopped).await {
            Either::Left((Ok(record), _)) => record,
            Either::Left((Err(err), _)) => break err,
            Either::Right(_) => {
                log::debug!("Stopped reading from {}", peer);
                pending.lock().await.close();
                return;
            }
        };

        if record.len() < 4 {
            log::debug!("Short record from {}", peer);
            continue;
        }
        let xid = NetworkEndian::read_u32(&record[..4]);
        match pending.lock().await.calls.remove(&xid) {
            Some(reply) => {
                // Receiver is gone if the call timed out
                let _ = reply.send(record);
            }
            None => log::debug!("Dropped reply with unknown xid {} from {}", xid, peer),
        }
    };

    if pending.lock().await.close() {
        return;
    }
    let disconnect = Disconnect {
        peer,
        cause: match cause.kind() {
            ErrorKind::UnexpectedEof => None,
            _ => Some(cause),
        },
    };
    if let Err(err) = notify.try_send(disconnect) {
        log::debug!("Disconnect notification dropped: {}", err);
    }
}
