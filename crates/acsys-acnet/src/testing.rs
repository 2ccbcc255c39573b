//! In-process acnetd stand-in for tests.
//!
//! [`FakeGateway`] listens on a loopback port, speaks the raw gateway
//! protocol (preamble, connect, node lookup, send request) and hands each
//! request to a caller-supplied handler together with a [`ReplySink`] for
//! answering it.

use std::collections::HashMap;
use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use acsys_frame::{FrameReader, FrameWriter, ReplyHeader, ACK, COMMAND, REPLY_HEADER_SIZE};
use acsys_transport::GatewayAddr;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::command::{CMD_CONNECT, CMD_NAME_LOOKUP, CMD_SEND_REQUEST, PREAMBLE, REQ_MULTIPLE};
use crate::config::SessionConfig;
use crate::rad50;
use crate::reply::lock;
use crate::status::Status;

/// Node number the fake gateway reports as local.
pub const LOCAL_NODE: u8 = 0x21;

/// First trunk/node value handed out to looked-up names.
pub const FIRST_NODE: u16 = 0x0A01;

type Handler = dyn Fn(&GatewayRequest, &ReplySink) + Send + Sync;
type SharedWriter = Arc<Mutex<FrameWriter<TcpStream>>>;

/// A request as received by the fake gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub request_id: u16,
    /// Destination task, decoded from RAD50.
    pub task: String,
    pub node: u16,
    pub multiple: bool,
    pub timeout_ms: u32,
    pub data: Bytes,
}

/// Writes DATA frames answering one request.
#[derive(Clone)]
pub struct ReplySink {
    request_id: u16,
    node: u16,
    writer: SharedWriter,
}

impl ReplySink {
    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    /// Send a reply with `status` and `payload`, from the request's node.
    pub fn reply(&self, status: Status, payload: &[u8]) -> acsys_frame::Result<()> {
        self.reply_as(self.request_id, status, payload)
    }

    /// Send a reply tagged with an arbitrary request id.
    pub fn reply_as(&self, request_id: u16, status: Status, payload: &[u8]) -> acsys_frame::Result<()> {
        let header = ReplyHeader {
            flags: 0,
            status: status.raw(),
            trunk: (self.node >> 8) as u8,
            node: (self.node & 0xff) as u8,
            request_id,
            length: (REPLY_HEADER_SIZE + payload.len()) as u16,
        };
        let mut buf = BytesMut::with_capacity(REPLY_HEADER_SIZE + payload.len());
        header.encode(&mut buf);
        buf.put_slice(payload);
        lock(&self.writer).send(acsys_frame::DATA, &buf)
    }
}

impl std::fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySink")
            .field("request_id", &self.request_id)
            .field("node", &self.node)
            .finish()
    }
}

struct GatewayState {
    handler: Box<Handler>,
    shutdown: AtomicBool,
    connections: AtomicUsize,
    next_request_id: AtomicU16,
    ack_status: Mutex<Status>,
    ack_delay: Mutex<Duration>,
    requests: Mutex<Vec<GatewayRequest>>,
    sinks: Mutex<HashMap<u16, ReplySink>>,
    nodes: Mutex<HashMap<String, u16>>,
    current: Mutex<Option<TcpStream>>,
}

/// A loopback acnetd that answers with a test-supplied handler.
pub struct FakeGateway {
    addr: SocketAddr,
    state: Arc<GatewayState>,
    acceptor: Option<JoinHandle<()>>,
}

impl FakeGateway {
    /// Start a gateway whose requests are answered by `handler`.
    pub fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&GatewayRequest, &ReplySink) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let state = Arc::new(GatewayState {
            handler: Box::new(handler),
            shutdown: AtomicBool::new(false),
            connections: AtomicUsize::new(0),
            next_request_id: AtomicU16::new(1),
            ack_status: Mutex::new(Status::from_raw(0)),
            ack_delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            sinks: Mutex::new(HashMap::new()),
            nodes: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
        });

        let acceptor = {
            let state = Arc::clone(&state);
            std::thread::Builder::new()
                .name("fake-acnetd".to_string())
                .spawn(move || accept_loop(listener, state))?
        };

        Ok(Self {
            addr,
            state,
            acceptor: Some(acceptor),
        })
    }

    /// A gateway that never replies to requests.
    pub fn silent() -> std::io::Result<Self> {
        Self::start(|_, _| {})
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn gateway_addr(&self) -> GatewayAddr {
        GatewayAddr::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// Session settings pointed at this gateway, with short timeouts.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            gateway: self.gateway_addr(),
            connect_timeout: Some(Duration::from_secs(2)),
            handshake_timeout: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(2),
            connect_wait: Duration::from_secs(2),
            reconnect_backoff: Duration::from_millis(50),
            ..SessionConfig::default()
        }
    }

    /// Pin the trunk/node value returned for `name`.
    pub fn with_node(self, name: &str, node: u16) -> Self {
        lock(&self.state.nodes).insert(name.to_ascii_uppercase(), node);
        self
    }

    /// Status placed in subsequent send-request acks.
    pub fn set_ack_status(&self, status: Status) {
        *lock(&self.state.ack_status) = status;
    }

    /// Hold each send-request ack back for `delay`.
    pub fn set_ack_delay(&self, delay: Duration) {
        *lock(&self.state.ack_delay) = delay;
    }

    /// Cut the live client connection.
    pub fn drop_connection(&self) {
        if let Some(stream) = lock(&self.state.current).take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<GatewayRequest> {
        lock(&self.state.requests).clone()
    }

    /// Reply sink for a request received earlier.
    pub fn sink(&self, request_id: u16) -> Option<ReplySink> {
        lock(&self.state.sinks).get(&request_id).cloned()
    }

    /// Wait until at least `count` requests arrived.
    pub fn wait_for_requests(&self, count: usize, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if lock(&self.state.requests).len() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        lock(&self.state.requests).len() >= count
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        self.state.shutdown.store(true, Ordering::SeqCst);
        self.drop_connection();
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
    }
}

fn accept_loop(listener: TcpListener, state: Arc<GatewayState>) {
    while !state.shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "fake gateway accepted");
                let state = Arc::clone(&state);
                let _ = std::thread::Builder::new()
                    .name("fake-acnetd-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = serve(stream, &state) {
                            debug!(error = %err, "fake gateway connection ended");
                        }
                    });
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(_) => break,
        }
    }
}

fn serve(mut stream: TcpStream, state: &GatewayState) -> acsys_frame::Result<()> {
    stream.set_nonblocking(false)?;
    let mut preamble = [0u8; PREAMBLE.len()];
    stream.read_exact(&mut preamble)?;
    if &preamble != PREAMBLE {
        return Err(acsys_frame::FrameError::ConnectionClosed);
    }

    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    *lock(&state.current) = Some(stream.try_clone()?);

    let writer: SharedWriter = Arc::new(Mutex::new(FrameWriter::new(stream.try_clone()?)));
    let mut reader = FrameReader::new(stream);
    let handle = rad50::encode(&format!("CLI{connection:03}"));

    loop {
        let frame = reader.read_frame()?;
        if frame.msg_type != COMMAND {
            continue;
        }

        let mut cmd = frame.payload;
        if cmd.remaining() < 10 {
            continue;
        }
        let code = cmd.get_u16();
        let _handle = cmd.get_u32();
        let _vnode = cmd.get_u32();

        let mut ack = BytesMut::with_capacity(16);
        ack.put_u16(code);

        match code {
            CMD_CONNECT => {
                ack.put_i16(0);
                ack.put_u8(LOCAL_NODE);
                ack.put_u32(handle);
                lock(&writer).send(ACK, &ack)?;
            }
            CMD_NAME_LOOKUP if cmd.remaining() >= 4 => {
                let name = rad50::decode(cmd.get_u32()).trim_end().to_string();
                let node = {
                    let mut nodes = lock(&state.nodes);
                    let next = FIRST_NODE + nodes.len() as u16;
                    *nodes.entry(name).or_insert(next)
                };
                ack.put_i16(0);
                ack.put_u16(node);
                lock(&writer).send(ACK, &ack)?;
            }
            CMD_SEND_REQUEST if cmd.remaining() >= 12 => {
                let task = rad50::decode(cmd.get_u32()).trim_end().to_string();
                let node = cmd.get_u16();
                let flags = cmd.get_u16();
                let timeout_ms = cmd.get_u32();

                let ack_status = *lock(&state.ack_status);
                let request_id = state.next_request_id.fetch_add(1, Ordering::SeqCst);
                let request = GatewayRequest {
                    request_id,
                    task,
                    node,
                    multiple: flags & REQ_MULTIPLE != 0,
                    timeout_ms,
                    data: cmd,
                };
                let sink = ReplySink {
                    request_id,
                    node,
                    writer: Arc::clone(&writer),
                };
                if !ack_status.is_fatal() {
                    lock(&state.requests).push(request.clone());
                    lock(&state.sinks).insert(request_id, sink.clone());
                }

                ack.put_i16(ack_status.raw());
                ack.put_u16(request_id);
                let delay = *lock(&state.ack_delay);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                lock(&writer).send(ACK, &ack)?;
                if ack_status.is_fatal() {
                    continue;
                }

                (state.handler)(&request, &sink);
            }
            _ => {
                ack.put_i16(Status::REQPACK.raw());
                lock(&writer).send(ACK, &ack)?;
            }
        }
    }
}
