//! The bus session: one TCP connection to acnetd shared by every request.
//!
//! A single reader thread owns all socket reads and the reconnect loop.
//! Callers only ever write, one command at a time, and then wait for the
//! gateway's acknowledgment on a shared ack channel. Replies to requests are
//! routed by request id into per-request queues which callers drain through
//! [`ReplyStream`]s.

use std::collections::HashMap;
use std::mem;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::JoinHandle;

use acsys_frame::{Frame, FrameConfig, FrameReader, FrameWriter, ReplyHeader, ACK, COMMAND, DATA};
use acsys_transport::BusStream;
use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::command::{check_ack_status, Command, NodeAck, RequestAck};
use crate::config::SessionConfig;
use crate::error::{AcnetError, Result};
use crate::handshake::handshake;
use crate::rad50;
use crate::reply::{lock, Release, Reply, ReplyQueue, ReplyStream};
use crate::status::Status;

/// Acks the gateway may have outstanding before the reader drops extras.
const ACK_CAPACITY: usize = 4;

/// A persistent, self-healing ACNET connection through an acnetd gateway.
///
/// Created once and shared (it is `Sync`); lives until [`BusSession::close`]
/// or drop. On transport failure every open reply stream receives `NOCON`
/// and the session reconnects in the background.
pub struct BusSession {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    config: SessionConfig,
    link: Mutex<Link>,
    link_changed: Condvar,
    /// Held for the whole write-then-await-ack exchange of a command.
    command: Mutex<Receiver<Bytes>>,
    ack_tx: SyncSender<Bytes>,
    requests: Mutex<RequestTable>,
    nodes: Mutex<HashMap<String, u16>>,
}

#[derive(Default)]
struct Link {
    connected: bool,
    shutdown: bool,
    handle: u32,
    node: u8,
    writer: Option<FrameWriter<BusStream>>,
    control: Option<BusStream>,
}

#[derive(Default)]
struct RequestTable {
    /// Bumped on every teardown.
    epoch: u64,
    queues: HashMap<u16, Arc<ReplyQueue>>,
}

impl BusSession {
    /// Create a session and start its reader thread, which connects in the
    /// background. Use [`BusSession::connect`] to wait for the link.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(ACK_CAPACITY);
        let shared = Arc::new(Shared {
            config,
            link: Mutex::new(Link::default()),
            link_changed: Condvar::new(),
            command: Mutex::new(ack_rx),
            ack_tx,
            requests: Mutex::new(RequestTable::default()),
            nodes: Mutex::new(HashMap::new()),
        });

        let reader = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("acnet-reader".to_string())
                .spawn(move || shared.run_reader())
                .map_err(acsys_transport::TransportError::Io)?
        };

        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Open a session and wait for the first connection.
    pub fn connect_with_config(config: SessionConfig) -> Result<Self> {
        let session = Self::open(config)?;
        session.connect()?;
        Ok(session)
    }

    /// Wait until the session is live.
    ///
    /// Idempotent: returns at once when already connected. Waits up to
    /// `connect_wait` otherwise and fails with `NOCON`.
    pub fn connect(&self) -> Result<()> {
        let link = lock(&self.shared.link);
        let (link, _) = self
            .shared
            .link_changed
            .wait_timeout_while(link, self.shared.config.connect_wait, |link| {
                !link.connected && !link.shutdown
            })
            .unwrap_or_else(PoisonError::into_inner);

        if link.connected {
            Ok(())
        } else {
            Err(Status::NOCON.into())
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.link).connected
    }

    /// Connection handle assigned by the gateway (0 until connected).
    pub fn local_handle(&self) -> u32 {
        lock(&self.shared.link).handle
    }

    /// Local node number reported by the gateway.
    pub fn local_node(&self) -> u8 {
        lock(&self.shared.link).node
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Number of request ids with a live reply queue.
    pub fn open_requests(&self) -> usize {
        lock(&self.shared.requests).queues.len()
    }

    /// Translate a node name into its trunk/node value.
    pub fn resolve_node(&self, name: &str) -> Result<u16> {
        self.connect()?;

        let key = name.trim().to_ascii_uppercase();
        if let Some(node) = lock(&self.shared.nodes).get(&key) {
            return Ok(*node);
        }

        let handle = self.local_handle();
        let command = Command::NameLookup {
            handle,
            name: rad50::encode(&key),
        };
        let (ack, _) = self.shared.send_command(&command.encode())?;
        let ack = NodeAck::parse(&ack)?;
        check_ack_status(ack.status)?;

        debug!(name = %key, node = ack.node, "resolved node");
        lock(&self.shared.nodes).insert(key, ack.node);
        Ok(ack.node)
    }

    /// Send a request for a single reply and wait for it.
    ///
    /// `PEND` replies are skipped; a fatal reply status is returned as the
    /// error. The timeout is passed to the remote side, not enforced here.
    pub fn request_once(&self, destination: &str, payload: &[u8], timeout_ms: u32) -> Result<Reply> {
        let mut stream = self.request_single(destination, payload, timeout_ms)?;
        match stream.recv()? {
            Some(reply) => Ok(reply),
            None => Err(Status::NOCON.into()),
        }
    }

    /// Send a request for a single reply and return the cursor that will
    /// yield it, for callers that poll instead of waiting.
    pub fn request_single(
        &self,
        destination: &str,
        payload: &[u8],
        timeout_ms: u32,
    ) -> Result<ReplyStream> {
        self.request(destination, payload, false, timeout_ms)
    }

    /// Send a request for multiple replies and return the cursor over them.
    pub fn request_stream(
        &self,
        destination: &str,
        payload: &[u8],
        timeout_ms: u32,
    ) -> Result<ReplyStream> {
        self.request(destination, payload, true, timeout_ms)
    }

    fn request(
        &self,
        destination: &str,
        payload: &[u8],
        multiple: bool,
        timeout_ms: u32,
    ) -> Result<ReplyStream> {
        let (task, node_name) = split_destination(destination)?;
        let node = self.resolve_node(node_name)?;

        let command = Command::SendRequest {
            handle: self.local_handle(),
            task: rad50::encode(task),
            node,
            multiple,
            timeout_ms,
            data: payload,
        };
        let (ack, epoch) = self.shared.send_command(&command.encode())?;
        let ack = RequestAck::parse(&ack)?;
        check_ack_status(ack.status)?;

        let queue = {
            let mut table = lock(&self.shared.requests);
            if table.epoch != epoch {
                // The connection dropped after the command went out; the
                // reply queue would never be closed.
                return Err(Status::NOCON.into());
            }
            Arc::clone(
                table
                    .queues
                    .entry(ack.request_id)
                    .or_insert_with(ReplyQueue::new),
            )
        };

        debug!(
            destination,
            request_id = ack.request_id,
            multiple,
            timeout_ms,
            "request sent"
        );
        let owner: Weak<dyn Release> = Arc::downgrade(&self.shared) as Weak<dyn Release>;
        Ok(ReplyStream::new(ack.request_id, queue, multiple).with_owner(owner))
    }

    /// Stop the reader thread and close the connection.
    ///
    /// Open reply streams receive `NOCON`. Safe to call more than once.
    pub fn close(&self) {
        {
            let mut link = lock(&self.shared.link);
            link.shutdown = true;
            if let Some(control) = link.control.as_ref() {
                let _ = control.shutdown();
            }
        }
        self.shared.link_changed.notify_all();

        if let Some(reader) = lock(&self.reader).take() {
            if reader.thread().id() != std::thread::current().id() {
                let _ = reader.join();
            }
        }
    }
}

impl Drop for BusSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for BusSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = lock(&self.shared.link);
        f.debug_struct("BusSession")
            .field("gateway", &self.shared.config.gateway)
            .field("connected", &link.connected)
            .field("handle", &rad50::decode(link.handle))
            .finish()
    }
}

/// Split `TASK@NODE`.
pub fn split_destination(destination: &str) -> Result<(&str, &str)> {
    match destination.split_once('@') {
        Some((task, node)) if !task.is_empty() && !node.is_empty() && !node.contains('@') => {
            Ok((task, node))
        }
        _ => Err(AcnetError::InvalidDestination(destination.to_string())),
    }
}

impl Release for Shared {
    fn release(&self, request_id: u16, queue: &Arc<ReplyQueue>) {
        let mut table = lock(&self.requests);
        if table
            .queues
            .get(&request_id)
            .is_some_and(|registered| Arc::ptr_eq(registered, queue))
        {
            table.queues.remove(&request_id);
        }
    }
}

impl Shared {
    fn is_shutdown(&self) -> bool {
        lock(&self.link).shutdown
    }

    /// Write a command and wait for its acknowledgment.
    ///
    /// Returns the ack payload and the connection epoch the command was
    /// sent on.
    fn send_command(&self, payload: &[u8]) -> Result<(Bytes, u64)> {
        let acks = lock(&self.command);

        // Acks read off a connection that was abandoned after an ack
        // timeout. The new connection only goes live once the reader has
        // finished with the old one, so nothing stale can arrive later.
        while acks.try_recv().is_ok() {}

        let epoch = lock(&self.requests).epoch;
        {
            let mut link = lock(&self.link);
            let Some(writer) = link.writer.as_mut() else {
                return Err(Status::NOCON.into());
            };
            if let Err(err) = writer.send(COMMAND, payload) {
                warn!(error = %err, "command write failed");
                return Err(Status::NOCON.into());
            }
        }

        match acks.recv_timeout(self.config.ack_timeout) {
            Ok(ack) => Ok((ack, epoch)),
            Err(_) => {
                warn!(
                    timeout = ?self.config.ack_timeout,
                    "no ack from gateway, dropping connection"
                );
                self.abandon_link(epoch);
                Err(Status::NOCON.into())
            }
        }
    }

    /// Drop the connection of `epoch` so a late ack cannot be paired with a
    /// later command. The reader tears down and reconnects.
    fn abandon_link(&self, epoch: u64) {
        if lock(&self.requests).epoch != epoch {
            return;
        }
        let mut link = lock(&self.link);
        link.connected = false;
        link.writer = None;
        if let Some(control) = link.control.take() {
            let _ = control.shutdown();
        }
    }

    fn run_reader(&self) {
        info!(gateway = %self.config.gateway, "acnet reader started");

        loop {
            if self.is_shutdown() {
                break;
            }

            let mut reader = match self.establish() {
                Ok(reader) => reader,
                Err(err) => {
                    warn!(gateway = %self.config.gateway, error = %err, "gateway connect failed");
                    if !self.backoff() {
                        break;
                    }
                    continue;
                }
            };

            let err = loop {
                match reader.read_frame() {
                    Ok(frame) => self.dispatch(frame),
                    Err(err) => break err,
                }
            };

            if self.is_shutdown() {
                self.teardown();
                break;
            }

            warn!(error = %err, "gateway connection lost");
            self.teardown();
            if !self.backoff() {
                break;
            }
        }

        info!("acnet reader stopped");
    }

    /// Connect, run the handshake and open the connected gate.
    fn establish(&self) -> Result<FrameReader<BusStream>> {
        let stream =
            acsys_transport::connect_timeout(&self.config.gateway, self.config.connect_timeout)?;
        let reader_stream = stream.try_clone()?;
        let control = stream.try_clone()?;

        let handshake_config = FrameConfig {
            read_timeout: Some(self.config.handshake_timeout),
            write_timeout: Some(self.config.handshake_timeout),
            ..self.config.frame.clone()
        };
        let mut reader = FrameReader::with_config_bus(reader_stream, handshake_config.clone())?;
        let mut writer = FrameWriter::with_config_bus(stream, handshake_config)?;

        let ack = handshake(&mut reader, &mut writer)?;

        reader.set_read_timeout(self.config.frame.read_timeout)?;
        writer
            .get_ref()
            .set_write_timeout(self.config.frame.write_timeout)?;

        {
            let mut link = lock(&self.link);
            if link.shutdown {
                let _ = control.shutdown();
                return Err(acsys_transport::TransportError::Shutdown.into());
            }
            link.connected = true;
            link.handle = ack.handle;
            link.node = ack.node;
            link.writer = Some(writer);
            link.control = Some(control);
        }
        self.link_changed.notify_all();

        info!(
            gateway = %self.config.gateway,
            handle = %rad50::decode(ack.handle),
            node = ack.node,
            "connected to acnetd"
        );
        Ok(reader)
    }

    fn dispatch(&self, frame: Frame) {
        match frame.msg_type {
            DATA => {
                let (header, body) = match ReplyHeader::split(frame.payload) {
                    Ok(parts) => parts,
                    Err(err) => {
                        warn!(error = %err, "dropping malformed reply");
                        return;
                    }
                };
                self.route(header, body);
            }
            ACK => match self.ack_tx.try_send(frame.payload) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("ack channel full, dropping ack"),
                Err(TrySendError::Disconnected(_)) => {}
            },
            other => debug!(msg_type = other, "ignoring gateway message"),
        }
    }

    fn route(&self, header: ReplyHeader, payload: Bytes) {
        let reply = Reply {
            status: Status::from_raw(header.status),
            address: header.address(),
            payload,
        };
        trace!(
            request_id = header.request_id,
            status = %reply.status,
            len = reply.payload.len(),
            "reply"
        );

        let mut table = lock(&self.requests);
        let queue = Arc::clone(
            table
                .queues
                .entry(header.request_id)
                .or_insert_with(ReplyQueue::new),
        );

        if queue.len() >= self.config.max_pending_replies {
            warn!(
                request_id = header.request_id,
                limit = self.config.max_pending_replies,
                "reply queue overflow, closing stream"
            );
            table.queues.remove(&header.request_id);
            drop(table);
            queue.push(Reply::status_only(Status::NOLCLMEM));
            return;
        }
        drop(table);

        queue.push(reply);
    }

    /// Close every open stream with `NOCON` and drop the socket.
    fn teardown(&self) {
        let queues = {
            let mut table = lock(&self.requests);
            table.epoch += 1;
            mem::take(&mut table.queues)
        };
        let closed = queues.len();
        for queue in queues.into_values() {
            queue.push(Reply::status_only(Status::NOCON));
        }

        lock(&self.nodes).clear();

        {
            let mut link = lock(&self.link);
            link.connected = false;
            link.writer = None;
            if let Some(control) = link.control.take() {
                let _ = control.shutdown();
            }
        }
        self.link_changed.notify_all();

        if closed > 0 {
            warn!(closed, "reply streams closed with NOCON");
        }
    }

    /// Sleep the reconnect backoff. Returns false if shut down meanwhile.
    fn backoff(&self) -> bool {
        let link = lock(&self.link);
        let (link, _) = self
            .link_changed
            .wait_timeout_while(link, self.config.reconnect_backoff, |link| !link.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        !link.shutdown
    }
}
