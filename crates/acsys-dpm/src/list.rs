use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use acsys_acnet::{BusSession, ReplyStream, Status};
use tracing::{debug, info, warn};

use crate::codec::{JsonCodec, ListCodec};
use crate::credential::{Credential, CredentialProvider, NoCredentials};
use crate::error::{ListError, Result};
use crate::generation::Generations;
use crate::item::{ListItem, Tag, Translated};
use crate::options::{ListOptions, Mode, DISCOVERY_DESTINATION, DPM_TASK};
use crate::protocol::{ListReply, ListRequest};
use crate::settings::{SettingBatches, SettingValue};
use crate::translate::translate;

/// Where a list is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// Open on the service, never started.
    Opened,
    Started,
    Stopped,
}

/// A list of data requests kept on a DPM.
///
/// Entries are edited locally and pushed to the service by [`start`]. Data
/// for the list arrives on the open-list reply stream and is read with
/// [`pending`] or [`process`].
///
/// The list is bound to the bus connection it was opened on. If that
/// connection drops, reading the list yields `NOCON` and the list has to be
/// opened again.
///
/// [`start`]: ListSession::start
/// [`pending`]: ListSession::pending
/// [`process`]: ListSession::process
pub struct ListSession<C: ListCodec = JsonCodec> {
    bus: Arc<BusSession>,
    codec: C,
    options: ListOptions,
    credentials: Box<dyn CredentialProvider>,
    dpm_task: String,
    list_id: u32,
    replies: ReplyStream,
    entries: Vec<(Tag, String)>,
    generations: Generations,
    state: ListState,
    settings_enabled: bool,
    backlog: VecDeque<ListItem>,
}

impl<C: ListCodec> ListSession<C> {
    /// Find a list service (unless `options` names one) and open a list on it.
    pub fn connect(bus: Arc<BusSession>, codec: C, options: ListOptions) -> Result<Self> {
        let dpm_task = match options.target_task() {
            Some(task) => task,
            None => discover(&bus, &codec, &options)?,
        };

        let request = marshal(&codec, &ListRequest::OpenList { location: None })?;
        let mut replies = bus.request_stream(&dpm_task, &request, options.timeouts.open_ms)?;

        let first = replies.recv()?.ok_or(ListError::UnexpectedReply {
            expected: "OpenList",
            got: "end of stream",
        })?;
        let list_id = match decode(&codec, &first.payload)? {
            ListReply::OpenList { list_id } => list_id,
            other => return Err(unexpected("OpenList", &other)),
        };
        replies.set_blocking(options.mode == Mode::Blocking);

        info!(%dpm_task, list_id, mode = ?options.mode, "list opened");
        Ok(Self {
            bus,
            codec,
            options,
            credentials: Box::new(NoCredentials),
            dpm_task,
            list_id,
            replies,
            entries: Vec::new(),
            generations: Generations::default(),
            state: ListState::Opened,
            settings_enabled: false,
            backlog: VecDeque::new(),
        })
    }

    /// Use `provider` for settings credentials.
    pub fn with_credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Box::new(provider);
        self
    }

    pub fn list_id(&self) -> u32 {
        self.list_id
    }

    /// Destination of the list service, `TASK@NODE`.
    pub fn dpm_task(&self) -> &str {
        &self.dpm_task
    }

    /// Local entries in the order they are sent on start.
    pub fn entries(&self) -> &[(Tag, String)] {
        &self.entries
    }

    pub fn generations(&self) -> Generations {
        self.generations
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    /// True once the service has ended the list's data stream.
    pub fn is_ended(&self) -> bool {
        self.replies.is_finished()
    }

    /// Whether the last settings attempt had a usable credential.
    pub fn settings_enabled(&self) -> bool {
        self.settings_enabled
    }

    /// Add a request under `tag`, replacing any earlier one. Takes effect on
    /// the next start.
    pub fn add_entry(&mut self, tag: Tag, request: impl Into<String>) {
        self.entries.retain(|(t, _)| *t != tag);
        self.entries.push((tag, request.into()));
    }

    /// Drop the entry under `tag`. Takes effect on the next start.
    pub fn remove_entry(&mut self, tag: Tag) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(t, _)| *t != tag);
        self.entries.len() != before
    }

    /// Drop every entry. Takes effect on the next start.
    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Load the local entries into the remote list and start acquisition.
    ///
    /// Data from earlier starts still in flight is discarded once this
    /// returns.
    pub fn start(&mut self, model: Option<&str>) -> Result<()> {
        let list_id = self.list_id;

        match self.rpc(&ListRequest::ClearList { list_id })? {
            ListReply::ListStatus { status, .. } => check(status)?,
            other => return Err(unexpected("ListStatus", &other)),
        }

        for (tag, drf) in &self.entries {
            let request = ListRequest::AddToList {
                list_id,
                ref_id: self.generations.add_ref(*tag),
                drf_request: drf.clone(),
            };
            match self.rpc(&request)? {
                ListReply::AddToList { status, .. } => check(status)?,
                other => return Err(unexpected("AddToList", &other)),
            }
        }

        let request = ListRequest::StartList {
            list_id,
            model: model.map(str::to_string),
        };
        match self.rpc(&request)? {
            ListReply::StartList { status, .. } => check(status)?,
            other => return Err(unexpected("StartList", &other)),
        }

        self.generations.advance();
        self.backlog.clear();
        self.state = ListState::Started;
        info!(
            list_id,
            entries = self.entries.len(),
            generation = self.generations.read(),
            "list started"
        );
        Ok(())
    }

    /// Ask the service to stop acquisition. The reply's content is ignored.
    pub fn stop(&mut self) -> Result<()> {
        let request = marshal(&self.codec, &ListRequest::StopList { list_id: self.list_id })?;
        self.state = ListState::Stopped;
        self.bus
            .request_once(&self.dpm_task, &request, self.options.timeouts.rpc_ms)?;
        debug!(list_id = self.list_id, "list stopped");
        Ok(())
    }

    /// Write values to the devices of list entries.
    ///
    /// Without a valid credential for the configured realm this does
    /// nothing and succeeds. Per-entry results arrive later on the list's
    /// stream as [`ItemStatus`](crate::ItemStatus) records.
    pub fn apply_settings<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (Tag, V)>,
        V: Into<SettingValue>,
    {
        let Some(credential) = self.usable_credential() else {
            return Ok(());
        };

        let mut batches = SettingBatches::default();
        for (tag, value) in values {
            if !self.entries.iter().any(|(t, _)| *t == tag) {
                return Err(ListError::NoEntry(tag));
            }
            batches.push(self.generations.active_ref(tag), value.into());
        }
        if batches.is_empty() {
            return Ok(());
        }

        debug!(list_id = self.list_id, count = batches.len(), "applying settings");
        let request = ListRequest::ApplySettings {
            user_name: credential.user().to_string(),
            list_id: self.list_id,
            raw_array: batches.raw,
            text_array: batches.text,
            scaled_array: batches.scaled,
        };
        match self.rpc(&request)? {
            ListReply::Status { status, .. } => check(status),
            other => Err(unexpected("Status", &other)),
        }
    }

    /// Turn a decoded reply into records for the current generation.
    pub fn translate(&self, reply: ListReply) -> Option<Translated> {
        translate(reply, &self.generations)
    }

    /// Records that have already arrived. Never waits; iterate again later
    /// to pick up where this left off.
    pub fn pending(&mut self) -> Pending<'_, C> {
        Pending { list: self }
    }

    /// Start the list and read its records, waiting for each. Stops the
    /// list when the service ends the stream.
    pub fn process(&mut self, model: Option<&str>) -> Result<Process<'_, C>> {
        self.start(model)?;
        Ok(Process {
            list: self,
            done: false,
        })
    }

    /// Read the next record the way the list's [`Mode`] says.
    pub fn next_item(&mut self) -> Option<Result<ListItem>> {
        let blocking = self.replies.is_blocking();
        self.pull(blocking)
    }

    /// Stop the list if it is running and release it.
    pub fn close(mut self) {
        if self.state == ListState::Started {
            if let Err(err) = self.stop() {
                debug!(error = %err, "stop on close failed");
            }
        }
    }

    fn pull(&mut self, blocking: bool) -> Option<Result<ListItem>> {
        loop {
            if let Some(item) = self.backlog.pop_front() {
                return Some(Ok(item));
            }

            let next = if blocking {
                self.replies.recv()
            } else {
                self.replies.try_next()
            };
            let reply = match next {
                Ok(Some(reply)) => reply,
                Ok(None) => return None,
                Err(err) => return Some(Err(err.into())),
            };

            let message = match decode(&self.codec, &reply.payload) {
                Ok(message) => message,
                Err(err) => return Some(Err(err)),
            };
            if let Some(translated) = self.translate(message) {
                self.backlog.extend(translated);
            }
        }
    }

    fn rpc(&self, request: &ListRequest) -> Result<ListReply> {
        rpc(
            &self.bus,
            &self.codec,
            &self.dpm_task,
            request,
            self.options.timeouts.rpc_ms,
        )
    }

    fn usable_credential(&mut self) -> Option<Credential> {
        let realm = &self.options.settings_realm;
        match self.credentials.credential() {
            Some(credential) if credential.is_valid_for(realm) => {
                if !self.settings_enabled {
                    info!(user = credential.user(), "settings enabled");
                }
                self.settings_enabled = true;
                Some(credential)
            }
            Some(credential) => {
                warn!(
                    principal = %credential.principal,
                    %realm,
                    "credential expired or outside realm, settings disabled"
                );
                self.settings_enabled = false;
                None
            }
            None => {
                info!("no credential, settings disabled");
                self.settings_enabled = false;
                None
            }
        }
    }
}

impl<C: ListCodec> std::fmt::Debug for ListSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSession")
            .field("dpm_task", &self.dpm_task)
            .field("list_id", &self.list_id)
            .field("state", &self.state)
            .field("entries", &self.entries.len())
            .field("generations", &self.generations)
            .finish()
    }
}

/// Non-blocking iterator over a list's queued records.
#[derive(Debug)]
pub struct Pending<'a, C: ListCodec> {
    list: &'a mut ListSession<C>,
}

impl<C: ListCodec> Iterator for Pending<'_, C> {
    type Item = Result<ListItem>;

    fn next(&mut self) -> Option<Self::Item> {
        self.list.pull(false)
    }
}

/// Blocking iterator over a started list's records.
#[derive(Debug)]
pub struct Process<'a, C: ListCodec> {
    list: &'a mut ListSession<C>,
    done: bool,
}

impl<C: ListCodec> Iterator for Process<'_, C> {
    type Item = Result<ListItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.list.pull(true) {
            Some(Ok(item)) => Some(Ok(item)),
            Some(Err(err)) => {
                // A failed stream is not stopped; the service already ended it.
                self.done = self.list.replies.is_finished();
                Some(Err(err))
            }
            None => {
                self.done = true;
                if let Err(err) = self.list.stop() {
                    warn!(error = %err, "stopping finished list failed");
                }
                None
            }
        }
    }
}

fn discover<C: ListCodec>(bus: &BusSession, codec: &C, options: &ListOptions) -> Result<String> {
    loop {
        info!("looking for an available DPM");
        match rpc(
            bus,
            codec,
            DISCOVERY_DESTINATION,
            &ListRequest::ServiceDiscovery,
            options.timeouts.rpc_ms,
        )? {
            ListReply::ServiceDiscovery {
                load,
                service_location,
            } => {
                let task = format!("{DPM_TASK}@{service_location}");
                info!(%task, load, "found list service");
                return Ok(task);
            }
            other => warn!(kind = other.kind(), "bad discovery reply"),
        }
        thread::sleep(options.discovery_interval);
    }
}

fn rpc<C: ListCodec>(
    bus: &BusSession,
    codec: &C,
    task: &str,
    request: &ListRequest,
    timeout_ms: u32,
) -> Result<ListReply> {
    let payload = marshal(codec, request)?;
    let reply = bus.request_once(task, &payload, timeout_ms)?;
    decode(codec, &reply.payload)
}

fn marshal<C: ListCodec>(codec: &C, request: &ListRequest) -> Result<bytes::Bytes> {
    codec.marshal(request).map_err(|err| {
        warn!(error = %err, kind = request.kind(), "error marshalling request");
        ListError::from(Status::REQPACK)
    })
}

fn decode<C: ListCodec>(codec: &C, payload: &[u8]) -> Result<ListReply> {
    codec.unmarshal(payload).map_err(|err| {
        warn!(error = %err, "error unmarshalling reply");
        ListError::from(Status::RPLYPACK)
    })
}

fn check(raw: i16) -> Result<()> {
    let status = Status::from_raw(raw);
    if status.is_fatal() {
        return Err(status.into());
    }
    Ok(())
}

fn unexpected(expected: &'static str, got: &ListReply) -> ListError {
    ListError::UnexpectedReply {
        expected,
        got: got.kind(),
    }
}
