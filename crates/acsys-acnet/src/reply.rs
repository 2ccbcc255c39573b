use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;

use crate::error::{AcnetError, Result};
use crate::status::Status;

/// One reply routed to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status the replier attached.
    pub status: Status,
    /// Trunk/node address of the replier.
    pub address: u16,
    /// Reply body.
    pub payload: Bytes,
}

impl Reply {
    /// A payload-less reply carrying only a status, as injected on
    /// connection loss or queue overflow.
    pub fn status_only(status: Status) -> Self {
        Self {
            status,
            address: 0,
            payload: Bytes::new(),
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replies for one request id, filled by the reader thread.
#[derive(Debug, Default)]
pub(crate) struct ReplyQueue {
    items: Mutex<VecDeque<Reply>>,
    ready: Condvar,
}

impl ReplyQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a reply and wake a waiting consumer. Returns the new depth.
    pub(crate) fn push(&self, reply: Reply) -> usize {
        let mut items = lock(&self.items);
        items.push_back(reply);
        let depth = items.len();
        drop(items);
        self.ready.notify_one();
        depth
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.items).len()
    }

    /// Take the oldest reply, waiting for one if `blocking`.
    pub(crate) fn pop(&self, blocking: bool) -> Option<Reply> {
        let mut items = lock(&self.items);
        if blocking {
            items = self
                .ready
                .wait_while(items, |items| items.is_empty())
                .unwrap_or_else(PoisonError::into_inner);
        }
        items.pop_front()
    }
}

/// Owner of the request table a stream's queue is registered in.
pub(crate) trait Release: Send + Sync {
    /// Forget `queue` under `request_id`, if it is still the registered one.
    fn release(&self, request_id: u16, queue: &Arc<ReplyQueue>);
}

/// Forward cursor over the replies to one request.
///
/// `PEND` replies are skipped. A fatal status is returned once as an error
/// and ends the stream. For multiple-reply requests an `ENDMULT` reply also
/// ends the stream (after yielding its payload, if it has one). With
/// blocking off, an empty queue reads as the end of what is available now;
/// a later pull resumes where this one stopped.
pub struct ReplyStream {
    request_id: u16,
    queue: Arc<ReplyQueue>,
    owner: Option<Weak<dyn Release>>,
    multiple: bool,
    blocking: bool,
    finished: bool,
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("request_id", &self.request_id)
            .field("multiple", &self.multiple)
            .field("blocking", &self.blocking)
            .field("finished", &self.finished)
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl ReplyStream {
    pub(crate) fn new(request_id: u16, queue: Arc<ReplyQueue>, multiple: bool) -> Self {
        Self {
            request_id,
            queue,
            owner: None,
            multiple,
            blocking: true,
            finished: false,
        }
    }

    /// Unregister from `owner` once the stream finishes or is dropped.
    pub(crate) fn with_owner(mut self, owner: Weak<dyn Release>) -> Self {
        self.owner = Some(owner);
        self
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(owner) = self.owner.take().and_then(|owner| owner.upgrade()) {
            owner.release(self.request_id, &self.queue);
        }
    }

    /// Gateway-assigned id this stream is bound to.
    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Choose whether [`Iterator::next`] and [`ReplyStream::next_reply`] wait
    /// for replies.
    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    /// True once a terminal status has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pull the next reply according to the blocking flag.
    pub fn next_reply(&mut self) -> Result<Option<Reply>> {
        self.pull(self.blocking)
    }

    /// Pull the next reply, waiting for it.
    pub fn recv(&mut self) -> Result<Option<Reply>> {
        self.pull(true)
    }

    /// Pull the next reply if one is already queued.
    pub fn try_next(&mut self) -> Result<Option<Reply>> {
        self.pull(false)
    }

    fn pull(&mut self, blocking: bool) -> Result<Option<Reply>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let Some(reply) = self.queue.pop(blocking) else {
                return Ok(None);
            };

            if reply.status.is_fatal() {
                self.finish();
                return Err(AcnetError::Status(reply.status));
            }

            if reply.status == Status::PEND {
                continue;
            }

            if self.multiple && reply.status == Status::ENDMULT {
                self.finish();
                if reply.payload.is_empty() {
                    return Ok(None);
                }
            } else if !self.multiple {
                self.finish();
            }

            return Ok(Some(reply));
        }
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}

impl Iterator for ReplyStream {
    type Item = Result<Reply>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_reply().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(status: Status, payload: &'static [u8]) -> Reply {
        Reply {
            status,
            address: 0x0921,
            payload: Bytes::from_static(payload),
        }
    }

    fn stream_with(replies: Vec<Reply>, multiple: bool) -> ReplyStream {
        let queue = ReplyQueue::new();
        for reply in replies {
            queue.push(reply);
        }
        ReplyStream::new(1, queue, multiple)
    }

    #[test]
    fn skips_pend() {
        let mut stream = stream_with(
            vec![
                data(Status::PEND, b""),
                data(Status::PEND, b""),
                data(Status::SUCCESS, b"value"),
            ],
            true,
        );

        let reply = stream.try_next().unwrap().unwrap();
        assert_eq!(reply.payload.as_ref(), b"value");
        assert_eq!(reply.address, 0x0921);
    }

    #[test]
    fn fatal_status_raises_once_then_ends() {
        let mut stream = stream_with(
            vec![data(Status::NOCON, b""), data(Status::SUCCESS, b"late")],
            true,
        );

        let err = stream.try_next().unwrap_err();
        assert_eq!(err.status(), Status::NOCON);
        assert!(stream.is_finished());
        assert!(stream.try_next().unwrap().is_none());
    }

    #[test]
    fn empty_nonblocking_pull_resumes_later() {
        let queue = ReplyQueue::new();
        let mut stream = ReplyStream::new(4, Arc::clone(&queue), true);
        stream.set_blocking(false);

        assert!(stream.next().is_none());
        assert!(!stream.is_finished());

        queue.push(data(Status::SUCCESS, b"later"));
        let reply = stream.next().unwrap().unwrap();
        assert_eq!(reply.payload.as_ref(), b"later");
    }

    #[test]
    fn endmult_ends_multiple_reply_stream() {
        let mut stream = stream_with(
            vec![
                data(Status::SUCCESS, b"one"),
                data(Status::ENDMULT, b"last"),
                data(Status::SUCCESS, b"never"),
            ],
            true,
        );

        let payloads: Vec<_> = stream
            .by_ref()
            .map(|reply| reply.unwrap().payload)
            .collect();
        assert_eq!(payloads, vec![Bytes::from_static(b"one"), Bytes::from_static(b"last")]);
        assert!(stream.is_finished());
    }

    #[test]
    fn empty_endmult_yields_nothing() {
        let mut stream = stream_with(vec![data(Status::ENDMULT, b"")], true);
        assert!(stream.recv().unwrap().is_none());
        assert!(stream.is_finished());
    }

    #[test]
    fn warnings_pass_through_as_data() {
        let warning = Status::new(17, 4);
        let mut stream = stream_with(vec![data(warning, b"w")], false);
        let reply = stream.recv().unwrap().unwrap();
        assert_eq!(reply.status, warning);
    }

    #[test]
    fn blocking_pull_waits_for_reader() {
        let queue = ReplyQueue::new();
        let mut stream = ReplyStream::new(9, Arc::clone(&queue), true);

        let producer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            queue.push(data(Status::SUCCESS, b"woken"));
        });

        let reply = stream.recv().unwrap().unwrap();
        assert_eq!(reply.payload.as_ref(), b"woken");
        producer.join().unwrap();
    }

    #[derive(Default)]
    struct Table(Mutex<Vec<u16>>);

    impl Release for Table {
        fn release(&self, request_id: u16, _queue: &Arc<ReplyQueue>) {
            lock(&self.0).push(request_id);
        }
    }

    #[test]
    fn single_reply_stream_releases_after_first_reply() {
        let table = Arc::new(Table::default());
        let owner: Weak<dyn Release> = Arc::downgrade(&table) as Weak<dyn Release>;
        let queue = ReplyQueue::new();
        queue.push(data(Status::SUCCESS, b"only"));
        queue.push(data(Status::SUCCESS, b"extra"));

        let mut stream = ReplyStream::new(7, queue, false).with_owner(owner);
        assert_eq!(stream.recv().unwrap().unwrap().payload.as_ref(), b"only");
        assert!(stream.is_finished());
        assert!(stream.recv().unwrap().is_none());

        drop(stream);
        assert_eq!(*lock(&table.0), vec![7]);
    }

    #[test]
    fn dropping_open_stream_releases() {
        let table = Arc::new(Table::default());
        let owner: Weak<dyn Release> = Arc::downgrade(&table) as Weak<dyn Release>;
        let stream = ReplyStream::new(3, ReplyQueue::new(), true).with_owner(owner);

        drop(stream);
        assert_eq!(*lock(&table.0), vec![3]);
    }
}
