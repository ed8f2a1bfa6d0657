//! Event channel built on crossbeam-channel.
//!
//! Provides a thread-safe way to send progress events from the scan and
//! export orchestrators to any presentation layer.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::path::Path;

use super::{Event, ExportEvent, ItemProgress, ScanEvent};

/// Sends events from the curation engine.
///
/// Cloned into every worker task. A dropped receiver is not an error:
/// progress reporting is optional.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Wrap a raw crossbeam sender.
    pub fn new(sender: Sender<Event>) -> Self {
        Self { inner: sender }
    }

    /// Send an event, discarding it if nobody listens.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }

    /// Report a finished scan task.
    pub fn scan_tick(&self, done: usize, total: usize, path: &Path) {
        self.send(Event::Scan(ScanEvent::Progress(ItemProgress {
            done,
            total,
            current_path: path.to_path_buf(),
        })));
    }

    /// Report a finished export task.
    pub fn export_tick(&self, done: usize, total: usize, path: &Path) {
        self.send(Event::Export(ExportEvent::Progress(ItemProgress {
            done,
            total,
            current_path: path.to_path_buf(),
        })));
    }
}

/// Receives events from the curation engine.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event arrives; `None` once every sender is gone.
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Iterate until every sender is dropped.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructors for sender/receiver pairs.
pub struct EventChannel;

impl EventChannel {
    /// Create a new unbounded event channel.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }

    /// Create a bounded channel; workers block when a slow listener falls
    /// `capacity` events behind.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose receiver is already gone, for runs without a listener.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}
