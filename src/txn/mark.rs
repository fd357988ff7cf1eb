//! Timestamp watermark
//!
//! Tracks in-flight timestamps and publishes `done_till`: the highest
//! timestamp at or below which every registered timestamp has finished.
//! The oracle keeps two of these, one for begin timestamps and one for
//! commit timestamps.
//!
//! ## Processing model
//! All state lives on one background thread. `begin`, `finish` and wait
//! registrations are sent over a single channel and handled strictly in
//! order, so the pending table needs no lock. Only `done_till` is shared,
//! as an atomic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, select, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{IsoError, Result};

enum MarkMessage {
    Begin(u64),
    Finish(u64),
    Wait { timestamp: u64, notify: Sender<()> },
    Stop,
}

/// Handle to a watermark processor thread
pub struct TimestampMark {
    name: &'static str,
    sender: Sender<MarkMessage>,
    done_till: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimestampMark {
    /// Spawn the processor. `done_till` starts at `initial`.
    pub fn new(name: &'static str, initial: u64) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let done_till = Arc::new(AtomicU64::new(initial));

        let processor = MarkProcessor {
            name,
            done_till: Arc::clone(&done_till),
            pending: BTreeMap::new(),
            waiters: BTreeMap::new(),
        };
        let worker = thread::Builder::new()
            .name(format!("isokv-{}-mark", name))
            .spawn(move || processor.run(receiver))?;

        Ok(Self {
            name,
            sender,
            done_till,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register one more in-flight operation at `timestamp`
    pub fn begin(&self, timestamp: u64) -> Result<()> {
        self.send(MarkMessage::Begin(timestamp))
    }

    /// Mark one operation at `timestamp` as finished
    pub fn finish(&self, timestamp: u64) -> Result<()> {
        self.send(MarkMessage::Finish(timestamp))
    }

    /// Highest timestamp known to be fully finished
    pub fn done_till(&self) -> u64 {
        self.done_till.load(Ordering::Acquire)
    }

    /// Block until `done_till() >= timestamp`
    pub fn wait_for_mark(&self, timestamp: u64) -> Result<()> {
        self.wait(timestamp, &channel::never(), channel::never())
    }

    /// Block until `done_till() >= timestamp` or `timeout` elapses
    pub fn wait_for_mark_timeout(&self, timestamp: u64, timeout: Duration) -> Result<()> {
        self.wait(timestamp, &channel::never(), channel::after(timeout))
    }

    /// Block until `done_till() >= timestamp` or `cancel` receives a message
    /// or disconnects. Cancelling abandons only this waiter.
    pub fn wait_for_mark_cancellable(&self, timestamp: u64, cancel: &Receiver<()>) -> Result<()> {
        self.wait(timestamp, cancel, channel::never())
    }

    /// Stop the processor and release every pending waiter. Later calls are
    /// no-ops.
    pub fn stop(&self) {
        let _ = self.sender.send(MarkMessage::Stop);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("{} mark processor panicked", self.name);
            }
        }
    }

    fn wait(&self, timestamp: u64, cancel: &Receiver<()>, deadline: Receiver<Instant>) -> Result<()> {
        if self.done_till() >= timestamp {
            return Ok(());
        }

        let (notify, notified) = channel::bounded(1);
        self.send(MarkMessage::Wait { timestamp, notify })?;

        select! {
            recv(notified) -> outcome => outcome.map_err(|_| IsoError::StoreStopped),
            recv(cancel) -> _ => Err(IsoError::WaitCancelled { timestamp }),
            recv(deadline) -> _ => Err(IsoError::WaitTimedOut { timestamp }),
        }
    }

    fn send(&self, message: MarkMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| IsoError::StoreStopped)
    }
}

impl Drop for TimestampMark {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the processor thread
struct MarkProcessor {
    name: &'static str,
    done_till: Arc<AtomicU64>,
    /// Outstanding operation count per timestamp
    pending: BTreeMap<u64, i64>,
    waiters: BTreeMap<u64, Vec<Sender<()>>>,
}

impl MarkProcessor {
    fn run(mut self, receiver: Receiver<MarkMessage>) {
        for message in receiver.iter() {
            match message {
                MarkMessage::Begin(timestamp) => self.update(timestamp, 1),
                MarkMessage::Finish(timestamp) => self.update(timestamp, -1),
                MarkMessage::Wait { timestamp, notify } => self.register(timestamp, notify),
                MarkMessage::Stop => break,
            }
        }

        // Dropping the notifiers wakes every blocked waiter with an error.
        let released: usize = self.waiters.values().map(Vec::len).sum();
        tracing::debug!(
            "{} mark stopped at done_till={}, released {} waiters",
            self.name,
            self.done_till.load(Ordering::Acquire),
            released
        );
    }

    fn register(&mut self, timestamp: u64, notify: Sender<()>) {
        if self.done_till.load(Ordering::Acquire) >= timestamp {
            let _ = notify.send(());
        } else {
            self.waiters.entry(timestamp).or_default().push(notify);
        }
    }

    fn update(&mut self, timestamp: u64, delta: i64) {
        *self.pending.entry(timestamp).or_insert(0) += delta;

        let previous = self.done_till.load(Ordering::Acquire);
        let mut done_till = previous;
        while let Some((&oldest, &count)) = self.pending.first_key_value() {
            if count > 0 {
                break;
            }
            self.pending.pop_first();
            done_till = done_till.max(oldest);
        }

        if done_till != previous {
            self.done_till.store(done_till, Ordering::Release);
            self.release_waiters(done_till);
        }
    }

    fn release_waiters(&mut self, done_till: u64) {
        let still_waiting = match done_till.checked_add(1) {
            Some(bound) => self.waiters.split_off(&bound),
            None => BTreeMap::new(),
        };
        let ready = std::mem::replace(&mut self.waiters, still_waiting);
        for notify in ready.into_values().flatten() {
            // A cancelled waiter has already dropped its receiver.
            let _ = notify.send(());
        }
    }
}
