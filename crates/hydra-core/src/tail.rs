//! Tailing iterator over the history store.
//!
//! A [`TailableIterator`] is the consumer end of a dedicated feeder task. The
//! backend spawns the feeder with [`TailableIterator::spawn`]; the feeder reads
//! history from the position captured at creation and pushes each new entry
//! through a bounded channel via [`TailFeed::deliver`].
//!
//! Cancellation is a [`CancellationToken`] shared by both ends. Interrupting
//! wakes a pending `next()`, stops the feeder and leaves the iterator
//! exhausted with no error recorded. Feeder read failures are recorded
//! separately and surface through [`TailableIterator::error`].
//!
//! Interruption and failure are decided under one lock: whichever comes
//! first wins, and the other is ignored.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::domain::{Document, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Running,
    Interrupted,
    Failed(String),
}

/// Outcome plus the token that wakes both ends.
#[derive(Debug, Clone)]
struct Control {
    outcome: Arc<Mutex<Outcome>>,
    cancel: CancellationToken,
}

impl Control {
    fn new() -> Self {
        Self {
            outcome: Arc::new(Mutex::new(Outcome::Running)),
            cancel: CancellationToken::new(),
        }
    }

    fn outcome(&self) -> Outcome {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn interrupt(&self) {
        {
            let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
            if *outcome == Outcome::Running {
                *outcome = Outcome::Interrupted;
            }
        }
        self.cancel.cancel();
    }

    /// Returns `false` when the iterator was already interrupted.
    fn fail(&self, message: String) -> bool {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if *outcome != Outcome::Running {
            return false;
        }
        *outcome = Outcome::Failed(message);
        true
    }
}

/// Producer side handed to the feeder task.
pub struct TailFeed {
    tx: mpsc::Sender<Document>,
    control: Control,
}

impl TailFeed {
    /// Hand one document to the consumer. Returns `false` once the consumer
    /// is gone or the iterator was interrupted; the feeder should stop then.
    pub async fn deliver(&self, doc: Document) -> bool {
        tokio::select! {
            biased;
            _ = self.control.cancel.cancelled() => false,
            sent = self.tx.send(doc) => sent.is_ok(),
        }
    }

    /// Record a read failure. Only the first one is kept, and nothing is
    /// recorded once the iterator was interrupted.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        if self.control.fail(message.clone()) {
            warn!(error = %message, "history tail failed");
        }
    }

    pub async fn cancelled(&self) {
        self.control.cancel.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.cancel.is_cancelled()
    }
}

/// Cloneable handle that interrupts a [`TailableIterator`] from elsewhere,
/// e.g. while another task is blocked in `next()`.
#[derive(Debug, Clone)]
pub struct Interrupter(Control);

impl Interrupter {
    pub fn interrupt(&self) {
        self.0.interrupt();
    }
}

/// Blocking pull interface over new history entries, in append order.
///
/// ```ignore
/// let mut it = store.inactive_iterator().await?;
/// while let Some(doc) = it.next().await {
///     println!("{} -> {}", doc.id().unwrap(), doc.status());
/// }
/// assert!(!it.has_error());
/// ```
pub struct TailableIterator {
    rx: mpsc::Receiver<Document>,
    peeked: Option<Document>,
    control: Control,
    finished: bool,
    _feeder: AbortOnDropHandle<()>,
}

impl TailableIterator {
    /// Spawn `feeder` on the current runtime and return the consumer end.
    pub fn spawn<F, Fut>(buffer: usize, feeder: F) -> Self
    where
        F: FnOnce(TailFeed) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let control = Control::new();
        let feed = TailFeed {
            tx,
            control: control.clone(),
        };
        let handle = tokio::spawn(feeder(feed));
        Self {
            rx,
            peeked: None,
            control,
            finished: false,
            _feeder: AbortOnDropHandle::new(handle),
        }
    }

    /// Wait until an entry is available (`true`) or the iterator has ended
    /// (`false`). An entry seen here is returned by the following `next()`.
    pub async fn has_next(&mut self) -> bool {
        if self.control.cancel.is_cancelled() {
            self.finish();
            return false;
        }
        if self.peeked.is_none() {
            self.peeked = self.recv().await;
        }
        self.peeked.is_some()
    }

    /// Wait for the next appended entry. `None` after interruption, after a
    /// read failure, or once the feeder stopped.
    pub async fn next(&mut self) -> Option<Document> {
        if self.control.cancel.is_cancelled() {
            self.finish();
            return None;
        }
        match self.peeked.take() {
            Some(doc) => Some(doc),
            None => self.recv().await,
        }
    }

    async fn recv(&mut self) -> Option<Document> {
        if self.finished {
            return None;
        }
        let received = tokio::select! {
            biased;
            _ = self.control.cancel.cancelled() => None,
            doc = self.rx.recv() => doc,
        };
        if received.is_none() {
            self.finish();
        }
        received
    }

    fn finish(&mut self) {
        if !self.finished {
            debug!(outcome = ?self.control.outcome(), "history tail finished");
        }
        self.finished = true;
        self.peeked = None;
        self.control.cancel.cancel();
        self.rx.close();
    }

    /// Request cancellation. A concurrently pending `next()` returns `None`.
    pub fn interrupt(&self) {
        self.control.interrupt();
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter(self.control.clone())
    }

    pub fn is_interrupted(&self) -> bool {
        self.control.outcome() == Outcome::Interrupted
    }

    /// Whether the feeder hit a read failure before any interruption.
    pub fn has_error(&self) -> bool {
        matches!(self.control.outcome(), Outcome::Failed(_))
    }

    pub fn error(&self) -> Option<StoreError> {
        match self.control.outcome() {
            Outcome::Failed(message) => Some(StoreError::IterationFailure(message)),
            _ => None,
        }
    }
}

impl Drop for TailableIterator {
    fn drop(&mut self) {
        self.control.interrupt();
    }
}
