//! Actor-based log buffer shared by every logger of an invocation.
//!
//! Loggers never touch buffered entries directly. They hold a cloneable
//! [`LogBufferHandle`] and send commands over an unbounded channel; a single
//! [`LogBufferService`] task owns the entries, decides when to flush and
//! talks to the transport.
//!
//! ```text
//!    ┌──────────────┐
//!    │   Loggers    │ (enrich() clones share one handle)
//!    └──────┬───────┘
//!           │ Collect / Flush / Shutdown
//!           v
//!    ┌──────────────┐
//!    │   Service    │ (single consumer, owns entries)
//!    └──────┬───────┘
//!           │ batches, in capture order
//!           v
//!    ┌──────────────┐
//!    │  Transport   │
//!    └──────────────┘
//! ```
//!
//! # Transport mode
//!
//! The first dispatch probes the transport. It runs one scheduling tick
//! after the first entry arrives so that lines logged back to back travel
//! together. A transport that completes synchronously gets one send per
//! entry from then on; one that returns a pending delivery gets batches,
//! flushed on an error/fatal line, on [`MAX_BATCH_ENTRIES`] entries, on
//! [`MAX_BATCH_BYTES`] serialized bytes, or after [`IDLE_FLUSH_INTERVAL`].
//!
//! # Ordering
//!
//! Deliveries are awaited one at a time inside the service, so batch N is
//! handed to the transport only after batch N-1 settled, and a flush reply
//! is sent only once everything queued before it has been delivered.
//!
//! [`MAX_BATCH_ENTRIES`]: crate::logs::constants::MAX_BATCH_ENTRIES
//! [`MAX_BATCH_BYTES`]: crate::logs::constants::MAX_BATCH_BYTES
//! [`IDLE_FLUSH_INTERVAL`]: crate::logs::constants::IDLE_FLUSH_INTERVAL

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

use crate::error::LogError;
use crate::logs::constants;
use crate::logs::entry::LogEntry;
use crate::logs::transport::{Delivery, LogTransport};

/// Commands sent from handles to the buffer service.
#[derive(Debug)]
pub enum BufferCommand {
    /// Append one serialized entry.
    Collect(LogEntry),
    /// Deliver everything queued and report the outcome once it settled.
    Flush(oneshot::Sender<Result<(), LogError>>),
    /// Deliver everything queued and stop the service.
    Shutdown,
}

/// Flush thresholds used once the buffer batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
    pub idle_interval: Duration,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_entries: constants::MAX_BATCH_ENTRIES,
            max_bytes: constants::MAX_BATCH_BYTES,
            idle_interval: constants::IDLE_FLUSH_INTERVAL,
        }
    }
}

/// How the transport completes deliveries, decided once per buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Undecided,
    Synchronous,
    Asynchronous,
}

/// Cloneable handle for sending commands to the buffer service.
#[derive(Clone, Debug)]
pub struct LogBufferHandle {
    tx: mpsc::UnboundedSender<BufferCommand>,
}

impl LogBufferHandle {
    /// Queues an entry without waiting.
    ///
    /// # Errors
    ///
    /// Returns the command back if the service has stopped.
    pub fn collect(&self, entry: LogEntry) -> Result<(), mpsc::error::SendError<BufferCommand>> {
        self.tx.send(BufferCommand::Collect(entry))
    }

    /// Delivers everything queued so far and waits for it to settle.
    ///
    /// Also reports a delivery failure of an earlier, unawaited batch.
    pub async fn flush(&self) -> Result<(), LogError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(BufferCommand::Flush(response_tx))
            .map_err(|_| LogError::ServiceStopped)?;

        response_rx.await.map_err(|_| LogError::ServiceStopped)?
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<BufferCommand>> {
        self.tx.send(BufferCommand::Shutdown)
    }

    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<BufferCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// Service task that owns buffered entries and drives the transport.
pub struct LogBufferService {
    transport: Arc<dyn LogTransport>,
    /// Cancelled when delivery must be abandoned.
    abort: CancellationToken,
    limits: BufferLimits,
    rx: mpsc::UnboundedReceiver<BufferCommand>,
    entries: Vec<LogEntry>,
    pending_bytes: usize,
    mode: TransportMode,
    probe_scheduled: bool,
    idle_deadline: Option<Instant>,
    /// First delivery failure not yet reported to a flush caller.
    failure: Option<LogError>,
}

impl LogBufferService {
    #[must_use]
    pub fn new(
        transport: Arc<dyn LogTransport>,
        abort: CancellationToken,
        limits: BufferLimits,
    ) -> (Self, LogBufferHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            transport,
            abort,
            limits,
            rx,
            entries: Vec::new(),
            pending_bytes: 0,
            mode: TransportMode::Undecided,
            probe_scheduled: false,
            idle_deadline: None,
            failure: None,
        };

        (service, LogBufferHandle { tx })
    }

    /// Creates the service and spawns it on the current runtime, inside the
    /// caller's span.
    pub fn spawn(
        transport: Arc<dyn LogTransport>,
        abort: CancellationToken,
        limits: BufferLimits,
    ) -> LogBufferHandle {
        let (service, handle) = Self::new(transport, abort, limits);
        tokio::spawn(service.run().in_current_span());
        handle
    }

    /// Processes commands until shutdown or until every handle is dropped,
    /// then delivers whatever is still queued.
    pub async fn run(mut self) {
        debug!("Log buffer service started");

        loop {
            if self.probe_scheduled {
                tokio::task::yield_now().await;
                let running = self.drain_ready().await;
                if self.mode == TransportMode::Undecided {
                    self.dispatch().await;
                }
                self.probe_scheduled = false;
                if !running {
                    break;
                }
                continue;
            }

            let command = match self.idle_deadline {
                Some(deadline) => tokio::select! {
                    command = self.rx.recv() => command,
                    () = tokio::time::sleep_until(deadline) => {
                        let queued = self.entries.len();
                        debug!("Idle flush interval elapsed with {queued} entries queued");
                        self.dispatch().await;
                        continue;
                    }
                },
                None => self.rx.recv().await,
            };

            let Some(command) = command else {
                break;
            };
            if !self.handle(command).await {
                break;
            }
        }

        self.dispatch().await;
        if let Some(failure) = self.failure.take() {
            warn!("Log buffer service stopped with an unreported delivery failure: {failure}");
        }
        debug!("Log buffer service stopped");
    }

    /// Handles commands already waiting in the channel. Returns `false` once
    /// the service should stop.
    async fn drain_ready(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(command) => {
                    if !self.handle(command).await {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    async fn handle(&mut self, command: BufferCommand) -> bool {
        match command {
            BufferCommand::Collect(entry) => self.collect(entry).await,
            BufferCommand::Flush(response_tx) => {
                self.dispatch().await;
                let result = self.failure.take().map_or(Ok(()), Err);
                if response_tx.send(result).is_err() {
                    debug!("Flush requester dropped before the flush settled");
                }
            }
            BufferCommand::Shutdown => {
                debug!("Log buffer service shutting down");
                return false;
            }
        }
        true
    }

    async fn collect(&mut self, entry: LogEntry) {
        match self.mode {
            TransportMode::Undecided => {
                self.push(entry);
                self.probe_scheduled = true;
            }
            TransportMode::Synchronous => {
                self.deliver(vec![entry]).await;
            }
            TransportMode::Asynchronous => {
                let urgent = entry.level.is_urgent();
                self.push(entry);
                if urgent
                    || self.entries.len() >= self.limits.max_entries
                    || self.pending_bytes >= self.limits.max_bytes
                {
                    self.dispatch().await;
                } else if self.idle_deadline.is_none() {
                    self.idle_deadline = Some(Instant::now() + self.limits.idle_interval);
                }
            }
        }
    }

    fn push(&mut self, entry: LogEntry) {
        self.pending_bytes += entry.byte_size();
        self.entries.push(entry);
    }

    /// Swaps out the queued entries and delivers them as one batch.
    async fn dispatch(&mut self) {
        self.idle_deadline = None;
        if self.entries.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.entries);
        self.pending_bytes = 0;
        self.deliver(batch).await;
    }

    async fn deliver(&mut self, batch: Vec<LogEntry>) {
        if self.abort.is_cancelled() {
            warn!("Dropping {} log entries: delivery aborted", batch.len());
            self.record(Err(LogError::Aborted));
            return;
        }

        let size = batch.len();
        match self.transport.send_entries(batch, self.abort.clone()) {
            Delivery::Complete(result) => {
                if self.mode == TransportMode::Undecided {
                    debug!("Log transport completed synchronously, sending entries one by one");
                    self.mode = TransportMode::Synchronous;
                }
                self.record(result.map_err(LogError::from));
            }
            Delivery::Pending(delivery) => {
                if self.mode == TransportMode::Undecided {
                    debug!("Log transport is asynchronous, batching entries");
                    self.mode = TransportMode::Asynchronous;
                }
                let result = tokio::select! {
                    result = delivery => result.map_err(LogError::from),
                    () = self.abort.cancelled() => {
                        warn!("Abandoning delivery of {size} log entries");
                        Err(LogError::Aborted)
                    }
                };
                self.record(result);
            }
        }
    }

    fn record(&mut self, result: Result<(), LogError>) {
        if let Err(e) = result {
            error!("Failed to deliver function logs: {e}");
            if self.failure.is_none() {
                self.failure = Some(e);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn mode(&self) -> TransportMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::logs::level::LogLevel;
    use crate::test_support::{entry, MemoryTransport};
    use tracing_test::traced_test;

    fn spawn(transport: &MemoryTransport) -> LogBufferHandle {
        LogBufferService::spawn(
            Arc::new(transport.clone()),
            CancellationToken::new(),
            BufferLimits::default(),
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_default_limits() {
        let limits = BufferLimits::default();
        assert_eq!(limits.max_entries, 8);
        assert_eq!(limits.max_bytes, 64_000);
        assert_eq!(limits.idle_interval, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_probe_batches_lines_logged_in_the_same_tick() {
        let transport = MemoryTransport::asynchronous();
        let handle = spawn(&transport);

        handle.collect(entry(LogLevel::Info, "a")).unwrap();
        handle.collect(entry(LogLevel::Info, "b")).unwrap();
        handle.flush().await.unwrap();

        assert_eq!(transport.messages_by_batch(), vec![vec!["a", "b"]]);
    }

    #[tokio::test]
    async fn test_mode_is_decided_by_first_delivery() {
        let transport = MemoryTransport::synchronous();
        let (mut service, handle) = LogBufferService::new(
            Arc::new(transport.clone()),
            CancellationToken::new(),
            BufferLimits::default(),
        );
        assert_eq!(service.mode(), TransportMode::Undecided);

        handle.collect(entry(LogLevel::Info, "a")).unwrap();
        let command = service.rx.recv().await.unwrap();
        service.handle(command).await;
        service.dispatch().await;
        assert_eq!(service.mode(), TransportMode::Synchronous);
    }

    #[tokio::test]
    async fn test_synchronous_transport_sends_each_entry() {
        let transport = MemoryTransport::synchronous();
        let handle = spawn(&transport);

        handle.collect(entry(LogLevel::Info, "probe")).unwrap();
        handle.flush().await.unwrap();

        handle.collect(entry(LogLevel::Info, "a")).unwrap();
        handle.collect(entry(LogLevel::Info, "b")).unwrap();
        settle().await;

        assert_eq!(
            transport.messages_by_batch(),
            vec![vec!["probe"], vec!["a"], vec!["b"]]
        );
    }

    #[tokio::test]
    async fn test_error_line_flushes_immediately() {
        let transport = MemoryTransport::asynchronous();
        let handle = spawn(&transport);
        handle.collect(entry(LogLevel::Info, "probe")).unwrap();
        handle.flush().await.unwrap();

        handle.collect(entry(LogLevel::Debug, "context")).unwrap();
        handle.collect(entry(LogLevel::Error, "boom")).unwrap();
        settle().await;

        assert_eq!(
            transport.messages_by_batch(),
            vec![vec!["probe"], vec!["context", "boom"]]
        );
    }

    #[tokio::test]
    async fn test_count_threshold_flushes() {
        let transport = MemoryTransport::asynchronous();
        let handle = spawn(&transport);
        handle.collect(entry(LogLevel::Info, "probe")).unwrap();
        handle.flush().await.unwrap();

        for i in 0..9 {
            let line = format!("line {i}");
            handle.collect(entry(LogLevel::Info, &line)).unwrap();
        }
        settle().await;

        let batches = transport.messages_by_batch();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 8);
    }

    #[tokio::test]
    async fn test_size_threshold_flushes() {
        let transport = MemoryTransport::asynchronous();
        let handle = spawn(&transport);
        handle.collect(entry(LogLevel::Info, "probe")).unwrap();
        handle.flush().await.unwrap();

        handle
            .collect(entry(LogLevel::Info, &"x".repeat(64_000)))
            .unwrap();
        settle().await;

        assert_eq!(transport.batches().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_interval_flushes() {
        let transport = MemoryTransport::asynchronous();
        let handle = spawn(&transport);
        handle.collect(entry(LogLevel::Info, "probe")).unwrap();
        handle.flush().await.unwrap();

        handle.collect(entry(LogLevel::Info, "quiet")).unwrap();
        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(transport.batches().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            transport.messages_by_batch(),
            vec![vec!["probe"], vec!["quiet"]]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_is_reported_by_next_flush() {
        let transport = MemoryTransport::failing("intake unavailable");
        let handle = spawn(&transport);

        handle.collect(entry(LogLevel::Info, "a")).unwrap();
        let result = handle.flush().await;

        assert_eq!(
            result,
            Err(LogError::Transport(TransportError::new("intake unavailable")))
        );
        assert!(logs_contain("Failed to deliver function logs"));
        assert_eq!(handle.flush().await, Ok(()));
    }

    #[tokio::test]
    async fn test_abort_abandons_pending_delivery() {
        let transport = MemoryTransport::hanging();
        let abort = CancellationToken::new();
        let handle = LogBufferService::spawn(
            Arc::new(transport.clone()),
            abort.clone(),
            BufferLimits::default(),
        );

        handle.collect(entry(LogLevel::Info, "stuck")).unwrap();
        let flush = tokio::spawn({
            let handle = handle.clone();
            async move { handle.flush().await }
        });
        settle().await;
        abort.cancel();

        assert_eq!(flush.await.unwrap(), Err(LogError::Aborted));
        let signals = transport.signals();
        assert!(signals.iter().all(CancellationToken::is_cancelled));
    }

    #[tokio::test]
    async fn test_dropping_handles_delivers_remaining_entries() {
        let transport = MemoryTransport::asynchronous();
        let (service, handle) = LogBufferService::new(
            Arc::new(transport.clone()),
            CancellationToken::new(),
            BufferLimits::default(),
        );
        let task = tokio::spawn(service.run());

        handle.collect(entry(LogLevel::Info, "last words")).unwrap();
        drop(handle);
        task.await.unwrap();

        assert_eq!(transport.messages_by_batch(), vec![vec!["last words"]]);
    }

    #[tokio::test]
    async fn test_flush_after_shutdown_fails() {
        let transport = MemoryTransport::asynchronous();
        let handle = spawn(&transport);
        handle.shutdown().unwrap();
        settle().await;

        assert_eq!(handle.flush().await, Err(LogError::ServiceStopped));
    }
}
