// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::logs::entry::LogEntry;

pub type DeliveryFuture = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send>>;

/// What a transport hands back for one batch.
///
/// The first value a buffer receives decides its mode for good: a
/// `Complete` delivery puts the buffer in synchronous mode (one send per
/// line), a `Pending` delivery switches it to batching.
pub enum Delivery {
    Complete(Result<(), TransportError>),
    Pending(DeliveryFuture),
}

impl Delivery {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), TransportError>> + Send + 'static,
    {
        Delivery::Pending(Box::pin(future))
    }
}

/// Destination for batches of function log entries.
///
/// `signal` is cancelled when the invocation's hard deadline passes; a
/// pending delivery still running at that point is abandoned.
pub trait LogTransport: Send + Sync {
    fn send_entries(&self, batch: Vec<LogEntry>, signal: CancellationToken) -> Delivery;
}

/// Writes each entry as a JSON line to stdout, where serverless hosts
/// collect function output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutTransport;

impl LogTransport for StdoutTransport {
    fn send_entries(&self, batch: Vec<LogEntry>, _signal: CancellationToken) -> Delivery {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for entry in &batch {
            if let Err(e) = writeln!(out, "{}", entry.json) {
                return Delivery::Complete(Err(TransportError::new(format!(
                    "Failed to write log line to stdout: {e}"
                ))));
            }
        }
        Delivery::Complete(
            out.flush()
                .map_err(|e| TransportError::new(format!("Failed to flush stdout: {e}"))),
        )
    }
}
