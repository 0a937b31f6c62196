// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn, Instrument};

use crate::logs::logger::Logger;

/// Soft and hard deadlines of one invocation.
///
/// At `timeout` the soft deadline logs `Timeout.` and cancels the handler's
/// signal. At `timeout + grace` the hard deadline logs `Aborting flush.` and
/// cancels the outer signal, which abandons pending log delivery. Both timers
/// are aborted when the coordinator is dropped.
#[derive(Debug)]
pub struct TimeoutCoordinator {
    soft: Option<JoinHandle<()>>,
    hard: Option<JoinHandle<()>>,
}

impl TimeoutCoordinator {
    pub fn start(
        timeout: Duration,
        grace: Duration,
        log: Logger,
        inner: CancellationToken,
        outer: CancellationToken,
    ) -> Self {
        let soft = {
            let log = log.clone();
            tokio::spawn(
                async move {
                    tokio::select! {
                        () = tokio::time::sleep(timeout) => {
                            warn!("Invocation exceeded its {} ms timeout", timeout.as_millis());
                            log.error("Timeout.");
                            inner.cancel();
                        }
                        () = inner.cancelled() => {}
                    }
                }
                .in_current_span(),
            )
        };

        let hard_deadline = timeout.saturating_add(grace);
        let grace_ms = grace.as_millis();
        let hard = tokio::spawn(
            async move {
                tokio::select! {
                    () = tokio::time::sleep(hard_deadline) => {
                        error!("Log flush still pending {grace_ms} ms after the timeout, aborting");
                        log.error("Aborting flush.");
                        outer.cancel();
                    }
                    () = outer.cancelled() => {}
                }
            }
            .in_current_span(),
        );

        Self {
            soft: Some(soft),
            hard: Some(hard),
        }
    }

    /// Stops the soft deadline. Called before the final flush.
    pub fn clear_soft(&mut self) {
        if let Some(soft) = self.soft.take() {
            soft.abort();
        }
    }

    /// Stops the hard deadline. Called once the final flush settled.
    pub fn clear_hard(&mut self) {
        if let Some(hard) = self.hard.take() {
            hard.abort();
        }
    }
}

impl Drop for TimeoutCoordinator {
    fn drop(&mut self) {
        self.clear_soft();
        self.clear_hard();
    }
}
