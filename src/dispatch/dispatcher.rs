//! Main-loop dispatcher.
//!
//! Owns the consumer half of the command queue, the handler table and the
//! host state. It is `!Send`: built on the host thread, it stays there, so
//! handlers can only ever run on that thread.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::audit::{AuditEntry, AuditLogger, AuditResult};
use crate::config::DispatcherConfig;
use crate::queue::{CommandReceiver, QueuedCommand};
use crate::server::BridgeMetrics;

use super::host::HostState;
use super::registry::HandlerRegistry;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: usize,
    pub failed: usize,
    pub dropped: usize,
    /// Commands still queued after the tick.
    pub remaining: usize,
}

impl TickReport {
    /// Commands taken off the queue during the tick.
    pub fn processed(&self) -> usize {
        self.dispatched + self.failed + self.dropped
    }
}

enum Outcome {
    Dispatched,
    Failed { code: &'static str, message: String },
    Dropped,
}

/// Drains the command queue on the host thread.
pub struct Dispatcher {
    receiver: CommandReceiver,
    registry: HandlerRegistry,
    host: HostState,
    tick_interval: Duration,
    max_commands_per_tick: usize,
    metrics: Option<Arc<BridgeMetrics>>,
    audit_logger: Option<Arc<AuditLogger>>,
    _host_thread: PhantomData<*const ()>,
}

impl Dispatcher {
    pub fn new(
        receiver: CommandReceiver,
        registry: HandlerRegistry,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            receiver,
            registry,
            host: HostState::new(),
            tick_interval: config.tick_interval(),
            max_commands_per_tick: config.max_commands_per_tick.max(1),
            metrics: None,
            audit_logger: None,
            _host_thread: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_audit_logger(mut self, audit_logger: Option<Arc<AuditLogger>>) -> Self {
        self.audit_logger = audit_logger;
        self
    }

    pub fn host(&self) -> &HostState {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostState {
        &mut self.host
    }

    /// Commands waiting in the queue.
    pub fn pending(&self) -> usize {
        self.receiver.depth()
    }

    /// Run the commands queued when the tick starts, at most
    /// `max_commands_per_tick` of them. Never waits for work.
    ///
    /// Commands pushed while the tick runs are left for the next tick.
    pub fn tick(&mut self) -> TickReport {
        let budget = self.receiver.depth().min(self.max_commands_per_tick);
        let mut report = TickReport::default();

        for _ in 0..budget {
            let Some(command) = self.receiver.try_pop() else {
                break;
            };
            match self.dispatch_one(&command) {
                Outcome::Dispatched => report.dispatched += 1,
                Outcome::Failed { .. } => report.failed += 1,
                Outcome::Dropped => report.dropped += 1,
            }
        }

        report.remaining = self.receiver.depth();
        if report.processed() > 0 {
            debug!(
                dispatched = report.dispatched,
                failed = report.failed,
                dropped = report.dropped,
                remaining = report.remaining,
                "Tick complete"
            );
        }
        report
    }

    fn dispatch_one(&mut self, command: &QueuedCommand) -> Outcome {
        let started = Instant::now();

        let outcome = match self.registry.get(&command.path) {
            None => {
                warn!(
                    request_id = %command.request_id,
                    path = %command.path,
                    "No handler for command path, dropping"
                );
                Outcome::Dropped
            }
            Some(handler) => {
                let host = &mut self.host;
                match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(host, command))) {
                    Ok(Ok(())) => Outcome::Dispatched,
                    Ok(Err(e)) => {
                        error!(
                            request_id = %command.request_id,
                            path = %command.path,
                            error = %e,
                            "Handler failed"
                        );
                        Outcome::Failed {
                            code: e.code(),
                            message: e.to_string(),
                        }
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(
                            request_id = %command.request_id,
                            path = %command.path,
                            panic = %message,
                            "Handler panicked"
                        );
                        Outcome::Failed {
                            code: "INTERNAL_ERROR",
                            message: format!("handler panicked: {}", message),
                        }
                    }
                }
            }
        };

        self.record(command, &outcome, started.elapsed());
        outcome
    }

    fn record(&self, command: &QueuedCommand, outcome: &Outcome, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            match outcome {
                Outcome::Dispatched => metrics.record_dispatched(),
                Outcome::Failed { .. } => metrics.record_failed(),
                Outcome::Dropped => metrics.record_dropped(),
            }
        }

        if let Some(logger) = &self.audit_logger {
            let result = match outcome {
                Outcome::Dispatched => AuditResult::Dispatched,
                Outcome::Failed { code, message } => AuditResult::Failed {
                    error_code: code.to_string(),
                    error_message: message.clone(),
                },
                Outcome::Dropped => AuditResult::Dropped,
            };
            let entry =
                AuditEntry::dispatch(command.request_id, &command.path, command.generation, result)
                    .with_duration_ms(elapsed.as_millis() as u64);
            if let Err(e) = logger.log(&entry) {
                error!(error = %e, "Failed to write audit log entry");
            }
        }
    }

    /// Tick until the queue is empty. Returns the number of commands processed.
    pub fn drain(&mut self) -> usize {
        let mut total = 0;
        loop {
            let report = self.tick();
            if report.processed() == 0 {
                return total;
            }
            total += report.processed();
        }
    }

    /// Tick at the configured period until `shutdown` is set, then drain.
    pub fn run_until(&mut self, shutdown: &AtomicBool) {
        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            max_commands_per_tick = self.max_commands_per_tick,
            "Dispatcher running on host thread"
        );

        while !shutdown.load(Ordering::Acquire) {
            let started = Instant::now();
            self.tick();
            if let Some(rest) = self.tick_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        let drained = self.drain();
        info!(drained = drained, "Dispatcher stopped");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
