//! Diagnostics emitted by the discovery and lookup orchestrators.
//!
//! The orchestrators never log on their own; they report what happened to an
//! [`Observer`] handed in by the caller. [`TracingObserver`] forwards events
//! to `tracing`, [`RecordingObserver`] keeps them for later inspection.

use crate::error::ErrorKind;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    StrategyStarted {
        strategy: String,
    },
    StrategyFailed {
        strategy: String,
        message: String,
    },
    StrategyEmpty {
        strategy: String,
    },
    StrategySelected {
        strategy: String,
        dependencies: usize,
    },
    ProviderStarted {
        provider: String,
    },
    ProviderCompleted {
        provider: String,
        vulnerabilities: usize,
        elapsed: Duration,
    },
    ProviderFailed {
        provider: String,
        kind: ErrorKind,
        message: String,
    },
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: &DiagnosticEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&self, _event: &DiagnosticEvent) {}
}

/// Forwards events to the `tracing` subscriber installed by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &DiagnosticEvent) {
        match event {
            DiagnosticEvent::StrategyStarted { strategy } => {
                debug!(strategy = %strategy, "trying discovery strategy");
            }
            DiagnosticEvent::StrategyFailed { strategy, message } => {
                info!(strategy = %strategy, "discovery strategy failed: {}", message);
            }
            DiagnosticEvent::StrategyEmpty { strategy } => {
                info!(strategy = %strategy, "discovery strategy found no dependencies");
            }
            DiagnosticEvent::StrategySelected {
                strategy,
                dependencies,
            } => {
                info!(strategy = %strategy, dependencies, "using discovered dependencies");
            }
            DiagnosticEvent::ProviderStarted { provider } => {
                debug!(provider = %provider, "querying provider");
            }
            DiagnosticEvent::ProviderCompleted {
                provider,
                vulnerabilities,
                elapsed,
            } => {
                info!(
                    provider = %provider,
                    vulnerabilities,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "provider finished"
                );
            }
            DiagnosticEvent::ProviderFailed {
                provider,
                kind,
                message,
            } => {
                warn!(provider = %provider, kind = ?kind, "provider failed: {}", message);
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the events seen so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &DiagnosticEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
