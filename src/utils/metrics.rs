//! Observability and Metrics
//!
//! Atomic counters fed by [`DiagnosticEvent`]s. A [`Metrics`] instance is
//! created by the owner of the server and handed to components as their
//! `Arc<dyn Diagnostics>`, usually wrapped in a [`Fanout`] together with
//! [`TracingDiagnostics`](crate::utils::diagnostics::TracingDiagnostics).

use crate::utils::diagnostics::{DiagnosticEvent, Diagnostics};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Metrics {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub frames_encoded: AtomicU64,
    /// Bytes of every complete frame read, dropped ones included
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    /// Corrupt or unparsable frames skipped by the decoder
    pub frames_dropped: AtomicU64,
    /// Receive buffers thrown away after an oversized header
    pub buffers_discarded: AtomicU64,
    pub packets_unhandled: AtomicU64,
    pub handler_failures: AtomicU64,
    pub salts_issued: AtomicU64,
    pub logins_succeeded: AtomicU64,
    pub logins_failed: AtomicU64,
    pub registrations: AtomicU64,
    pub registrations_rejected: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            buffers_discarded: AtomicU64::new(0),
            packets_unhandled: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            salts_issued: AtomicU64::new(0),
            logins_succeeded: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            registrations_rejected: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            buffers_discarded: self.buffers_discarded.load(Ordering::Relaxed),
            packets_unhandled: self.packets_unhandled.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            salts_issued: self.salts_issued.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            frames_decoded = snapshot.frames_decoded,
            frames_encoded = snapshot.frames_encoded,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            frames_dropped = snapshot.frames_dropped,
            buffers_discarded = snapshot.buffers_discarded,
            packets_unhandled = snapshot.packets_unhandled,
            handler_failures = snapshot.handler_failures,
            salts_issued = snapshot.salts_issued,
            logins_succeeded = snapshot.logins_succeeded,
            logins_failed = snapshot.logins_failed,
            registrations = snapshot.registrations,
            registrations_rejected = snapshot.registrations_rejected,
            uptime_seconds = snapshot.uptime_seconds,
            "Chat protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for Metrics {
    fn emit(&self, event: DiagnosticEvent<'_>) {
        match event {
            DiagnosticEvent::FrameDecoded { frame_len, .. } => {
                Self::bump(&self.frames_decoded);
                self.bytes_received
                    .fetch_add(frame_len as u64, Ordering::Relaxed);
            }
            DiagnosticEvent::FrameEncoded { frame_len, .. } => {
                Self::bump(&self.frames_encoded);
                self.bytes_sent.fetch_add(frame_len as u64, Ordering::Relaxed);
            }
            DiagnosticEvent::FrameDropped { frame_len, .. } => {
                Self::bump(&self.frames_dropped);
                self.bytes_received
                    .fetch_add(frame_len as u64, Ordering::Relaxed);
            }
            DiagnosticEvent::BufferDiscarded { .. } => Self::bump(&self.buffers_discarded),
            DiagnosticEvent::Unhandled { .. } => Self::bump(&self.packets_unhandled),
            DiagnosticEvent::HandlerFailed { .. } => Self::bump(&self.handler_failures),
            DiagnosticEvent::SaltIssued { .. } => Self::bump(&self.salts_issued),
            DiagnosticEvent::AuthSucceeded { .. } => Self::bump(&self.logins_succeeded),
            DiagnosticEvent::AuthFailed { .. } => Self::bump(&self.logins_failed),
            DiagnosticEvent::Registered { .. } => Self::bump(&self.registrations),
            DiagnosticEvent::RegistrationRejected { .. } => {
                Self::bump(&self.registrations_rejected)
            }
            DiagnosticEvent::ConnectionOpened { .. } => {
                Self::bump(&self.connections_total);
                Self::bump(&self.connections_active);
            }
            DiagnosticEvent::ConnectionClosed { .. } => {
                // Saturate at zero.
                let _ = self.connections_active.fetch_update(
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                    |n| n.checked_sub(1),
                );
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub frames_decoded: u64,
    pub frames_encoded: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub frames_dropped: u64,
    pub buffers_discarded: u64,
    pub packets_unhandled: u64,
    pub handler_failures: u64,
    pub salts_issued: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub registrations: u64,
    pub registrations_rejected: u64,
    pub uptime_seconds: u64,
}

/// Forwards every event to each inner sink in order.
pub struct Fanout {
    sinks: Vec<Arc<dyn Diagnostics>>,
}

impl Fanout {
    pub fn new(sinks: Vec<Arc<dyn Diagnostics>>) -> Self {
        Self { sinks }
    }
}

impl Diagnostics for Fanout {
    fn emit(&self, event: DiagnosticEvent<'_>) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Logs how long the enclosing scope took when dropped.
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
