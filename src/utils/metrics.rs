//! Observability and Metrics
//!
//! Per-session counters for monitoring traffic and failure paths.
//!
//! Uses atomic counters so the background read/write tasks and the
//! session owner can update and read them without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one session
#[derive(Debug)]
pub struct SessionMetrics {
    /// Frames written to the transport (including internal replies)
    pub frames_sent: AtomicU64,
    /// Frames extracted from the receive buffer
    pub frames_received: AtomicU64,
    /// Total bytes written, framing included
    pub bytes_sent: AtomicU64,
    /// Total frame body bytes received
    pub bytes_received: AtomicU64,
    /// Packets handed to listeners
    pub packets_delivered: AtomicU64,
    /// Frames discarded because they could not be decoded
    pub decode_errors: AtomicU64,
    /// Management packets consumed by the session
    pub management_messages: AtomicU64,
    /// Management packets that were unknown or malformed
    pub handshake_errors: AtomicU64,
    /// Connect, read or write failures
    pub transport_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl SessionMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_delivered: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            management_messages: AtomicU64::new(0),
            handshake_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a frame written
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a frame received
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn packet_delivered(&self) {
        self.packets_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn management_message(&self) {
        self.management_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_error(&self) {
        self.handshake_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_delivered: self.packets_delivered.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            management_messages: self.management_messages.load(Ordering::Relaxed),
            handshake_errors: self.handshake_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            packets_delivered = snapshot.packets_delivered,
            decode_errors = snapshot.decode_errors,
            management_messages = snapshot.management_messages,
            handshake_errors = snapshot.handshake_errors,
            transport_errors = snapshot.transport_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_delivered: u64,
    pub decode_errors: u64,
    pub management_messages: u64,
    pub handshake_errors: u64,
    pub transport_errors: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
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
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
