//! Router metrics for observability
//!
//! Counters for channel lifecycle and event routing outcomes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Router-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open chat channels
    pub active_connections: AtomicU64,
    /// Total channels accepted since server start
    pub total_connections: AtomicU64,
    /// Channels closed because the same identity reconnected
    pub superseded_connections: AtomicU64,

    // Event metrics
    /// Text frames received from clients
    pub events_received: AtomicU64,
    /// Events forwarded to a recipient channel
    pub events_routed: AtomicU64,
    /// Events discarded because the recipient had no open channel
    pub events_unroutable: AtomicU64,
    /// Events discarded because the recipient's outbound buffer was full
    pub events_dropped: AtomicU64,
    /// Frames that were not readable as events
    pub events_malformed: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_superseded(&self) {
        self.superseded_connections.fetch_add(1, Ordering::Relaxed);
    }

    // Event tracking
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_unroutable(&self) {
        self.events_unroutable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_malformed(&self) {
        self.events_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                superseded: self.superseded_connections.load(Ordering::Relaxed),
            },
            events: EventMetrics {
                received: self.events_received.load(Ordering::Relaxed),
                routed: self.events_routed.load(Ordering::Relaxed),
                unroutable: self.events_unroutable.load(Ordering::Relaxed),
                dropped: self.events_dropped.load(Ordering::Relaxed),
                malformed: self.events_malformed.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub events: EventMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub superseded: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetrics {
    pub received: u64,
    pub routed: u64,
    pub unroutable: u64,
    pub dropped: u64,
    pub malformed: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub online: usize,
    pub uptime_secs: u64,
}
