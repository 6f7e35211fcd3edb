//! Server metrics for observability
//!
//! Lock-free counters bumped from the WebSocket and HTTP paths.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::ws::Delivery;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,
    /// Sockets that ended with a read/write error
    pub websocket_errors: AtomicU64,

    // Message metrics
    /// Realtime events received from clients
    pub events_received: AtomicU64,
    /// Events dropped because they were malformed or missing fields
    pub events_ignored: AtomicU64,
    /// Messages pushed into a connection outbox
    pub messages_delivered: AtomicU64,
    /// Messages addressed to a connection that had already gone away
    pub messages_dropped: AtomicU64,

    // Store metrics
    pub journal_updates: AtomicU64,
    pub transcript_entries: AtomicU64,

    // History proxy metrics
    pub history_requests: AtomicU64,
    pub history_failures: AtomicU64,

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

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, delivery: Delivery) {
        self.messages_delivered
            .fetch_add(delivery.delivered as u64, Ordering::Relaxed);
        self.messages_dropped
            .fetch_add(delivery.dropped as u64, Ordering::Relaxed);
    }

    pub fn journal_updated(&self) {
        self.journal_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transcript_appended(&self) {
        self.transcript_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn history_requested(&self, ok: bool) {
        self.history_requests.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.history_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics. `conversations` is the current
    /// store size, which the metrics themselves do not track.
    pub fn snapshot(&self, conversations: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            conversations: conversations as u64,
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                errors: self.websocket_errors.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                events_received: self.events_received.load(Ordering::Relaxed),
                events_ignored: self.events_ignored.load(Ordering::Relaxed),
                delivered: self.messages_delivered.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
            },
            store: StoreMetrics {
                journal_updates: self.journal_updates.load(Ordering::Relaxed),
                transcript_entries: self.transcript_entries.load(Ordering::Relaxed),
            },
            history: HistoryMetrics {
                requests: self.history_requests.load(Ordering::Relaxed),
                failures: self.history_failures.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub conversations: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub store: StoreMetrics,
    pub history: HistoryMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub events_received: u64,
    pub events_ignored: u64,
    pub delivered: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub journal_updates: u64,
    pub transcript_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMetrics {
    pub requests: u64,
    pub failures: u64,
}
