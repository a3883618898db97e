use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing service activity since startup.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_indexed: AtomicU64,
    searches: AtomicU64,
    chats: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed indexing batch.
    pub fn record_indexed(&self, documents: u64) {
        self.documents_indexed
            .fetch_add(documents, Ordering::Relaxed);
    }

    /// Record a completed similarity search.
    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed chat turn.
    pub fn record_chat(&self) {
        self.chats.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            chats: self.chats.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents indexed since startup.
    pub documents_indexed: u64,
    /// Similarity searches served since startup.
    pub searches: u64,
    /// Chat turns answered since startup.
    pub chats: u64,
}
