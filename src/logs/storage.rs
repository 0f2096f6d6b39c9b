//! Per-resource log storage

use crate::logs::types::LogEntry;
use crate::resource::ResourceKey;
use crate::storage::buffer::{Snapshot, SnapshotBuffer};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Log buffer owned by one resource
#[derive(Debug)]
struct ResourceLogs {
    /// Held across id assignment and append so ids follow buffer order
    writer: Mutex<()>,
    buffer: SnapshotBuffer<LogEntry>,
}

/// Outcome of one write
#[derive(Debug, Default)]
pub struct LogWrite {
    pub stored: Vec<Arc<LogEntry>>,
    /// Ids of entries evicted to make room
    pub evicted: Vec<u64>,
}

/// Log storage engine.
///
/// Each resource has its own bounded buffer, so ingestion for one resource
/// never waits on another and eviction is per resource.
#[derive(Debug)]
pub struct LogStorage {
    max_logs_per_resource: usize,
    resources: DashMap<ResourceKey, Arc<ResourceLogs>>,
    by_id: DashMap<u64, Arc<LogEntry>>,
    next_id: AtomicU64,
}

impl LogStorage {
    pub fn new(max_logs_per_resource: usize) -> Self {
        Self {
            max_logs_per_resource,
            resources: DashMap::new(),
            by_id: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores entries for one resource, assigning their ids.
    pub fn add_logs(&self, key: &ResourceKey, entries: Vec<LogEntry>) -> LogWrite {
        if entries.is_empty() {
            return LogWrite::default();
        }

        let logs = self.resource_logs(key);
        let _guard = logs.writer.lock();

        let stored: Vec<Arc<LogEntry>> = entries
            .into_iter()
            .map(|mut entry| {
                entry.id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Arc::new(entry)
            })
            .collect();
        for entry in &stored {
            self.by_id.insert(entry.id, Arc::clone(entry));
        }

        let evicted = logs.buffer.push_batch(stored.clone());
        for entry in &evicted {
            self.by_id.remove(&entry.id);
        }
        if !evicted.is_empty() {
            tracing::trace!(resource = %key, count = evicted.len(), "Evicted oldest logs");
        }

        LogWrite {
            stored,
            evicted: evicted.iter().map(|entry| entry.id).collect(),
        }
    }

    fn resource_logs(&self, key: &ResourceKey) -> Arc<ResourceLogs> {
        if let Some(logs) = self.resources.get(key) {
            return Arc::clone(logs.value());
        }
        let entry = self.resources.entry(key.clone()).or_insert_with(|| {
            Arc::new(ResourceLogs {
                writer: Mutex::new(()),
                buffer: SnapshotBuffer::new(self.max_logs_per_resource),
            })
        });
        Arc::clone(entry.value())
    }

    /// Snapshot of the logs selected by `key`, oldest first.
    ///
    /// `None` selects every resource; a grouping key selects every instance
    /// of its name. Multi-resource snapshots are merged in insertion order.
    pub fn snapshot(&self, key: Option<&ResourceKey>) -> Snapshot<LogEntry> {
        if let Some(key) = key.filter(|k| !k.is_grouping()) {
            return self
                .resources
                .get(key)
                .map(|logs| logs.buffer.snapshot())
                .unwrap_or_default();
        }

        let mut merged: Vec<Arc<LogEntry>> = Vec::new();
        for entry in self.resources.iter() {
            if key.map_or(true, |k| k.matches(entry.key())) {
                merged.extend(entry.value().buffer.snapshot().iter().map(Arc::clone));
            }
        }
        merged.sort_by_key(|entry| entry.id);
        Arc::new(merged)
    }

    /// Returns true if any selected resource buffer is at capacity
    pub fn is_full(&self, key: Option<&ResourceKey>) -> bool {
        self.resources
            .iter()
            .filter(|entry| key.map_or(true, |k| k.matches(entry.key())))
            .any(|entry| entry.value().buffer.is_full())
    }

    pub fn get(&self, id: u64) -> Option<Arc<LogEntry>> {
        self.by_id.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Total number of stored logs
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&self) {
        self.resources.clear();
        self.by_id.clear();
    }
}
