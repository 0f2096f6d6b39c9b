//! Change notifications for live views.
//!
//! Every successful write publishes events on a broadcast channel. Slow
//! subscribers skip missed events instead of blocking ingestion; a UI only
//! needs to know that something changed, not every intermediate change.

use crate::resource::ResourceKey;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// What changed in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEvent {
    /// A resource was added, or the repository was cleared
    ResourcesChanged,
    /// New log entries for a resource
    Logs(ResourceKey),
    /// New spans for these resources
    Traces(Vec<ResourceKey>),
    /// New metric points for a resource
    Metrics(ResourceKey),
}

impl RepositoryEvent {
    /// Returns true if the event concerns a resource selected by `key`
    pub fn touches(&self, key: &ResourceKey) -> bool {
        match self {
            Self::ResourcesChanged => true,
            Self::Logs(changed) | Self::Metrics(changed) => key.matches(changed),
            Self::Traces(changed) => changed.iter().any(|c| key.matches(c)),
        }
    }
}

/// Receiving end of repository notifications
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<RepositoryEvent>,
    resource: Option<ResourceKey>,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<RepositoryEvent>) -> Self {
        Self {
            receiver,
            resource: None,
        }
    }

    /// Only yield events touching `key` (grouping keys match every instance)
    pub fn for_resource(mut self, key: ResourceKey) -> Self {
        self.resource = Some(key);
        self
    }

    fn wanted(&self, event: &RepositoryEvent) -> bool {
        self.resource.as_ref().map_or(true, |key| event.touches(key))
    }

    /// Waits for the next relevant event. Returns `None` once the repository
    /// has been dropped.
    pub async fn recv(&mut self) -> Option<RepositoryEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wanted(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscriber lagged, skipping ahead");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next relevant event if one is already queued
    pub fn try_recv(&mut self) -> Option<RepositoryEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wanted(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscriber lagged, skipping ahead");
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}
