//! Event types for the MLIB event system
//!
//! Provides shared event definitions and the EventBus used by the metadata
//! service to announce refresh cycles, image changes and probe warnings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Reason an item is handed to the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateReason {
    /// User edited metadata
    MetadataEdit,
    /// Refresh cycle imported metadata
    MetadataImport,
    /// Image slots changed
    ImageUpdate,
    /// Nothing changed; save only stamps bookkeeping fields
    None,
}

impl UpdateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateReason::MetadataEdit => "MetadataEdit",
            UpdateReason::MetadataImport => "MetadataImport",
            UpdateReason::ImageUpdate => "ImageUpdate",
            UpdateReason::None => "None",
        }
    }
}

/// MLIB catalog events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    /// A refresh cycle executed and was persisted
    ItemRefreshed {
        item_id: Uuid,
        reason: UpdateReason,
        /// Whether the gate requested a full (replace-all) refresh
        force_full: bool,
        timestamp: DateTime<Utc>,
    },

    /// The refresh gate declined a refresh (steady state, not an error)
    ItemRefreshSkipped {
        item_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Item persisted outside a refresh cycle (edit, lock change)
    ItemUpdated {
        item_id: Uuid,
        reason: UpdateReason,
        timestamp: DateTime<Utc>,
    },

    /// Image slots of one kind changed
    ImagesChanged {
        item_id: Uuid,
        image_kind: String,
        /// Records of that kind after the change
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// File probe failed during image validation; record kept
    ImageProbeFailed {
        item_id: Uuid,
        path: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Item removed from the catalog
    ItemRemoved {
        item_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for catalog events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CatalogEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use mlib_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CatalogEvent,
    ) -> Result<usize, broadcast::error::SendError<CatalogEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CatalogEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
