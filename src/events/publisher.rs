use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcast publisher for flow lifecycle events
#[derive(Debug, Clone)]
pub struct FlowEventPublisher {
    sender: broadcast::Sender<FlowEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct FlowEvent {
    pub name: String,
    pub document_id: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl FlowEventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event for a document, returning how many subscribers
    /// received it
    pub fn publish(
        &self,
        event_name: impl Into<String>,
        document_id: impl Into<String>,
        context: Value,
    ) -> usize {
        let event = FlowEvent {
            name: event_name.into(),
            document_id: document_id.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // No subscribers is acceptable: events are notifications, not a queue
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FlowEventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
