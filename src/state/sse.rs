use tokio::sync::{Mutex, broadcast};

use crate::dto::sse::ServerEvent;

/// SSE sub-state carved out from [`AppState`](super::AppState): one hub for
/// the public stream, one for the single admin stream plus its token guard.
pub struct SseState {
    public: SseHub,
    admin: SseHub,
    admin_token: Mutex<Option<String>>,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(public_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            admin: SseHub::new(admin_capacity),
            admin_token: Mutex::new(None),
        }
    }

    /// Hub fanning events out to every public subscriber.
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    /// Hub carrying admin-only events.
    pub fn admin(&self) -> &SseHub {
        &self.admin
    }

    /// Token slot coordinating the single allowed admin SSE connection.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        &self.admin_token
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
