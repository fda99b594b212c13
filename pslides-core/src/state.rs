//! The deck snapshot and the publishing seam used for state sync.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

/// Serializable subset of deck state exchanged between contexts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckState {
    /// Position of the active slide, `-1` if none.
    pub current_index: i64,
    /// Activation of the current slide's fragments, in markup order.
    pub current_slide_fragment_activation: Vec<bool>,
    pub clock_elapsed: i64,
    pub clock_start: Option<i64>,
}

impl DeckState {
    pub fn is_clock_running(&self) -> bool {
        self.clock_start.is_some()
    }
}

/// What travels on the sync channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMessage {
    /// A context just joined and asks for everybody's state.
    RequestState,
    State(DeckState),
}

/// Outbound side of the sync channel.
pub trait StatePublisher: Send {
    fn publish(&self, message: ChannelMessage);
}

impl StatePublisher for Sender<ChannelMessage> {
    fn publish(&self, message: ChannelMessage) {
        // Nobody listening is the same as nothing delivered.
        let _ = self.send(message);
    }
}
