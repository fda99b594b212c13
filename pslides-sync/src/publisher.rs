//! Deck-side adapter onto a broadcast channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use pslides_core::{ChannelMessage, StatePublisher};
use uuid::Uuid;

use crate::broadcast::BroadcastGroup;
use crate::protocol::SyncMessage;

/// Encodes deck messages and fans them out on one channel.
pub struct ChannelPublisher {
    group: Arc<BroadcastGroup>,
    peer_id: Uuid,
    deck_id: Uuid,
    seq: AtomicU64,
}

impl ChannelPublisher {
    pub fn new(group: Arc<BroadcastGroup>, peer_id: Uuid, deck_id: Uuid) -> Self {
        Self {
            group,
            peer_id,
            deck_id,
            seq: AtomicU64::new(0),
        }
    }

    pub fn peer_id(&self) -> Uuid {
        self.peer_id
    }

    /// Sequence number of the last message sent.
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}

impl StatePublisher for ChannelPublisher {
    fn publish(&self, message: ChannelMessage) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = match SyncMessage::from_channel_message(self.peer_id, self.deck_id, seq, &message) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Peer {} could not encode message: {e}", self.peer_id);
                return;
            }
        };
        match self.group.broadcast(&msg) {
            Ok(receivers) => debug!("Peer {} sent {:?} #{seq} to {receivers} receiver(s)", self.peer_id, msg.msg_type),
            Err(e) => warn!("Peer {} broadcast failed: {e}", self.peer_id),
        }
    }
}
