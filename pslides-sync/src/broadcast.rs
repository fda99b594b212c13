//! Topic-keyed fan-out between deck contexts.
//!
//! Uses tokio broadcast channels for O(1) send to all subscribers.
//! Each peer gets an independent receiver that buffers up to `capacity` messages;
//! a peer that falls further behind loses the oldest messages, which is the
//! at-most-once delivery the sync model expects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::protocol::{PeerInfo, ProtocolError, SyncMessage};

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub active_peers: usize,
}

/// Lock-free counters for the send path.
struct AtomicBroadcastStats {
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
}

impl AtomicBroadcastStats {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }
}

/// One broadcast channel shared by every context on a topic.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<Vec<u8>>>,

    /// Contexts attached to this channel
    peers: Arc<RwLock<HashMap<Uuid, PeerInfo>>>,

    /// Messages buffered per receiver
    capacity: usize,

    atomic_stats: Arc<AtomicBroadcastStats>,
}

impl BroadcastGroup {
    /// Create a group whose receivers each buffer `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            peers: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
            atomic_stats: Arc::new(AtomicBroadcastStats::new()),
        }
    }

    /// Register a peer. Returns its receiver.
    pub async fn add_peer(&self, info: PeerInfo) -> broadcast::Receiver<Arc<Vec<u8>>> {
        let mut peers = self.peers.write().await;
        peers.insert(info.peer_id, info);
        self.sender.subscribe()
    }

    /// Unregister a peer. Its receiver keeps working until dropped.
    pub async fn remove_peer(&self, peer_id: &Uuid) -> Option<PeerInfo> {
        let mut peers = self.peers.write().await;
        peers.remove(peer_id)
    }

    /// Encode once and send to every receiver, the sender's own included.
    /// Filtering is the receiver's job.
    pub fn broadcast(&self, msg: &SyncMessage) -> Result<usize, ProtocolError> {
        let encoded = msg.encode()?;
        Ok(self.broadcast_raw(Arc::new(encoded)))
    }

    /// Broadcast pre-encoded bytes directly.
    pub fn broadcast_raw(&self, encoded: Arc<Vec<u8>>) -> usize {
        let count = self.sender.send(encoded).unwrap_or(0);
        self.atomic_stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Account for messages a lagging receiver never saw.
    pub fn record_dropped(&self, count: u64) {
        self.atomic_stats.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Number of registered peers.
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Snapshot of the registered peers.
    pub async fn peers(&self) -> Vec<PeerInfo> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Whether `peer_id` is registered.
    pub async fn has_peer(&self, peer_id: &Uuid) -> bool {
        self.peers.read().await.contains_key(peer_id)
    }

    /// Current counters and peer count.
    pub async fn stats(&self) -> BroadcastStats {
        let peers = self.peers.read().await;
        BroadcastStats {
            messages_sent: self.atomic_stats.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.atomic_stats.messages_dropped.load(Ordering::Relaxed),
            active_peers: peers.len(),
        }
    }

    /// Messages buffered per receiver.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw receiver without registering a peer.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<u8>>> {
        self.sender.subscribe()
    }
}

/// Maps topic names to broadcast groups.
///
/// Contexts that attach with the same topic see each other; different
/// topics are fully isolated.
pub struct ChannelRegistry {
    channels: Arc<RwLock<HashMap<String, Arc<BroadcastGroup>>>>,
    default_capacity: usize,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChannelRegistry {
    /// Create a registry whose channels default to `default_capacity`.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            default_capacity,
        }
    }

    /// Get the channel for `topic`, creating it if needed.
    pub async fn get_or_create(&self, topic: &str) -> Arc<BroadcastGroup> {
        self.get_or_create_with(topic, self.default_capacity).await
    }

    /// Like [`Self::get_or_create`]; `capacity` only applies if the channel
    /// doesn't exist yet.
    pub async fn get_or_create_with(&self, topic: &str, capacity: usize) -> Arc<BroadcastGroup> {
        // Fast path: read lock
        {
            let channels = self.channels.read().await;
            if let Some(channel) = channels.get(topic) {
                return channel.clone();
            }
        }

        let mut channels = self.channels.write().await;
        // Double-check after acquiring write lock
        if let Some(channel) = channels.get(topic) {
            return channel.clone();
        }

        log::debug!("Opening channel '{topic}' (capacity {capacity})");
        let channel = Arc::new(BroadcastGroup::new(capacity));
        channels.insert(topic.to_owned(), channel.clone());
        channel
    }

    /// Drop a channel nobody is attached to.
    pub async fn remove_if_empty(&self, topic: &str) -> bool {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get(topic) {
            if channel.peer_count().await == 0 {
                channels.remove(topic);
                log::debug!("Closed channel '{topic}'");
                return true;
            }
        }
        false
    }

    /// Number of open channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Names of the open channels.
    pub async fn topics(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }
}
