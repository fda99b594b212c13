//! A deck attached to a sync channel.
//!
//! ```text
//!            ┌──────────────── DeckSession ────────────────┐
//!  channel ─►│ receiver task ─► Deck::receive (muted apply) │
//!            │                        │                     │
//!            │                 Arc<Mutex<Deck>> ─► ChannelPublisher ─► channel
//!            │                        │                     │
//!            │ tick task ─────► watch<ClockReading>         │
//!            └──────────────────────────────────────────────┘
//! ```
//!
//! The deck arrives from its builder with a slide already selected.
//! Attaching asks the other contexts for their state. Detaching stops both
//! tasks and the clock without telling anybody.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use pslides_core::{ClockReading, Deck, DeckState};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::broadcast::{BroadcastGroup, ChannelRegistry};
use crate::protocol::{PeerInfo, SyncMessage};
use crate::publisher::ChannelPublisher;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Channel name shared by all contexts of one presentation
    pub topic: String,
    /// Messages buffered per receiver
    pub channel_capacity: usize,
    /// Clock display refresh period
    pub tick_interval: Duration,
    /// Drop messages whose sequence number isn't newer than the last one
    /// applied from the same peer
    pub ignore_stale: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            topic: "p-slides".to_string(),
            channel_capacity: 64,
            tick_interval: Duration::from_secs(1),
            ignore_stale: false,
        }
    }
}

/// A deck joined to a topic.
///
/// Leave with [`DeckSession::detach`]. Dropping a session only stops its
/// tasks; the peer stays listed on the channel.
pub struct DeckSession {
    deck: Arc<Mutex<Deck>>,
    peer: PeerInfo,
    deck_id: Uuid,
    topic: String,
    group: Arc<BroadcastGroup>,
    clock_rx: watch::Receiver<ClockReading>,
    receiver_task: JoinHandle<()>,
    tick_task: JoinHandle<()>,
}

impl DeckSession {
    /// Joins `config.topic` and starts the receiver and clock tasks.
    pub async fn attach(deck: Deck, registry: &ChannelRegistry, config: SyncConfig) -> Self {
        let peer = PeerInfo::new(deck.mode().as_str());
        let deck_id = deck.id();
        let group = registry.get_or_create_with(&config.topic, config.channel_capacity).await;
        // Subscribe before the join request goes out so no answer is missed.
        let rx = group.add_peer(peer.clone()).await;
        let publisher = ChannelPublisher::new(group.clone(), peer.peer_id, deck_id);

        let deck = Arc::new(Mutex::new(deck));
        let reading = {
            let mut deck = deck.lock().await;
            debug_assert!(deck.is_empty() || deck.current_index().is_some());
            deck.set_publisher(Box::new(publisher));
            deck.request_state();
            deck.clock_reading()
        };

        let (clock_tx, clock_rx) = watch::channel(reading);
        let receiver_task = tokio::spawn(receive_loop(
            deck.clone(),
            rx,
            group.clone(),
            peer.peer_id,
            deck_id,
            config.ignore_stale,
        ));
        let tick_task = tokio::spawn(tick_loop(deck.clone(), clock_tx, config.tick_interval));

        info!("Peer {} ({}) attached deck {} to '{}'", peer.peer_id, peer.name, deck_id, config.topic);
        Self {
            deck,
            peer,
            deck_id,
            topic: config.topic,
            group,
            clock_rx,
            receiver_task,
            tick_task,
        }
    }

    pub fn peer_id(&self) -> Uuid {
        self.peer.peer_id
    }

    pub fn deck_id(&self) -> Uuid {
        self.deck_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Shared handle to the deck.
    pub fn deck(&self) -> Arc<Mutex<Deck>> {
        self.deck.clone()
    }

    /// Runs `f` with the deck locked.
    pub async fn with_deck<R>(&self, f: impl FnOnce(&mut Deck) -> R) -> R {
        let mut deck = self.deck.lock().await;
        f(&mut deck)
    }

    pub async fn state(&self) -> DeckState {
        self.deck.lock().await.state()
    }

    /// Clock readings refreshed every tick.
    pub fn clock(&self) -> watch::Receiver<ClockReading> {
        self.clock_rx.clone()
    }

    /// Leaves the channel. The clock is stopped locally only.
    pub async fn detach(self, registry: &ChannelRegistry) {
        self.receiver_task.abort();
        self.tick_task.abort();
        {
            let mut deck = self.deck.lock().await;
            deck.clear_publisher();
            deck.muted(|deck| deck.stop_clock());
        }
        self.group.remove_peer(&self.peer.peer_id).await;
        registry.remove_if_empty(&self.topic).await;
        info!("Peer {} detached from '{}'", self.peer.peer_id, self.topic);
    }
}

impl Drop for DeckSession {
    fn drop(&mut self) {
        self.receiver_task.abort();
        self.tick_task.abort();
    }
}

async fn receive_loop(
    deck: Arc<Mutex<Deck>>,
    mut rx: broadcast::Receiver<Arc<Vec<u8>>>,
    group: Arc<BroadcastGroup>,
    peer_id: Uuid,
    deck_id: Uuid,
    ignore_stale: bool,
) {
    let mut last_seq: HashMap<Uuid, u64> = HashMap::new();
    loop {
        let bytes = match rx.recv().await {
            Ok(bytes) => bytes,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Peer {peer_id} lagged, {skipped} message(s) lost");
                group.record_dropped(skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                debug!("Peer {peer_id} channel closed");
                break;
            }
        };

        let msg = match SyncMessage::decode(&bytes) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Peer {peer_id} ignoring undecodable message: {e}");
                continue;
            }
        };

        // Skip our own messages
        if msg.peer_id == peer_id {
            continue;
        }
        if msg.deck_id != deck_id {
            trace!("Peer {peer_id} ignoring message for deck {}", msg.deck_id);
            continue;
        }
        if ignore_stale {
            let last = last_seq.entry(msg.peer_id).or_insert(0);
            if msg.seq <= *last {
                debug!("Peer {peer_id} dropping stale #{} from {} (last #{})", msg.seq, msg.peer_id, *last);
                continue;
            }
            *last = msg.seq;
        }

        trace!("Peer {peer_id} received {:?} #{} from {}", msg.msg_type, msg.seq, msg.peer_id);
        let from = msg.peer_id;
        let message = match msg.into_channel_message() {
            Ok(message) => message,
            Err(e) => {
                warn!("Peer {peer_id} ignoring bad payload from {from}: {e}");
                continue;
            }
        };
        if let Err(e) = deck.lock().await.receive(message) {
            warn!("Peer {peer_id} could not apply state from {from}: {e}");
        }
    }
}

async fn tick_loop(deck: Arc<Mutex<Deck>>, clock_tx: watch::Sender<ClockReading>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let reading = deck.lock().await.clock_reading();
        clock_tx.send_replace(reading);
    }
}
