//! # pslides-sync: Cross-context deck state synchronization
//!
//! Keeps several decks (an audience view and a speaker view, say) on the same
//! slide, fragment and clock by broadcasting full snapshots on a shared topic.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                       ┌──────────────┐
//! │ DeckSession  │                       │ DeckSession  │
//! │ (audience)   │                       │ (speaker)    │
//! └──────┬───────┘                       └──────┬───────┘
//!        │ ChannelPublisher    bincode          │
//!        ▼                   SyncMessage        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │        BroadcastGroup  (topic "p-slides")            │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-most-once and unordered relative to local changes; the
//! last snapshot applied wins. A joining context sends a `StateRequest` and
//! every other context answers by re-publishing its state. Applied
//! snapshots are never re-published.
//!
//! ## Modules
//!
//! - [`protocol`]: Binary wire protocol (bincode-encoded SyncMessage)
//! - [`broadcast`]: Topic-keyed fan-out with backpressure
//! - [`publisher`]: Deck-side channel adapter
//! - [`session`]: Attach/detach, receiver and clock tasks

pub mod broadcast;
pub mod protocol;
pub mod publisher;
pub mod session;

// Re-exports for convenience
pub use broadcast::{BroadcastGroup, BroadcastStats, ChannelRegistry};
pub use protocol::{MessageType, PeerInfo, ProtocolError, SyncMessage};
pub use publisher::ChannelPublisher;
pub use session::{DeckSession, SyncConfig};
