//! Binary protocol for deck state synchronization.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────┬──────────┐
//! │ msg_type │ peer_id   │ deck_id  │ seq      │ payload  │
//! │ 1 byte   │ 16 bytes  │ 16 bytes │ varint   │ variable │
//! └──────────┴───────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! A `StateRequest` has an empty payload; a `State` carries a bincode-encoded
//! [`DeckState`].

use pslides_core::{ChannelMessage, DeckState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message types for the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Late joiner asking everybody to publish their state
    StateRequest = 1,
    /// Full deck snapshot
    State = 2,
}

/// Peer identity on a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: Uuid,
    pub name: String,
}

impl PeerInfo {
    /// A fresh identity named after the deck's mode.
    pub fn new(name: impl Into<String>) -> Self {
        Self { peer_id: Uuid::new_v4(), name: name.into() }
    }
}

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub msg_type: MessageType,
    pub peer_id: Uuid,
    pub deck_id: Uuid,
    /// Per-sender sequence number, starting at 1
    pub seq: u64,
    pub payload: Vec<u8>,
}

impl SyncMessage {
    pub fn state_request(peer_id: Uuid, deck_id: Uuid, seq: u64) -> Self {
        Self {
            msg_type: MessageType::StateRequest,
            peer_id,
            deck_id,
            seq,
            payload: Vec::new(),
        }
    }

    pub fn state(peer_id: Uuid, deck_id: Uuid, seq: u64, state: &DeckState) -> Result<Self, ProtocolError> {
        let payload = bincode::serde::encode_to_vec(state, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))?;
        Ok(Self {
            msg_type: MessageType::State,
            peer_id,
            deck_id,
            seq,
            payload,
        })
    }

    /// Wrap a deck channel message.
    pub fn from_channel_message(
        peer_id: Uuid,
        deck_id: Uuid,
        seq: u64,
        message: &ChannelMessage,
    ) -> Result<Self, ProtocolError> {
        match message {
            ChannelMessage::RequestState => Ok(Self::state_request(peer_id, deck_id, seq)),
            ChannelMessage::State(state) => Self::state(peer_id, deck_id, seq, state),
        }
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }

    /// Parse the snapshot payload.
    pub fn deck_state(&self) -> Result<DeckState, ProtocolError> {
        if self.msg_type != MessageType::State {
            return Err(ProtocolError::InvalidMessageType);
        }
        let (state, _) = bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(state)
    }

    /// Unwrap into what the deck understands.
    pub fn into_channel_message(self) -> Result<ChannelMessage, ProtocolError> {
        match self.msg_type {
            MessageType::StateRequest => Ok(ChannelMessage::RequestState),
            MessageType::State => self.deck_state().map(ChannelMessage::State),
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    InvalidMessageType,
    ChannelClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::InvalidMessageType => write!(f, "Invalid message type"),
            Self::ChannelClosed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
