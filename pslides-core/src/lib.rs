//! # pslides-core: Presentation navigation engine
//!
//! Decks of slides with progressively revealed fragments, speaker notes,
//! a presentation clock and a serializable snapshot for cross-context sync.
//! Runtime-free and synchronous: every operation completes before returning.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   KeyCommand    ┌──────────────┐   StatePublisher
//! │ KeyBindings  │ ──────────────► │     Deck     │ ─────────────────► sync
//! └──────────────┘                 └──────┬───────┘ ◄───────────────── ChannelMessage
//!                                         │ owns
//!                                         ▼
//!                                  ┌──────────────┐   sequence()   ┌──────────────────┐
//!                                  │    Slide     │ ─────────────► │ FragmentSequence │
//!                                  │ (fragments,  │                │ (cached groups)  │
//!                                  │  notes)      │                └──────────────────┘
//!                                  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`sequence`]: Reveal order from index / group hints
//! - [`fragment`]: Fragment activation and markers
//! - [`slide`]: Stepping through a slide's groups
//! - [`notes`]: Note ordering and the speaker panel
//! - [`deck`]: Slide selection, clock, snapshot, sync hooks
//! - [`commands`]: Key strokes and the command table
//! - [`events`]: Deck notifications
//! - [`state`]: Snapshot and channel message types
//! - [`clock`]: Time sources and clock readings
//! - [`source`]: JSON deck files

pub mod clock;
pub mod commands;
pub mod deck;
pub mod events;
pub mod fragment;
pub mod notes;
pub mod sequence;
pub mod slide;
pub mod source;
pub mod state;

// Re-exports for convenience
pub use clock::{ClockReading, ManualTime, SystemTime, TimeSource};
pub use commands::{KeyBindings, KeyCommand, KeyMatcher, KeyStroke};
pub use deck::{Deck, DeckBuilder, DeckConfig, DeckError, DeckMode};
pub use events::{DeckEvent, EventEmitter};
pub use fragment::Fragment;
pub use notes::{Note, NoteAnchor, NotesPanel, PanelNote};
pub use sequence::{
    parse_index_attr, sequence, FragmentDescriptor, FragmentIndex, FragmentSequence, Sequenced,
};
pub use slide::{Slide, SlideStep};
pub use source::{DeckSource, FragmentSource, NoteSource, SlideSource, SourceError};
pub use state::{ChannelMessage, DeckState, StatePublisher};
