//! The deck: slide selection, stepping, clock, snapshot and sync hooks.
//!
//! ## Architecture
//!
//! ```text
//!  KeyStroke ──► KeyBindings ──► Deck::execute
//!                                     │
//!                           next() / previous()
//!                                     │
//!                 ┌───────────────────┴───────────────────┐
//!                 ▼                                       ▼
//!        Slide step toggled                       Slide exhausted
//!        (refresh notes panel)                   select(adjacent slide)
//!                 │                                       │
//!                 └──────────► broadcast_state() ◄────────┘
//!                                     │
//!                              StatePublisher
//! ```
//!
//! The deck is the only writer of the per-slide `is_active` / `is_previous`
//! flags. Exactly one slide is active whenever the deck is non-empty.

use std::fmt;
use std::sync::mpsc::Receiver;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{ClockReading, SystemTime, TimeSource};
use crate::commands::{KeyBindings, KeyCommand, KeyStroke};
use crate::events::{DeckEvent, EventEmitter};
use crate::notes::NotesPanel;
use crate::slide::{Slide, SlideStep};
use crate::state::{ChannelMessage, DeckState, StatePublisher};

// ---------------------------------------------------------------
// Error types
// ---------------------------------------------------------------

/// Invalid-argument failures. Always the caller's fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    #[error("Slide not found: {0}")]
    SlideNotFound(Uuid),

    #[error("Slide index {index} out of range for {len} slide(s)")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Fragment not found: {0}")]
    FragmentNotFound(Uuid),
}

// ---------------------------------------------------------------
// Mode
// ---------------------------------------------------------------

/// Display mode. Unknown names normalize to `Presentation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeckMode {
    #[default]
    Presentation,
    Speaker,
}

impl DeckMode {
    pub const ALL: [DeckMode; 2] = [Self::Presentation, Self::Speaker];

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "speaker" => Self::Speaker,
            _ => Self::Presentation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Presentation => "presentation",
            Self::Speaker => "speaker",
        }
    }

    /// The next (or previous) mode, wrapping around.
    pub fn cycle(self, forward: bool) -> Self {
        let count = Self::ALL.len();
        let current = Self::ALL.iter().position(|mode| *mode == self).unwrap_or(0);
        let next = if forward { (current + 1) % count } else { (current + count - 1) % count };
        Self::ALL[next]
    }
}

impl fmt::Display for DeckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DeckMode {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<DeckMode> for String {
    fn from(mode: DeckMode) -> Self {
        mode.as_str().to_owned()
    }
}

// ---------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Mode the deck starts in.
    pub mode: DeckMode,
    pub key_bindings: KeyBindings,
    /// Overrides the content-derived deck id.
    pub deck_id: Option<Uuid>,
}

/// Identity shared by every deck built from the same content.
fn content_id(slides: &[Slide]) -> Uuid {
    let mut text = String::new();
    for slide in slides {
        text.push_str(slide.title());
        text.push('\n');
        for fragment in slide.fragments() {
            text.push_str(&fragment.label);
            text.push('\n');
        }
        for note in slide.raw_notes() {
            text.push_str(&note.text);
            text.push('\n');
        }
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, text.as_bytes())
}

// ---------------------------------------------------------------
// Builder
// ---------------------------------------------------------------

pub struct DeckBuilder {
    slides: Vec<Slide>,
    config: DeckConfig,
    time: Box<dyn TimeSource>,
    publisher: Option<Box<dyn StatePublisher>>,
}

impl Default for DeckBuilder {
    fn default() -> Self {
        Self {
            slides: Vec::new(),
            config: DeckConfig::default(),
            time: Box::new(SystemTime),
            publisher: None,
        }
    }
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, slide: Slide) -> Self {
        self.slides.push(slide);
        self
    }

    pub fn slides(mut self, slides: impl IntoIterator<Item = Slide>) -> Self {
        self.slides.extend(slides);
        self
    }

    pub fn config(mut self, config: DeckConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: DeckMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn deck_id(mut self, id: Uuid) -> Self {
        self.config.deck_id = Some(id);
        self
    }

    pub fn time_source<T: TimeSource + 'static>(mut self, time: T) -> Self {
        self.time = Box::new(time);
        self
    }

    pub fn publisher<P: StatePublisher + 'static>(mut self, publisher: P) -> Self {
        self.publisher = Some(Box::new(publisher));
        self
    }

    /// Wires everything up and selects the first slide.
    pub fn build(self) -> Deck {
        let id = self.config.deck_id.unwrap_or_else(|| content_id(&self.slides));
        let mut slides = self.slides;
        for slide in &mut slides {
            slide.set_active(false);
            slide.set_previous(false);
        }

        let mut deck = Deck {
            id,
            slides,
            mode: self.config.mode,
            key_bindings: self.config.key_bindings,
            clock_elapsed: 0,
            clock_start: None,
            time: self.time,
            notes_panel: NotesPanel::default(),
            events: EventEmitter::default(),
            publisher: None,
            muted: false,
        };
        if !deck.slides.is_empty() {
            deck.select(0);
        }
        deck.publisher = self.publisher;
        info!("Deck {} built with {} slide(s)", deck.id, deck.slides.len());
        deck
    }
}

// ---------------------------------------------------------------
// Deck
// ---------------------------------------------------------------

pub struct Deck {
    id: Uuid,
    slides: Vec<Slide>,
    mode: DeckMode,
    key_bindings: KeyBindings,
    clock_elapsed: i64,
    /// Wall-clock start while running.
    clock_start: Option<i64>,
    time: Box<dyn TimeSource>,
    notes_panel: NotesPanel,
    events: EventEmitter,
    publisher: Option<Box<dyn StatePublisher>>,
    muted: bool,
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck")
            .field("id", &self.id)
            .field("slides", &self.slides.len())
            .field("current_index", &self.current_index())
            .field("mode", &self.mode)
            .field("clock_elapsed", &self.clock_elapsed)
            .field("clock_start", &self.clock_start)
            .field("muted", &self.muted)
            .finish()
    }
}

impl Deck {
    pub fn builder() -> DeckBuilder {
        DeckBuilder::new()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&mut self) -> Receiver<DeckEvent> {
        self.events.subscribe()
    }

    pub fn notes_panel(&self) -> &NotesPanel {
        &self.notes_panel
    }

    // ── Mode and keys ───────────────────────────────────────────

    pub fn mode(&self) -> DeckMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DeckMode) {
        if self.mode == mode {
            return;
        }
        debug!("Deck {} mode {} -> {}", self.id, self.mode, mode);
        self.mode = mode;
        self.events.emit(DeckEvent::ModeChanged { mode });
    }

    pub fn cycle_mode(&mut self, forward: bool) {
        self.set_mode(self.mode.cycle(forward));
    }

    pub fn key_bindings(&self) -> &KeyBindings {
        &self.key_bindings
    }

    pub fn key_bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.key_bindings
    }

    pub fn execute(&mut self, command: KeyCommand) {
        trace!("Deck {} executing {}", self.id, command);
        match command {
            KeyCommand::Next => self.next(),
            KeyCommand::Previous => self.previous(),
            KeyCommand::NextSlide => self.next_slide(),
            KeyCommand::PreviousSlide => self.previous_slide(),
            KeyCommand::GoToStart => self.go_to_start(),
            KeyCommand::GoToEnd => self.go_to_end(),
            KeyCommand::ToggleClock => self.toggle_clock(),
            KeyCommand::ResetClock => self.set_clock(0),
            KeyCommand::ToggleMode => self.cycle_mode(true),
            KeyCommand::PreviousMode => self.cycle_mode(false),
        }
    }

    /// Runs the command bound to `stroke`. Returns whether one was bound.
    pub fn handle_key(&mut self, stroke: &KeyStroke) -> bool {
        match self.key_bindings.command_for(stroke) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    // ── Slides ──────────────────────────────────────────────────

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide(&self, id: Uuid) -> Option<&Slide> {
        self.slides.iter().find(|slide| slide.id() == id)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    fn position_of(&self, id: Uuid) -> Result<usize, DeckError> {
        self.slides
            .iter()
            .position(|slide| slide.id() == id)
            .ok_or(DeckError::SlideNotFound(id))
    }

    /// Position of the active slide.
    pub fn current_index(&self) -> Option<usize> {
        self.slides.iter().position(Slide::is_active)
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.slides.iter().find(|slide| slide.is_active())
    }

    pub fn set_current_slide(&mut self, id: Uuid) -> Result<(), DeckError> {
        let position = self.position_of(id)?;
        self.select(position);
        Ok(())
    }

    pub fn set_current_index(&mut self, index: i64) -> Result<(), DeckError> {
        let len = self.slides.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|&position| position < len)
            .ok_or(DeckError::IndexOutOfRange { index, len })?;
        self.select(position);
        Ok(())
    }

    fn select(&mut self, target: usize) {
        let previous = self.current_index();
        if previous == Some(target) {
            return;
        }
        let previous = previous.map(|position| self.slides[position].id());
        self.transition(target, previous);
    }

    /// Makes `target` the only active slide in one pass.
    fn transition(&mut self, target: usize, previous: Option<Uuid>) {
        for (position, slide) in self.slides.iter_mut().enumerate() {
            if position == target {
                slide.set_active(true);
                slide.refresh_markers();
            } else {
                let before = position < target;
                slide.set_active(false);
                slide.set_previous(before);
                slide.set_fragment_visibility(before);
            }
        }

        let slide = &self.slides[target];
        let id = slide.id();
        self.notes_panel.replace(slide);
        debug!("Deck {} now on slide {} ({})", self.id, target, slide.title());

        self.events.emit(DeckEvent::SlideChanged { slide: id, index: target, previous });
        if self.at_end() {
            self.events.emit(DeckEvent::Finished);
        }
        self.broadcast_state();
    }

    /// Adds a slide at the end.
    pub fn push_slide(&mut self, slide: Slide) -> Uuid {
        self.insert_slide(self.slides.len(), slide)
    }

    /// Inserts a slide at `position` (clamped), revealed or hidden according
    /// to which side of the current slide it lands on.
    pub fn insert_slide(&mut self, position: usize, mut slide: Slide) -> Uuid {
        let position = position.min(self.slides.len());
        let id = slide.id();
        slide.set_active(false);

        match self.current_index() {
            Some(current) => {
                let before = position <= current;
                slide.set_previous(before);
                slide.set_fragment_visibility(before);
                self.slides.insert(position, slide);
                self.broadcast_state();
            }
            None => {
                slide.set_previous(false);
                self.slides.insert(position, slide);
                self.select(position);
            }
        }
        id
    }

    /// Removes a slide. Removing the current slide selects the slide that
    /// takes its place, or the new last slide.
    pub fn remove_slide(&mut self, id: Uuid) -> Result<Slide, DeckError> {
        let position = self.position_of(id)?;
        let mut removed = self.slides.remove(position);
        let was_active = removed.is_active();
        removed.set_active(false);

        if was_active && !self.slides.is_empty() {
            let target = position.min(self.slides.len() - 1);
            self.transition(target, Some(id));
        } else {
            if self.slides.is_empty() {
                self.notes_panel.clear();
            }
            self.broadcast_state();
        }
        Ok(removed)
    }

    /// Mutates a slide in place and re-derives everything that depends on it.
    pub fn slide_mut<R>(&mut self, id: Uuid, f: impl FnOnce(&mut Slide) -> R) -> Result<R, DeckError> {
        let position = self.position_of(id)?;
        let current = self.current_index();
        let slide = &mut self.slides[position];
        let result = f(slide);

        if slide.is_active() {
            slide.refresh_markers();
            self.notes_panel.replace(&self.slides[position]);
            self.broadcast_state();
        } else if let Some(current) = current {
            slide.set_fragment_visibility(position < current);
        } else {
            slide.refresh_markers();
        }
        Ok(result)
    }

    // ── Navigation ──────────────────────────────────────────────

    /// One reveal step forward, moving to the next slide when the current one
    /// has nothing left.
    pub fn next(&mut self) {
        if self.at_end() {
            return;
        }
        let Some(position) = self.current_index() else {
            self.select(0);
            return;
        };
        match self.slides[position].next() {
            SlideStep::Exhausted => {
                if position + 1 < self.slides.len() {
                    self.select(position + 1);
                }
            }
            SlideStep::Toggled { fragments, activated } => {
                self.after_step(position, fragments, activated);
            }
        }
    }

    /// One reveal step back, moving to the previous slide when the current one
    /// is fully hidden.
    pub fn previous(&mut self) {
        if self.at_start() {
            return;
        }
        let Some(position) = self.current_index() else {
            return;
        };
        match self.slides[position].previous() {
            SlideStep::Exhausted => {
                if position > 0 {
                    self.select(position - 1);
                }
            }
            SlideStep::Toggled { fragments, activated } => {
                self.after_step(position, fragments, activated);
            }
        }
    }

    fn after_step(&mut self, position: usize, fragments: Vec<Uuid>, activated: bool) {
        let slide = &self.slides[position];
        self.notes_panel.refresh(slide);
        self.events.emit(DeckEvent::FragmentToggled { slide: slide.id(), fragments, activated });
        self.broadcast_state();
        if activated && self.at_end() {
            self.events.emit(DeckEvent::Finished);
        }
    }

    /// Moves to the following slide. On the last slide, reveals all of it.
    pub fn next_slide(&mut self) {
        let len = self.slides.len();
        match self.current_index() {
            Some(position) if position + 1 < len => self.select(position + 1),
            Some(position) => {
                let revealed = self.slides[position].next_inactive_group().is_some();
                self.set_slide_visibility(position, true);
                if revealed {
                    self.events.emit(DeckEvent::Finished);
                }
            }
            None if len > 0 => self.select(0),
            None => {}
        }
    }

    /// Moves to the preceding slide. On the first slide, hides all of it.
    pub fn previous_slide(&mut self) {
        match self.current_index() {
            Some(0) => self.set_slide_visibility(0, false),
            Some(position) => self.select(position - 1),
            None => {}
        }
    }

    fn set_slide_visibility(&mut self, position: usize, activated: bool) {
        let slide = &mut self.slides[position];
        slide.set_fragment_visibility(activated);
        self.notes_panel.refresh(&self.slides[position]);
        self.broadcast_state();
    }

    /// First slide, with nothing revealed.
    pub fn go_to_start(&mut self) {
        if self.slides.is_empty() {
            return;
        }
        self.select(0);
        self.previous_slide();
    }

    /// Last slide, fully revealed.
    pub fn go_to_end(&mut self) {
        let Some(last) = self.slides.len().checked_sub(1) else {
            return;
        };
        self.select(last);
        self.next_slide();
    }

    /// Stepping back would do nothing.
    pub fn at_start(&self) -> bool {
        if self.current_index().is_some_and(|position| position > 0) {
            return false;
        }
        self.slides.first().map_or(true, |slide| slide.last_activated_group().is_none())
    }

    /// Stepping forward would do nothing.
    pub fn at_end(&self) -> bool {
        let len = self.slides.len();
        match self.current_index() {
            Some(position) if position + 1 < len => return false,
            None if len > 0 => return false,
            _ => {}
        }
        self.slides.last().map_or(true, |slide| slide.next_inactive_group().is_none())
    }

    // ── Clock ───────────────────────────────────────────────────

    /// Elapsed milliseconds, including the running stretch.
    pub fn clock(&self) -> i64 {
        let live = self.clock_start.map_or(0, |start| self.time.now_millis().saturating_sub(start));
        self.clock_elapsed.saturating_add(live)
    }

    pub fn clock_reading(&self) -> ClockReading {
        ClockReading::from_millis(self.clock())
    }

    pub fn clock_elapsed(&self) -> i64 {
        self.clock_elapsed
    }

    pub fn clock_start(&self) -> Option<i64> {
        self.clock_start
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock_start.is_some()
    }

    /// No-op while already running.
    pub fn start_clock(&mut self) {
        if self.is_clock_running() {
            return;
        }
        let timestamp = self.time.now_millis();
        self.clock_start = Some(timestamp);
        debug!("Deck {} clock started at {} ({} ms elapsed)", self.id, timestamp, self.clock_elapsed);
        self.events.emit(DeckEvent::ClockStarted { timestamp, elapsed: self.clock_elapsed });
        self.broadcast_state();
    }

    pub fn stop_clock(&mut self) {
        if let Some(start) = self.clock_start.take() {
            let live = self.time.now_millis().saturating_sub(start);
            self.clock_elapsed = self.clock_elapsed.saturating_add(live);
        }
        debug!("Deck {} clock stopped at {} ms", self.id, self.clock_elapsed);
        self.events.emit(DeckEvent::ClockStopped { elapsed: self.clock_elapsed });
        self.broadcast_state();
    }

    pub fn toggle_clock(&mut self) {
        if self.is_clock_running() {
            self.stop_clock();
        } else {
            self.start_clock();
        }
    }

    /// Overwrites the accumulated time. A running clock keeps running from
    /// the new value.
    pub fn set_clock(&mut self, elapsed: i64) {
        self.clock_elapsed = elapsed;
        if self.is_clock_running() {
            self.clock_start = Some(self.time.now_millis());
        }
        debug!("Deck {} clock set to {} ms", self.id, elapsed);
        self.events.emit(DeckEvent::ClockSet { elapsed });
        self.broadcast_state();
    }

    // ── Snapshot ────────────────────────────────────────────────

    pub fn state(&self) -> DeckState {
        DeckState {
            current_index: self.current_index().map_or(-1, |position| position as i64),
            current_slide_fragment_activation: self.current_slide().map(Slide::activation).unwrap_or_default(),
            clock_elapsed: self.clock_elapsed,
            clock_start: self.clock_start,
        }
    }

    /// Applies a snapshot: slide first, then clock, then the current slide's
    /// activation. Publishes the resulting state once.
    pub fn set_state(&mut self, state: &DeckState) -> Result<(), DeckError> {
        let was_muted = self.muted;
        self.muted(|deck| deck.apply_state(state))?;
        if !was_muted {
            self.broadcast_state();
        }
        Ok(())
    }

    fn apply_state(&mut self, state: &DeckState) -> Result<(), DeckError> {
        if state.current_index >= 0 || !self.slides.is_empty() {
            self.set_current_index(state.current_index)?;
        }
        self.clock_elapsed = state.clock_elapsed;
        self.clock_start = state.clock_start;
        if let Some(position) = self.current_index() {
            let slide = &mut self.slides[position];
            slide.apply_activation(&state.current_slide_fragment_activation);
            self.notes_panel.replace(&self.slides[position]);
        }
        Ok(())
    }

    // ── Sync ────────────────────────────────────────────────────

    /// Replaces the outbound channel, returning the old one.
    pub fn set_publisher(&mut self, publisher: Box<dyn StatePublisher>) -> Option<Box<dyn StatePublisher>> {
        self.publisher.replace(publisher)
    }

    pub fn clear_publisher(&mut self) -> Option<Box<dyn StatePublisher>> {
        self.publisher.take()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Runs `f` with publishing suppressed, then restores the previous flag.
    pub fn muted<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.muted, true);
        let result = f(self);
        self.muted = previous;
        result
    }

    pub fn broadcast_state(&self) {
        if self.muted {
            trace!("Deck {} muted, not publishing", self.id);
            return;
        }
        if let Some(publisher) = &self.publisher {
            let state = self.state();
            debug!("Deck {} publishing state (slide {})", self.id, state.current_index);
            publisher.publish(ChannelMessage::State(state));
        }
    }

    /// Asks every other context for its state. Not affected by muting.
    pub fn request_state(&self) {
        if let Some(publisher) = &self.publisher {
            info!("Deck {} requesting state", self.id);
            publisher.publish(ChannelMessage::RequestState);
        }
    }

    /// Handles an inbound channel message.
    pub fn receive(&mut self, message: ChannelMessage) -> Result<(), DeckError> {
        match message {
            ChannelMessage::RequestState => {
                self.broadcast_state();
                Ok(())
            }
            ChannelMessage::State(state) => self.muted(|deck| deck.set_state(&state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{channel, Receiver};

    use super::*;
    use crate::clock::ManualTime;
    use crate::fragment::Fragment;
    use crate::notes::Note;

    fn slide_with(title: &str, fragments: usize) -> Slide {
        (0..fragments).fold(Slide::new(title), |slide, n| {
            slide.with_fragment(Fragment::new(format!("{title}-{n}")))
        })
    }

    fn deck(counts: &[usize]) -> Deck {
        Deck::builder()
            .slides(counts.iter().enumerate().map(|(n, &count)| slide_with(&format!("s{n}"), count)))
            .time_source(ManualTime::new(0))
            .build()
    }

    fn recording(deck: &mut Deck) -> Receiver<ChannelMessage> {
        let (tx, rx) = channel();
        deck.set_publisher(Box::new(tx));
        rx
    }

    fn drain<T>(rx: &Receiver<T>) -> Vec<T> {
        rx.try_iter().collect()
    }

    fn activation(deck: &Deck, position: usize) -> Vec<bool> {
        deck.slides()[position].activation()
    }

    #[test]
    fn test_build_selects_first_slide() {
        let deck = deck(&[2, 1]);
        assert_eq!(deck.current_index(), Some(0));
        assert!(deck.slides()[0].is_active());
        assert!(!deck.slides()[1].is_active());
        assert_eq!(deck.state().current_index, 0);
        assert!(deck.at_start());
        assert!(!deck.at_end());
    }

    #[test]
    fn test_empty_deck() {
        let mut deck = deck(&[]);
        assert_eq!(deck.current_index(), None);
        assert!(deck.at_start());
        assert!(deck.at_end());
        assert_eq!(deck.state().current_index, -1);
        deck.next();
        deck.previous();
        deck.go_to_end();
        assert_eq!(deck.current_index(), None);
    }

    #[test]
    fn test_next_steps_fragments_then_slides() {
        let mut deck = deck(&[2, 1]);
        deck.next();
        assert_eq!(activation(&deck, 0), vec![true, false]);
        deck.next();
        assert_eq!(activation(&deck, 0), vec![true, true]);
        assert_eq!(deck.current_index(), Some(0));

        deck.next();
        assert_eq!(deck.current_index(), Some(1));
        assert_eq!(activation(&deck, 1), vec![false]);
        assert!(deck.slides()[0].is_previous());

        deck.next();
        assert_eq!(activation(&deck, 1), vec![true]);
        assert!(deck.at_end());
    }

    #[test]
    fn test_previous_walks_back_to_start() {
        let mut deck = deck(&[2, 1]);
        for _ in 0..4 {
            deck.next();
        }
        deck.previous();
        assert_eq!(activation(&deck, 1), vec![false]);
        deck.previous();
        assert_eq!(deck.current_index(), Some(0));
        assert_eq!(activation(&deck, 0), vec![true, true]);
        deck.previous();
        deck.previous();
        assert_eq!(activation(&deck, 0), vec![false, false]);
        assert!(deck.at_start());

        let before = deck.state();
        deck.previous();
        assert_eq!(deck.state(), before);
    }

    #[test]
    fn test_next_at_end_is_idempotent() {
        let mut deck = deck(&[1, 2]);
        for _ in 0..4 {
            deck.next();
        }
        assert!(deck.at_end());

        let events = deck.subscribe();
        let published = recording(&mut deck);
        let before = deck.state();
        deck.next();
        assert_eq!(deck.state(), before);
        assert!(drain(&events).is_empty());
        assert!(drain(&published).is_empty());
    }

    #[test]
    fn test_finished_fires_once() {
        let mut deck = deck(&[1, 1]);
        let events = deck.subscribe();
        for _ in 0..6 {
            deck.next();
        }
        let finished = drain(&events).into_iter().filter(|event| *event == DeckEvent::Finished).count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_finished_on_selecting_empty_last_slide() {
        let mut deck = deck(&[0, 0]);
        let events = deck.subscribe();
        deck.next();
        let received = drain(&events);
        assert!(matches!(received[0], DeckEvent::SlideChanged { index: 1, .. }));
        assert_eq!(received[1], DeckEvent::Finished);
    }

    #[test]
    fn test_skip_bulk_visibility() {
        let mut deck = deck(&[3, 2, 2]);
        deck.next();
        deck.next();
        assert_eq!(activation(&deck, 0), vec![true, true, false]);

        deck.set_current_index(2).unwrap();
        assert_eq!(activation(&deck, 0), vec![true, true, true]);
        assert_eq!(activation(&deck, 1), vec![true, true]);
        assert_eq!(activation(&deck, 2), vec![false, false]);
        assert!(deck.slides()[0].is_previous());
        assert!(deck.slides()[1].is_previous());
        assert_eq!(deck.current_index(), Some(2));
    }

    #[test]
    fn test_backward_jump_hides_later_slides() {
        let mut deck = deck(&[1, 2, 2]);
        deck.set_current_index(2).unwrap();
        deck.next();
        deck.set_current_index(0).unwrap();
        assert_eq!(activation(&deck, 1), vec![false, false]);
        assert_eq!(activation(&deck, 2), vec![false, false]);
        assert!(!deck.slides()[1].is_previous());
        assert!(!deck.slides()[2].is_previous());
    }

    #[test]
    fn test_invalid_selection_is_rejected() {
        let mut deck = deck(&[1, 1, 1]);
        assert_eq!(
            deck.set_current_index(5),
            Err(DeckError::IndexOutOfRange { index: 5, len: 3 })
        );
        assert_eq!(
            deck.set_current_index(-1),
            Err(DeckError::IndexOutOfRange { index: -1, len: 3 })
        );
        let stranger = Uuid::new_v4();
        assert_eq!(deck.set_current_slide(stranger), Err(DeckError::SlideNotFound(stranger)));
        assert_eq!(deck.current_index(), Some(0));
    }

    #[test]
    fn test_reselecting_current_slide_is_noop() {
        let mut deck = deck(&[1, 1]);
        let events = deck.subscribe();
        let current = deck.slides()[0].id();
        deck.set_current_slide(current).unwrap();
        assert!(drain(&events).is_empty());
    }

    #[test]
    fn test_slide_changed_reports_previous() {
        let mut deck = deck(&[1, 1, 1]);
        let events = deck.subscribe();
        let ids: Vec<Uuid> = deck.slides().iter().map(Slide::id).collect();
        deck.set_current_index(2).unwrap();
        assert_eq!(
            events.try_recv(),
            Ok(DeckEvent::SlideChanged { slide: ids[2], index: 2, previous: Some(ids[0]) })
        );
    }

    #[test]
    fn test_fragment_toggle_event() {
        let mut deck = Deck::builder()
            .slide(
                Slide::new("grouped")
                    .with_fragment(Fragment::new("a").with_group("g"))
                    .with_fragment(Fragment::new("b"))
                    .with_fragment(Fragment::new("c").with_group("g")),
            )
            .build();
        let events = deck.subscribe();
        deck.next();

        let slide = &deck.slides()[0];
        let expected = vec![slide.fragments()[0].id, slide.fragments()[2].id];
        assert_eq!(
            events.try_recv(),
            Ok(DeckEvent::FragmentToggled { slide: slide.id(), fragments: expected, activated: true })
        );
    }

    #[test]
    fn test_clock_arithmetic() {
        let time = ManualTime::new(1000);
        let mut deck = Deck::builder().slide(slide_with("s", 0)).time_source(time.clone()).build();
        let events = deck.subscribe();

        deck.start_clock();
        time.set(4500);
        assert_eq!(deck.clock(), 3500);
        deck.stop_clock();
        assert_eq!(deck.clock_elapsed(), 3500);
        assert_eq!(deck.clock(), 3500);
        assert!(!deck.is_clock_running());

        assert_eq!(
            drain(&events),
            vec![
                DeckEvent::ClockStarted { timestamp: 1000, elapsed: 0 },
                DeckEvent::ClockStopped { elapsed: 3500 },
            ]
        );
    }

    #[test]
    fn test_set_clock_rebases_running_clock() {
        let time = ManualTime::new(0);
        let mut deck = Deck::builder().time_source(time.clone()).build();
        deck.start_clock();
        time.advance(5000);
        deck.set_clock(1000);
        assert_eq!(deck.clock(), 1000);
        time.advance(500);
        assert_eq!(deck.clock(), 1500);
        assert_eq!(deck.clock_reading().to_string(), "00:00:01");
    }

    #[test]
    fn test_extreme_remote_clock_saturates() {
        let time = ManualTime::new(10);
        let mut deck = Deck::builder().slide(Slide::new("only")).time_source(time).build();
        let state = DeckState {
            current_index: 0,
            current_slide_fragment_activation: Vec::new(),
            clock_elapsed: i64::MAX,
            clock_start: Some(0),
        };
        deck.set_state(&state).unwrap();
        assert_eq!(deck.clock(), i64::MAX);
        deck.stop_clock();
        assert_eq!(deck.clock_elapsed(), i64::MAX);

        let state = DeckState { clock_elapsed: 0, clock_start: Some(i64::MIN), ..state };
        deck.set_state(&state).unwrap();
        assert_eq!(deck.clock(), i64::MAX);
    }

    #[test]
    fn test_start_clock_twice_keeps_start() {
        let time = ManualTime::new(100);
        let mut deck = Deck::builder().time_source(time.clone()).build();
        deck.start_clock();
        time.set(900);
        deck.start_clock();
        assert_eq!(deck.clock_start(), Some(100));
    }

    #[test]
    fn test_stop_clock_when_stopped_still_notifies() {
        let mut deck = deck(&[1]);
        let events = deck.subscribe();
        let published = recording(&mut deck);
        deck.stop_clock();
        assert_eq!(drain(&events), vec![DeckEvent::ClockStopped { elapsed: 0 }]);
        assert_eq!(drain(&published).len(), 1);
    }

    #[test]
    fn test_state_roundtrip_is_noop() {
        let time = ManualTime::new(10_000);
        let mut deck = Deck::builder()
            .slides([slide_with("a", 2), slide_with("b", 3)])
            .time_source(time.clone())
            .build();
        for _ in 0..4 {
            deck.next();
        }
        deck.start_clock();
        time.advance(2500);

        let state = deck.state();
        deck.set_state(&state).unwrap();
        assert_eq!(deck.state(), state);
        assert_eq!(deck.clock(), 2500);
    }

    #[test]
    fn test_set_state_applies_everything() {
        let mut deck = deck(&[1, 3, 1]);
        let events = deck.subscribe();
        let state = DeckState {
            current_index: 1,
            current_slide_fragment_activation: vec![true, false, true],
            clock_elapsed: 4200,
            clock_start: None,
        };
        deck.set_state(&state).unwrap();

        assert_eq!(deck.state(), state);
        assert_eq!(activation(&deck, 0), vec![true]);
        assert_eq!(deck.clock(), 4200);
        // Positional restore never fires toggle notifications.
        assert!(drain(&events)
            .iter()
            .all(|event| !matches!(event, DeckEvent::FragmentToggled { .. })));
    }

    #[test]
    fn test_set_state_pads_short_activation() {
        let mut deck = deck(&[3]);
        deck.set_state(&DeckState {
            current_index: 0,
            current_slide_fragment_activation: vec![true],
            clock_elapsed: 0,
            clock_start: None,
        })
        .unwrap();
        assert_eq!(activation(&deck, 0), vec![true, false, false]);
    }

    #[test]
    fn test_set_state_out_of_range() {
        let mut deck = deck(&[1]);
        let state = DeckState { current_index: 3, ..DeckState::default() };
        assert!(matches!(deck.set_state(&state), Err(DeckError::IndexOutOfRange { index: 3, len: 1 })));
        assert!(!deck.is_muted());
    }

    #[test]
    fn test_set_state_publishes_once() {
        let mut deck = deck(&[2, 2, 2]);
        let published = recording(&mut deck);
        deck.set_state(&DeckState {
            current_index: 2,
            current_slide_fragment_activation: vec![true, false],
            clock_elapsed: 10,
            clock_start: None,
        })
        .unwrap();
        assert_eq!(drain(&published), vec![ChannelMessage::State(deck.state())]);
    }

    #[test]
    fn test_received_state_is_not_echoed() {
        let mut audience = deck(&[2, 2]);
        let mut speaker = deck(&[2, 2]);
        for _ in 0..3 {
            audience.next();
        }

        let echoes = recording(&mut speaker);
        speaker.receive(ChannelMessage::State(audience.state())).unwrap();
        assert!(drain(&echoes).is_empty());
        assert_eq!(speaker.state(), audience.state());
        assert!(!speaker.is_muted());
    }

    #[test]
    fn test_state_request_republishes() {
        let mut deck = deck(&[1, 1]);
        let published = recording(&mut deck);
        deck.receive(ChannelMessage::RequestState).unwrap();
        assert_eq!(drain(&published), vec![ChannelMessage::State(deck.state())]);
    }

    #[test]
    fn test_request_state_ignores_mute() {
        let mut deck = deck(&[1]);
        let published = recording(&mut deck);
        deck.muted(|deck| {
            deck.broadcast_state();
            deck.request_state();
        });
        assert_eq!(drain(&published), vec![ChannelMessage::RequestState]);
    }

    #[test]
    fn test_muted_scope_restores_previous_flag() {
        let mut deck = deck(&[1]);
        deck.muted(|deck| {
            deck.muted(|deck| assert!(deck.is_muted()));
            assert!(deck.is_muted());
        });
        assert!(!deck.is_muted());
    }

    #[test]
    fn test_every_step_publishes() {
        let mut deck = deck(&[1, 1]);
        let published = recording(&mut deck);
        deck.next();
        deck.next();
        let states: Vec<i64> = drain(&published)
            .into_iter()
            .filter_map(|message| match message {
                ChannelMessage::State(state) => Some(state.current_index),
                ChannelMessage::RequestState => None,
            })
            .collect();
        assert_eq!(states, vec![0, 1]);
    }

    #[test]
    fn test_next_slide_on_last_reveals_everything() {
        let mut deck = deck(&[1, 3]);
        deck.next_slide();
        assert_eq!(deck.current_index(), Some(1));
        assert_eq!(activation(&deck, 1), vec![false, false, false]);

        let events = deck.subscribe();
        deck.next_slide();
        assert_eq!(activation(&deck, 1), vec![true, true, true]);
        assert!(deck.at_end());
        assert_eq!(drain(&events), vec![DeckEvent::Finished]);
    }

    #[test]
    fn test_finished_once_when_jumping_to_end() {
        let mut empty_last = deck(&[1, 0]);
        let events = empty_last.subscribe();
        let finished = |events: &Receiver<DeckEvent>| {
            drain(events).into_iter().filter(|event| *event == DeckEvent::Finished).count()
        };

        empty_last.go_to_end();
        assert_eq!(finished(&events), 1);
        empty_last.next_slide();
        empty_last.go_to_end();
        assert_eq!(finished(&events), 0);

        let mut hidden_last = deck(&[1, 2]);
        let events = hidden_last.subscribe();
        hidden_last.go_to_end();
        assert_eq!(finished(&events), 1);
        hidden_last.next_slide();
        assert_eq!(finished(&events), 0);
    }

    #[test]
    fn test_previous_slide_on_first_hides_everything() {
        let mut deck = deck(&[3, 1]);
        deck.next();
        deck.next();
        deck.previous_slide();
        assert_eq!(activation(&deck, 0), vec![false, false, false]);
        assert!(deck.at_start());

        deck.set_current_index(1).unwrap();
        deck.previous_slide();
        assert_eq!(deck.current_index(), Some(0));
    }

    #[test]
    fn test_go_to_start_and_end() {
        let mut deck = deck(&[2, 1, 2]);
        deck.go_to_end();
        assert_eq!(deck.current_index(), Some(2));
        assert_eq!(activation(&deck, 2), vec![true, true]);
        assert!(deck.at_end());

        deck.go_to_start();
        assert_eq!(deck.current_index(), Some(0));
        assert_eq!(activation(&deck, 0), vec![false, false]);
        assert!(deck.at_start());
    }

    #[test]
    fn test_key_handling() {
        let time = ManualTime::new(0);
        let mut deck = Deck::builder()
            .slides([slide_with("a", 1), slide_with("b", 1)])
            .time_source(time.clone())
            .build();
        let key = |raw: &str| KeyStroke::parse(raw).unwrap();

        assert!(deck.handle_key(&key("right")));
        assert_eq!(activation(&deck, 0), vec![true]);
        assert!(deck.handle_key(&key("PageDown")));
        assert_eq!(deck.current_index(), Some(1));
        assert!(!deck.handle_key(&key("x")));

        assert!(deck.handle_key(&key("alt+m")));
        assert_eq!(deck.mode(), DeckMode::Speaker);
        assert!(deck.handle_key(&key("alt+shift+M")));
        assert_eq!(deck.mode(), DeckMode::Presentation);

        assert!(deck.handle_key(&key("p")));
        assert!(deck.is_clock_running());
        time.advance(3000);
        assert!(deck.handle_key(&key("alt+0")));
        assert_eq!(deck.clock(), 0);
        assert!(deck.handle_key(&key("P")));
        assert!(!deck.is_clock_running());
    }

    #[test]
    fn test_mode_normalizes_unknown() {
        assert_eq!(DeckMode::parse("Speaker"), DeckMode::Speaker);
        assert_eq!(DeckMode::parse("grid"), DeckMode::Presentation);
        assert_eq!(DeckMode::Presentation.cycle(false), DeckMode::Speaker);
        let mode: DeckMode = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(mode, DeckMode::Presentation);
    }

    #[test]
    fn test_mode_change_event() {
        let mut deck = deck(&[1]);
        let events = deck.subscribe();
        deck.set_mode(DeckMode::Speaker);
        deck.set_mode(DeckMode::Speaker);
        assert_eq!(drain(&events), vec![DeckEvent::ModeChanged { mode: DeckMode::Speaker }]);
    }

    #[test]
    fn test_insert_slide_before_current() {
        let mut deck = deck(&[1, 1]);
        deck.set_current_index(1).unwrap();
        deck.insert_slide(0, slide_with("new", 2));
        assert_eq!(deck.current_index(), Some(2));
        assert_eq!(activation(&deck, 0), vec![true, true]);
        assert!(deck.slides()[0].is_previous());

        deck.push_slide(slide_with("tail", 1));
        assert_eq!(activation(&deck, 3), vec![false]);
        assert!(!deck.slides()[3].is_active());
    }

    #[test]
    fn test_insert_into_empty_deck_selects() {
        let mut deck = deck(&[]);
        let id = deck.push_slide(slide_with("only", 1));
        assert_eq!(deck.current_slide().map(Slide::id), Some(id));
    }

    #[test]
    fn test_remove_active_slide_selects_same_position() {
        let mut deck = deck(&[1, 1, 1]);
        deck.set_current_index(1).unwrap();
        let removed_id = deck.slides()[1].id();
        let events = deck.subscribe();

        let removed = deck.remove_slide(removed_id).unwrap();
        assert!(!removed.is_active());
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.current_index(), Some(1));
        assert!(matches!(
            events.try_recv(),
            Ok(DeckEvent::SlideChanged { index: 1, previous: Some(id), .. }) if id == removed_id
        ));

        let last = deck.slides()[1].id();
        deck.remove_slide(last).unwrap();
        assert_eq!(deck.current_index(), Some(0));
    }

    #[test]
    fn test_remove_only_slide_clears_notes() {
        let slide = Slide::new("only").with_note(Note::new("hello"));
        let id = slide.id();
        let mut deck = Deck::builder().slide(slide).build();
        assert_eq!(deck.notes_panel().len(), 1);
        deck.remove_slide(id).unwrap();
        assert!(deck.notes_panel().is_empty());
        assert_eq!(deck.current_index(), None);
    }

    #[test]
    fn test_notes_panel_follows_steps() {
        let fragment = Fragment::new("point");
        let fragment_id = fragment.id;
        let mut deck = Deck::builder()
            .slide(
                Slide::new("with notes")
                    .with_fragment(fragment)
                    .with_note(Note::for_fragment("explain point", fragment_id))
                    .with_note(Note::new("welcome")),
            )
            .slide(Slide::new("bare"))
            .build();

        let visible: Vec<&str> = deck.notes_panel().visible().collect();
        assert_eq!(visible, vec!["welcome"]);
        deck.next();
        let visible: Vec<&str> = deck.notes_panel().visible().collect();
        assert_eq!(visible, vec!["welcome", "explain point"]);
        deck.next();
        assert!(deck.notes_panel().is_empty());
    }

    #[test]
    fn test_slide_mut_rederives_state() {
        let mut deck = deck(&[1]);
        deck.next();
        assert!(deck.at_end());

        let id = deck.slides()[0].id();
        deck.slide_mut(id, |slide| slide.push_fragment(Fragment::new("late"))).unwrap();
        assert!(!deck.at_end());
        deck.next();
        assert_eq!(activation(&deck, 0), vec![true, true]);
    }

    #[test]
    fn test_deck_id_is_content_derived() {
        let a = deck(&[2, 1]);
        let b = deck(&[2, 1]);
        let c = deck(&[2, 2]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());

        let fixed = Uuid::new_v4();
        let d = Deck::builder().deck_id(fixed).slide(slide_with("s", 1)).build();
        assert_eq!(d.id(), fixed);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DeckConfig = serde_json::from_str(r#"{ "mode": "speaker" }"#).unwrap();
        assert_eq!(config.mode, DeckMode::Speaker);
        assert_eq!(config.key_bindings, KeyBindings::default());
        assert_eq!(config.deck_id, None);
    }
}
