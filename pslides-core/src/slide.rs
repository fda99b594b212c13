//! A single slide: its fragments, notes and reveal stepping.

use std::cell::OnceCell;

use log::{debug, trace};
use uuid::Uuid;

use crate::deck::DeckError;
use crate::fragment::Fragment;
use crate::notes::{anchor_position, note_order, Note};
use crate::sequence::{sequence, FragmentIndex, FragmentSequence};

/// Result of one reveal step on a slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideStep {
    /// A whole group flipped to `activated`.
    Toggled { fragments: Vec<Uuid>, activated: bool },
    /// Nothing left to do in that direction.
    Exhausted,
}

impl SlideStep {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// A slide owns its fragments in document order.
///
/// The reveal sequence and the note order are derived lazily and dropped on
/// any structural change. `is_active` / `is_previous` are only ever written by
/// the owning [`Deck`](crate::Deck).
#[derive(Debug, Clone)]
pub struct Slide {
    id: Uuid,
    title: String,
    fragments: Vec<Fragment>,
    notes: Vec<Note>,
    is_active: bool,
    is_previous: bool,
    sequence: OnceCell<FragmentSequence>,
    note_order: OnceCell<Vec<usize>>,
}

fn sequence_in<'a>(cell: &'a OnceCell<FragmentSequence>, fragments: &[Fragment]) -> &'a FragmentSequence {
    cell.get_or_init(|| {
        trace!("sequencing {} fragment(s)", fragments.len());
        sequence(fragments)
    })
}

impl Slide {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            fragments: Vec::new(),
            notes: Vec::new(),
            is_active: false,
            is_previous: false,
            sequence: OnceCell::new(),
            note_order: OnceCell::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.push_fragment(fragment);
        self
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.push_note(note);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Set on slides positioned before the current one. The current slide
    /// keeps the flag when it was reached by going backwards.
    pub fn is_previous(&self) -> bool {
        self.is_previous
    }

    pub(crate) fn set_active(&mut self, is_active: bool) {
        self.is_active = is_active;
    }

    pub(crate) fn set_previous(&mut self, is_previous: bool) {
        self.is_previous = is_previous;
    }

    // ── Fragments ───────────────────────────────────────────────

    /// Fragments as they appear in markup.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment(&self, id: Uuid) -> Option<&Fragment> {
        self.fragments.iter().find(|fragment| fragment.id == id)
    }

    fn fragment_position(&self, id: Uuid) -> Result<usize, DeckError> {
        self.fragments
            .iter()
            .position(|fragment| fragment.id == id)
            .ok_or(DeckError::FragmentNotFound(id))
    }

    pub fn push_fragment(&mut self, fragment: Fragment) -> Uuid {
        let id = fragment.id;
        self.fragments.push(fragment);
        self.invalidate();
        id
    }

    /// Insert at a document position (clamped to the end).
    pub fn insert_fragment(&mut self, position: usize, fragment: Fragment) -> Uuid {
        let id = fragment.id;
        let position = position.min(self.fragments.len());
        self.fragments.insert(position, fragment);
        self.invalidate();
        id
    }

    pub fn remove_fragment(&mut self, id: Uuid) -> Option<Fragment> {
        let position = self.fragment_position(id).ok()?;
        let removed = self.fragments.remove(position);
        self.invalidate();
        Some(removed)
    }

    pub fn set_fragment_index(&mut self, id: Uuid, index: Option<FragmentIndex>) -> Result<(), DeckError> {
        let position = self.fragment_position(id)?;
        self.fragments[position].set_index(index);
        self.invalidate();
        Ok(())
    }

    pub fn set_fragment_group(&mut self, id: Uuid, group: Option<String>) -> Result<(), DeckError> {
        let position = self.fragment_position(id)?;
        self.fragments[position].set_group(group);
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.sequence.take();
        self.note_order.take();
    }

    /// Fragments grouped in reveal order, as positions into [`Self::fragments`].
    pub fn fragment_sequence(&self) -> &FragmentSequence {
        sequence_in(&self.sequence, &self.fragments)
    }

    fn is_group_activated(&self, group: &[usize]) -> bool {
        group.iter().all(|&position| self.fragments[position].is_activated())
    }

    /// The group the next forward step would activate.
    pub fn next_inactive_group(&self) -> Option<&[usize]> {
        self.fragment_sequence().iter().find(|group| !self.is_group_activated(group))
    }

    /// The group the next backward step would deactivate.
    pub fn last_activated_group(&self) -> Option<&[usize]> {
        self.fragment_sequence().iter().rev().find(|group| self.is_group_activated(group))
    }

    /// Activation of every fragment, in markup order.
    pub fn activation(&self) -> Vec<bool> {
        self.fragments.iter().map(Fragment::is_activated).collect()
    }

    // ── Stepping ────────────────────────────────────────────────

    /// Activates the next group. `Exhausted` means the deck should move on.
    pub fn next(&mut self) -> SlideStep {
        let Some(group) = self.next_inactive_group().map(<[usize]>::to_vec) else {
            return SlideStep::Exhausted;
        };
        self.toggle_group(&group, true)
    }

    /// Deactivates the last activated group. `Exhausted` means the deck should
    /// move back.
    pub fn previous(&mut self) -> SlideStep {
        let Some(group) = self.last_activated_group().map(<[usize]>::to_vec) else {
            return SlideStep::Exhausted;
        };
        self.toggle_group(&group, false)
    }

    fn toggle_group(&mut self, group: &[usize], activated: bool) -> SlideStep {
        for &position in group {
            self.fragments[position].set_activated(activated);
        }
        self.refresh_markers();
        let fragments: Vec<Uuid> = group.iter().map(|&position| self.fragments[position].id).collect();
        debug!(
            "slide {}: {} fragment(s) {}",
            self.id,
            fragments.len(),
            if activated { "activated" } else { "deactivated" }
        );
        SlideStep::Toggled { fragments, activated }
    }

    /// Sets every fragment at once, bypassing the sequence.
    pub fn set_fragment_visibility(&mut self, activated: bool) {
        for fragment in &mut self.fragments {
            fragment.set_activated(activated);
        }
        self.refresh_markers();
    }

    /// Restores activation positionally. Missing entries count as inactive.
    pub fn apply_activation(&mut self, activation: &[bool]) {
        for (position, fragment) in self.fragments.iter_mut().enumerate() {
            fragment.set_activated(activation.get(position).copied().unwrap_or(false));
        }
        self.refresh_markers();
    }

    /// Recomputes the current/previous markers of every fragment.
    pub(crate) fn refresh_markers(&mut self) {
        let Self { sequence, fragments, .. } = self;
        let groups = sequence_in(&*sequence, fragments.as_slice()).groups();
        let activated: Vec<bool> = groups
            .iter()
            .map(|group| group.iter().all(|&position| fragments[position].is_activated()))
            .collect();

        for (n, group) in groups.iter().enumerate() {
            let is_current = activated[n] && !activated.get(n + 1).copied().unwrap_or(false);
            let last = group.len() - 1;
            for (k, &position) in group.iter().enumerate() {
                // Only the last fragment of the current group carries the marker.
                fragments[position].set_markers(is_current && k == last, activated[n] && !is_current);
            }
        }
    }

    /// The fragment currently marked as the latest revealed point.
    pub fn current_fragment(&self) -> Option<&Fragment> {
        self.fragments.iter().find(|fragment| fragment.is_current())
    }

    // ── Notes ───────────────────────────────────────────────────

    pub fn push_note(&mut self, note: Note) {
        self.notes.push(note);
        self.note_order.take();
    }

    /// Notes in the order they were written.
    pub fn raw_notes(&self) -> &[Note] {
        &self.notes
    }

    /// Notes in reveal order.
    pub fn notes(&self) -> Vec<&Note> {
        let order = self
            .note_order
            .get_or_init(|| note_order(&self.notes, &self.fragments, self.fragment_sequence()));
        order.iter().map(|&position| &self.notes[position]).collect()
    }

    pub fn note_is_visible(&self, note: &Note) -> bool {
        anchor_position(note, &self.fragments)
            .map_or(true, |position| self.fragments[position].is_activated())
    }
}
