//! Speaker notes: anchoring, ordering and the speaker panel.
//!
//! A note is tied to the fragment that encloses it, or to a fragment group by
//! id. Notes follow the reveal order of their fragments; notes without a
//! fragment are always visible and come first.

use uuid::Uuid;

use crate::fragment::Fragment;
use crate::sequence::FragmentSequence;
use crate::slide::Slide;

/// What a note is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NoteAnchor {
    #[default]
    Free,
    /// Note written inside a fragment.
    Fragment(Uuid),
    /// Note referencing a fragment group by id.
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub text: String,
    pub anchor: NoteAnchor,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), anchor: NoteAnchor::Free }
    }

    pub fn for_fragment(text: impl Into<String>, fragment: Uuid) -> Self {
        Self { text: text.into(), anchor: NoteAnchor::Fragment(fragment) }
    }

    pub fn for_group(text: impl Into<String>, group: impl Into<String>) -> Self {
        Self { text: text.into(), anchor: NoteAnchor::Group(group.into()) }
    }
}

/// Position of the fragment a note belongs to, if it resolves to one.
pub(crate) fn anchor_position(note: &Note, fragments: &[Fragment]) -> Option<usize> {
    match &note.anchor {
        NoteAnchor::Free => None,
        NoteAnchor::Fragment(id) => fragments.iter().position(|fragment| fragment.id == *id),
        NoteAnchor::Group(group) => {
            fragments.iter().position(|fragment| fragment.group() == Some(group.as_str()))
        }
    }
}

/// Note positions sorted by the sequence position of their fragment.
pub(crate) fn note_order(
    notes: &[Note],
    fragments: &[Fragment],
    sequence: &FragmentSequence,
) -> Vec<usize> {
    let mut order: Vec<(usize, i64)> = notes
        .iter()
        .enumerate()
        .map(|(position, note)| {
            let key = anchor_position(note, fragments)
                .and_then(|fragment| sequence.group_of(fragment))
                .map_or(-1, |group| group as i64);
            (position, key)
        })
        .collect();
    // Stable: equal keys keep document order.
    order.sort_by_key(|&(_, key)| key);
    order.into_iter().map(|(position, _)| position).collect()
}

/// One line in the speaker panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelNote {
    pub text: String,
    pub visible: bool,
}

/// The speaker-notes panel of a deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesPanel {
    entries: Vec<PanelNote>,
}

impl NotesPanel {
    /// Replace the panel content with the ordered notes of `slide`.
    pub fn replace(&mut self, slide: &Slide) {
        self.entries = slide
            .notes()
            .into_iter()
            .map(|note| PanelNote { text: note.text.clone(), visible: slide.note_is_visible(note) })
            .collect();
    }

    /// Re-check note visibility after fragments of `slide` were toggled.
    pub fn refresh(&mut self, slide: &Slide) {
        for (entry, note) in self.entries.iter_mut().zip(slide.notes()) {
            entry.visible = slide.note_is_visible(note);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[PanelNote] {
        &self.entries
    }

    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|entry| entry.visible).map(|entry| entry.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
