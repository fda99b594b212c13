//! Text rendering of a deck, plus the built-in demo talk.

use std::fmt::Write as _;

use pslides_core::{Deck, DeckMode, DeckSource, FragmentSource, NoteSource, SlideSource};

/// One screenful for `deck`. Speaker mode also lists the notes panel.
pub fn render(deck: &Deck) -> String {
    let mut out = String::new();
    let clock = deck.clock_reading();
    let running = if deck.is_clock_running() { " ▶" } else { "" };

    let Some(slide) = deck.current_slide() else {
        let _ = writeln!(out, "[{}] (no slides)  {clock}{running}", deck.mode());
        return out;
    };
    let position = deck.current_index().map_or(0, |index| index + 1);
    let _ = writeln!(
        out,
        "[{}] {}/{} {}  {clock}{running}",
        deck.mode(),
        position,
        deck.len(),
        slide.title()
    );

    for fragment in slide.fragments() {
        let shown = if fragment.is_visible() { '●' } else { '○' };
        let marker = if fragment.is_current() { "  «" } else { "" };
        let _ = writeln!(out, "  {shown} {}{marker}", fragment.label);
    }

    if deck.mode() == DeckMode::Speaker && !deck.notes_panel().is_empty() {
        let _ = writeln!(out, "  notes:");
        for note in deck.notes_panel().entries() {
            let bullet = if note.visible { '-' } else { '·' };
            let _ = writeln!(out, "    {bullet} {}", note.text);
        }
    }
    if deck.at_end() {
        let _ = writeln!(out, "  (end)");
    }
    out
}

fn fragment(label: &str, index: Option<&str>) -> FragmentSource {
    FragmentSource {
        label: label.to_string(),
        index: index.map(str::to_string),
        ..FragmentSource::default()
    }
}

fn note(text: &str) -> NoteSource {
    NoteSource { text: text.to_string(), group: None }
}

/// Used when no deck file is given.
pub fn demo_source() -> DeckSource {
    DeckSource {
        slides: vec![
            SlideSource {
                title: "Progressive reveal".to_string(),
                fragments: vec![fragment("What", None), fragment("How", None), fragment("Why", None)],
                notes: vec![note("Step with the arrow keys")],
            },
            SlideSource {
                title: "Ordering".to_string(),
                fragments: vec![
                    fragment("shown last", Some("2")),
                    fragment("shown first", Some("0")),
                    fragment("together", Some("1:pair")),
                    FragmentSource { group: Some("pair".to_string()), ..fragment("with this", None) },
                ],
                notes: vec![
                    note("Indexes order the steps"),
                    NoteSource { text: "Groups reveal at once".to_string(), group: Some("pair".to_string()) },
                ],
            },
            SlideSource {
                title: "Spoilers".to_string(),
                fragments: vec![FragmentSource { initially_visible: true, ..fragment("hidden on step", None) }],
                notes: Vec::new(),
            },
            SlideSource {
                title: "Thanks".to_string(),
                ..SlideSource::default()
            },
        ],
        ..DeckSource::default()
    }
}
