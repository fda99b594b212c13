//! JSON deck sources.
//!
//! A deck file is the declarative markup of a presentation:
//!
//! ```json
//! {
//!   "config": { "mode": "presentation" },
//!   "slides": [
//!     {
//!       "title": "Intro",
//!       "fragments": [
//!         { "label": "first", "index": 1 },
//!         { "label": "second", "index": "0:pair", "notes": ["say this"] },
//!         { "label": "third", "group": "pair", "initiallyVisible": true }
//!       ],
//!       "notes": [{ "text": "welcome" }, { "text": "about the pair", "group": "pair" }]
//!     }
//!   ]
//! }
//! ```
//!
//! Index values are read leniently: numbers, numeric strings and
//! `"<index>:<group>"` strings are accepted, anything else leaves the
//! fragment unindexed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::deck::{Deck, DeckBuilder, DeckConfig};
use crate::fragment::Fragment;
use crate::notes::Note;
use crate::slide::Slide;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read deck source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid deck source: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckSource {
    pub config: DeckConfig,
    pub slides: Vec<SlideSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideSource {
    pub title: String,
    pub fragments: Vec<FragmentSource>,
    pub notes: Vec<NoteSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FragmentSource {
    pub label: String,
    /// Raw index attribute.
    #[serde(deserialize_with = "lenient_index", skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub initially_visible: bool,
    /// Notes written inside the fragment.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSource {
    pub text: String,
    /// Fragment group this note belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(raw) => Some(raw),
        _ => None,
    })
}

impl DeckSource {
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        log::debug!("Loading deck source from {}", path.display());
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, SourceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A builder primed with these slides and config.
    pub fn into_builder(self) -> DeckBuilder {
        Deck::builder()
            .config(self.config)
            .slides(self.slides.into_iter().map(SlideSource::into_slide))
    }

    pub fn build(self) -> Deck {
        self.into_builder().build()
    }
}

impl SlideSource {
    pub fn into_slide(self) -> Slide {
        let mut slide = Slide::new(self.title);
        let mut inner_notes = Vec::new();

        for source in self.fragments {
            let mut fragment = Fragment::new(source.label);
            if let Some(group) = source.group {
                fragment = fragment.with_group(group);
            }
            if let Some(index) = source.index {
                fragment = fragment.with_index_attr(&index);
            }
            if source.initially_visible {
                fragment = fragment.initially_visible();
            }
            let id = slide.push_fragment(fragment);
            inner_notes.extend(source.notes.into_iter().map(|text| Note::for_fragment(text, id)));
        }

        for note in self.notes {
            slide.push_note(match note.group {
                Some(group) => Note::for_group(note.text, group),
                None => Note::new(note.text),
            });
        }
        for note in inner_notes {
            slide.push_note(note);
        }
        slide
    }
}
