//! Key strokes, key matchers and the command table.
//!
//! Input collaborators translate raw key events into [`KeyStroke`]s and let
//! the deck resolve them through its [`KeyBindings`]. The first binding that
//! matches wins, so table order matters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed command vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCommand {
    Next,
    Previous,
    NextSlide,
    PreviousSlide,
    GoToStart,
    GoToEnd,
    ToggleClock,
    ResetClock,
    ToggleMode,
    PreviousMode,
}

impl KeyCommand {
    pub const ALL: [KeyCommand; 10] = [
        Self::Next,
        Self::Previous,
        Self::NextSlide,
        Self::PreviousSlide,
        Self::GoToStart,
        Self::GoToEnd,
        Self::ToggleClock,
        Self::ResetClock,
        Self::ToggleMode,
        Self::PreviousMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
            Self::NextSlide => "nextslide",
            Self::PreviousSlide => "previousslide",
            Self::GoToStart => "gotostart",
            Self::GoToEnd => "gotoend",
            Self::ToggleClock => "toggleclock",
            Self::ResetClock => "resetclock",
            Self::ToggleMode => "togglemode",
            Self::PreviousMode => "previousmode",
        }
    }
}

impl fmt::Display for KeyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|command| command.as_str() == wanted)
            .ok_or_else(|| format!("unknown command '{s}'"))
    }
}

/// A single key press with its modifier state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: String,
    pub alt: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl KeyStroke {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Parses `"alt+shift+M"`-style strings. Modifier names are case
    /// insensitive, the key itself is not (`p` and `P` are different keys).
    /// Returns `None` for an empty key.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        // A literal '+' key: "+" or "alt++".
        let (modifiers, key) = match raw.strip_suffix("++") {
            Some(rest) => (rest, "+"),
            None if raw == "+" => ("", "+"),
            None => match raw.rsplit_once('+') {
                Some((modifiers, key)) => (modifiers, key),
                None => ("", raw),
            },
        };

        let mut stroke = Self::new(normalize_key(key)?);
        for modifier in modifiers.split('+').filter(|m| !m.is_empty()) {
            match modifier.to_ascii_lowercase().as_str() {
                "alt" | "option" => stroke.alt = true,
                "shift" => stroke.shift = true,
                "ctrl" | "control" => stroke.ctrl = true,
                "meta" | "cmd" | "super" => stroke.meta = true,
                _ => return None,
            }
        }
        Some(stroke)
    }
}

fn normalize_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    if key.chars().count() == 1 {
        return Some(key.to_owned());
    }
    let named = match key.to_ascii_lowercase().as_str() {
        "right" | "arrowright" => "ArrowRight",
        "left" | "arrowleft" => "ArrowLeft",
        "up" | "arrowup" => "ArrowUp",
        "down" | "arrowdown" => "ArrowDown",
        "pageup" | "pgup" => "PageUp",
        "pagedown" | "pgdn" => "PageDown",
        "home" => "Home",
        "end" => "End",
        "space" => " ",
        "enter" | "return" => "Enter",
        "escape" | "esc" => "Escape",
        _ => return Some(key.to_owned()),
    };
    Some(named.to_owned())
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [(self.ctrl, "ctrl+"), (self.meta, "meta+"), (self.alt, "alt+"), (self.shift, "shift+")] {
            if on {
                f.write_str(name)?;
            }
        }
        f.write_str(&self.key)
    }
}

/// Partial key description. Unset fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<bool>,
}

impl KeyMatcher {
    pub fn key(key: impl Into<String>) -> Self {
        Self { key: Some(key.into()), ..Self::default() }
    }

    pub fn alt(mut self, alt: bool) -> Self {
        self.alt = Some(alt);
        self
    }

    pub fn shift(mut self, shift: bool) -> Self {
        self.shift = Some(shift);
        self
    }

    pub fn matches(&self, stroke: &KeyStroke) -> bool {
        fn field<T: PartialEq>(expected: &Option<T>, actual: &T) -> bool {
            expected.as_ref().map_or(true, |expected| expected == actual)
        }
        field(&self.key, &stroke.key)
            && field(&self.alt, &stroke.alt)
            && field(&self.shift, &stroke.shift)
            && field(&self.ctrl, &stroke.ctrl)
            && field(&self.meta, &stroke.meta)
    }
}

/// Ordered command → matchers table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    entries: Vec<(KeyCommand, Vec<KeyMatcher>)>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// First command with a matcher accepting `stroke`.
    pub fn command_for(&self, stroke: &KeyStroke) -> Option<KeyCommand> {
        self.entries
            .iter()
            .find(|(_, matchers)| matchers.iter().any(|matcher| matcher.matches(stroke)))
            .map(|(command, _)| *command)
    }

    /// Replaces the matchers of `command`, appending it if it wasn't bound.
    pub fn set(&mut self, command: KeyCommand, matchers: Vec<KeyMatcher>) {
        match self.entries.iter_mut().find(|(bound, _)| *bound == command) {
            Some((_, existing)) => *existing = matchers,
            None => self.entries.push((command, matchers)),
        }
    }

    /// Adds one more matcher to `command`.
    pub fn bind(&mut self, command: KeyCommand, matcher: KeyMatcher) {
        match self.entries.iter_mut().find(|(bound, _)| *bound == command) {
            Some((_, existing)) => existing.push(matcher),
            None => self.entries.push((command, vec![matcher])),
        }
    }

    pub fn unbind(&mut self, command: KeyCommand) {
        self.entries.retain(|(bound, _)| *bound != command);
    }

    pub fn matchers(&self, command: KeyCommand) -> &[KeyMatcher] {
        self.entries
            .iter()
            .find(|(bound, _)| *bound == command)
            .map(|(_, matchers)| matchers.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        use KeyCommand::*;
        let keys = |names: &[&str]| names.iter().map(|name| KeyMatcher::key(*name)).collect::<Vec<_>>();
        Self {
            entries: vec![
                (Next, keys(&["ArrowRight", "ArrowDown"])),
                (Previous, keys(&["ArrowLeft", "ArrowUp"])),
                (NextSlide, keys(&["PageDown"])),
                (PreviousSlide, keys(&["PageUp"])),
                (GoToStart, keys(&["Home"])),
                (GoToEnd, keys(&["End"])),
                (ToggleClock, keys(&["P", "p"])),
                (ResetClock, vec![KeyMatcher::key("0").alt(true)]),
                (
                    ToggleMode,
                    vec![
                        KeyMatcher::key("M").alt(true).shift(false),
                        KeyMatcher::key("m").alt(true).shift(false),
                    ],
                ),
                (
                    PreviousMode,
                    vec![
                        KeyMatcher::key("M").alt(true).shift(true),
                        KeyMatcher::key("m").alt(true).shift(true),
                    ],
                ),
            ],
        }
    }
}
