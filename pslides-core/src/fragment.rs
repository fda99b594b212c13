//! Fragments and their activation state.

use uuid::Uuid;

use crate::sequence::{parse_index_attr, FragmentIndex, Sequenced};

/// A progressively revealed part of a slide.
///
/// Activation is the navigation state ("has this step been played");
/// visibility is what a renderer shows. The two only differ for fragments that
/// start visible and get hidden as the presentation advances.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: Uuid,
    pub label: String,
    index: Option<FragmentIndex>,
    group: Option<String>,
    initially_visible: bool,
    activated: bool,
    is_current: bool,
    is_previous: bool,
}

impl Fragment {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            index: None,
            group: None,
            initially_visible: false,
            activated: false,
            is_current: false,
            is_previous: false,
        }
    }

    pub fn with_index(mut self, index: f64) -> Self {
        self.index = FragmentIndex::new(index);
        self
    }

    /// Applies a raw `"<index>"` / `"<index>:<group>"` attribute.
    ///
    /// An explicit group set earlier wins over the one embedded in the attribute.
    pub fn with_index_attr(mut self, raw: &str) -> Self {
        let (index, group) = parse_index_attr(raw);
        self.index = index;
        if self.group.is_none() {
            self.group = group;
        }
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn initially_visible(mut self) -> Self {
        self.initially_visible = true;
        self
    }

    pub fn index(&self) -> Option<FragmentIndex> {
        self.index
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn is_initially_visible(&self) -> bool {
        self.initially_visible
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn is_visible(&self) -> bool {
        self.activated != self.initially_visible
    }

    /// Last fragment of the most recently activated group.
    pub fn is_current(&self) -> bool {
        self.is_current
    }

    /// Activated, but not part of the current group.
    pub fn is_previous(&self) -> bool {
        self.is_previous
    }

    pub(crate) fn set_index(&mut self, index: Option<FragmentIndex>) {
        self.index = index;
    }

    pub(crate) fn set_group(&mut self, group: Option<String>) {
        self.group = group;
    }

    pub(crate) fn set_activated(&mut self, activated: bool) {
        self.activated = activated;
    }

    pub(crate) fn set_markers(&mut self, is_current: bool, is_previous: bool) {
        self.is_current = is_current;
        self.is_previous = is_previous;
    }
}

impl Sequenced for Fragment {
    fn index(&self) -> Option<FragmentIndex> {
        self.index
    }

    fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}
