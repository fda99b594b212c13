//! Fragment sequencing: turns fragments in document order into reveal groups.
//!
//! Three kinds of input entries:
//! - grouped fragments (shared group id), merged into one entry,
//! - indexed fragments, merged per index value,
//! - free fragments (neither), one entry each.
//!
//! Indexed entries are emitted in ascending index order. Free entries keep
//! their document order and are slotted in front of the first indexed entry
//! whose leading fragment comes later in the document.
//!
//! ```text
//!  document:  A   B(0)   C   D(1)
//!  sequence: [A] [B]    [C] [D]
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Numeric ordering key of a fragment.
///
/// Always finite and non-negative. Values only order fragments relative to
/// each other; they need not be contiguous or start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct FragmentIndex(f64);

impl FragmentIndex {
    /// Returns `None` for negative, NaN or infinite values.
    pub fn new(value: f64) -> Option<Self> {
        // `+ 0.0` folds -0.0 into 0.0 so both land in the same bucket.
        (value.is_finite() && value >= 0.0).then_some(Self(value + 0.0))
    }

    /// Lenient parse of an index attribute. Anything unusable is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::new)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Eq for FragmentIndex {}

impl PartialOrd for FragmentIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FragmentIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for FragmentIndex {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("invalid fragment index {value}"))
    }
}

impl From<FragmentIndex> for f64 {
    fn from(index: FragmentIndex) -> Self {
        index.0
    }
}

/// Splits an index attribute of the form `"<index>"` or `"<index>:<group>"`.
pub fn parse_index_attr(raw: &str) -> (Option<FragmentIndex>, Option<String>) {
    match raw.split_once(':') {
        Some((index, group)) => (FragmentIndex::parse(index), Some(group.to_owned())),
        None => (FragmentIndex::parse(raw), None),
    }
}

/// Anything that carries the two sequencing hints.
pub trait Sequenced {
    fn index(&self) -> Option<FragmentIndex>;
    fn group(&self) -> Option<&str>;
}

/// Bare sequencing input, detached from any slide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentDescriptor {
    pub index: Option<FragmentIndex>,
    pub group: Option<String>,
}

impl FragmentDescriptor {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn indexed(index: f64) -> Self {
        Self {
            index: FragmentIndex::new(index),
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl Sequenced for FragmentDescriptor {
    fn index(&self) -> Option<FragmentIndex> {
        self.index
    }

    fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

/// Ordered reveal groups. Each group lists positions into the sequenced
/// input, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSequence {
    groups: Vec<Vec<usize>>,
}

impl FragmentSequence {
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &[usize]> + '_ {
        self.groups.iter().map(Vec::as_slice)
    }

    /// Position in the sequence of the group holding the given fragment.
    pub fn group_of(&self, position: usize) -> Option<usize> {
        self.groups.iter().position(|group| group.contains(&position))
    }
}

struct GroupEntry<'a> {
    id: &'a str,
    members: Vec<usize>,
    index: Option<FragmentIndex>,
}

/// Computes the reveal order for `fragments` (given in document order).
pub fn sequence<T: Sequenced>(fragments: &[T]) -> FragmentSequence {
    let mut free: Vec<Vec<usize>> = Vec::new();
    let mut indexed: BTreeMap<FragmentIndex, Vec<usize>> = BTreeMap::new();
    let mut groups: Vec<GroupEntry<'_>> = Vec::new();
    let mut group_slots: HashMap<&str, usize> = HashMap::new();

    for (position, fragment) in fragments.iter().enumerate() {
        match (fragment.group(), fragment.index()) {
            (Some(id), index) => {
                let slot = *group_slots.entry(id).or_insert_with(|| {
                    groups.push(GroupEntry { id, members: Vec::new(), index: None });
                    groups.len() - 1
                });
                let entry = &mut groups[slot];
                entry.members.push(position);
                // The first indexed member decides where the whole group goes.
                if entry.index.is_none() {
                    entry.index = index;
                }
            }
            (None, Some(index)) => indexed.entry(index).or_default().push(position),
            (None, None) => free.push(vec![position]),
        }
    }

    for entry in groups {
        log::trace!("fragment group '{}' has {} member(s)", entry.id, entry.members.len());
        match entry.index {
            Some(index) => indexed.entry(index).or_default().extend(entry.members),
            None => free.push(entry.members),
        }
    }

    free.sort_by_key(|members| members[0]);
    for members in indexed.values_mut() {
        members.sort_unstable();
    }

    let mut ordered = Vec::with_capacity(free.len() + indexed.len());
    let mut free = free.into_iter().peekable();
    let mut indexed = indexed.into_values().peekable();
    loop {
        let take_free = match (free.peek(), indexed.peek()) {
            (Some(next_free), Some(next_indexed)) => next_free[0] < next_indexed[0],
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_free { free.next() } else { indexed.next() };
        ordered.extend(next);
    }

    FragmentSequence { groups: ordered }
}
