//! Conversion between human location labels and wire location ids.
//!
//! A label names the innermost place first: `"public library of Spam Village"`.
//! The id reverses the chain and joins it structurally: `"Spam_Village::public_library"`.
//!
//! Only the first space (or placeholder) in each segment is substituted, so an
//! id such as `"Spam_Village::old_town_square"` keeps an underscore in its
//! label. The server's id format for multi-word segments is not pinned down,
//! so the substitution is kept as is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separates a label's segments, innermost first.
pub const LABEL_SEPARATOR: &str = " of ";
/// Separates an id's segments, outermost first.
pub const ID_SEPARATOR: &str = "::";
/// Stands in for the first space of each segment inside an id.
pub const SPACE_PLACEHOLDER: &str = "_";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationLabel(String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_id(&self) -> LocationId {
        to_id(&self.0)
    }
}

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_label(&self) -> LocationLabel {
        to_label(&self.0)
    }
}

impl fmt::Display for LocationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `"public library of Spam Village"` => `"Spam_Village::public_library"`
pub fn to_id(label: &str) -> LocationId {
    // `Split` over a string pattern is not double-ended; reverse after collecting.
    let segments: Vec<&str> = label.split(LABEL_SEPARATOR).collect();
    let segments: Vec<String> = segments
        .iter()
        .rev()
        .map(|segment| segment.replacen(' ', SPACE_PLACEHOLDER, 1))
        .collect();
    LocationId(segments.join(ID_SEPARATOR))
}

/// `"Spam_Village::public_library"` => `"public library of Spam Village"`
pub fn to_label(id: &str) -> LocationLabel {
    let segments: Vec<&str> = id.split(ID_SEPARATOR).collect();
    let segments: Vec<String> = segments
        .iter()
        .rev()
        .map(|segment| segment.replacen(SPACE_PLACEHOLDER, " ", 1))
        .collect();
    LocationLabel(segments.join(LABEL_SEPARATOR))
}
