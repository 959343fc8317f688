//! Metatag vocabulary handling.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagdexError};

/// The set of metatag names a parser recognizes.
///
/// Names are validated on construction (ASCII, lowercase, no colon, no
/// whitespace) and kept sorted by descending length, so that overlapping
/// prefixes such as `ordered` and `order` resolve to the longest match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    names: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from metatag names.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            if !is_valid_name(name) {
                return Err(TagdexError::InvalidMetatagName(name.clone()));
            }
        }

        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        Ok(Vocabulary { names })
    }

    /// A vocabulary recognizing no metatags; every `name:value` token
    /// parses as a plain tag.
    pub fn empty() -> Self {
        Vocabulary::default()
    }

    /// Names in matching order, longest first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii() && !b.is_ascii_uppercase() && !b.is_ascii_whitespace() && b != b':'
        })
}
