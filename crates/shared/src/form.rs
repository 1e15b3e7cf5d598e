use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FieldNameError, ShapeConflict};

/// Nested submit payload built from a form's controls.
///
/// `Text("")` serializes as `""`, so an empty control stays distinguishable
/// from an absent one once the payload is JSON-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    List(Vec<FormValue>),
    Map(BTreeMap<String, FormValue>),
}

impl Default for FormValue {
    fn default() -> Self {
        Self::Map(BTreeMap::new())
    }
}

impl FormValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FormValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FormValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.as_map().and_then(|entries| entries.get(key))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::List(items) => items.iter().map(FormValue::to_json).collect(),
            Self::Map(entries) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect::<serde_json::Map<_, _>>()
                .into(),
        }
    }

    /// Places `value` at the path addressed by `field`.
    ///
    /// Missing containers are created on the way down. A list-append target
    /// pushes onto the list at its parent path; any other target overwrites.
    pub fn insert(&mut self, field: &FieldName, value: FormValue) -> Result<(), ShapeConflict> {
        let conflict = || ShapeConflict {
            name: field.name().to_owned(),
        };
        let Self::Map(root) = self else {
            return Err(conflict());
        };
        let mut cursor = root;
        let (leaf, parents) = field.split_leaf();
        let append = field.is_list_append();

        for (idx, part) in parents.iter().enumerate() {
            let opens_list = append && idx + 1 == parents.len();
            let slot = cursor.entry(part.clone()).or_insert_with(|| {
                if opens_list {
                    Self::List(Vec::new())
                } else {
                    Self::default()
                }
            });
            if opens_list {
                return match slot {
                    Self::List(items) => {
                        items.push(value);
                        Ok(())
                    }
                    _ => Err(conflict()),
                };
            }
            cursor = match slot {
                Self::Map(entries) => entries,
                _ => return Err(conflict()),
            };
        }

        cursor.insert(leaf.to_owned(), value);
        Ok(())
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Structural address parsed from a control's `name` attribute.
///
/// `a` is a single segment; `a[b][c]` is `a`, `b`, `c`; a trailing `[]`
/// leaves an empty final segment, meaning "append to a list".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldName {
    name: String,
    segments: Vec<String>,
}

impl FieldName {
    pub fn parse(name: &str) -> Result<Self, FieldNameError> {
        if name.is_empty() {
            return Err(FieldNameError::Empty);
        }
        let malformed = || FieldNameError::Malformed {
            name: name.to_owned(),
        };

        let Some(open) = name.find('[') else {
            return Ok(Self {
                name: name.to_owned(),
                segments: vec![name.to_owned()],
            });
        };

        let outer = &name[..open];
        let is_word = |ch: char| ch.is_ascii_alphanumeric() || ch == '_';
        if outer.is_empty() || !outer.chars().all(is_word) {
            return Err(malformed());
        }
        let inner = name[open + 1..].strip_suffix(']').ok_or_else(malformed)?;

        let mut segments = vec![outer.to_owned()];
        segments.extend(inner.split("][").map(str::to_owned));
        Ok(Self {
            name: name.to_owned(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_list_append(&self) -> bool {
        self.segments.len() > 1 && self.segments.last().is_some_and(String::is_empty)
    }

    /// Final segment and the path of its parent container.
    pub fn split_leaf(&self) -> (&str, &[String]) {
        match self.segments.split_last() {
            Some((leaf, parents)) => (leaf.as_str(), parents),
            None => ("", &[]),
        }
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
