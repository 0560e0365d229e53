use std::fmt;

use crate::encode::encode_value;
use crate::placeholder::Placeholder;

/// One element of an address template.
///
/// `key=value` segments carry a key; bare `{placeholder}` segments don't. The value is
/// held decoded: `/`, `=` and `:` are escaped again whenever the segment is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub key: Option<String>,
    pub value: String,
}

impl Segment {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: Some(key.into()), value: value.into() }
    }

    /// A key-less segment, normally a bare placeholder like `{selected.host}`.
    pub fn bare(value: impl Into<String>) -> Self {
        Self { key: None, value: value.into() }
    }

    pub fn has_key(&self) -> bool { self.key.is_some() }

    /// Empty segments carry no addressing information and are dropped from templates.
    pub fn is_empty(&self) -> bool { self.key.is_none() && self.value.is_empty() }

    pub fn contains_placeholder(&self) -> bool {
        self.value.len() >= 2 && self.value.starts_with('{') && self.value.ends_with('}')
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        if self.contains_placeholder() {
            Some(Placeholder::lookup(&self.value[1..self.value.len() - 1]))
        } else {
            None
        }
    }

    pub fn is_wildcard(&self) -> bool { self.value == crate::WILDCARD }

    pub(crate) fn key_is_placeholder(&self) -> bool {
        self.key.as_deref().is_some_and(|k| k.len() >= 2 && k.starts_with('{') && k.ends_with('}'))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}={}", key, encode_value(&self.value)),
            None => f.write_str(&self.value),
        }
    }
}
