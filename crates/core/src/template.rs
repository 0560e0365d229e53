use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::address::ResourceAddress;
use crate::encode::{decode_value, split_unescaped, unescaped_positions};
use crate::placeholder::Placeholder;
use crate::resolver::TemplateResolver;
use crate::segment::Segment;
use crate::TemplateError;

type Segments = SmallVec<[Segment; 6]>;

/// Immutable, path-like template addressing a resource in the management tree.
///
/// Grammar of the encoded form:
///
/// ```text
/// Template = "/" | Segment ("/" Segment)*
/// Segment  = Placeholder | Key "=" Value
/// Value    = Placeholder | Token | "*"
/// ```
///
/// `/`, `=` and `:` inside a value are backslash-escaped. The canonical encoded string
/// is the identity of a template: equality and hashing use it alone.
#[derive(Clone)]
pub struct AddressTemplate {
    template: String,
    segments: Segments,
}

impl AddressTemplate {
    /// The template with no segments, addressing the root of the resource tree.
    pub fn root() -> Self {
        Self { template: "/".to_string(), segments: SmallVec::new() }
    }

    /// Build a template from segments. Empty segments are dropped.
    pub fn of<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = Segment>,
    {
        let segments: Segments = segments.into_iter().filter(|s| !s.is_empty()).collect();
        let template = join(&segments);
        Self { template, segments }
    }

    pub fn from_placeholder(placeholder: &Placeholder) -> Self {
        Self::of([Segment::bare(placeholder.expression())])
    }

    /// Parse an encoded template string.
    ///
    /// Never fails: blank input yields [`AddressTemplate::root`], and parsing stops at
    /// the first malformed segment, keeping the valid prefix.
    pub fn parse(input: &str) -> Self {
        let body = strip_slashes(input.trim());
        if body.is_empty() {
            return Self::root();
        }
        let mut segments = Segments::new();
        for raw in split_unescaped(body, b'/') {
            match parse_segment(raw) {
                Some(segment) => segments.push(segment),
                None => break,
            }
        }
        Self::of(segments)
    }

    /// Canonical encoded form: `/` for the root, `/k=v/...` otherwise.
    pub fn template(&self) -> &str { &self.template }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> { self.segments.iter() }

    pub fn len(&self) -> usize { self.segments.len() }

    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    pub fn first(&self) -> Option<&Segment> { self.segments.first() }

    pub fn last(&self) -> Option<&Segment> { self.segments.last() }

    /// True iff no segment holds a placeholder value or the wildcard.
    pub fn is_fully_qualified(&self) -> bool {
        self.segments.iter().all(|s| !s.contains_placeholder() && !s.is_wildcard())
    }

    /// Append a `key=value` segment. `value` is the raw value and gets encoded.
    pub fn append(&self, key: &str, value: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::new(key, value));
        Self::of(segments)
    }

    /// Append an encoded template string; a leading `/` is optional.
    pub fn append_str(&self, encoded: &str) -> Self {
        let base = if self.is_empty() { "" } else { self.template.as_str() };
        Self::parse(&format!("{}/{}", base, encoded.trim_start_matches('/')))
    }

    pub fn append_template(&self, other: &AddressTemplate) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self::of(segments)
    }

    /// Segments `from..to`, with the bounds rules of a slice range.
    pub fn sub_template(&self, from: usize, to: usize) -> Result<Self, TemplateError> {
        match self.segments.get(from..to) {
            Some(slice) => Ok(Self::of(slice.iter().cloned())),
            None => Err(TemplateError::OutOfBounds { from, to, len: self.len() }),
        }
    }

    /// The template without its last segment; the root for templates of size <= 1.
    pub fn parent(&self) -> Self {
        if self.len() <= 1 {
            Self::root()
        } else {
            Self::of(self.segments[..self.len() - 1].iter().cloned())
        }
    }

    /// Replace `key=*` segments left to right with the given values.
    pub fn wildcards<I, S>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter();
        let segments: Vec<Segment> = self
            .segments
            .iter()
            .map(|s| {
                if s.has_key() && s.is_wildcard() {
                    if let Some(v) = values.next() {
                        return Segment { key: s.key.clone(), value: v.into() };
                    }
                }
                s.clone()
            })
            .collect();
        Self::of(segments)
    }

    /// Run the template through `resolver` and turn the result into a concrete address.
    ///
    /// Fails if a segment is still a placeholder (in key or value) or has no key.
    pub fn resolve<R>(&self, resolver: &R) -> Result<ResourceAddress, TemplateError>
    where
        R: TemplateResolver + ?Sized,
    {
        let resolved = resolver.resolve(self);
        let mut address = ResourceAddress::root();
        for segment in resolved.iter() {
            match &segment.key {
                Some(key) if !segment.contains_placeholder() && !segment.key_is_placeholder() => {
                    address = address.add(key.clone(), segment.value.clone());
                }
                _ => return Err(TemplateError::Unresolved { segment: segment.to_string() }),
            }
        }
        Ok(address)
    }
}

fn join(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for s in segments {
        out.push('/');
        out.push_str(&s.to_string());
    }
    out
}

/// Remove leading and trailing unescaped slashes.
fn strip_slashes(s: &str) -> &str {
    let mut s = s.trim_start_matches('/');
    while s.ends_with('/') {
        let last = s.len() - 1;
        if unescaped_positions(s, b'/').last() == Some(&last) {
            s = &s[..last];
        } else {
            break;
        }
    }
    s
}

fn parse_segment(raw: &str) -> Option<Segment> {
    if raw.is_empty() || raw == "{}" || raw.starts_with('=') {
        return None;
    }
    let equals = unescaped_positions(raw, b'=');
    if equals.last() == Some(&(raw.len() - 1)) {
        return None;
    }
    let opening = raw.matches('{').count();
    if opening != raw.matches('}').count() {
        return None;
    }
    if equals.is_empty() && opening == 0 {
        return None;
    }

    let segment = match equals.first() {
        Some(&pos) => Segment::new(&raw[..pos], decode_value(&raw[pos + 1..])),
        None => Segment::bare(raw),
    };

    let key = segment.key.as_deref().unwrap_or_default();
    let has_placeholder = |s: &str| s.contains('{') && s.contains('}');
    match (key.is_empty(), segment.value.is_empty()) {
        (true, true) => None,
        (true, false) if segment.has_key() && !has_placeholder(&segment.value) => None,
        (false, true) if !has_placeholder(key) => None,
        _ => Some(segment),
    }
}

impl Default for AddressTemplate {
    fn default() -> Self { Self::root() }
}

impl PartialEq for AddressTemplate {
    fn eq(&self, other: &Self) -> bool { self.template == other.template }
}

impl Eq for AddressTemplate {}

impl Hash for AddressTemplate {
    fn hash<H: Hasher>(&self, state: &mut H) { self.template.hash(state) }
}

impl fmt::Display for AddressTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.template) }
}

impl fmt::Debug for AddressTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddressTemplate").field(&self.template).finish()
    }
}

impl FromStr for AddressTemplate {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self::parse(s)) }
}

impl From<&str> for AddressTemplate {
    fn from(s: &str) -> Self { Self::parse(s) }
}

impl From<&ResourceAddress> for AddressTemplate {
    fn from(address: &ResourceAddress) -> Self {
        Self::of(address.iter().map(|(k, v)| Segment::new(k, v)))
    }
}

impl<'a> IntoIterator for &'a AddressTemplate {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter { self.segments.iter() }
}

impl Serialize for AddressTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.template)
    }
}

impl<'de> Deserialize<'de> for AddressTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
