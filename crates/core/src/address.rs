use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::encode::encode_value;
use crate::TemplateError;

/// Concrete address of one resource: an ordered list of `key=value` pairs.
///
/// On the wire an address is a list of single-entry objects,
/// `[{"host":"primary"},{"server":"server-one"}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    segments: Vec<(String, String)>,
}

impl ResourceAddress {
    pub fn root() -> Self { Self::default() }

    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.segments.push((key.into(), value.into()));
        self
    }

    pub fn append(mut self, other: &ResourceAddress) -> Self {
        self.segments.extend(other.segments.iter().cloned());
        self
    }

    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn len(&self) -> usize { self.segments.len() }

    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    pub fn get(&self, index: usize) -> Option<(&str, &str)> {
        self.segments.get(index).map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.segments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Read an address node. `null` is the root address.
    pub fn from_node(node: &Value) -> Result<Self, TemplateError> {
        let list = match node {
            Value::Null => return Ok(Self::root()),
            Value::Array(list) => list,
            other => return Err(TemplateError::InvalidAddress(format!("expected a list, got {}", other))),
        };
        let mut segments = Vec::with_capacity(list.len());
        for item in list {
            let entry = item
                .as_object()
                .filter(|o| o.len() == 1)
                .and_then(|o| o.iter().next())
                .ok_or_else(|| TemplateError::InvalidAddress(format!("expected a single-entry object, got {}", item)))?;
            let value = match entry.1 {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            segments.push((entry.0.clone(), value));
        }
        Ok(Self { segments })
    }

    pub fn to_node(&self) -> Value {
        Value::Array(
            self.segments
                .iter()
                .map(|(k, v)| {
                    let mut m = Map::with_capacity(1);
                    m.insert(k.clone(), Value::String(v.clone()));
                    Value::Object(m)
                })
                .collect(),
        )
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for (k, v) in &self.segments {
            write!(f, "/{}={}", k, encode_value(v))?;
        }
        Ok(())
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_node().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let node = Value::deserialize(deserializer)?;
        Self::from_node(&node).map_err(serde::de::Error::custom)
    }
}
