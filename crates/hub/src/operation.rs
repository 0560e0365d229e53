use std::fmt;

use arbor_core::ResourceAddress;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::names::{ADDRESS, COMPOSITE, OPERATION, STEPS};

/// A single management operation: name, target address and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    address: ResourceAddress,
    params: Map<String, Value>,
}

impl Operation {
    pub fn new(address: ResourceAddress, name: impl Into<String>) -> Self {
        Self { name: name.into(), address, params: Map::new() }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn address(&self) -> &ResourceAddress { &self.address }
    pub fn params(&self) -> &Map<String, Value> { &self.params }
    pub fn get_param(&self, name: &str) -> Option<&Value> { self.params.get(name) }

    /// Request node: `{"operation": .., "address": [..], <params>}`.
    pub fn to_node(&self) -> Value {
        let mut node = Map::with_capacity(self.params.len() + 2);
        node.insert(OPERATION.to_string(), Value::String(self.name.clone()));
        node.insert(ADDRESS.to_string(), self.address.to_node());
        for (k, v) in &self.params {
            node.insert(k.clone(), v.clone());
        }
        Value::Object(node)
    }

    /// CLI-style rendering, e.g. `/subsystem=io:read-resource-description(operations=true)`.
    pub fn as_cli(&self) -> String {
        let mut out = if self.address.is_empty() { String::new() } else { self.address.to_string() };
        out.push(':');
        out.push_str(&self.name);
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}={s}"),
                    other => format!("{k}={other}"),
                })
                .collect();
            out.push('(');
            out.push_str(&params.join(","));
            out.push(')');
        }
        out
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.as_cli()) }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { self.to_node().serialize(s) }
}

/// Several operations executed as one request. Step `i` of the response answers
/// `steps()[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composite {
    steps: Vec<Operation>,
}

impl Composite {
    pub fn new(steps: Vec<Operation>) -> Self { Self { steps } }

    pub fn steps(&self) -> &[Operation] { &self.steps }
    pub fn get(&self, index: usize) -> Option<&Operation> { self.steps.get(index) }
    pub fn len(&self) -> usize { self.steps.len() }
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    pub fn to_node(&self) -> Value {
        let mut node = Map::with_capacity(3);
        node.insert(OPERATION.to_string(), Value::String(COMPOSITE.to_string()));
        node.insert(ADDRESS.to_string(), Value::Array(Vec::new()));
        node.insert(STEPS.to_string(), Value::Array(self.steps.iter().map(Operation::to_node).collect()));
        Value::Object(node)
    }

    pub fn as_cli(&self) -> String {
        self.steps.iter().map(Operation::as_cli).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.as_cli()) }
}

impl Serialize for Composite {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { self.to_node().serialize(s) }
}

impl FromIterator<Operation> for Composite {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self { Self::new(iter.into_iter().collect()) }
}
