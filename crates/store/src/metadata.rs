use std::fmt;
use std::sync::Arc;

use arbor_core::AddressTemplate;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Flat description node of a single resource: attributes, operations, documentation.
///
/// Children descriptions are never nested; each child is stored under its own address.
#[derive(Clone, Default, PartialEq)]
pub struct ResourceDescription(Arc<Value>);

impl ResourceDescription {
    pub fn new(node: Value) -> Self { Self(Arc::new(node)) }

    pub fn undefined() -> Self { Self::default() }

    pub fn is_defined(&self) -> bool { !self.0.is_null() }

    pub fn node(&self) -> &Value { &self.0 }

    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }

    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.0.get("attributes").and_then(Value::as_object)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes().and_then(|a| a.get(name))
    }

    pub fn operations(&self) -> Option<&Map<String, Value>> {
        self.0.get("operations").and_then(Value::as_object)
    }

    pub fn operation(&self, name: &str) -> Option<&Value> {
        self.operations().and_then(|o| o.get(name))
    }

    pub fn deprecated(&self) -> bool {
        self.0.get("deprecated").is_some_and(|d| !d.is_null())
    }

    /// Names of registered capabilities, if any.
    pub fn capabilities(&self) -> Vec<&str> {
        self.0
            .get("capabilities")
            .and_then(Value::as_array)
            .map(|caps| caps.iter().filter_map(|c| c.get("name").and_then(Value::as_str)).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ResourceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescription")
            .field("defined", &self.is_defined())
            .field("attributes", &self.attributes().map_or(0, Map::len))
            .field("operations", &self.operations().map_or(0, Map::len))
            .finish()
    }
}

impl Serialize for ResourceDescription {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { self.0.as_ref().serialize(s) }
}

/// Effective access-control node for a resource.
#[derive(Clone, Default, PartialEq)]
pub struct SecurityContext(Arc<Value>);

impl SecurityContext {
    pub fn new(node: Value) -> Self { Self(Arc::new(node)) }

    pub fn undefined() -> Self { Self::default() }

    /// Readable, not writable, no attribute or operation grants.
    pub fn read_only() -> Self {
        Self::new(json!({ "read": true, "write": false, "attributes": {}, "operations": {} }))
    }

    pub fn is_defined(&self) -> bool { !self.0.is_null() }

    pub fn node(&self) -> &Value { &self.0 }

    pub fn readable(&self) -> bool { flag(self.0.get("read")) }

    pub fn writable(&self) -> bool { flag(self.0.get("write")) }

    pub fn readable_attribute(&self, name: &str) -> bool {
        flag(self.0.get("attributes").and_then(|a| a.get(name)).and_then(|a| a.get("read")))
    }

    pub fn writable_attribute(&self, name: &str) -> bool {
        flag(self.0.get("attributes").and_then(|a| a.get(name)).and_then(|a| a.get("write")))
    }

    pub fn executable(&self, operation: &str) -> bool {
        flag(self.0.get("operations").and_then(|o| o.get(operation)).and_then(|o| o.get("execute")))
    }
}

fn flag(v: Option<&Value>) -> bool { v.and_then(Value::as_bool).unwrap_or(false) }

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("read", &self.readable())
            .field("write", &self.writable())
            .finish()
    }
}

impl Serialize for SecurityContext {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { self.0.as_ref().serialize(s) }
}

/// Immutable description + security pair for one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    template: AddressTemplate,
    resource_description: ResourceDescription,
    security_context: SecurityContext,
    recursive: bool,
    #[serde(skip)]
    empty: bool,
}

impl Metadata {
    pub fn new(
        template: AddressTemplate,
        resource_description: ResourceDescription,
        security_context: SecurityContext,
    ) -> Self {
        let empty = !resource_description.is_defined() && !security_context.is_defined();
        Self { template, resource_description, security_context, recursive: false, empty }
    }

    /// Placeholder returned when nothing is known about a template.
    pub fn empty() -> Self {
        Self::new(AddressTemplate::root(), ResourceDescription::undefined(), SecurityContext::undefined())
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn template(&self) -> &AddressTemplate { &self.template }
    pub fn resource_description(&self) -> &ResourceDescription { &self.resource_description }
    pub fn security_context(&self) -> &SecurityContext { &self.security_context }
    pub fn is_recursive(&self) -> bool { self.recursive }
    pub fn is_empty(&self) -> bool { self.empty }
}

impl Default for Metadata {
    fn default() -> Self { Self::empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_flags() {
        let sc = SecurityContext::new(json!({
            "read": true,
            "write": false,
            "attributes": { "name": { "read": true, "write": true } },
            "operations": { "add": { "execute": true } }
        }));
        assert!(sc.readable());
        assert!(!sc.writable());
        assert!(sc.readable_attribute("name"));
        assert!(sc.writable_attribute("name"));
        assert!(!sc.readable_attribute("missing"));
        assert!(sc.executable("add"));
        assert!(!sc.executable("remove"));
    }

    #[test]
    fn read_only_fallback() {
        let sc = SecurityContext::read_only();
        assert!(sc.is_defined());
        assert!(sc.readable());
        assert!(!sc.writable());
        assert!(!sc.executable("write-attribute"));
    }

    #[test]
    fn description_accessors() {
        let rd = ResourceDescription::new(json!({
            "description": "The IO subsystem",
            "attributes": { "a": { "type": "STRING" } },
            "operations": { "read-resource": {} },
            "capabilities": [ { "name": "org.wildfly.io" } ]
        }));
        assert_eq!(rd.description(), Some("The IO subsystem"));
        assert!(rd.attribute("a").is_some());
        assert!(rd.operation("read-resource").is_some());
        assert!(!rd.deprecated());
        assert_eq!(rd.capabilities(), vec!["org.wildfly.io"]);
    }

    #[test]
    fn empty_metadata() {
        let m = Metadata::empty();
        assert!(m.is_empty());
        assert!(!m.is_recursive());
        assert_eq!(m.template().to_string(), "/");

        let m = Metadata::new(
            AddressTemplate::parse("subsystem=io"),
            ResourceDescription::new(json!({ "description": "io" })),
            SecurityContext::read_only(),
        )
        .with_recursive(true);
        assert!(!m.is_empty());
        assert!(m.is_recursive());
    }
}
