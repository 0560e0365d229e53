use std::collections::{BTreeMap, BTreeSet};

use arbor_core::{ResourceAddress, TemplateError, HOST, SERVER};
use arbor_hub::names::{
    ACCESS_CONTROL, ADDRESS, CHILDREN, DEFAULT, DESCRIPTION, EXCEPTIONS, MODEL_DESCRIPTION, RESULT,
};
use arbor_hub::{failure_description, is_failure, Composite};
use arbor_store::{ResourceDescription, SecurityContext};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParserError {
    #[error("Failed step 'step-{step}' in composite result: {description}")]
    FailedStep { step: usize, description: String },
    #[error("Cannot get operation at index {index} from composite with {len} steps")]
    MissingOperation { index: usize, len: usize },
    #[error(transparent)]
    Address(#[from] TemplateError),
}

/// Descriptions and security contexts collected from one or more responses.
///
/// The first entry seen for an address wins; later ones for the same address are dropped.
#[derive(Debug, Default)]
pub struct DescribeResult {
    pub(crate) descriptions: Vec<(ResourceAddress, ResourceDescription)>,
    described: FxHashSet<String>,
    pub(crate) security: FxHashMap<String, SecurityContext>,
    pub(crate) processed: BTreeMap<String, BTreeSet<String>>,
}

impl DescribeResult {
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty() && self.security.is_empty() && self.processed.is_empty()
    }

    pub fn has_description(&self, address: &ResourceAddress) -> bool {
        self.described.contains(&address.to_string())
    }

    pub fn has_security_context(&self, address: &ResourceAddress) -> bool {
        self.security.contains_key(&address.to_string())
    }

    /// Descriptions in the order they were found.
    pub fn descriptions(&self) -> impl Iterator<Item = (&ResourceAddress, &ResourceDescription)> + '_ {
        self.descriptions.iter().map(|(a, d)| (a, d))
    }

    pub fn security_context(&self, address: &ResourceAddress) -> Option<&SecurityContext> {
        self.security.get(&address.to_string())
    }

    /// Requested address to the concrete addresses it produced.
    pub fn processed(&self) -> &BTreeMap<String, BTreeSet<String>> { &self.processed }

    fn add_description(&mut self, address: &ResourceAddress, description: ResourceDescription) {
        if self.described.insert(address.to_string()) {
            self.descriptions.push((address.clone(), description));
        }
    }

    fn add_security_context(&mut self, address: &ResourceAddress, context: SecurityContext) {
        self.security.entry(address.to_string()).or_insert(context);
    }

    fn add_processed(&mut self, requested: String, resolved: String) {
        self.processed.entry(requested).or_default().insert(resolved);
    }
}

/// Parse the step nodes of a composite; `steps[i]` answers `composite.steps()[i]`.
///
/// A step whose result is a list carries one `(address, result)` pair per matched
/// resource. Any failed step aborts the parse.
pub fn parse_composite(composite: &Composite, steps: &[Value], result: &mut DescribeResult) -> Result<(), ParserError> {
    for (index, step) in steps.iter().enumerate() {
        if is_failure(step) {
            return Err(ParserError::FailedStep { step: index + 1, description: failure_description(step) });
        }
        let operation = composite
            .get(index)
            .ok_or(ParserError::MissingOperation { index, len: composite.len() })?;
        match step.get(RESULT) {
            Some(Value::Array(items)) => {
                for item in items {
                    let Some(node) = item.get(RESULT).filter(|r| !r.is_null()) else { continue };
                    let item_address = ResourceAddress::from_node(item.get(ADDRESS).unwrap_or(&Value::Null))?;
                    let address = fully_qualified(operation.address(), item_address);
                    walk(operation.address(), address, node, result)?;
                }
            }
            Some(node) => parse_single(operation.address(), node, result)?,
            None => parse_single(operation.address(), &Value::Null, result)?,
        }
    }
    Ok(())
}

/// Parse the result of a single description request against `operation_address`.
pub fn parse_single(operation_address: &ResourceAddress, node: &Value, result: &mut DescribeResult) -> Result<(), ParserError> {
    match node {
        Value::Array(items) => {
            for item in items {
                let Some(nested) = item.get(RESULT).filter(|r| !r.is_null()) else { continue };
                let address = ResourceAddress::from_node(item.get(ADDRESS).unwrap_or(&Value::Null))?;
                let address = fully_qualified(operation_address, address);
                walk(operation_address, address, nested, result)?;
            }
            Ok(())
        }
        other => walk(operation_address, operation_address.clone(), other, result),
    }
}

/// Requests against `/host=h/server=s/..` with wildcards answer with addresses relative
/// to the server; put the host and server back in front.
fn fully_qualified(operation: &ResourceAddress, result: ResourceAddress) -> ResourceAddress {
    let relative = operation.len() > 2
        && operation.len() == result.len() + 2
        && operation.get(0).is_some_and(|(k, _)| k == HOST)
        && operation.get(1).is_some_and(|(k, _)| k == SERVER);
    match (relative, operation.get(0), operation.get(1)) {
        (true, Some((_, host)), Some((_, server))) => {
            let resolved = ResourceAddress::root().add(HOST, host).add(SERVER, server).append(&result);
            debug!(from = %result, to = %resolved, "adjust result address");
            resolved
        }
        _ => result,
    }
}

/// Flatten a description node and its `children` into per-address entries, pre-order.
fn walk(
    operation_address: &ResourceAddress,
    address: ResourceAddress,
    node: &Value,
    result: &mut DescribeResult,
) -> Result<(), ParserError> {
    let requested = operation_address.to_string();
    let mut stack = vec![(address, node)];

    while let Some((address, node)) = stack.pop() {
        let current = address.to_string();
        if current != requested {
            result.add_processed(requested.clone(), current);
        }

        if defined(node.get(DESCRIPTION)).is_some() && !result.has_description(&address) {
            result.add_description(&address, ResourceDescription::new(flat(node)));
        }

        if let Some(access_control) = defined(node.get(ACCESS_CONTROL)) {
            if let Some(default) = defined(access_control.get(DEFAULT)) {
                result.add_security_context(&address, SecurityContext::new(default.clone()));
            }
            if let Some(exceptions) = access_control.get(EXCEPTIONS).and_then(Value::as_object) {
                for exception in exceptions.values() {
                    let exception_address = ResourceAddress::from_node(exception.get(ADDRESS).unwrap_or(&Value::Null))?;
                    result.add_security_context(&exception_address, SecurityContext::new(exception.clone()));
                }
            }
        }

        if let Some(children) = node.get(CHILDREN).and_then(Value::as_object) {
            let mut pending = Vec::new();
            for (child_type, child) in children {
                let Some(models) = child.get(MODEL_DESCRIPTION).and_then(Value::as_object) else { continue };
                for (child_name, child_node) in models {
                    pending.push((address.clone().add(child_type.as_str(), child_name.as_str()), child_node));
                }
            }
            stack.extend(pending.into_iter().rev());
        }
    }
    Ok(())
}

fn defined(v: Option<&Value>) -> Option<&Value> { v.filter(|v| !v.is_null()) }

/// The node without its `children`.
fn flat(node: &Value) -> Value {
    match node.as_object() {
        Some(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != CHILDREN)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        ),
        None => node.clone(),
    }
}
