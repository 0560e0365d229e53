use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arbor_core::Placeholder;
use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Topology of the connected management server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// A single server.
    #[default]
    Standalone,
    /// A managed domain of hosts, server groups and servers.
    Domain,
}

impl FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standalone" => Ok(Self::Standalone),
            "domain" => Ok(Self::Domain),
            other => Err(format!("unknown server mode '{}' (expect standalone or domain)", other)),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standalone => "standalone",
            Self::Domain => "domain",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub mode: ServerMode,
}

impl Environment {
    pub fn new(mode: ServerMode) -> Self { Self { mode } }
    pub fn standalone(&self) -> bool { self.mode == ServerMode::Standalone }
}

/// Current placeholder bindings, e.g. which server or profile is selected.
#[derive(Debug, Clone, Default)]
pub struct StatementContext {
    environment: Environment,
    values: FxHashMap<Placeholder, String>,
    placeholders: FxHashMap<String, Placeholder>,
}

impl StatementContext {
    pub fn new(environment: Environment) -> Self {
        Self { environment, values: FxHashMap::default(), placeholders: FxHashMap::default() }
    }

    pub fn environment(&self) -> Environment { self.environment }

    /// Whether domain-only placeholders are dropped instead of resolved.
    pub fn standalone(&self) -> bool { self.environment.standalone() }

    /// Bind `placeholder` to `value`, replacing any previous binding.
    pub fn assign(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.placeholders.insert(placeholder.name().to_string(), placeholder.clone());
        self.values.insert(placeholder, value.into());
    }

    /// Bind by textual name; well-known names keep their resource type.
    pub fn assign_name(&mut self, name: &str, value: impl Into<String>) {
        self.assign(Placeholder::lookup(name), value);
    }

    pub fn unassign(&mut self, name: &str) {
        if let Some(p) = self.placeholders.remove(name) {
            self.values.remove(&p);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.placeholders.clear();
    }

    pub fn placeholder(&self, name: &str) -> Option<&Placeholder> { self.placeholders.get(name) }

    pub fn value(&self, placeholder: &Placeholder) -> Option<&str> {
        self.values.get(placeholder).map(String::as_str)
    }

    /// Current bindings sorted by placeholder name.
    pub fn bindings(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self.values.iter().map(|(p, v)| (p.name(), v.as_str())).collect();
        out.sort_unstable();
        out
    }
}

/// Shared, swappable statement context for one server connection.
///
/// Readers take a cheap snapshot with [`ContextHandle::load`]; changes publish a new
/// context so snapshots in use are never mutated underneath their holders.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    inner: Arc<ArcSwap<StatementContext>>,
}

impl ContextHandle {
    pub fn new(context: StatementContext) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(context)) }
    }

    pub fn load(&self) -> Arc<StatementContext> { self.inner.load_full() }

    pub fn store(&self, context: StatementContext) {
        debug!(mode = %context.environment().mode, "statement context replaced");
        self.inner.store(Arc::new(context));
    }

    /// Copy the current context, apply `f`, and publish the result.
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&mut StatementContext),
    {
        self.inner.rcu(|current| {
            let mut next = StatementContext::clone(current);
            f(&mut next);
            next
        });
    }

    pub fn assign(&self, placeholder: Placeholder, value: &str) {
        debug!(placeholder = %placeholder, value, "assign placeholder");
        self.update(|ctx| ctx.assign(placeholder.clone(), value));
    }
}

impl Default for ContextHandle {
    fn default() -> Self { Self::new(StatementContext::default()) }
}
