use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const DEPLOYMENT: &str = "deployment";
pub const HOST: &str = "host";
pub const PROFILE: &str = "profile";
pub const SERVER: &str = "server";
pub const SERVER_CONFIG: &str = "server-config";
pub const SERVER_GROUP: &str = "server-group";
pub const SUBSYSTEM: &str = "subsystem";

/// Named substitution point inside a template, written as `{name}`.
///
/// A placeholder may be bound to a resource type which becomes the segment key when a
/// bare `{name}` segment is resolved. Domain-only placeholders have no meaning against
/// a standalone server and are dropped there. Equality and hashing use the name only.
#[derive(Debug, Clone)]
pub struct Placeholder {
    name: Cow<'static, str>,
    resource: Option<Cow<'static, str>>,
    domain_only: bool,
}

impl Placeholder {
    pub const DOMAIN_CONTROLLER: Placeholder = Placeholder::known("domain.controller", Some(HOST), true);
    pub const SELECTED_DEPLOYMENT: Placeholder = Placeholder::known("selected.deployment", Some(DEPLOYMENT), false);
    pub const SELECTED_HOST: Placeholder = Placeholder::known("selected.host", Some(HOST), true);
    pub const SELECTED_PROFILE: Placeholder = Placeholder::known("selected.profile", Some(PROFILE), true);
    pub const SELECTED_RESOURCE: Placeholder = Placeholder::known("selected.resource", None, false);
    pub const SELECTED_SERVER: Placeholder = Placeholder::known("selected.server", Some(SERVER), true);
    pub const SELECTED_SERVER_CONFIG: Placeholder = Placeholder::known("selected.server-config", Some(SERVER_CONFIG), true);
    pub const SELECTED_SERVER_GROUP: Placeholder = Placeholder::known("selected.server-group", Some(SERVER_GROUP), true);

    pub const WELL_KNOWN: [Placeholder; 8] = [
        Self::DOMAIN_CONTROLLER,
        Self::SELECTED_DEPLOYMENT,
        Self::SELECTED_HOST,
        Self::SELECTED_PROFILE,
        Self::SELECTED_RESOURCE,
        Self::SELECTED_SERVER,
        Self::SELECTED_SERVER_CONFIG,
        Self::SELECTED_SERVER_GROUP,
    ];

    const fn known(name: &'static str, resource: Option<&'static str>, domain_only: bool) -> Self {
        let resource = match resource {
            Some(r) => Some(Cow::Borrowed(r)),
            None => None,
        };
        Self { name: Cow::Borrowed(name), resource, domain_only }
    }

    pub fn new(name: impl Into<String>, resource: Option<&str>, domain_only: bool) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            resource: resource.map(|r| Cow::Owned(r.to_string())),
            domain_only,
        }
    }

    /// The well-known placeholder with this name, if any.
    pub fn well_known(name: &str) -> Option<Placeholder> {
        Self::WELL_KNOWN.iter().find(|p| p.name == name).cloned()
    }

    /// Well-known placeholder for `name`, or an ad-hoc one without resource type.
    pub fn lookup(name: &str) -> Placeholder {
        Self::well_known(name).unwrap_or_else(|| Placeholder::new(name, None, false))
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn resource(&self) -> Option<&str> { self.resource.as_deref() }
    pub fn domain_only(&self) -> bool { self.domain_only }

    /// The name surrounded by `{` and `}`.
    pub fn expression(&self) -> String {
        format!("{{{}}}", self.name)
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool { self.name == other.name }
}

impl Eq for Placeholder {}

impl Hash for Placeholder {
    fn hash<H: Hasher>(&self, state: &mut H) { self.name.hash(state) }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name)
    }
}
