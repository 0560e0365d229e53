use std::sync::Arc;

use arbor_core::{
    AddressTemplate, Segment, TemplateResolver, DEPLOYMENT, HOST, PROFILE, SERVER, SERVER_CONFIG,
    SERVER_GROUP, WILDCARD,
};

use crate::context::StatementContext;

/// Substitutes placeholders with the values bound in a [`StatementContext`].
///
/// - bound `key={p}` becomes `key=value`
/// - bound `{p}` becomes `<resource type of p>=value`
/// - domain-only placeholders are dropped against a standalone server
/// - unbound placeholders pass through unchanged
#[derive(Debug, Clone)]
pub struct StatementContextResolver {
    context: Arc<StatementContext>,
}

impl StatementContextResolver {
    pub fn new(context: Arc<StatementContext>) -> Self { Self { context } }

    pub fn context(&self) -> &StatementContext { &self.context }
}

impl TemplateResolver for StatementContextResolver {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate {
        let mut resolved = Vec::with_capacity(template.len());
        for segment in template {
            let Some(placeholder) = segment.placeholder() else {
                resolved.push(segment.clone());
                continue;
            };
            if self.context.standalone() && placeholder.domain_only() {
                continue;
            }
            let bound = self
                .context
                .placeholder(placeholder.name())
                .and_then(|p| self.context.value(p).map(|v| (p, v)));
            let next = match bound {
                Some((p, value)) => match (&segment.key, p.resource()) {
                    (Some(key), _) => Segment::new(key.clone(), value),
                    (None, Some(resource)) => Segment::new(resource, value),
                    // no key to attach the value to
                    (None, None) => segment.clone(),
                },
                None => segment.clone(),
            };
            resolved.push(next);
        }
        AddressTemplate::of(resolved)
    }
}

/// Order in which [`WildcardResolver`] visits wildcard segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    LeftToRight,
    RightToLeft,
}

/// Replaces `key=*` segments with the given values, first come first served.
///
/// Segments left over once the values run out keep their wildcard. Blank values are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct WildcardResolver {
    direction: Direction,
    values: Vec<String>,
}

impl WildcardResolver {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_direction(Direction::LeftToRight, values)
    }

    pub fn with_direction<I, S>(direction: Direction, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| !v.trim().is_empty())
            .collect();
        Self { direction, values }
    }
}

impl TemplateResolver for WildcardResolver {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate {
        let mut queue = self.values.iter();
        let mut substitute = |segment: &Segment| -> Segment {
            if segment.has_key() && !segment.contains_placeholder() && segment.is_wildcard() {
                if let Some(value) = queue.next() {
                    return Segment { key: segment.key.clone(), value: value.clone() };
                }
            }
            segment.clone()
        };
        match self.direction {
            Direction::LeftToRight => AddressTemplate::of(template.iter().map(&mut substitute).collect::<Vec<_>>()),
            Direction::RightToLeft => {
                let mut resolved: Vec<Segment> = template.iter().rev().map(&mut substitute).collect();
                resolved.reverse();
                AddressTemplate::of(resolved)
            }
        }
    }
}

/// Canonicalizes templates into cache keys.
///
/// Placeholders are substituted first; then values that vary between otherwise equal
/// resources are replaced by `*` so those resources share one cache entry:
///
/// - standalone: a leading `deployment=..` when the template has more than one segment
/// - domain: a leading `profile=..`, and `deployment=..` in second position when the
///   template has more than two segments; `host`, `server-group`, `server` and
///   `server-config` keep their values
/// - any value that is still a placeholder, in either mode
#[derive(Debug, Clone)]
pub struct CacheKeyResolver {
    statement: StatementContextResolver,
}

impl CacheKeyResolver {
    pub fn new(context: Arc<StatementContext>) -> Self {
        Self { statement: StatementContextResolver::new(context) }
    }

    fn wildcard(standalone: bool, segment: &Segment, index: usize, len: usize) -> bool {
        if segment.contains_placeholder() {
            return true;
        }
        let key = segment.key.as_deref();
        if standalone {
            return key == Some(DEPLOYMENT) && index == 0 && len > 1;
        }
        match key {
            Some(HOST | SERVER_GROUP | SERVER | SERVER_CONFIG) => false,
            Some(PROFILE) => index == 0,
            Some(DEPLOYMENT) => index == 1 && len > 2,
            _ => false,
        }
    }
}

impl TemplateResolver for CacheKeyResolver {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate {
        if template.is_empty() {
            return template.clone();
        }
        let standalone = self.statement.context().standalone();
        let resolved = self.statement.resolve(template);
        let len = resolved.len();
        AddressTemplate::of(resolved.iter().enumerate().map(|(index, segment)| {
            if Self::wildcard(standalone, segment, index, len) {
                Segment { key: segment.key.clone(), value: WILDCARD.to_string() }
            } else {
                segment.clone()
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Environment, ServerMode};
    use arbor_core::Placeholder;

    fn all_bound(mode: ServerMode) -> Arc<StatementContext> {
        let mut ctx = StatementContext::new(Environment::new(mode));
        let bindings = [
            (Placeholder::DOMAIN_CONTROLLER, "primary"),
            (Placeholder::SELECTED_DEPLOYMENT, "hello-world"),
            (Placeholder::SELECTED_HOST, "secondary"),
            (Placeholder::SELECTED_PROFILE, "full"),
            (Placeholder::SELECTED_SERVER, "server1"),
            (Placeholder::SELECTED_SERVER_CONFIG, "server2"),
            (Placeholder::SELECTED_SERVER_GROUP, "main-server-group"),
            (Placeholder::SELECTED_RESOURCE, "bar"),
        ];
        for (p, v) in bindings {
            ctx.assign(p, v);
        }
        Arc::new(ctx)
    }

    fn pairs(mode: ServerMode, pairs: &[(&str, &str)]) -> Arc<StatementContext> {
        let mut ctx = StatementContext::new(Environment::new(mode));
        for (name, value) in pairs {
            ctx.assign_name(name, *value);
        }
        Arc::new(ctx)
    }

    fn resolve(r: &impl TemplateResolver, t: &str) -> String {
        r.resolve(&AddressTemplate::parse(t)).to_string()
    }

    #[test]
    fn statement_context_values() {
        let r = StatementContextResolver::new(pairs(ServerMode::Domain, &[("a", "a"), ("b", "b")]));
        assert_eq!(resolve(&r, "a=b"), "/a=b");
        assert_eq!(resolve(&r, "a={a}"), "/a=a");
        assert_eq!(resolve(&r, "{a}={a}"), "/{a}=a");
        assert_eq!(resolve(&r, "a={a}/b={b}"), "/a=a/b=b");
        assert_eq!(resolve(&r, "a={unbound}"), "/a={unbound}");
        // ad-hoc placeholders have no resource type to use as key
        assert_eq!(resolve(&r, "{a}/c=d"), "/{a}/c=d");
    }

    #[test]
    fn statement_context_domain() {
        let r = StatementContextResolver::new(all_bound(ServerMode::Domain));
        assert_eq!(resolve(&r, "{domain.controller}"), "/host=primary");
        assert_eq!(resolve(&r, "{selected.deployment}"), "/deployment=hello-world");
        assert_eq!(resolve(&r, "{selected.host}"), "/host=secondary");
        assert_eq!(resolve(&r, "{selected.profile}"), "/profile=full");
        assert_eq!(resolve(&r, "{selected.server}"), "/server=server1");
        assert_eq!(resolve(&r, "{selected.server-config}"), "/server-config=server2");
        assert_eq!(resolve(&r, "{selected.server-group}"), "/server-group=main-server-group");
        assert_eq!(resolve(&r, "foo={selected.resource}"), "/foo=bar");
    }

    #[test]
    fn statement_context_standalone_drops_domain_only() {
        let r = StatementContextResolver::new(all_bound(ServerMode::Standalone));
        assert_eq!(resolve(&r, "{domain.controller}/a=b"), "/a=b");
        assert_eq!(resolve(&r, "{selected.deployment}"), "/deployment=hello-world");
        assert_eq!(resolve(&r, "{selected.host}/a=b"), "/a=b");
        assert_eq!(resolve(&r, "{selected.profile}/a=b"), "/a=b");
        assert_eq!(resolve(&r, "{selected.server}/a=b"), "/a=b");
        assert_eq!(resolve(&r, "{selected.server-config}/a=b"), "/a=b");
        assert_eq!(resolve(&r, "{selected.server-group}/a=b"), "/a=b");
        assert_eq!(resolve(&r, "foo={selected.resource}"), "/foo=bar");
    }

    #[test]
    fn wildcards_ltr() {
        let empty: [&str; 0] = [];
        assert_eq!(resolve(&WildcardResolver::new(empty), "a=b"), "/a=b");
        assert_eq!(resolve(&WildcardResolver::new(["foo"]), "{a}/b={c}"), "/{a}/b={c}");
        assert_eq!(resolve(&WildcardResolver::new(["b"]), "a=*/c=*"), "/a=b/c=*");
        assert_eq!(resolve(&WildcardResolver::new(["b", "d"]), "a=*/c=*"), "/a=b/c=d");
        assert_eq!(resolve(&WildcardResolver::new(["b", "d", "e"]), "a=*/c=*"), "/a=b/c=d");
        assert_eq!(resolve(&WildcardResolver::new(["b", "d"]), "a=*/c={d}"), "/a=b/c={d}");
        assert_eq!(resolve(&WildcardResolver::new(["", " ", "x"]), "a=*"), "/a=x");
    }

    #[test]
    fn wildcards_rtl() {
        let rtl = |values: &[&str]| WildcardResolver::with_direction(Direction::RightToLeft, values.iter().copied());
        assert_eq!(resolve(&rtl(&["b"]), "a=*/c=*"), "/a=*/c=b");
        assert_eq!(resolve(&rtl(&["b", "d"]), "a=*/c=*"), "/a=d/c=b");
        assert_eq!(resolve(&rtl(&["b", "d", "e"]), "a=*/c={d}"), "/a=b/c={d}");
    }

    #[test]
    fn wildcard_resolver_is_reusable() {
        let r = WildcardResolver::new(["x"]);
        assert_eq!(resolve(&r, "a=*"), "/a=x");
        assert_eq!(resolve(&r, "a=*"), "/a=x");
    }

    #[test]
    fn cache_key_standalone() {
        let r = CacheKeyResolver::new(all_bound(ServerMode::Standalone));
        assert_eq!(resolve(&r, "/"), "/");
        assert_eq!(resolve(&r, "subsystem=io"), "/subsystem=io");
        assert_eq!(resolve(&r, "deployment=foo.war"), "/deployment=foo.war");
        assert_eq!(resolve(&r, "deployment=foo.war/subsystem=undertow"), "/deployment=*/subsystem=undertow");
        assert_eq!(resolve(&r, "{selected.host}/{selected.server}/subsystem=io"), "/subsystem=io");
        assert_eq!(resolve(&r, "subsystem=foo/bar={unbound}"), "/subsystem=foo/bar=*");
    }

    #[test]
    fn cache_key_domain() {
        let r = CacheKeyResolver::new(all_bound(ServerMode::Domain));
        assert_eq!(resolve(&r, "profile=full/subsystem=io"), "/profile=*/subsystem=io");
        assert_eq!(resolve(&r, "{selected.profile}/subsystem=io"), "/profile=*/subsystem=io");
        assert_eq!(resolve(&r, "host=primary/server=server-one/interface=public"), "/host=primary/server=server-one/interface=public");
        assert_eq!(resolve(&r, "{selected.host}/{selected.server}"), "/host=secondary/server=server1");
        assert_eq!(resolve(&r, "server-group=main/deployment=a.war/subsystem=ee"), "/server-group=main/deployment=*/subsystem=ee");
        assert_eq!(resolve(&r, "server-group=main/deployment=a.war"), "/server-group=main/deployment=a.war");
        assert_eq!(resolve(&r, "subsystem=ee/profile=x"), "/subsystem=ee/profile=x");
    }

    #[test]
    fn cache_key_is_deterministic() {
        let r = CacheKeyResolver::new(all_bound(ServerMode::Domain));
        let inputs = ["profile=a/subsystem=io", "profile=b/subsystem=io", "host=h/server=s/subsystem=io"];
        let first: Vec<String> = inputs.iter().map(|t| resolve(&r, t)).collect();
        let again: Vec<String> = inputs.iter().rev().map(|t| resolve(&r, t)).rev().collect();
        assert_eq!(first, again);
        assert_eq!(first[0], first[1]);
    }
}
