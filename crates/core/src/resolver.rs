use std::sync::Arc;

use crate::template::AddressTemplate;

/// Transforms one template into another, e.g. by substituting placeholders.
///
/// Resolvers are plain values closing over whatever they need; they compose by
/// explicit sequencing with [`TemplateResolver::and_then`].
pub trait TemplateResolver {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate;

    /// Apply `self`, then `next`.
    fn and_then<R>(self, next: R) -> Chain<Self, R>
    where
        Self: Sized,
        R: TemplateResolver,
    {
        Chain { first: self, second: next }
    }
}

/// Returns templates unchanged. Used for templates that are already concrete.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl TemplateResolver for NoopResolver {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate { template.clone() }
}

#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: TemplateResolver, B: TemplateResolver> TemplateResolver for Chain<A, B> {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate {
        self.second.resolve(&self.first.resolve(template))
    }
}

impl<T: TemplateResolver + ?Sized> TemplateResolver for &T {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate { (**self).resolve(template) }
}

impl<T: TemplateResolver + ?Sized> TemplateResolver for Box<T> {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate { (**self).resolve(template) }
}

impl<T: TemplateResolver + ?Sized> TemplateResolver for Arc<T> {
    fn resolve(&self, template: &AddressTemplate) -> AddressTemplate { (**self).resolve(template) }
}
