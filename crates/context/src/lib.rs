//! Arbor statement context: the current placeholder bindings of one connected server,
//! and the resolvers that substitute them into address templates.

#![forbid(unsafe_code)]

mod context;
mod resolvers;

pub use context::{ContextHandle, Environment, ServerMode, StatementContext};
pub use resolvers::{CacheKeyResolver, Direction, StatementContextResolver, WildcardResolver};
