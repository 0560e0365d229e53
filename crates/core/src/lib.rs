//! Arbor core types: segments, placeholders, address templates and concrete addresses.
//!
//! An address template is a path-like view onto the management resource tree
//! (`/profile=full/subsystem=io`) that may still carry placeholders (`{selected.profile}`)
//! and wildcards (`*`). Templates become concrete [`ResourceAddress`]es by running them
//! through a [`TemplateResolver`].

#![forbid(unsafe_code)]

mod address;
mod encode;
mod placeholder;
mod resolver;
mod segment;
mod template;

pub use address::ResourceAddress;
pub use encode::{decode_value, encode_value};
pub use placeholder::{
    Placeholder, DEPLOYMENT, HOST, PROFILE, SERVER, SERVER_CONFIG, SERVER_GROUP, SUBSYSTEM,
};
pub use resolver::{Chain, NoopResolver, TemplateResolver};
pub use segment::Segment;
pub use template::AddressTemplate;

/// The wildcard token standing for "any instance of this resource type".
pub const WILDCARD: &str = "*";

/// Errors raised by template and address operations.
///
/// Malformed template strings are *not* errors: the parser truncates at the first
/// invalid segment instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("sub template range {from}..{to} out of bounds for template of {len} segments")]
    OutOfBounds { from: usize, to: usize, len: usize },
    #[error("segment '{segment}' is not resolved to a key/value pair")]
    Unresolved { segment: String },
    #[error("invalid address node: {0}")]
    InvalidAddress(String),
}

pub mod prelude {
    pub use super::{
        AddressTemplate, Placeholder, ResourceAddress, Segment, TemplateError, TemplateResolver,
        WILDCARD,
    };
}
