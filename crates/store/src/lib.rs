//! Arbor store: bounded first-level metadata cache and the repository on top of it.

#![forbid(unsafe_code)]

mod cache;
mod metadata;
mod repository;

pub use cache::{Cache, EvictionHook};
pub use metadata::{Metadata, ResourceDescription, SecurityContext};
pub use repository::{
    MetadataRepository, ProcessedEntry, RepositoryDump, UpdatePolicy, DEFAULT_CAPACITY,
};
