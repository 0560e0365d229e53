//! Arbor meta: fetches resource descriptions in batches and keeps the repository current.

#![forbid(unsafe_code)]

mod describe;
mod lookup;
mod parser;
mod settings;
mod update;

pub use describe::{describe_operation, partition, plan, Batch};
pub use lookup::{MetadataLookup, ProcessError};
pub use parser::{parse_composite, parse_single, DescribeResult, ParserError};
pub use settings::Settings;
pub use update::{UpdateSummary, UpdateTask};
