//! Arbor hub: management operations, composites and their dispatch to a server.

#![forbid(unsafe_code)]

mod dispatch;
mod http;
mod operation;

pub use dispatch::{composite_steps, failure_description, is_failure, DispatchError, Dispatcher};
pub use http::HttpDispatcher;
pub use operation::{Composite, Operation};

/// Wire names used in management requests and responses.
pub mod names {
    pub const ACCESS_CONTROL: &str = "access-control";
    pub const ADDRESS: &str = "address";
    pub const CHILDREN: &str = "children";
    pub const COMBINED_DESCRIPTIONS: &str = "combined-descriptions";
    pub const COMPOSITE: &str = "composite";
    pub const DEFAULT: &str = "default";
    pub const DESCRIPTION: &str = "description";
    pub const EXCEPTIONS: &str = "exceptions";
    pub const FAILED: &str = "failed";
    pub const FAILURE_DESCRIPTION: &str = "failure-description";
    pub const LOCALE: &str = "locale";
    pub const MODEL_DESCRIPTION: &str = "model-description";
    pub const OPERATION: &str = "operation";
    pub const OPERATIONS: &str = "operations";
    pub const OUTCOME: &str = "outcome";
    pub const READ_RESOURCE_DESCRIPTION: &str = "read-resource-description";
    pub const RECURSIVE_DEPTH: &str = "recursive-depth";
    pub const RESULT: &str = "result";
    pub const STEPS: &str = "steps";
    pub const SUCCESS: &str = "success";
}
