use arbor_core::ResourceAddress;
use arbor_hub::names::{
    ACCESS_CONTROL, COMBINED_DESCRIPTIONS, LOCALE, OPERATIONS, READ_RESOURCE_DESCRIPTION, RECURSIVE_DEPTH,
};
use arbor_hub::{Composite, Operation};

use crate::settings::Settings;

/// Description request for one address, listing operations and combined access control.
pub fn describe_operation(address: ResourceAddress, settings: &Settings, recursive: bool) -> Operation {
    let operation = Operation::new(address, READ_RESOURCE_DESCRIPTION)
        .param(OPERATIONS, true)
        .param(ACCESS_CONTROL, COMBINED_DESCRIPTIONS)
        .param(LOCALE, settings.locale.clone());
    if recursive {
        operation.param(RECURSIVE_DEPTH, settings.depth)
    } else {
        operation
    }
}

/// Consecutive chunks of at most `size` items, order preserved.
pub fn partition<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// One round trip to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Single(Operation),
    Composite(Composite),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Composite(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Group operations into round trips: one operation goes alone, up to `batch_size`
/// share a composite, more are split into composites of `batch_size`.
pub fn plan(mut operations: Vec<Operation>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    match operations.len() {
        0 => Vec::new(),
        1 => operations.pop().map(Batch::Single).into_iter().collect(),
        n if n <= batch_size => vec![Batch::Composite(Composite::new(operations))],
        _ => partition(&operations, batch_size)
            .into_iter()
            .map(|chunk| Batch::Composite(Composite::new(chunk)))
            .collect(),
    }
}
