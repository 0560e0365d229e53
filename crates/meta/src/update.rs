use arbor_core::AddressTemplate;
use arbor_store::{Metadata, MetadataRepository, SecurityContext};
use tracing::{debug, warn};

use crate::parser::DescribeResult;

/// Outcome of committing a [`DescribeResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub added: usize,
    pub skipped: usize,
    pub read_only_fallbacks: usize,
}

/// Commits parsed descriptions into the repository.
pub struct UpdateTask<'a> {
    repository: &'a mut MetadataRepository,
}

impl<'a> UpdateTask<'a> {
    pub fn new(repository: &'a mut MetadataRepository) -> Self { Self { repository } }

    /// Add one metadata entry per description, then record processed addresses.
    /// A description without security context gets [`SecurityContext::read_only`].
    pub fn apply(self, result: DescribeResult, recursive: bool) -> UpdateSummary {
        let DescribeResult { descriptions, mut security, processed, .. } = result;
        let mut summary = UpdateSummary::default();

        for (address, description) in descriptions {
            let key = address.to_string();
            let security_context = security.remove(&key).unwrap_or_else(|| {
                warn!(address = %key, "no security context in description result, falling back to read-only");
                summary.read_only_fallbacks += 1;
                SecurityContext::read_only()
            });
            let metadata = Metadata::new(AddressTemplate::from(&address), description, security_context);
            if self.repository.add(&address, metadata, recursive) {
                summary.added += 1;
            } else {
                summary.skipped += 1;
            }
        }

        for (requested, resolved) in &processed {
            debug!(requested = %requested, resolved = resolved.len(), "add processed addresses");
            self.repository.add_processed(requested, resolved.iter().map(String::as_str));
        }
        summary
    }
}
