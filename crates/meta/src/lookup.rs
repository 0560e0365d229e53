use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use arbor_context::ContextHandle;
use arbor_core::{AddressTemplate, NoopResolver, ResourceAddress, TemplateError};
use arbor_hub::{DispatchError, Dispatcher};
use arbor_store::{Metadata, MetadataRepository, RepositoryDump};
use metrics::{counter, histogram};
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::describe::{describe_operation, plan, Batch};
use crate::parser::{parse_composite, parse_single, DescribeResult, ParserError};
use crate::settings::Settings;
use crate::update::UpdateTask;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error("cannot describe {template}: {source}")]
    Template { template: String, source: TemplateError },
}

/// Metadata front door: answers from the repository and fetches what is missing.
///
/// Batches run one after another; results are committed only after every batch of a
/// call succeeded. The repository lock is never held across a dispatch.
pub struct MetadataLookup {
    dispatcher: Arc<dyn Dispatcher>,
    settings: Settings,
    repository: Mutex<MetadataRepository>,
}

enum Next {
    Done(Metadata),
    Fetch(String),
}

impl MetadataLookup {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, context: ContextHandle, settings: Settings) -> Self {
        let repository = MetadataRepository::new(settings.cache_capacity, context);
        Self::with_repository(dispatcher, repository, settings)
    }

    pub fn with_repository(dispatcher: Arc<dyn Dispatcher>, repository: MetadataRepository, settings: Settings) -> Self {
        Self { dispatcher, settings, repository: Mutex::new(repository) }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    fn repository(&self) -> MutexGuard<'_, MetadataRepository> {
        self.repository.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, template: &AddressTemplate) -> bool { self.repository().contains(template) }

    /// Cached metadata only; [`Metadata::empty`] if `template` was never fetched.
    pub fn get(&self, template: &AddressTemplate) -> Metadata {
        let mut repository = self.repository();
        if !repository.contains(template) {
            error!(template = %template, "missing metadata");
            return Metadata::empty();
        }
        repository.get(template)
    }

    pub fn canonical(&self, template: &AddressTemplate) -> String { self.repository().canonical(template) }

    pub fn dump(&self) -> RepositoryDump { self.repository().dump() }

    /// Metadata for `template`, fetching it when not cached.
    ///
    /// A wildcard template that already expanded to several resources yields
    /// [`Metadata::empty`]; ask for one of the concrete addresses instead.
    pub async fn lookup(&self, template: &AddressTemplate) -> Result<Metadata, ProcessError> {
        let next = {
            let mut repository = self.repository();
            let key = repository.canonical(template);
            match repository.cached(&key) {
                Some(metadata) => {
                    debug!(template = %template, key = %key, "lookup from cache");
                    Next::Done(metadata)
                }
                None => match repository.processed(template).map(|r| r.iter().cloned().collect::<Vec<_>>()) {
                    Some(resolved) if resolved.len() > 1 => {
                        debug!(template = %template, key = %key, resolved = resolved.len(), "processed into multiple addresses");
                        Next::Done(Metadata::empty())
                    }
                    Some(mut resolved) if resolved.len() == 1 => {
                        let single = resolved.remove(0);
                        match repository.cached(&single) {
                            Some(metadata) => Next::Done(metadata),
                            None => Next::Fetch(single),
                        }
                    }
                    _ => Next::Fetch(key),
                },
            }
        };
        match next {
            Next::Done(metadata) => Ok(metadata),
            Next::Fetch(address) => {
                self.fetch(vec![address], false).await?;
                Ok(self.repository().get(template))
            }
        }
    }

    /// Make sure metadata for all `templates` is cached and return it in order.
    ///
    /// With `recursive`, descriptions are requested with `recursive-depth` and entries
    /// that were fetched non-recursively count as missing.
    pub async fn process(&self, templates: &[AddressTemplate], recursive: bool) -> Result<Vec<Metadata>, ProcessError> {
        let missing = {
            let mut repository = self.repository();
            let mut seen = FxHashSet::default();
            let mut missing = Vec::new();
            for template in templates {
                let present =
                    if recursive { repository.contains_recursive(template) } else { repository.contains(template) };
                let key = repository.canonical(template);
                if !present && seen.insert(key.clone()) {
                    missing.push(key);
                }
            }
            missing
        };

        if missing.is_empty() {
            debug!(templates = templates.len(), "all metadata already processed");
        } else {
            self.fetch(missing, recursive).await?;
            info!(templates = templates.len(), recursive, "processed metadata");
        }

        let mut repository = self.repository();
        Ok(templates.iter().map(|t| repository.get(t)).collect())
    }

    async fn fetch(&self, addresses: Vec<String>, recursive: bool) -> Result<(), ProcessError> {
        let operations = addresses
            .iter()
            .map(|a| Ok(describe_operation(concrete(a)?, &self.settings, recursive)))
            .collect::<Result<Vec<_>, ProcessError>>()?;
        let batches = plan(operations, self.settings.batch_size);
        debug!(addresses = addresses.len(), batches = batches.len(), recursive, "fetch descriptions");

        let started = Instant::now();
        let mut result = DescribeResult::default();
        for batch in &batches {
            let batch_started = Instant::now();
            match batch {
                Batch::Single(operation) => {
                    debug!(operation = %operation, "execute description request");
                    let node = self.dispatcher.execute(operation).await?;
                    parse_single(operation.address(), &node, &mut result)?;
                }
                Batch::Composite(composite) => {
                    debug!(steps = composite.len(), operations = %composite, "execute composite description request");
                    let steps = self.dispatcher.execute_composite(composite).await?;
                    parse_composite(composite, &steps, &mut result)?;
                }
            }
            counter!("meta_batches_total", 1u64);
            histogram!("meta_batch_ms", batch_started.elapsed().as_secs_f64() * 1000.0);
        }

        let summary = UpdateTask::new(&mut self.repository()).apply(result, recursive);
        info!(
            added = summary.added,
            skipped = summary.skipped,
            read_only = summary.read_only_fallbacks,
            took_ms = started.elapsed().as_millis() as u64,
            "metadata committed"
        );
        Ok(())
    }
}

fn concrete(address: &str) -> Result<ResourceAddress, ProcessError> {
    AddressTemplate::parse(address)
        .resolve(&NoopResolver)
        .map_err(|source| ProcessError::Template { template: address.to_string(), source })
}
