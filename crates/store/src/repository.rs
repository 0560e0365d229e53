use std::collections::{BTreeMap, BTreeSet};

use arbor_context::{CacheKeyResolver, ContextHandle};
use arbor_core::{AddressTemplate, ResourceAddress, TemplateResolver};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::{Cache, EvictionHook};
use crate::metadata::Metadata;

pub const DEFAULT_CAPACITY: usize = 500;

/// What [`MetadataRepository::add`] does when the canonical key is already cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Keep the existing entry.
    #[default]
    InsertOnce,
    /// Replace the existing entry.
    Overwrite,
}

/// Cache of metadata keyed by canonical template strings.
///
/// Keys are produced by the cache-key resolver against the current statement context,
/// so `/host=primary/subsystem=io` and `/{selected.host}/subsystem=io` share an entry
/// while `primary` is selected. The processed index maps each requested (possibly
/// wildcarded) template to the concrete keys its lookup produced.
pub struct MetadataRepository {
    context: ContextHandle,
    cache: Cache<String, Metadata>,
    processed: BTreeMap<String, BTreeSet<String>>,
    policy: UpdatePolicy,
}

impl MetadataRepository {
    pub fn new(capacity: usize, context: ContextHandle) -> Self {
        Self::with_eviction_hook(capacity, context, |_, _| {})
    }

    /// Like [`MetadataRepository::new`] with an extra callback for evicted entries,
    /// e.g. to spill them into a slower tier.
    pub fn with_eviction_hook<F>(capacity: usize, context: ContextHandle, hook: F) -> Self
    where
        F: Fn(&str, &Metadata) + Send + Sync + 'static,
    {
        let on_evict: EvictionHook<String, Metadata> = Box::new(move |address: &String, metadata: &Metadata| {
            debug!(address = %address, "metadata evicted from first-level cache");
            counter!("meta_cache_evicted_total", 1u64);
            hook(address, metadata);
        });
        Self {
            context,
            cache: Cache::with_eviction_hook(capacity, on_evict),
            processed: BTreeMap::new(),
            policy: UpdatePolicy::default(),
        }
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context(&self) -> &ContextHandle { &self.context }
    pub fn capacity(&self) -> usize { self.cache.capacity() }
    pub fn len(&self) -> usize { self.cache.len() }
    pub fn is_empty(&self) -> bool { self.cache.is_empty() }

    /// Canonical cache key of `template` under the current statement context.
    pub fn canonical(&self, template: &AddressTemplate) -> String {
        CacheKeyResolver::new(self.context.load()).resolve(template).to_string()
    }

    /// True if metadata for `template` is cached directly, or if the template was
    /// processed before and every concrete key it produced is still cached.
    pub fn contains(&self, template: &AddressTemplate) -> bool {
        let key = self.canonical(template);
        if self.cache.contains(key.as_str()) {
            return true;
        }
        match self.processed.get(&key) {
            Some(keys) if !keys.is_empty() => keys.iter().all(|k| self.cache.contains(k.as_str())),
            _ => false,
        }
    }

    /// Like [`MetadataRepository::contains`], but every entry involved must also have
    /// been fetched recursively. Does not touch recency.
    pub fn contains_recursive(&self, template: &AddressTemplate) -> bool {
        let key = self.canonical(template);
        if let Some(metadata) = self.cache.peek(key.as_str()) {
            return metadata.is_recursive();
        }
        match self.processed.get(&key) {
            Some(keys) if !keys.is_empty() => {
                keys.iter().all(|k| self.cache.peek(k.as_str()).is_some_and(Metadata::is_recursive))
            }
            _ => false,
        }
    }

    /// Metadata for `template`, or [`Metadata::empty`] when nothing usable is cached.
    ///
    /// A processed template that resolved to exactly one concrete key falls back to that
    /// key's entry; one that resolved to several has no single answer.
    pub fn get(&mut self, template: &AddressTemplate) -> Metadata {
        let key = self.canonical(template);
        if let Some(metadata) = self.cache.get(key.as_str()) {
            counter!("meta_cache_hit_total", 1u64);
            debug!(template = %template, key = %key, "metadata cache hit");
            return metadata.clone();
        }

        let fallback = match self.processed.get(&key) {
            Some(keys) if keys.len() == 1 => keys.iter().next().cloned(),
            Some(keys) if keys.len() > 1 => {
                warn!(template = %template, key = %key, resolved = keys.len(), "template resolved to multiple addresses");
                None
            }
            _ => None,
        };
        if let Some(metadata) = fallback.and_then(|k| self.cache.get(k.as_str())) {
            counter!("meta_cache_hit_total", 1u64);
            debug!(template = %template, key = %key, "metadata cache hit via processed index");
            return metadata.clone();
        }

        counter!("meta_cache_miss_total", 1u64);
        error!(template = %template, key = %key, "no metadata found");
        Metadata::empty()
    }

    /// Direct cache hit for an already canonical `key`; no processed-index fallback.
    pub fn cached(&mut self, key: &str) -> Option<Metadata> {
        let metadata = self.cache.get(key).cloned();
        if metadata.is_some() {
            counter!("meta_cache_hit_total", 1u64);
        }
        metadata
    }

    /// Store `metadata` under the canonical key of `address`. Returns whether the cache
    /// changed; with [`UpdatePolicy::InsertOnce`] an existing entry is kept unless a
    /// recursive description replaces a non-recursive one.
    pub fn add(&mut self, address: &ResourceAddress, metadata: Metadata, recursive: bool) -> bool {
        let key = self.canonical(&AddressTemplate::from(address));
        if self.policy == UpdatePolicy::InsertOnce
            && self.cache.peek(key.as_str()).is_some_and(|existing| existing.is_recursive() || !recursive)
        {
            return false;
        }
        debug!(address = %address, key = %key, recursive, "cache metadata");
        counter!("meta_cache_insert_total", 1u64);
        self.cache.put(key, metadata.with_recursive(recursive));
        gauge!("meta_cache_entries", self.cache.len() as f64);
        true
    }

    /// Record which concrete addresses a requested template expanded to.
    /// Both sides are stored canonicalized.
    pub fn add_processed<'a, I>(&mut self, requested: &str, resolved: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let key = self.canonical(&AddressTemplate::parse(requested));
        let values: BTreeSet<String> =
            resolved.into_iter().map(|r| self.canonical(&AddressTemplate::parse(r))).collect();
        self.processed.entry(key).or_default().extend(values);
    }

    /// Concrete keys recorded for `template`, if it was processed.
    pub fn processed(&self, template: &AddressTemplate) -> Option<&BTreeSet<String>> {
        self.processed.get(&self.canonical(template))
    }

    pub fn remove(&mut self, template: &AddressTemplate) -> Option<Metadata> {
        let key = self.canonical(template);
        self.cache.remove(key.as_str())
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.processed.clear();
        gauge!("meta_cache_entries", 0.0);
    }

    /// Snapshot of the repository for inspection.
    pub fn dump(&self) -> RepositoryDump {
        RepositoryDump {
            first_level: self.cache.len(),
            second_level: 0,
            entries: self.cache.lru_keys().into_iter().cloned().collect(),
            processed: self
                .processed
                .iter()
                .map(|(requested, resolved)| ProcessedEntry {
                    requested: requested.clone(),
                    resolved: resolved.iter().cloned().collect(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for MetadataRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRepository")
            .field("cache", &self.cache)
            .field("processed", &self.processed.len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryDump {
    pub first_level: usize,
    pub second_level: usize,
    /// Cached keys, most recently used first.
    pub entries: Vec<String>,
    pub processed: Vec<ProcessedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedEntry {
    pub requested: String,
    pub resolved: Vec<String>,
}
