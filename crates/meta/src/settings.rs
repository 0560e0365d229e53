use arbor_context::ServerMode;
use arbor_store::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_DEPTH: u32 = 1;
pub const DEFAULT_LOCALE: &str = "en";

/// Knobs for metadata processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Locale of description texts.
    pub locale: String,
    /// Description requests per composite.
    pub batch_size: usize,
    /// First-level cache capacity.
    pub cache_capacity: usize,
    /// `recursive-depth` of recursive description requests.
    pub depth: u32,
    pub mode: ServerMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            cache_capacity: DEFAULT_CAPACITY,
            depth: DEFAULT_DEPTH,
            mode: ServerMode::default(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `ARBOR_LOCALE`, `ARBOR_BATCH_SIZE`, `ARBOR_CACHE_CAPACITY`,
    /// `ARBOR_RECURSIVE_DEPTH` and `ARBOR_MODE`.
    pub fn from_env() -> Self { Self::from_source(|key| std::env::var(key).ok()) }

    fn from_source<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mode = match var("ARBOR_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "ignoring ARBOR_MODE");
                defaults.mode
            }),
            None => defaults.mode,
        };
        Self {
            locale: var("ARBOR_LOCALE").filter(|s| !s.trim().is_empty()).unwrap_or(defaults.locale),
            batch_size: var("ARBOR_BATCH_SIZE").and_then(|s| s.parse().ok()).unwrap_or(defaults.batch_size).max(1),
            cache_capacity: var("ARBOR_CACHE_CAPACITY").and_then(|s| s.parse().ok()).unwrap_or(defaults.cache_capacity),
            depth: var("ARBOR_RECURSIVE_DEPTH").and_then(|s| s.parse().ok()).unwrap_or(defaults.depth),
            mode,
        }
    }
}
