//! Compiled template cache
//!
//! Templates are immutable once compiled, so they are shared as
//! `Arc<Template>` and kept for the life of the process. Tagged templates are
//! keyed by the address of their static string array; string templates by
//! their markup.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::trace;

use crate::error::Result;
use crate::types::Template;

/// Template cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Address of the `static` string array emitted at a call site
    Statics(usize),
    Markup(String),
}

#[derive(Debug, Default)]
struct Entries {
    templates: HashMap<CacheKey, Arc<Template>>,
    hits: usize,
    misses: usize,
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
    pub entry_count: usize,
}

/// Template cache manager
#[derive(Debug, Clone, Default)]
pub struct TemplateCache {
    inner: Arc<RwLock<Entries>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a compiled template
    ///
    /// When two callers race on the same key the first insert wins, so every
    /// caller ends up sharing one `Arc`.
    pub fn get_or_compile<F>(&self, key: &CacheKey, compiler: F) -> Result<Arc<Template>>
    where
        F: FnOnce() -> Result<Template>,
    {
        if let Ok(mut entries) = self.inner.write() {
            if let Some(template) = entries.templates.get(key).cloned() {
                entries.hits += 1;
                return Ok(template);
            }
            entries.misses += 1;
        }

        let template = Arc::new(compiler()?);
        trace!(key = ?key, "compiled template for cache");

        if let Ok(mut entries) = self.inner.write() {
            let shared = entries
                .templates
                .entry(key.clone())
                .or_insert_with(|| template.clone())
                .clone();
            return Ok(shared);
        }

        Ok(template)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner
            .read()
            .map(|entries| entries.templates.contains_key(key))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.inner.write() {
            entries.templates.clear();
            entries.hits = 0;
            entries.misses = 0;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .read()
            .map(|entries| {
                let total = entries.hits + entries.misses;
                CacheStats {
                    hits: entries.hits,
                    misses: entries.misses,
                    hit_rate: if total > 0 {
                        entries.hits as f64 / total as f64
                    } else {
                        0.0
                    },
                    entry_count: entries.templates.len(),
                }
            })
            .unwrap_or_default()
    }
}

static GLOBAL_CACHE: OnceLock<TemplateCache> = OnceLock::new();

/// Process-wide template cache
pub fn get_global_cache() -> &'static TemplateCache {
    GLOBAL_CACHE.get_or_init(TemplateCache::new)
}

/// Drop every cached template
pub fn clear_global_cache() {
    get_global_cache().clear();
}
