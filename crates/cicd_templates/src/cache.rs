//! Resolved-template cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cicd_core::GenerationResult;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::template::{Template, TemplateKey};

/// A cached template with its access bookkeeping.
#[derive(Debug)]
pub struct CacheEntry {
    template: Arc<Template>,
    access_count: AtomicU64,
    first_loaded_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(template: Template) -> Self {
        Self {
            template: Arc::new(template),
            access_count: AtomicU64::new(1),
            first_loaded_at: Utc::now(),
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Number of times the entry was handed out, including the initial load.
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::SeqCst)
    }

    pub fn first_loaded_at(&self) -> DateTime<Utc> {
        self.first_loaded_at
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_accesses: u64,
    pub average_access_count: f64,
}

type Slot = Arc<OnceCell<CacheEntry>>;

/// Per-key template cache.
///
/// Each key owns a slot that is initialised at most once; concurrent callers
/// for the same key wait on that slot instead of loading again.
#[derive(Debug, Default)]
pub struct TemplateCache {
    slots: Mutex<HashMap<TemplateKey, Slot>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached template for `key`, running `loader` on a miss.
    ///
    /// A failed load leaves no entry behind, so the next call loads again.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &TemplateKey,
        loader: F,
    ) -> GenerationResult<Arc<Template>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GenerationResult<Template>>,
    {
        let slot = self.slots.lock().entry(key.clone()).or_default().clone();

        let mut loaded = false;
        let result = slot
            .get_or_try_init(|| {
                loaded = true;
                async move { loader().await.map(CacheEntry::new) }
            })
            .await;

        match result {
            Ok(entry) => {
                if loaded {
                    debug!("Cached template {}", key);
                } else {
                    entry.access_count.fetch_add(1, Ordering::SeqCst);
                    debug!("Cache hit for {}", key);
                }
                Ok(entry.template.clone())
            }
            Err(err) => {
                let mut slots = self.slots.lock();
                if let Some(current) = slots.get(key) {
                    if Arc::ptr_eq(current, &slot) && !current.initialized() {
                        slots.remove(key);
                    }
                }
                Err(err)
            }
        }
    }

    /// Cached template for `key` without loading or counting an access.
    pub fn peek(&self, key: &TemplateKey) -> Option<Arc<Template>> {
        self.slots
            .lock()
            .get(key)
            .and_then(|slot| slot.get())
            .map(|entry| entry.template.clone())
    }

    pub fn contains(&self, key: &TemplateKey) -> bool {
        self.peek(key).is_some()
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.lock();
        let mut stats = CacheStats::default();
        for entry in slots.values().filter_map(|slot| slot.get()) {
            stats.entry_count += 1;
            stats.total_accesses += entry.access_count();
        }
        if stats.entry_count > 0 {
            stats.average_access_count = stats.total_accesses as f64 / stats.entry_count as f64;
        }
        stats
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        debug!("Clearing {} cached template(s)", slots.len());
        slots.clear();
    }
}
