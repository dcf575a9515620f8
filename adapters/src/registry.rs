//! Provider registry
//!
//! Owned mapping from provider code to adapter, built once at startup and
//! shared behind an `Arc`. Lookups take a read lock only.

use crate::PixProvider;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
struct Entries {
    /// Adapters in registration order
    order: Vec<Arc<dyn PixProvider>>,
    /// Code -> position in `order`
    index: HashMap<String, usize>,
}

/// Code -> adapter lookup
#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<Entries>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its code. Registering a code twice replaces
    /// the adapter and keeps the original registration position.
    pub fn register(&self, provider: Arc<dyn PixProvider>) {
        let code = provider.code().to_string();
        let mut entries = self.entries.write();

        match entries.index.get(&code).copied() {
            Some(position) => {
                warn!(provider = %code, "Replacing registered provider");
                entries.order[position] = provider;
            }
            None => {
                info!(provider = %code, name = provider.name(), "Registered provider");
                let position = entries.order.len();
                entries.order.push(provider);
                entries.index.insert(code, position);
            }
        }
    }

    /// Adapter for `code`, `None` when not configured
    pub fn get(&self, code: &str) -> Option<Arc<dyn PixProvider>> {
        let entries = self.entries.read();
        entries
            .index
            .get(code)
            .map(|position| Arc::clone(&entries.order[*position]))
    }

    /// All adapters in registration order
    pub fn get_all(&self) -> Vec<Arc<dyn PixProvider>> {
        self.entries.read().order.clone()
    }

    /// Registered codes in registration order
    pub fn codes(&self) -> Vec<String> {
        self.entries
            .read()
            .order
            .iter()
            .map(|provider| provider.code().to_string())
            .collect()
    }

    /// Registration position of `code`
    pub fn position(&self, code: &str) -> Option<usize> {
        self.entries.read().index.get(code).copied()
    }

    /// Whether `code` is registered
    pub fn contains(&self, code: &str) -> bool {
        self.entries.read().index.contains_key(code)
    }

    /// Number of distinct codes
    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    /// No providers registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}
