use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::product::ProductId;
use crate::encoding::Embedding;

/// Product embeddings keyed by `(encoder, catalog version, product id)`.
///
/// Only one catalog version is held at a time: the first insert for a new
/// version drops every entry of the previous one. The lock is never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    catalog_version: Option<String>,
    entries: HashMap<(String, ProductId), Embedding>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        encoder: &str,
        catalog_version: &str,
        product_id: &ProductId,
    ) -> Option<Embedding> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.catalog_version.as_deref() != Some(catalog_version) {
            return None;
        }
        state.entries.get(&(encoder.to_string(), product_id.clone())).cloned()
    }

    pub fn insert(
        &self,
        encoder: &str,
        catalog_version: &str,
        product_id: ProductId,
        embedding: Embedding,
    ) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.catalog_version.as_deref() != Some(catalog_version) {
            state.entries.clear();
            state.catalog_version = Some(catalog_version.to_string());
        }
        state.entries.insert((encoder.to_string(), product_id), embedding);
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn catalog_version(&self) -> Option<String> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).catalog_version.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.catalog_version = None;
    }
}
