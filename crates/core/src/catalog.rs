use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::product::Product;
use crate::errors::CatalogError;

/// Immutable view of the catalog at one point in time. Cheap to clone; the
/// engine reads it without locking.
#[derive(Clone, Debug)]
pub struct CatalogSnapshot {
    version: String,
    products: Arc<[Product]>,
    loaded_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Builds a snapshot, rejecting duplicate product ids. Products are not
    /// validated here; malformed entries are skipped during scoring.
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        if let Some(duplicate) = first_duplicate(&products) {
            return Err(CatalogError::DuplicateProduct(duplicate));
        }

        let version = catalog_version(&products)?;
        Ok(Self { version, products: products.into(), loaded_at: Utc::now() })
    }

    pub fn empty() -> Self {
        Self {
            version: blake3::hash(b"[]").to_hex().to_string(),
            products: Arc::from(Vec::new()),
            loaded_at: Utc::now(),
        }
    }

    /// blake3 digest of the canonical JSON of the product list.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

fn first_duplicate(products: &[Product]) -> Option<String> {
    let mut seen = HashSet::with_capacity(products.len());
    products.iter().find(|product| !seen.insert(&product.id)).map(|product| product.id.0.clone())
}

fn catalog_version(products: &[Product]) -> Result<String, CatalogError> {
    let canonical = serde_json::to_vec(products)
        .map_err(|error| CatalogError::Unavailable(format!("catalog is not serializable: {error}")))?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError>;
}

#[derive(Clone, Debug)]
pub struct InMemoryCatalog {
    snapshot: CatalogSnapshot,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        Ok(Self { snapshot: CatalogSnapshot::new(products)? })
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        Ok(self.snapshot.clone())
    }
}

/// Reads a JSON array of products from disk on every snapshot.
#[derive(Clone, Debug)]
pub struct JsonFileCatalog {
    path: PathBuf,
    strict: bool,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), strict: false }
    }

    /// Reject the whole file when any product fails validation.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProductCatalog for JsonFileCatalog {
    async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CatalogError::ReadFile { path: self.path.clone(), source })?;
        let products: Vec<Product> = serde_json::from_slice(&bytes)
            .map_err(|source| CatalogError::ParseFile { path: self.path.clone(), source })?;

        if self.strict {
            for product in &products {
                product.validate()?;
            }
        }

        let snapshot = CatalogSnapshot::new(products)?;
        debug!(
            event_name = "catalog.snapshot.loaded",
            path = %self.path.display(),
            products = snapshot.len(),
            version = snapshot.version(),
            "catalog snapshot loaded"
        );
        Ok(snapshot)
    }
}
