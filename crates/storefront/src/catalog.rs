//! Product catalog cache.
//!
//! Loads `GET products/` once per TTL window using `moka`. Concurrent
//! readers share a single in-flight load. The catalog only decorates cart
//! lines for display; a failed load degrades to "unavailable" placeholders
//! and never blocks a cart operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lustre_core::cart::{self, CartLineItem, EnrichedCartItem};
use lustre_core::catalog::{CatalogProduct, ProductLookup};
use lustre_core::ProductId;
use moka::future::Cache;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiClient, ApiError};

/// Products endpoint, relative to the API base URL.
pub const PRODUCTS_PATH: &str = "products/";

/// The catalog could not be loaded.
#[derive(Debug, Clone, Error)]
#[error("catalog unavailable: {0}")]
pub struct CatalogError(Arc<ApiError>);

impl CatalogError {
    /// The underlying API error.
    #[must_use]
    pub fn api_error(&self) -> &ApiError {
        &self.0
    }
}

/// A loaded product list indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<CatalogProduct>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Index a product list. Later duplicates of an id are ignored.
    #[must_use]
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        let mut index = HashMap::with_capacity(products.len());
        for (position, product) in products.iter().enumerate() {
            index.entry(product.id).or_insert(position);
        }
        Self { products, index }
    }

    /// Look up a product by id.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.index.get(&id).and_then(|&i| self.products.get(i))
    }

    /// All products in server order.
    #[must_use]
    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ProductLookup for Catalog {
    fn product(&self, id: ProductId) -> Option<&CatalogProduct> {
        Self::product(self, id)
    }
}

/// Observable catalog state.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub catalog: Option<Arc<Catalog>>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Events applied to [`CatalogState`].
#[derive(Debug, Clone)]
pub enum CatalogAction {
    LoadStarted,
    Loaded(Arc<Catalog>),
    LoadFailed(String),
    Invalidated,
}

impl CatalogState {
    /// Apply an action, returning the next state.
    #[must_use]
    pub fn reduce(self, action: CatalogAction) -> Self {
        match action {
            CatalogAction::LoadStarted => Self {
                loading: true,
                error: None,
                ..self
            },
            CatalogAction::Loaded(catalog) => Self {
                catalog: Some(catalog),
                loading: false,
                error: None,
            },
            CatalogAction::LoadFailed(error) => Self {
                loading: false,
                error: Some(error),
                ..self
            },
            CatalogAction::Invalidated => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CatalogKey;

/// Read-only product catalog backed by a TTL cache.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogCacheInner>,
}

struct CatalogCacheInner {
    api: ApiClient,
    cache: Cache<CatalogKey, Arc<Catalog>>,
    state: watch::Sender<CatalogState>,
}

impl CatalogCache {
    /// Create a cache whose loaded catalog lives for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        let (state, _) = watch::channel(CatalogState::default());

        Self {
            inner: Arc::new(CatalogCacheInner { api, cache, state }),
        }
    }

    fn dispatch(&self, action: CatalogAction) {
        self.inner
            .state
            .send_modify(|state| *state = std::mem::take(state).reduce(action));
    }

    /// The catalog, loading it on first use or after expiry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the products endpoint fails.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Arc<Catalog>, CatalogError> {
        if let Some(catalog) = self.inner.cache.get(&CatalogKey).await {
            debug!("Cache hit for catalog");
            return Ok(catalog);
        }

        self.dispatch(CatalogAction::LoadStarted);
        let api = self.inner.api.clone();
        let result = self
            .inner
            .cache
            .try_get_with(CatalogKey, async move {
                let products: Vec<CatalogProduct> = api.get_list(PRODUCTS_PATH).await?;
                debug!(count = products.len(), "catalog loaded");
                Ok::<_, ApiError>(Arc::new(Catalog::new(products)))
            })
            .await;

        match result {
            Ok(catalog) => {
                self.dispatch(CatalogAction::Loaded(Arc::clone(&catalog)));
                Ok(catalog)
            }
            Err(err) => {
                warn!(error = %err, "catalog load failed");
                self.dispatch(CatalogAction::LoadFailed(err.to_string()));
                Err(CatalogError(err))
            }
        }
    }

    /// Look up one product, loading the catalog if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the catalog cannot be loaded.
    pub async fn product(&self, id: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
        Ok(self.load().await?.product(id).cloned())
    }

    /// Join cart lines with catalog snapshots.
    ///
    /// A catalog failure yields every line as unavailable rather than an
    /// error.
    pub async fn enrich(&self, lines: &[CartLineItem]) -> Vec<EnrichedCartItem> {
        match self.load().await {
            Ok(catalog) => cart::enrich(lines, catalog.as_ref()),
            Err(_) => cart::enrich(lines, &Catalog::default()),
        }
    }

    /// Drop the cached catalog so the next read reloads it.
    pub async fn invalidate(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
        self.dispatch(CatalogAction::Invalidated);
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn state(&self) -> CatalogState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.inner.state.subscribe()
    }
}
