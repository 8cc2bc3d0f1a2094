//! Storefront client state shared by a UI or CLI.

use std::sync::{Arc, Mutex, PoisonError};

use lustre_core::cart::CartSummary;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tracing::info;

use crate::addresses::AddressBook;
use crate::api::{ApiClient, ApiError, Session};
use crate::cart::CartStore;
use crate::catalog::CatalogCache;
use crate::checkout::{Checkout, CheckoutRequest, PaymentWidget};
use crate::config::{Credentials, StorefrontConfig};
use crate::coupons::CouponBook;
use crate::navigation::{Destination, Navigator};

/// Every store wired to one session.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    catalog: CatalogCache,
    cart: CartStore,
    addresses: AddressBook,
    coupons: Mutex<CouponBook>,
}

impl Storefront {
    /// Create a signed-out storefront.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, navigator: Arc<dyn Navigator>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api, Session::new(), navigator)?;
        let catalog = CatalogCache::new(api.clone(), config.catalog_ttl);
        let cart = CartStore::new(api.clone());
        let addresses = AddressBook::new(api.clone());
        let coupons = Mutex::new(CouponBook::new(api.clone()));

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                catalog,
                cart,
                addresses,
                coupons,
            }),
        })
    }

    /// Create a storefront and sign in with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the client cannot be built or the login fails.
    pub async fn connect(
        config: StorefrontConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let credentials = config.credentials.clone();
        let storefront = Self::new(config, navigator)?;
        storefront.sign_in(&credentials).await?;
        Ok(storefront)
    }

    /// Authenticate with `credentials`. `Credentials::None` does nothing.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if a password login is rejected.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<(), ApiError> {
        match credentials {
            Credentials::None => Ok(()),
            Credentials::Password { email, password } => self.login(email, password).await,
            Credentials::Tokens { access, refresh } => {
                self.inner.api.restore(access.clone(), refresh.clone()).await;
                Ok(())
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` if the credentials are rejected.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), ApiError> {
        self.inner.api.login(email, password).await
    }

    /// Sign out: drop tokens and every per-customer store, then go to sign-in.
    pub async fn logout(&self) {
        self.inner.api.session().sign_out().await;
        self.inner.cart.clear();
        self.inner.addresses.clear();
        self.coupons().clear();
        info!("signed out");
        self.inner.api.navigate(Destination::SignIn);
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        self.inner.api.session()
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressBook {
        &self.inner.addresses
    }

    /// Coupon book for the current checkout session.
    #[must_use]
    pub fn coupons(&self) -> CouponBook {
        self.inner
            .coupons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a new checkout session: coupons are fetched again on next use.
    pub fn new_coupon_session(&self) {
        *self
            .inner
            .coupons
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = CouponBook::new(self.inner.api.clone());
    }

    /// Totals for the current cart and applied coupon.
    pub async fn summary(&self) -> CartSummary {
        let lines = self.inner.cart.state().items;
        let items = self.inner.catalog.enrich(&lines).await;
        let policy = &self.inner.config.shipping;

        let subtotal = CartSummary::compute(&items, Decimal::ZERO, policy).subtotal;
        let discount = self.coupons().discount(subtotal);
        CartSummary::compute(&items, discount, policy)
    }

    /// Checkout inputs from the current address, coupon and cart state.
    ///
    /// The remembered coupon is evaluated against the live subtotal and only
    /// sent when it still applies, so the order matches the shown total.
    pub async fn checkout_request(&self) -> CheckoutRequest {
        let summary = self.summary().await;
        let coupon_code = match self.coupons().reevaluate(summary.subtotal) {
            Some(Ok(applied)) => Some(applied.code),
            Some(Err(err)) => {
                info!(error = %err, "coupon no longer applies, ordering without it");
                None
            }
            None => None,
        };

        CheckoutRequest {
            address: self.inner.addresses.selected().map(|a| a.id),
            coupon_code,
            item_count: summary.item_count,
        }
    }

    /// A checkout orchestrator paying through `widget`.
    #[must_use]
    pub fn checkout(&self, widget: Arc<dyn PaymentWidget>) -> Checkout {
        Checkout::with_cart(
            self.inner.api.clone(),
            widget,
            self.inner.cart.clone(),
            self.inner.config.payment_timeout,
        )
    }
}
