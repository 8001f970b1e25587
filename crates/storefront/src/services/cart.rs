//! Cart storage for guests and signed-in customers.
//!
//! Both carts implement [`CartStore`]:
//!
//! - [`SessionCart`] keeps a [`CartSnapshot`] in the tower-sessions session.
//!   Title and unit price are captured when a line is added.
//! - [`PersistentCart`] keeps lines in `shop.cart_item`. Title and price are
//!   read live from the catalog on every snapshot.
//!
//! Handlers pick one with [`ActiveCart::for_request`].

use std::future::Future;

use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use piffy_core::{
    CartLine, CartSnapshot, CurrencyCode, LineKey, PriceError, ProductId, QuantityChange, UserId,
    VariantId,
};

use crate::db::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::{CurrentUser, session_keys};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("variant {variant_id} not found for product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: VariantId,
    },

    #[error("price error: {0}")]
    Price(#[from] PriceError),
}

/// Storage for one cart.
///
/// `set_quantity` and `remove` return `false` when the line is not in the cart.
pub trait CartStore: Send + Sync {
    /// Add a priced line, merging into an existing line with the same key.
    fn add(&self, line: CartLine) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Change a line's quantity. [`QuantityChange::Remove`] and `Set(0)` drop it.
    fn set_quantity(
        &self,
        key: LineKey,
        change: QuantityChange,
    ) -> impl Future<Output = Result<bool, CartError>> + Send;

    /// Remove a line.
    fn remove(&self, key: LineKey) -> impl Future<Output = Result<bool, CartError>> + Send;

    /// Remove every line.
    fn clear(&self) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Current lines with prices.
    fn snapshot(&self) -> impl Future<Output = Result<CartSnapshot, CartError>> + Send;
}

/// Price a line from the live catalog.
///
/// # Errors
///
/// Returns `CartError::ProductNotFound` or `CartError::VariantNotFound` for
/// unknown ids, and `CartError::Price` if a variant adjustment makes the price
/// negative.
#[instrument(skip(pool))]
pub async fn price_line(
    pool: &PgPool,
    key: LineKey,
    quantity: u32,
    currency: CurrencyCode,
) -> Result<CartLine, CartError> {
    let catalog = CatalogRepository::new(pool);
    let product = catalog
        .get_product(key.product_id)
        .await?
        .ok_or(CartError::ProductNotFound(key.product_id))?;

    let (title, unit_price) = match key.variant_id {
        None => (product.title.clone(), product.price),
        Some(variant_id) => {
            let variant = catalog
                .get_variant(product.id, variant_id)
                .await?
                .ok_or(CartError::VariantNotFound {
                    product_id: product.id,
                    variant_id,
                })?;
            let price = variant.final_price(&product, currency)?;
            (format!("{} - {}", product.title, variant.name), price.amount)
        }
    };

    Ok(CartLine {
        key,
        title,
        unit_price,
        quantity,
    })
}

// =============================================================================
// Guest cart
// =============================================================================

/// Guest cart stored in the session under `session_keys::CART`.
#[derive(Debug, Clone)]
pub struct SessionCart {
    session: Session,
}

impl SessionCart {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    async fn load(&self) -> Result<CartSnapshot, CartError> {
        Ok(self
            .session
            .get::<CartSnapshot>(session_keys::CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, cart: &CartSnapshot) -> Result<(), CartError> {
        if cart.is_empty() {
            self.session.remove::<CartSnapshot>(session_keys::CART).await?;
        } else {
            self.session.insert(session_keys::CART, cart).await?;
        }
        Ok(())
    }
}

impl CartStore for SessionCart {
    async fn add(&self, line: CartLine) -> Result<(), CartError> {
        let mut cart = self.load().await?;
        cart.add(line);
        self.save(&cart).await
    }

    async fn set_quantity(&self, key: LineKey, change: QuantityChange) -> Result<bool, CartError> {
        let mut cart = self.load().await?;
        let found = cart.apply(&key, change);
        if found {
            self.save(&cart).await?;
        }
        Ok(found)
    }

    async fn remove(&self, key: LineKey) -> Result<bool, CartError> {
        self.set_quantity(key, QuantityChange::Remove).await
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.session.remove::<CartSnapshot>(session_keys::CART).await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<CartSnapshot, CartError> {
        self.load().await
    }
}

// =============================================================================
// Persistent cart
// =============================================================================

/// A signed-in customer's cart in `shop.cart`.
#[derive(Debug, Clone)]
pub struct PersistentCart {
    pool: PgPool,
    user_id: UserId,
}

impl PersistentCart {
    #[must_use]
    pub const fn new(pool: PgPool, user_id: UserId) -> Self {
        Self { pool, user_id }
    }
}

impl CartStore for PersistentCart {
    async fn add(&self, line: CartLine) -> Result<(), CartError> {
        CartRepository::new(&self.pool)
            .add(self.user_id, line.key, line.quantity)
            .await?;
        Ok(())
    }

    async fn set_quantity(&self, key: LineKey, change: QuantityChange) -> Result<bool, CartError> {
        let repo = CartRepository::new(&self.pool);
        let found = match change.normalized() {
            QuantityChange::Set(quantity) => repo.set_quantity(self.user_id, key, quantity).await?,
            QuantityChange::Remove => repo.remove(self.user_id, key).await?,
        };
        Ok(found)
    }

    async fn remove(&self, key: LineKey) -> Result<bool, CartError> {
        Ok(CartRepository::new(&self.pool)
            .remove(self.user_id, key)
            .await?)
    }

    async fn clear(&self) -> Result<(), CartError> {
        CartRepository::new(&self.pool).clear(self.user_id).await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<CartSnapshot, CartError> {
        let lines = CartRepository::new(&self.pool).lines(self.user_id).await?;
        Ok(CartSnapshot::new(lines))
    }
}

// =============================================================================
// Request-scoped selection
// =============================================================================

/// The cart that belongs to the current request.
#[derive(Debug, Clone)]
pub enum ActiveCart {
    Guest(SessionCart),
    Persistent(PersistentCart),
}

impl ActiveCart {
    /// Signed-in customers get their persistent cart, guests the session cart.
    #[must_use]
    pub fn for_request(pool: &PgPool, session: Session, user: Option<&CurrentUser>) -> Self {
        match user {
            Some(user) => Self::Persistent(PersistentCart::new(pool.clone(), user.id)),
            None => Self::Guest(SessionCart::new(session)),
        }
    }

    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl CartStore for ActiveCart {
    async fn add(&self, line: CartLine) -> Result<(), CartError> {
        match self {
            Self::Guest(cart) => cart.add(line).await,
            Self::Persistent(cart) => cart.add(line).await,
        }
    }

    async fn set_quantity(&self, key: LineKey, change: QuantityChange) -> Result<bool, CartError> {
        match self {
            Self::Guest(cart) => cart.set_quantity(key, change).await,
            Self::Persistent(cart) => cart.set_quantity(key, change).await,
        }
    }

    async fn remove(&self, key: LineKey) -> Result<bool, CartError> {
        match self {
            Self::Guest(cart) => cart.remove(key).await,
            Self::Persistent(cart) => cart.remove(key).await,
        }
    }

    async fn clear(&self) -> Result<(), CartError> {
        match self {
            Self::Guest(cart) => cart.clear().await,
            Self::Persistent(cart) => cart.clear().await,
        }
    }

    async fn snapshot(&self) -> Result<CartSnapshot, CartError> {
        match self {
            Self::Guest(cart) => cart.snapshot().await,
            Self::Persistent(cart) => cart.snapshot().await,
        }
    }
}

// =============================================================================
// In-memory cart for tests
// =============================================================================
