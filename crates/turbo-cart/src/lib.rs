//! Shopping cart engine for TurboCommerce storefronts.
//!
//! This crate provides the stateful core behind a storefront's cart overlay:
//!
//! - **Cart**: line items keyed by product, optimistic mutations with
//!   correlated remote confirmation, derived totals
//! - **Visibility**: the shared open/closed flag for the cart overlay
//! - **Dismiss**: outside-interaction detection for an active region
//! - **Panel**: the Loading / Empty / Populated state machine the overlay renders
//!
//! Everything outside the engine (remote cart API, catalog, notifications,
//! routing) is reached through the traits in [`collab`] and [`remote`].
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cart::prelude::*;
//!
//! let ctx = CartContext::builder(CartConfig::default())
//!     .remote(MemoryRemote::new())
//!     .build();
//!
//! let product = Product::new(1u64, "Linen Shirt", Money::new(500, Currency::USD))?;
//! ctx.add_to_cart(&product, 2, 1280).await?;
//!
//! let view = ctx.panel().view();
//! ```

pub mod cart;
pub mod collab;
pub mod config;
pub mod context;
pub mod dismiss;
pub mod error;
pub mod ids;
pub mod money;
pub mod panel;
pub mod remote;
pub mod visibility;

pub use error::CartError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::CartError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Cart
    pub use crate::cart::{
        compute_total, parse_quantity_input, Cart, CartOwner, CartStore, CartTotals, LineItem,
        Product, QuantityStepper,
    };

    // Collaborators
    pub use crate::collab::{
        Catalog, CatalogError, CatalogRecord, Navigator, NoticeKind, Notifier, StaticCatalog,
        TracingNotifier,
    };
    pub use crate::remote::{CartRemote, Confirmation, MemoryRemote, RemoteError};

    // Overlay
    pub use crate::dismiss::{InteractionHub, PointerEvent, Region, Subscription};
    pub use crate::panel::{CartPanel, LineView, PanelState, PanelView};
    pub use crate::visibility::{CartVisibility, Visibility};

    pub use crate::config::{CartConfig, FailurePolicy, RetryConfig};
    pub use crate::context::CartContext;
}
