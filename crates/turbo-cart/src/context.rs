//! Session-level wiring of the cart engine.
//!
//! A [`CartContext`] owns one store, one visibility flag and one panel, and
//! exposes the storefront actions that touch more than one of them.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::cart::{CartOwner, CartStore, Product};
use crate::collab::{LogNavigator, Navigator, Notifier, TracingNotifier};
use crate::config::CartConfig;
use crate::dismiss::{InteractionHub, Rect, Region};
use crate::error::CartError;
use crate::ids::ElementId;
use crate::panel::CartPanel;
use crate::remote::{CartRemote, MemoryRemote};
use crate::visibility::CartVisibility;

/// Builder for [`CartContext`].
///
/// Anything not supplied falls back to an in-process stand-in: a
/// [`MemoryRemote`], a [`TracingNotifier`] and a [`LogNavigator`].
pub struct CartContextBuilder {
    config: CartConfig,
    remote: Option<Arc<dyn CartRemote>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
    hub: Option<InteractionHub>,
    region: Region,
}

impl CartContextBuilder {
    pub fn remote(self, remote: impl CartRemote + 'static) -> Self {
        self.shared_remote(Arc::new(remote))
    }

    /// Use a remote the caller keeps a handle to.
    pub fn shared_remote(mut self, remote: Arc<dyn CartRemote>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Interaction hub of the surface the panel renders on.
    pub fn hub(mut self, hub: InteractionHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Element and bounds of the rendered panel.
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn build(self) -> CartContext {
        let remote = self
            .remote
            .unwrap_or_else(|| Arc::new(MemoryRemote::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(LogNavigator));
        let hub = self.hub.unwrap_or_default();

        let store = Arc::new(CartStore::new(self.config, remote, notifier));
        let visibility = CartVisibility::new();
        let panel = Arc::new(CartPanel::new(
            store.clone(),
            visibility.clone(),
            hub.clone(),
            navigator,
            self.region,
        ));

        CartContext {
            store,
            visibility,
            panel,
            hub,
        }
    }
}

/// One shopper's cart engine.
#[derive(Debug, Clone)]
pub struct CartContext {
    store: Arc<CartStore>,
    visibility: CartVisibility,
    panel: Arc<CartPanel>,
    hub: InteractionHub,
}

impl CartContext {
    pub fn builder(config: CartConfig) -> CartContextBuilder {
        CartContextBuilder {
            config,
            remote: None,
            notifier: None,
            navigator: None,
            hub: None,
            region: Region::new(ElementId(0), Rect::default()),
        }
    }

    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    pub fn visibility(&self) -> &CartVisibility {
        &self.visibility
    }

    pub fn panel(&self) -> &Arc<CartPanel> {
        &self.panel
    }

    pub fn hub(&self) -> &InteractionHub {
        &self.hub
    }

    pub fn config(&self) -> &CartConfig {
        self.store.config()
    }

    /// Product page "add to cart".
    ///
    /// On viewports at least `open_on_add_min_width` wide the panel opens
    /// before the confirmation is awaited, so it shows the pending state.
    /// If the add is rejected locally a panel opened here is closed again.
    pub async fn add_to_cart(
        &self,
        product: &Product,
        quantity: i64,
        viewport_width: u32,
    ) -> Result<(), CartError> {
        let opened =
            viewport_width >= self.config().open_on_add_min_width && self.visibility.open();
        if opened {
            self.panel.sync();
        }

        let result = self.store.add_item(product, quantity).await;
        if result.is_err() && opened {
            self.panel.close();
        }
        result
    }

    /// Header cart button.
    pub fn open_cart(&self) {
        self.panel.open();
    }

    pub fn close_cart(&self) {
        self.panel.close();
    }

    /// Sign-in: the cart now belongs to `owner` and starts empty.
    pub fn on_login(&self, owner: CartOwner) {
        tracing::info!(?owner, "cart session started");
        self.store.reset_owner(owner);
    }

    /// Sign-out: empty the cart and hide the panel.
    pub fn on_logout(&self) {
        self.store.reset_owner(CartOwner::Anonymous);
        self.panel.close();
        tracing::info!("cart session ended");
    }

    /// Spawn [`CartPanel::run`] on the current runtime.
    pub fn spawn_panel_driver(&self) -> JoinHandle<()> {
        tokio::spawn(self.panel.clone().run())
    }
}
