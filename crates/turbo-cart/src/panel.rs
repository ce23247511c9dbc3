//! The cart overlay: what it shows and how it opens and closes.
//!
//! The panel picks one of three states from the store, in priority order:
//! a pending confirmation shows [`PanelState::Loading`] even when the cart is
//! empty, so an empty cart never flashes before the first answer arrives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::cart::{compute_totals, CartStore, LineItem};
use crate::collab::Navigator;
use crate::dismiss::{InteractionHub, Rect, Region, Subscription};
use crate::error::CartError;
use crate::ids::ProductId;
use crate::money::Money;
use crate::visibility::CartVisibility;

/// What the open panel displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelState {
    Loading,
    Empty,
    Populated,
}

impl PanelState {
    /// Loading first, then emptiness.
    pub fn select(is_loading: bool, line_count: usize) -> Self {
        if is_loading {
            PanelState::Loading
        } else if line_count == 0 {
            PanelState::Empty
        } else {
            PanelState::Populated
        }
    }
}

/// One rendered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineView {
    pub product_id: ProductId,
    pub title: String,
    pub image: Option<String>,
    pub quantity: i64,
    pub unit_price: String,
    pub line_total: String,
}

impl LineView {
    fn from_item(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            title: item.title.clone(),
            image: item.image.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.display(),
            line_total: item
                .line_total()
                .map(|m| m.display())
                .unwrap_or_else(|_| UNAVAILABLE.to_string()),
        }
    }
}

const UNAVAILABLE: &str = "\u{2014}";

/// Render model for the open panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PanelView {
    Loading,
    Empty,
    Populated {
        lines: Vec<LineView>,
        item_count: i64,
        total: Money,
        total_display: String,
    },
}

impl PanelView {
    pub fn state(&self) -> PanelState {
        match self {
            PanelView::Loading => PanelState::Loading,
            PanelView::Empty => PanelState::Empty,
            PanelView::Populated { .. } => PanelState::Populated,
        }
    }
}

type DismissSlot = Mutex<Option<Subscription>>;

fn lock_slot(slot: &DismissSlot) -> MutexGuard<'_, Option<Subscription>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The cart overlay.
///
/// While the shared visibility flag is open, the panel keeps an outside
/// listener on its region; a press outside closes the flag. Closing by any
/// route releases the listener.
pub struct CartPanel {
    store: Arc<CartStore>,
    visibility: CartVisibility,
    hub: InteractionHub,
    navigator: Arc<dyn Navigator>,
    region: Mutex<Region>,
    dismiss: Arc<DismissSlot>,
}

impl std::fmt::Debug for CartPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartPanel")
            .field("visibility", &self.visibility)
            .field("dismiss_active", &self.is_dismiss_active())
            .finish_non_exhaustive()
    }
}

impl CartPanel {
    pub fn new(
        store: Arc<CartStore>,
        visibility: CartVisibility,
        hub: InteractionHub,
        navigator: Arc<dyn Navigator>,
        region: Region,
    ) -> Self {
        Self {
            store,
            visibility,
            hub,
            navigator,
            region: Mutex::new(region),
            dismiss: Arc::new(Mutex::new(None)),
        }
    }

    fn region(&self) -> Region {
        *self.region.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, whether or not the panel is open.
    pub fn state(&self) -> PanelState {
        let snapshot = self.store.snapshot();
        PanelState::select(snapshot.is_loading, snapshot.items.len())
    }

    /// Render model, or `None` while the panel is closed.
    pub fn view(&self) -> Option<PanelView> {
        if !self.visibility.is_open() {
            return None;
        }
        Some(self.render())
    }

    /// Render model regardless of visibility.
    pub fn render(&self) -> PanelView {
        let snapshot = self.store.snapshot();
        match PanelState::select(snapshot.is_loading, snapshot.items.len()) {
            PanelState::Loading => PanelView::Loading,
            PanelState::Empty => PanelView::Empty,
            PanelState::Populated => {
                let lines = snapshot.items.iter().map(LineView::from_item).collect();
                let currency = self.store.config().currency;
                let (item_count, total, total_display) =
                    match compute_totals(&snapshot.items, currency) {
                        Ok(t) => (t.item_count, t.total, t.total.display()),
                        Err(error) => {
                            tracing::error!(%error, "cart total unavailable");
                            (
                                snapshot.items.iter().map(|i| i.quantity).sum(),
                                Money::zero(currency),
                                UNAVAILABLE.to_string(),
                            )
                        }
                    };
                PanelView::Populated {
                    lines,
                    item_count,
                    total,
                    total_display,
                }
            }
        }
    }

    /// Attach or release the outside listener to match the visibility flag.
    pub fn sync(&self) {
        let open = self.visibility.is_open();
        let mut slot = lock_slot(&self.dismiss);
        match (open, slot.is_some()) {
            (true, false) => {
                let visibility = self.visibility.clone();
                let weak_slot: Weak<DismissSlot> = Arc::downgrade(&self.dismiss);
                let subscription = self.hub.observe(self.region(), move |_| {
                    visibility.close();
                    if let Some(slot) = weak_slot.upgrade() {
                        let released = lock_slot(&slot).take();
                        drop(released);
                    }
                });
                *slot = Some(subscription);
                tracing::debug!("cart panel dismiss listener attached");
            }
            (false, true) => {
                let released = slot.take();
                drop(slot);
                drop(released);
                tracing::debug!("cart panel dismiss listener released");
            }
            _ => {}
        }
    }

    /// Whether an outside listener is registered.
    pub fn is_dismiss_active(&self) -> bool {
        lock_slot(&self.dismiss)
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Open the panel.
    pub fn open(&self) {
        self.visibility.open();
        self.sync();
    }

    /// Close control.
    pub fn close(&self) {
        self.visibility.close();
        self.sync();
    }

    /// Close and go to the full cart page.
    pub fn view_cart(&self) {
        self.close();
        self.navigator.navigate_to(&self.store.config().cart_route);
    }

    /// The panel moved or resized.
    pub fn set_bounds(&self, bounds: Rect) {
        let mut region = self.region.lock().unwrap_or_else(PoisonError::into_inner);
        region.bounds = bounds;
        if let Some(subscription) = lock_slot(&self.dismiss).as_ref() {
            subscription.update_bounds(bounds);
        }
    }

    /// Quantity control on a line. Rejected while a change is confirming.
    pub async fn change_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), CartError> {
        if !self.store.accepts_input() {
            return Err(CartError::Busy);
        }
        self.store.update_quantity(product_id, quantity).await
    }

    /// Remove control on a line. Rejected while a change is confirming.
    pub async fn remove_line(&self, product_id: &ProductId) -> Result<(), CartError> {
        if !self.store.accepts_input() {
            return Err(CartError::Busy);
        }
        self.store.remove_item(product_id).await;
        Ok(())
    }

    /// Follow the visibility flag until the task is dropped, keeping the
    /// outside listener in step with changes made by any holder of the flag.
    pub async fn run(self: Arc<Self>) {
        let mut changes = self.visibility.subscribe();
        self.sync();
        while changes.changed().await.is_ok() {
            self.sync();
        }
    }
}
