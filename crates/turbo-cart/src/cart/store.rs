//! The cart store: optimistic local mutations, correlated remote confirmation.
//!
//! Every mutation is applied to the local cart before its confirmation is
//! requested, so readers see the change immediately. Each mutation takes a
//! ticket carrying a sequence number; a confirmation only reconciles the
//! local line if its ticket is still the newest one for that product and the
//! cart has not been cleared since. Late answers for superseded mutations are
//! dropped. Only updates and removes take the remote's quantity, and only
//! when no other confirmation for the line is still out; adds keep the
//! local sum.
//!
//! The store lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::cart::{compute_totals, Cart, CartOwner, CartTotals, LineItem, Product};
use crate::collab::{Catalog, NoticeKind, Notifier};
use crate::config::{CartConfig, FailurePolicy};
use crate::error::CartError;
use crate::ids::ProductId;
use crate::money::Money;
use crate::remote::{CartRemote, Confirmation, RemoteError};

/// Consistent view of the cart at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Lines in insertion order.
    pub items: Vec<LineItem>,
    /// A confirmation is outstanding.
    pub is_loading: bool,
    /// Change counter at the time of the snapshot.
    pub revision: u64,
}

/// Remote call a mutation needs confirmed.
#[derive(Debug, Clone)]
enum RemoteOp {
    Add { product_id: ProductId, quantity: i64 },
    Update { product_id: ProductId, quantity: i64 },
    Remove { product_id: ProductId },
}

impl RemoteOp {
    fn product_id(&self) -> &ProductId {
        match self {
            Self::Add { product_id, .. }
            | Self::Update { product_id, .. }
            | Self::Remove { product_id } => product_id,
        }
    }

    /// Adds report the remote's running total, which may include units this
    /// cart never held (another session, or a cart cleared since), so only
    /// updates and removes align the local line with the remote.
    fn reconciles(&self) -> bool {
        !matches!(self, Self::Add { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Self::Add { .. } => "Added to cart",
            Self::Update { .. } => "Cart updated",
            Self::Remove { .. } => "Removed from cart",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::Add { .. } => "Could not add item to cart",
            Self::Update { .. } => "Could not update cart",
            Self::Remove { .. } => "Could not remove item from cart",
        }
    }
}

/// Correlates a confirmation with the mutation that issued it.
#[derive(Debug)]
struct Ticket {
    seq: u64,
    epoch: u64,
    /// Line before the mutation, with its position.
    previous: Option<(usize, LineItem)>,
}

#[derive(Debug)]
struct StoreState {
    cart: Cart,
    /// Confirmations not yet settled.
    pending: usize,
    next_seq: u64,
    /// Newest issued sequence number per product.
    latest: HashMap<ProductId, u64>,
    /// Unsettled confirmations per product, across epochs.
    in_flight: HashMap<ProductId, usize>,
    /// Bumped by `clear`; tickets from older epochs are stale.
    epoch: u64,
}

impl StoreState {
    fn issue(&mut self, product_id: &ProductId, previous: Option<(usize, LineItem)>) -> Ticket {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.latest.insert(product_id.clone(), seq);
        *self.in_flight.entry(product_id.clone()).or_insert(0) += 1;
        self.pending += 1;
        Ticket {
            seq,
            epoch: self.epoch,
            previous,
        }
    }

    /// Mark one confirmation for `product_id` settled. Returns how many are
    /// still outstanding for it.
    fn release(&mut self, product_id: &ProductId) -> usize {
        self.pending = self.pending.saturating_sub(1);
        let Some(count) = self.in_flight.get_mut(product_id) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            self.in_flight.remove(product_id);
        }
        remaining
    }

    fn is_current(&self, product_id: &ProductId, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch && self.latest.get(product_id) == Some(&ticket.seq)
    }

    fn snapshot_line(&self, product_id: &ProductId) -> Option<(usize, LineItem)> {
        let index = self.cart.position(product_id)?;
        self.cart.items().get(index).cloned().map(|item| (index, item))
    }
}

/// Owner of the session's cart.
///
/// Shared as `Arc<CartStore>`; every mutation goes through its methods.
pub struct CartStore {
    state: Mutex<StoreState>,
    revision: watch::Sender<u64>,
    remote: Arc<dyn CartRemote>,
    notifier: Arc<dyn Notifier>,
    config: CartConfig,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create a store with an empty anonymous cart.
    pub fn new(
        config: CartConfig,
        remote: Arc<dyn CartRemote>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(StoreState {
                cart: Cart::new(CartOwner::Anonymous, config.currency),
                pending: 0,
                next_seq: 0,
                latest: HashMap::new(),
                in_flight: HashMap::new(),
                epoch: 0,
            }),
            revision,
            remote,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    fn check_limit(&self, quantity: i64) -> Result<(), CartError> {
        if quantity > self.config.max_quantity_per_item {
            return Err(CartError::QuantityExceedsLimit(
                quantity,
                self.config.max_quantity_per_item,
            ));
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Mutations
    // ----------------------------------------------------------------------

    /// Add `quantity` units of `product`.
    ///
    /// An existing line is incremented; otherwise a new line is appended with
    /// the product's current price. Only validation errors are returned; a
    /// failed confirmation is reported through the notifier.
    pub async fn add_item(&self, product: &Product, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        if product.unit_price.currency != self.config.currency {
            return Err(CartError::CurrencyMismatch {
                expected: self.config.currency.code().to_string(),
                got: product.unit_price.currency.code().to_string(),
            });
        }

        let ticket = {
            let mut state = self.lock();
            let previous = state.snapshot_line(&product.id);
            match state.cart.get_mut(&product.id) {
                Some(existing) => {
                    let new_quantity = existing
                        .quantity
                        .checked_add(quantity)
                        .ok_or(CartError::Overflow)?;
                    self.check_limit(new_quantity)?;
                    existing.quantity = new_quantity;
                }
                None => {
                    self.check_limit(quantity)?;
                    state.cart.push(LineItem::from_product(product, quantity));
                }
            }
            let ticket = state.issue(&product.id, previous);
            tracing::debug!(
                product_id = %product.id,
                quantity,
                seq = ticket.seq,
                "cart add applied locally"
            );
            ticket
        };
        self.bump();

        self.confirm(
            RemoteOp::Add {
                product_id: product.id.clone(),
                quantity,
            },
            ticket,
        )
        .await;
        Ok(())
    }

    /// Look up a product in `catalog` and add it.
    pub async fn add_by_id(
        &self,
        catalog: &dyn Catalog,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let product = catalog.product(product_id).await?;
        self.add_item(&product, quantity).await
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// Updating a product that is not in the cart does nothing.
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        new_quantity: i64,
    ) -> Result<(), CartError> {
        if new_quantity <= 0 {
            self.remove_item(product_id).await;
            return Ok(());
        }
        self.check_limit(new_quantity)?;

        let ticket = {
            let mut state = self.lock();
            let Some(previous) = state.snapshot_line(product_id) else {
                tracing::debug!(%product_id, "update for product not in cart ignored");
                return Ok(());
            };
            if let Some(line) = state.cart.get_mut(product_id) {
                line.quantity = new_quantity;
            }
            let ticket = state.issue(product_id, Some(previous));
            tracing::debug!(
                %product_id,
                quantity = new_quantity,
                seq = ticket.seq,
                "cart update applied locally"
            );
            ticket
        };
        self.bump();

        self.confirm(
            RemoteOp::Update {
                product_id: product_id.clone(),
                quantity: new_quantity,
            },
            ticket,
        )
        .await;
        Ok(())
    }

    /// Remove a line. Removing a product that is not in the cart does
    /// nothing: no remote call and no loading state.
    pub async fn remove_item(&self, product_id: &ProductId) {
        let ticket = {
            let mut state = self.lock();
            let Some(previous) = state.snapshot_line(product_id) else {
                return;
            };
            state.cart.remove(product_id);
            let ticket = state.issue(product_id, Some(previous));
            tracing::debug!(%product_id, seq = ticket.seq, "cart remove applied locally");
            ticket
        };
        self.bump();

        self.confirm(
            RemoteOp::Remove {
                product_id: product_id.clone(),
            },
            ticket,
        )
        .await;
    }

    /// Empty the cart locally, e.g. on logout.
    ///
    /// Confirmations still in flight settle afterwards without touching the
    /// emptied cart.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.cart.clear();
            state.latest.clear();
            state.epoch += 1;
            tracing::debug!(epoch = state.epoch, "cart cleared");
        }
        self.bump();
    }

    /// Hand the cart to a new owner, emptying it first.
    pub fn reset_owner(&self, owner: CartOwner) {
        self.clear();
        self.lock().cart.owner = owner;
        self.bump();
    }

    // ----------------------------------------------------------------------
    // Confirmation
    // ----------------------------------------------------------------------

    async fn confirm(&self, op: RemoteOp, ticket: Ticket) {
        let result = self.call_with_retry(&op).await;
        self.settle(&op, ticket, result);
    }

    async fn call_with_retry(&self, op: &RemoteOp) -> Result<Confirmation, RemoteError> {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            match self.call_remote(op).await {
                Ok(confirmation) => return Ok(confirmation),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        op = op.name(),
                        product_id = %op.product_id(),
                        attempt,
                        ?delay,
                        error = %e,
                        "retrying cart confirmation"
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_remote(&self, op: &RemoteOp) -> Result<Confirmation, RemoteError> {
        let timeout = self.config.confirm_timeout();
        let call = match op {
            RemoteOp::Add {
                product_id,
                quantity,
            } => self.remote.confirm_add(product_id, *quantity),
            RemoteOp::Update {
                product_id,
                quantity,
            } => self.remote.confirm_update(product_id, *quantity),
            RemoteOp::Remove { product_id } => self.remote.confirm_remove(product_id),
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout)),
        }
    }

    fn settle(&self, op: &RemoteOp, ticket: Ticket, result: Result<Confirmation, RemoteError>) {
        let product_id = op.product_id();
        let notice = {
            let mut state = self.lock();
            let outstanding = state.release(product_id);
            let current = state.is_current(product_id, &ticket);
            if current {
                state.latest.remove(product_id);
            }

            match result {
                Ok(confirmation) => {
                    if !current {
                        tracing::debug!(
                            op = op.name(),
                            %product_id,
                            seq = ticket.seq,
                            "stale confirmation dropped"
                        );
                        None
                    } else {
                        // An answer settled while others for the same line are
                        // still out cannot account for them.
                        match confirmation.quantity {
                            Some(remote_quantity) if op.reconciles() && outstanding == 0 => {
                                reconcile(
                                    &mut state.cart,
                                    product_id,
                                    remote_quantity,
                                    self.config.max_quantity_per_item,
                                );
                            }
                            _ => {}
                        }
                        tracing::info!(
                            op = op.name(),
                            %product_id,
                            seq = ticket.seq,
                            "cart change confirmed"
                        );
                        self.config
                            .notify_success
                            .then(|| (NoticeKind::Success, op.success_message().to_string()))
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        op = op.name(),
                        %product_id,
                        seq = ticket.seq,
                        %error,
                        "cart confirmation failed"
                    );
                    if current && self.config.failure_policy == FailurePolicy::Revert {
                        revert(&mut state.cart, product_id, ticket.previous);
                    }
                    Some((NoticeKind::Error, op.failure_message().to_string()))
                }
            }
        };
        self.bump();

        if let Some((kind, message)) = notice {
            self.notifier.notify(kind, &message);
        }
    }

    // ----------------------------------------------------------------------
    // Selectors
    // ----------------------------------------------------------------------

    /// Lines in insertion order.
    pub fn items(&self) -> Vec<LineItem> {
        self.lock().cart.items().to_vec()
    }

    /// Line for one product.
    pub fn item(&self, product_id: &ProductId) -> Option<LineItem> {
        self.lock().cart.get(product_id).cloned()
    }

    /// Copy of the whole cart.
    pub fn cart(&self) -> Cart {
        self.lock().cart.clone()
    }

    pub fn owner(&self) -> CartOwner {
        self.lock().cart.owner.clone()
    }

    /// True while any confirmation is outstanding.
    pub fn is_loading(&self) -> bool {
        self.lock().pending > 0
    }

    /// Whether user-input line mutations are accepted right now.
    pub fn accepts_input(&self) -> bool {
        !self.is_loading()
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> i64 {
        self.lock().cart.item_count()
    }

    /// Current total, derived from the lines.
    pub fn total(&self) -> Result<Money, CartError> {
        self.lock().cart.total()
    }

    pub fn totals(&self) -> Result<CartTotals, CartError> {
        let state = self.lock();
        compute_totals(state.cart.items(), state.cart.currency)
    }

    /// Items, loading flag and revision read under one lock.
    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.lock();
        CartSnapshot {
            items: state.cart.items().to_vec(),
            is_loading: state.pending > 0,
            revision: *self.revision.borrow(),
        }
    }

    /// Receiver that changes whenever the cart or loading flag does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// Align a line with the quantity the remote reports.
fn reconcile(cart: &mut Cart, product_id: &ProductId, remote_quantity: i64, max_quantity: i64) {
    if remote_quantity <= 0 {
        cart.remove(product_id);
        return;
    }
    if remote_quantity > max_quantity {
        tracing::warn!(
            %product_id,
            remote = remote_quantity,
            limit = max_quantity,
            "remote quantity above per-item limit ignored"
        );
        return;
    }
    match cart.get_mut(product_id) {
        Some(line) if line.quantity != remote_quantity => {
            tracing::info!(
                %product_id,
                local = line.quantity,
                remote = remote_quantity,
                "reconciled line quantity with remote"
            );
            line.quantity = remote_quantity;
        }
        Some(_) => {}
        None => {
            tracing::warn!(
                %product_id,
                remote = remote_quantity,
                "remote holds a line missing locally"
            );
        }
    }
}

/// Undo a mutation using the line as it was before.
fn revert(cart: &mut Cart, product_id: &ProductId, previous: Option<(usize, LineItem)>) {
    match previous {
        Some((index, item)) => cart.restore(index, item),
        None => {
            cart.remove(product_id);
        }
    }
    tracing::debug!(%product_id, "optimistic change reverted");
}
