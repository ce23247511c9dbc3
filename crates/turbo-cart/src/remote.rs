//! Remote cart confirmation service.
//!
//! Every local cart mutation is mirrored to a remote store through
//! [`CartRemote`]. The store bounds each call with a timeout, so
//! implementations only need to eventually answer.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::ProductId;

/// Error settling a remote confirmation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote store refused the change.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// No answer within the configured timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Transport or service failure.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Rejections are final; the rest may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Successful answer from the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Confirmation {
    /// Quantity the remote now holds for the line, when it reports one.
    /// Zero means the remote no longer has the line.
    pub quantity: Option<i64>,
}

impl Confirmation {
    /// Plain acknowledgement without a quantity.
    pub fn ack() -> Self {
        Self { quantity: None }
    }

    /// Acknowledgement carrying the remote's quantity.
    pub fn with_quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
        }
    }
}

/// The remote side of the cart.
#[async_trait]
pub trait CartRemote: Send + Sync {
    /// Confirm that `quantity` units of a product were added.
    async fn confirm_add(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Confirmation, RemoteError>;

    /// Confirm that a line's quantity was set to `quantity`.
    async fn confirm_update(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Confirmation, RemoteError>;

    /// Confirm that a line was removed.
    async fn confirm_remove(&self, product_id: &ProductId) -> Result<Confirmation, RemoteError>;
}

/// In-process remote cart with configurable latency and failures.
///
/// Keeps its own quantities so confirmations report what a real backend
/// would hold after applying the same calls.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    quantities: Mutex<HashMap<ProductId, i64>>,
    rejected: Mutex<HashSet<ProductId>>,
    latency: Duration,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject all future changes to this product.
    pub fn reject(&self, product_id: impl Into<ProductId>) {
        self.rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product_id.into());
    }

    /// Simulate the service being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Quantity the remote currently holds for a product.
    pub fn quantity(&self, product_id: &ProductId) -> Option<i64> {
        self.quantities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .copied()
    }

    /// Number of confirmation calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn settle<F>(&self, product_id: &ProductId, apply: F) -> Result<Confirmation, RemoteError>
    where
        F: FnOnce(&mut HashMap<ProductId, i64>) -> i64,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("remote cart offline".into()));
        }
        let rejected = self
            .rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(product_id);
        if rejected {
            return Err(RemoteError::Rejected(format!(
                "product {product_id} cannot be changed"
            )));
        }
        let mut quantities = self.quantities.lock().unwrap_or_else(PoisonError::into_inner);
        let quantity = apply(&mut quantities);
        Ok(Confirmation::with_quantity(quantity))
    }
}

#[async_trait]
impl CartRemote for MemoryRemote {
    async fn confirm_add(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Confirmation, RemoteError> {
        self.settle(product_id, |quantities| {
            let entry = quantities.entry(product_id.clone()).or_insert(0);
            *entry = entry.saturating_add(quantity);
            *entry
        })
        .await
    }

    async fn confirm_update(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Confirmation, RemoteError> {
        self.settle(product_id, |quantities| {
            quantities.insert(product_id.clone(), quantity);
            quantity
        })
        .await
    }

    async fn confirm_remove(&self, product_id: &ProductId) -> Result<Confirmation, RemoteError> {
        self.settle(product_id, |quantities| {
            quantities.remove(product_id);
            0
        })
        .await
    }
}
