//! Open/closed flag for the cart overlay.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Whether the cart overlay is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Open,
    #[default]
    Closed,
}

impl Visibility {
    pub fn is_open(self) -> bool {
        self == Visibility::Open
    }
}

impl From<bool> for Visibility {
    fn from(open: bool) -> Self {
        if open {
            Visibility::Open
        } else {
            Visibility::Closed
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Shared handle to the overlay flag.
///
/// Clones refer to the same flag. Any holder may open or close it; readers
/// can [`subscribe`](Self::subscribe) to follow changes. Setting the current
/// value again does not notify subscribers.
#[derive(Clone)]
pub struct CartVisibility {
    tx: Arc<watch::Sender<Visibility>>,
}

impl fmt::Debug for CartVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CartVisibility").field(&self.get()).finish()
    }
}

impl CartVisibility {
    /// Create a closed flag.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Visibility::Closed);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> Visibility {
        *self.tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.get().is_open()
    }

    /// Set the flag. Returns whether it changed.
    pub fn set(&self, visibility: Visibility) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == visibility {
                return false;
            }
            *current = visibility;
            true
        });
        if changed {
            tracing::debug!(%visibility, "cart visibility changed");
        }
        changed
    }

    pub fn open(&self) -> bool {
        self.set(Visibility::Open)
    }

    pub fn close(&self) -> bool {
        self.set(Visibility::Closed)
    }

    pub fn toggle(&self) -> Visibility {
        let next = match self.get() {
            Visibility::Open => Visibility::Closed,
            Visibility::Closed => Visibility::Open,
        };
        self.set(next);
        next
    }

    /// Receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<Visibility> {
        self.tx.subscribe()
    }
}

impl Default for CartVisibility {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_closed() {
        let visibility = CartVisibility::new();
        assert_eq!(visibility.get(), Visibility::Closed);
        assert!(!visibility.is_open());
    }

    #[test]
    fn test_clones_share_state() {
        let header = CartVisibility::new();
        let panel = header.clone();

        assert!(header.open());
        assert!(panel.is_open());
        assert!(panel.close());
        assert!(!header.is_open());
    }

    #[test]
    fn test_set_same_value_reports_no_change() {
        let visibility = CartVisibility::new();
        let rx = visibility.subscribe();
        assert!(!visibility.close());
        assert!(!rx.has_changed().unwrap());

        assert!(visibility.open());
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_toggle() {
        let visibility = CartVisibility::new();
        assert_eq!(visibility.toggle(), Visibility::Open);
        assert_eq!(visibility.toggle(), Visibility::Closed);
    }

    #[tokio::test]
    async fn test_subscriber_sees_transitions() {
        let visibility = CartVisibility::new();
        let mut rx = visibility.subscribe();

        visibility.open();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Visibility::Open);

        visibility.close();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Visibility::Closed);
    }
}
