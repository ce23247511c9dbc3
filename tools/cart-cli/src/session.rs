//! A cart session wired to the terminal.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use turbo_cart::dismiss::{PointerEvent, Rect};
use turbo_cart::prelude::*;

use crate::output::{visibility_badge, Output};

/// Records bundled for `demo`, `run` and `catalog`.
pub const DEMO_CATALOG: &str = include_str!("../data/catalog.json");

/// The rendered cart panel.
pub const PANEL_ELEMENT: ElementId = ElementId(1);
/// The page behind the panel.
pub const PAGE_ELEMENT: ElementId = ElementId(0);

/// Simulated viewport.
pub const VIEWPORT_WIDTH: u32 = 1280;

fn panel_bounds() -> Rect {
    Rect::new(880.0, 0.0, 400.0, 900.0)
}

/// One thing the engine told the outside world.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub at: String,
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct EventLog(Mutex<Vec<Event>>);

impl EventLog {
    fn record(&self, kind: &'static str, detail: impl Into<String>) {
        let event = Event {
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind,
            detail: detail.into(),
        };
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

/// Prints notices as they arrive.
struct ConsoleNotifier {
    output: Output,
    log: Arc<EventLog>,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => {
                self.output.success(message);
                self.log.record("success", message);
            }
            NoticeKind::Error => {
                self.output.warn(message);
                self.log.record("error", message);
            }
        }
    }
}

struct ConsoleNavigator {
    output: Output,
    log: Arc<EventLog>,
}

impl Navigator for ConsoleNavigator {
    fn navigate_to(&self, route: &str) {
        self.output.info(&format!("navigate → {}", route));
        self.log.record("navigate", route);
    }
}

/// Cart engine plus the stand-ins it talks to.
pub struct Session {
    pub cart: CartContext,
    pub remote: Arc<MemoryRemote>,
    pub catalog: StaticCatalog,
    pub log: Arc<EventLog>,
    output: Output,
}

impl Session {
    pub fn new(config: &CartConfig, latency: Duration, output: &Output) -> Result<Self> {
        let catalog = StaticCatalog::from_json(DEMO_CATALOG, config.currency)
            .context("Failed to load demo catalog")?;
        let log = Arc::new(EventLog::default());
        let remote = Arc::new(MemoryRemote::new().with_latency(latency));

        let cart = CartContext::builder(config.clone())
            .shared_remote(remote.clone())
            .notifier(Arc::new(ConsoleNotifier {
                output: output.clone(),
                log: log.clone(),
            }))
            .navigator(Arc::new(ConsoleNavigator {
                output: output.clone(),
                log: log.clone(),
            }))
            .region(Region::new(PANEL_ELEMENT, panel_bounds()))
            .build();

        Ok(Self {
            cart,
            remote,
            catalog,
            log,
            output: output.clone(),
        })
    }

    /// Resolve a product by id.
    pub async fn product(&self, id: &str) -> Result<Product> {
        let product = self
            .catalog
            .product(&ProductId::new(id))
            .await
            .with_context(|| format!("Unknown product '{}'", id))?;
        Ok(product)
    }

    /// A press on a control inside the panel.
    pub fn click_inside(&self) -> usize {
        let event = PointerEvent::press(900.0, 120.0).through([ElementId(2), PANEL_ELEMENT]);
        self.cart.hub().dispatch(&event)
    }

    /// A press on the page behind the panel.
    pub fn click_outside(&self) -> usize {
        let event = PointerEvent::press(200.0, 300.0).through([PAGE_ELEMENT]);
        self.cart.hub().dispatch(&event)
    }

    /// Wait until no confirmation is outstanding.
    pub async fn settle(&self) -> Result<()> {
        let store = self.cart.store();
        let mut revisions = store.subscribe();
        revisions
            .wait_for(|_| !store.is_loading())
            .await
            .context("Cart store closed")?;
        Ok(())
    }

    pub fn print_state(&self) {
        let store = self.cart.store();
        if self.output.is_json() {
            self.output.json(&serde_json::json!({
                "visibility": self.cart.visibility().get(),
                "is_loading": store.is_loading(),
                "items": store.items(),
                "panel": self.cart.panel().view(),
            }));
            return;
        }
        self.output.kv("cart", &visibility_badge(self.cart.visibility().is_open()));
        self.output.kv("loading", &store.is_loading().to_string());
        self.output.kv("state", &format!("{:?}", self.cart.panel().state()));
        self.output.panel(self.cart.panel().view().as_ref());
    }
}
