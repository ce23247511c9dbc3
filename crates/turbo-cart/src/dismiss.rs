//! Outside-interaction detection.
//!
//! An [`InteractionHub`] receives every pointer interaction of a surface.
//! Components register a [`Region`] with a callback and get a
//! [`Subscription`] back; while the subscription lives, the callback runs
//! once for each pointer press that lands outside the region. Dropping the
//! subscription removes the listener.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::ids::ElementId;

/// A position in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Edges are inside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && p.x <= self.x + self.width
            && p.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// One pointer interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub position: Point,
    /// Elements the event bubbles through, innermost first. Empty when the
    /// renderer only reports coordinates.
    #[serde(default)]
    pub path: Vec<ElementId>,
}

impl PointerEvent {
    /// A mouse press at `(x, y)`.
    pub fn press(x: f64, y: f64) -> Self {
        Self {
            kind: PointerKind::Mouse,
            phase: PointerPhase::Down,
            position: Point::new(x, y),
            path: Vec::new(),
        }
    }

    /// A touch start at `(x, y)`.
    pub fn touch(x: f64, y: f64) -> Self {
        Self {
            kind: PointerKind::Touch,
            ..Self::press(x, y)
        }
    }

    /// Set the bubbling path, innermost element first.
    pub fn through(mut self, path: impl IntoIterator<Item = ElementId>) -> Self {
        self.path = path.into_iter().collect();
        self
    }

    pub fn with_phase(mut self, phase: PointerPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Only presses count as interactions; moves and releases do not.
    pub fn is_qualifying(&self) -> bool {
        self.phase == PointerPhase::Down
    }
}

/// A rendered area that should not dismiss itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub element: ElementId,
    pub bounds: Rect,
}

impl Region {
    pub fn new(element: ElementId, bounds: Rect) -> Self {
        Self { element, bounds }
    }

    /// An event is inside when it bubbles through the region's element. With
    /// no path, fall back to the region's bounds.
    pub fn contains(&self, event: &PointerEvent) -> bool {
        if event.path.is_empty() {
            return self.bounds.contains(event.position);
        }
        event.path.contains(&self.element)
    }
}

type Callback = Arc<dyn Fn(&PointerEvent) + Send + Sync>;

struct Listener {
    region: Region,
    callback: Callback,
}

#[derive(Default)]
struct HubInner {
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl HubInner {
    fn listeners(&self) -> MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dispatch point for a surface's pointer interactions.
#[derive(Clone, Default)]
pub struct InteractionHub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for InteractionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl InteractionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `on_outside` for each qualifying interaction outside `region`
    /// until the returned subscription is dropped.
    pub fn observe<F>(&self, region: Region, on_outside: F) -> Subscription
    where
        F: Fn(&PointerEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().insert(
            id,
            Listener {
                region,
                callback: Arc::new(on_outside),
            },
        );
        tracing::trace!(listener = id, element = %region.element, "outside listener registered");
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver one interaction. Returns how many callbacks ran.
    ///
    /// Callbacks run without the hub locked, so they may drop their own or
    /// other subscriptions.
    pub fn dispatch(&self, event: &PointerEvent) -> usize {
        if !event.is_qualifying() {
            return 0;
        }
        let targets: Vec<(u64, Callback)> = self
            .inner
            .listeners()
            .iter()
            .filter(|(_, l)| !l.region.contains(event))
            .map(|(id, l)| (*id, l.callback.clone()))
            .collect();

        let mut fired = 0;
        for (id, callback) in targets {
            // Skip listeners removed by an earlier callback in this dispatch.
            if !self.inner.listeners().contains_key(&id) {
                continue;
            }
            callback(event);
            fired += 1;
        }
        fired
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}

/// Keeps an outside listener registered. Dropping it deregisters.
#[must_use = "dropping the subscription deregisters the listener immediately"]
pub struct Subscription {
    id: u64,
    hub: Weak<HubInner>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        let Some(hub) = self.hub.upgrade() else {
            return false;
        };
        let listeners = hub.listeners();
        listeners.contains_key(&self.id)
    }

    /// Move or resize the region being watched.
    pub fn update_bounds(&self, bounds: Rect) {
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let mut listeners = hub.listeners();
        if let Some(listener) = listeners.get_mut(&self.id) {
            listener.region.bounds = bounds;
        }
    }

    /// Deregister now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            // Take the listener out before it drops so its callback is not
            // destroyed while the hub is locked.
            let removed = hub.listeners().remove(&self.id);
            drop(removed);
            tracing::trace!(listener = self.id, "outside listener removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const PANEL: ElementId = ElementId(1);
    const CLOSE_BUTTON: ElementId = ElementId(2);
    const BACKDROP: ElementId = ElementId(0);

    fn panel_region() -> Region {
        Region::new(PANEL, Rect::new(600.0, 0.0, 400.0, 800.0))
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&PointerEvent) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_: &PointerEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_inside_never_fires() {
        let hub = InteractionHub::new();
        let (count, cb) = counter();
        let _sub = hub.observe(panel_region(), cb);

        // Bubbling up from a child control.
        hub.dispatch(&PointerEvent::press(10.0, 10.0).through([CLOSE_BUTTON, PANEL, BACKDROP]));
        // Coordinates only, inside bounds.
        hub.dispatch(&PointerEvent::press(700.0, 300.0));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_outside_fires_once_per_interaction() {
        let hub = InteractionHub::new();
        let (count, cb) = counter();
        let _sub = hub.observe(panel_region(), cb);

        assert_eq!(hub.dispatch(&PointerEvent::press(10.0, 10.0).through([BACKDROP])), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        hub.dispatch(&PointerEvent::touch(100.0, 100.0));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_press_phases_ignored() {
        let hub = InteractionHub::new();
        let (count, cb) = counter();
        let _sub = hub.observe(panel_region(), cb);

        hub.dispatch(&PointerEvent::press(10.0, 10.0).with_phase(PointerPhase::Move));
        hub.dispatch(&PointerEvent::press(10.0, 10.0).with_phase(PointerPhase::Up));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_deregisters() {
        let hub = InteractionHub::new();
        let (count, cb) = counter();
        let sub = hub.observe(panel_region(), cb);
        assert_eq!(hub.listener_count(), 1);
        assert!(sub.is_active());

        sub.cancel();
        assert_eq!(hub.listener_count(), 0);
        hub.dispatch(&PointerEvent::press(10.0, 10.0));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_drop_its_own_subscription() {
        let hub = InteractionHub::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let sub = {
            let slot = slot.clone();
            let count = count.clone();
            hub.observe(panel_region(), move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                let taken = slot.lock().unwrap().take();
                drop(taken);
            })
        };
        *slot.lock().unwrap() = Some(sub);

        hub.dispatch(&PointerEvent::press(10.0, 10.0));
        hub.dispatch(&PointerEvent::press(10.0, 10.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_update_bounds() {
        let hub = InteractionHub::new();
        let (count, cb) = counter();
        let sub = hub.observe(panel_region(), cb);

        sub.update_bounds(Rect::new(0.0, 0.0, 50.0, 50.0));
        hub.dispatch(&PointerEvent::press(10.0, 10.0));
        hub.dispatch(&PointerEvent::press(700.0, 300.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outlives_hub() {
        let hub = InteractionHub::new();
        let (_, cb) = counter();
        let sub = hub.observe(panel_region(), cb);
        drop(hub);
        assert!(!sub.is_active());
        drop(sub);
    }
}
