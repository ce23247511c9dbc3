//! End-to-end cart behaviour through the public API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use turbo_cart::dismiss::Rect;
use turbo_cart::prelude::*;

#[derive(Default)]
struct Notices(Mutex<Vec<(NoticeKind, String)>>);

impl Notifier for Notices {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.0.lock().unwrap().push((kind, message.to_string()));
    }
}

impl Notices {
    fn count(&self, kind: NoticeKind) -> usize {
        self.0.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }
}

type Answer = Result<Confirmation, RemoteError>;

/// Remote whose answers are released by the test, in any order.
#[derive(Default)]
struct GatedRemote {
    gates: Mutex<VecDeque<oneshot::Receiver<Answer>>>,
}

impl GatedRemote {
    fn gate(&self) -> oneshot::Sender<Answer> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    async fn next(&self) -> Answer {
        let gate = self.gates.lock().unwrap().pop_front();
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(RemoteError::Unavailable("gate dropped".into()))),
            None => Ok(Confirmation::ack()),
        }
    }
}

#[async_trait]
impl CartRemote for GatedRemote {
    async fn confirm_add(&self, _: &ProductId, _: i64) -> Answer {
        self.next().await
    }

    async fn confirm_update(&self, _: &ProductId, _: i64) -> Answer {
        self.next().await
    }

    async fn confirm_remove(&self, _: &ProductId) -> Answer {
        self.next().await
    }
}

const PANEL: ElementId = ElementId(100);

fn product(id: u64, price: i64) -> Product {
    Product::new(id, format!("Product {id}"), Money::new(price, Currency::USD)).unwrap()
}

fn context(remote: Arc<dyn CartRemote>, notices: Arc<Notices>) -> CartContext {
    CartContext::builder(CartConfig::default())
        .shared_remote(remote)
        .notifier(notices)
        .region(Region::new(PANEL, Rect::new(600.0, 0.0, 400.0, 800.0)))
        .build()
}

#[tokio::test]
async fn repeated_adds_accumulate_into_one_line() {
    let ctx = context(Arc::new(MemoryRemote::new()), Arc::default());
    let store = ctx.store();

    store.add_item(&product(1, 500), 2).await.unwrap();
    store.add_item(&product(1, 500), 3).await.unwrap();

    let items = store.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, ProductId::from(1u64));
    assert_eq!(items[0].quantity, 5);
    assert_eq!(store.total().unwrap().amount_cents, 2500);
}

#[tokio::test]
async fn update_to_zero_empties_cart() {
    let ctx = context(Arc::new(MemoryRemote::new()), Arc::default());
    ctx.store().add_item(&product(2, 1200), 1).await.unwrap();
    ctx.store()
        .update_quantity(&ProductId::from(2u64), 0)
        .await
        .unwrap();

    assert!(ctx.store().items().is_empty());
    ctx.open_cart();
    assert_eq!(ctx.panel().view(), Some(PanelView::Empty));
}

#[tokio::test]
async fn removing_absent_product_is_a_no_op() {
    let remote = Arc::new(MemoryRemote::new());
    let ctx = context(remote.clone(), Arc::default());

    ctx.store().remove_item(&ProductId::from(99u64)).await;
    assert!(ctx.store().items().is_empty());
    assert!(!ctx.store().is_loading());
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn outside_click_closes_open_cart() {
    let ctx = context(Arc::new(MemoryRemote::new()), Arc::default());
    assert_eq!(ctx.visibility().get(), Visibility::Closed);

    ctx.open_cart();
    assert_eq!(ctx.visibility().get(), Visibility::Open);

    ctx.hub()
        .dispatch(&PointerEvent::press(20.0, 20.0).through([ElementId(1)]));
    assert_eq!(ctx.visibility().get(), Visibility::Closed);
    assert_eq!(ctx.hub().listener_count(), 0);
}

#[tokio::test]
async fn failed_confirmation_keeps_quantity_and_notifies_once() {
    let remote = Arc::new(MemoryRemote::new());
    remote.reject(3u64);
    let notices = Arc::new(Notices::default());
    let ctx = context(remote, notices.clone());

    ctx.store().add_item(&product(3, 800), 4).await.unwrap();

    assert_eq!(ctx.store().item(&ProductId::from(3u64)).unwrap().quantity, 4);
    assert!(!ctx.store().is_loading());
    assert_eq!(notices.count(NoticeKind::Error), 1);
    assert_eq!(notices.count(NoticeKind::Success), 0);
}

#[tokio::test]
async fn late_confirmation_for_superseded_update_is_dropped() {
    let remote = Arc::new(GatedRemote::default());
    let notices = Arc::new(Notices::default());
    let ctx = context(remote.clone(), notices.clone());
    let store = ctx.store().clone();
    let id = ProductId::from(5u64);

    let add_gate = remote.gate();
    add_gate.send(Ok(Confirmation::with_quantity(1))).unwrap();
    store.add_item(&product(5, 300), 1).await.unwrap();

    let first_gate = remote.gate();
    let second_gate = remote.gate();
    let mut revisions = store.subscribe();

    let first = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.update_quantity(&id, 2).await }
    });
    revisions
        .wait_for(|_| store.item(&id).is_some_and(|l| l.quantity == 2))
        .await
        .unwrap();

    let second = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.update_quantity(&id, 3).await }
    });
    revisions
        .wait_for(|_| store.item(&id).is_some_and(|l| l.quantity == 3))
        .await
        .unwrap();

    // Newer answer first, then the stale one.
    second_gate.send(Ok(Confirmation::with_quantity(3))).unwrap();
    second.await.unwrap().unwrap();
    assert!(store.is_loading());

    first_gate.send(Ok(Confirmation::with_quantity(2))).unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(store.item(&id).unwrap().quantity, 3);
    assert!(!store.is_loading());
    assert_eq!(notices.count(NoticeKind::Success), 2);
}

#[tokio::test]
async fn pending_remove_shows_loading_before_empty() {
    let remote = Arc::new(GatedRemote::default());
    let ctx = context(remote.clone(), Arc::default());
    let id = ProductId::from(6u64);

    // Add is answered at once; the remove waits on its gate.
    ctx.add_to_cart(&product(6, 900), 1, 1440).await.unwrap();
    let gate = remote.gate();

    let remove = tokio::spawn({
        let ctx = ctx.clone();
        let id = id.clone();
        async move { ctx.store().remove_item(&id).await }
    });
    let mut revisions = ctx.store().subscribe();
    revisions
        .wait_for(|_| ctx.store().is_loading())
        .await
        .unwrap();

    assert!(ctx.store().items().is_empty());
    assert_eq!(ctx.panel().view(), Some(PanelView::Loading));

    gate.send(Ok(Confirmation::with_quantity(0))).unwrap();
    remove.await.unwrap();
    assert_eq!(ctx.panel().view(), Some(PanelView::Empty));
}

#[tokio::test]
async fn overlapping_adds_answered_in_reverse_keep_the_sum() {
    let remote = Arc::new(GatedRemote::default());
    let ctx = context(remote.clone(), Arc::default());
    let store = ctx.store().clone();
    let id = ProductId::from(8u64);
    let first_gate = remote.gate();
    let second_gate = remote.gate();
    let mut revisions = store.subscribe();

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.add_item(&product(8, 250), 2).await }
    });
    revisions
        .wait_for(|_| store.item(&id).is_some_and(|l| l.quantity == 2))
        .await
        .unwrap();

    let second = tokio::spawn({
        let store = store.clone();
        async move { store.add_item(&product(8, 250), 3).await }
    });
    revisions
        .wait_for(|_| store.item(&id).is_some_and(|l| l.quantity == 5))
        .await
        .unwrap();

    // The remote applied the second add first, then the first.
    second_gate.send(Ok(Confirmation::with_quantity(3))).unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(store.item(&id).unwrap().quantity, 5);

    first_gate.send(Ok(Confirmation::with_quantity(5))).unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(store.item(&id).unwrap().quantity, 5);
    assert_eq!(store.total().unwrap().amount_cents, 1250);
    assert!(!store.is_loading());
}

#[tokio::test]
async fn adds_after_logout_start_from_zero() {
    let ctx = CartContext::builder(CartConfig::default()).build();
    let shirt = product(1, 500);

    ctx.add_to_cart(&shirt, 2, 1280).await.unwrap();
    ctx.on_logout();
    ctx.add_to_cart(&shirt, 1, 1280).await.unwrap();

    assert_eq!(ctx.store().item(&shirt.id).unwrap().quantity, 1);
    assert_eq!(ctx.store().item_count(), 1);
}

#[tokio::test]
async fn update_after_logout_uses_new_session_quantity() {
    let remote = Arc::new(MemoryRemote::new());
    let ctx = context(remote.clone(), Arc::default());
    let shirt = product(1, 500);

    ctx.store().add_item(&shirt, 4).await.unwrap();
    ctx.on_logout();
    ctx.store().add_item(&shirt, 1).await.unwrap();
    ctx.store().update_quantity(&shirt.id, 2).await.unwrap();

    assert_eq!(ctx.store().item(&shirt.id).unwrap().quantity, 2);
    assert_eq!(remote.quantity(&shirt.id), Some(2));
}

#[tokio::test]
async fn logout_while_confirming_leaves_cart_empty() {
    let remote = Arc::new(GatedRemote::default());
    let notices = Arc::new(Notices::default());
    let ctx = context(remote.clone(), notices.clone());
    let gate = remote.gate();

    let add = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.store().add_item(&product(7, 100), 2).await }
    });
    let mut revisions = ctx.store().subscribe();
    revisions
        .wait_for(|_| ctx.store().is_loading())
        .await
        .unwrap();

    ctx.on_logout();
    gate.send(Ok(Confirmation::with_quantity(2))).unwrap();
    add.await.unwrap().unwrap();

    assert!(ctx.store().items().is_empty());
    assert!(!ctx.store().is_loading());
    assert_eq!(notices.count(NoticeKind::Success), 0);
}

#[tokio::test]
async fn view_cart_closes_and_navigates() {
    #[derive(Default)]
    struct Routes(Mutex<Vec<String>>);

    impl Navigator for Routes {
        fn navigate_to(&self, route: &str) {
            self.0.lock().unwrap().push(route.to_string());
        }
    }

    let routes = Arc::new(Routes::default());
    let ctx = CartContext::builder(CartConfig::default())
        .navigator(routes.clone())
        .build();

    ctx.open_cart();
    ctx.panel().view_cart();

    assert!(!ctx.visibility().is_open());
    assert_eq!(*routes.0.lock().unwrap(), vec!["/carts".to_string()]);
}
