use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pagewatch_cli::{
    bootstrap, register, CartEntry, Collaborators, ControllerError, Document,
    PageWatchConfig, StaticCart,
};
use pagewatch_core_types::{NodeId, Visibility};
use tokio::time::advance;

const LOCATION: &str = "https://shop.test/order/menu?date=2024-03-05&meal=lunch";

struct Page {
    doc: Document,
    host: NodeId,
    tabs: NodeId,
    category: NodeId,
    cart: NodeId,
    banner: NodeId,
}

fn element(doc: &Document, tag: &str, class: &str, parent: NodeId) -> NodeId {
    let node = doc.create_element(tag);
    doc.set_attribute(node, "class", class).unwrap();
    doc.append_child(parent, node).unwrap();
    node
}

fn menu_item(doc: &Document, parent: NodeId, id: &str, price: &str) -> NodeId {
    let item = doc.create_element("div");
    doc.set_attribute(item, "id", id).unwrap();
    doc.set_attribute(item, "class", "menu-item").unwrap();
    let label = doc.create_element("span");
    doc.set_attribute(label, "class", "menu-item-price").unwrap();
    doc.set_text(label, price).unwrap();
    doc.append_child(item, label).unwrap();
    doc.append_child(parent, item).unwrap();
    item
}

fn page(prices: &[(&str, &str)]) -> (Page, Vec<NodeId>) {
    let doc = Document::new(LOCATION, 64);
    let root = doc.root();
    let host = element(&doc, "div", "menu-filters", root);
    let tabs = element(&doc, "nav", "menu-list", root);
    let region = element(&doc, "div", "menu-items", root);
    let category = element(&doc, "section", "menu-category", region);
    let items = prices
        .iter()
        .map(|(id, price)| menu_item(&doc, category, id, price))
        .collect();
    let cart = element(&doc, "aside", "cart", root);
    let banner = element(&doc, "div", "banner", root);
    doc.flush();
    (
        Page {
            doc,
            host,
            tabs,
            category,
            cart,
            banner,
        },
        items,
    )
}

fn cart_with(entries: &[(&str, f64)]) -> Arc<StaticCart> {
    let cart = Arc::new(StaticCart::default());
    for (key, remaining) in entries {
        cart.set(
            *key,
            CartEntry {
                items: 1,
                items_price_total: 4.0,
                remaining_budget: *remaining,
            },
        );
    }
    cart
}

fn config(enabled: bool) -> PageWatchConfig {
    PageWatchConfig {
        enabled_default: enabled,
        ..PageWatchConfig::default()
    }
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

fn visibility(doc: &Document, nodes: &[NodeId]) -> Vec<Visibility> {
    nodes.iter().map(|node| doc.visibility(*node)).collect()
}

#[tokio::test(start_paused = true)]
async fn toggle_enables_budget_and_updates_label() {
    let (page, items) = page(&[("soup", "$12.00"), ("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(false), Collaborators::reference(cart))
        .await
        .unwrap();

    assert_eq!(controller.label(), "Filter by budget");
    assert_eq!(controller.state().budget, None);
    assert!(visibility(&page.doc, &items).iter().all(|v| v.is_visible()));

    let toggle = controller.toggle().unwrap();
    assert!(!page.doc.is_checked(toggle.input));
    page.doc.set_checked(toggle.input, true).unwrap();
    page.doc.flush();
    settle().await;

    let state = controller.state();
    assert!(state.enabled);
    assert_eq!(state.budget, Some(15.5));
    assert_eq!(controller.label(), "Filter by budget ($15.50 available)");
    assert_eq!(
        page.doc.text_content(toggle.text),
        "Filter by budget ($15.50 available)"
    );
    assert_eq!(
        visibility(&page.doc, &items),
        vec![Visibility::Visible, Visibility::Visible, Visibility::Hidden]
    );

    page.doc.set_checked(toggle.input, false).unwrap();
    page.doc.flush();
    settle().await;
    assert!(!controller.state().enabled);
    assert_eq!(controller.state().budget, None);
    assert_eq!(page.doc.text_content(toggle.text), "Filter by budget");
    assert!(visibility(&page.doc, &items).iter().all(|v| v.is_visible()));

    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn cart_change_recomputes_budget_and_cascades_to_category() {
    let (page, items) = page(&[("soup", "$12.00"), ("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(
        page.doc.clone(),
        config(true),
        Collaborators::reference(Arc::clone(&cart)),
    )
    .await
    .unwrap();
    settle().await;
    assert_eq!(
        visibility(&page.doc, &items),
        vec![Visibility::Visible, Visibility::Visible, Visibility::Hidden]
    );

    // Let the start-up cooldown lapse so the cart change leads.
    advance(Duration::from_millis(400)).await;
    settle().await;
    cart.set(
        "3-5-lunch",
        CartEntry {
            items: 2,
            items_price_total: 9.5,
            remaining_budget: 10.0,
        },
    );
    page.doc.set_attribute(page.cart, "data-count", "2").unwrap();
    page.doc.flush();
    settle().await;

    assert_eq!(controller.state().budget, Some(10.0));
    assert_eq!(
        visibility(&page.doc, &items),
        vec![Visibility::Hidden, Visibility::Visible, Visibility::Hidden]
    );
    assert_eq!(page.doc.visibility(page.category), Visibility::Visible);

    advance(Duration::from_millis(400)).await;
    settle().await;
    cart.set(
        "3-5-lunch",
        CartEntry {
            items: 3,
            items_price_total: 17.5,
            remaining_budget: 2.0,
        },
    );
    page.doc.set_attribute(page.cart, "data-count", "3").unwrap();
    page.doc.flush();
    settle().await;
    assert_eq!(page.doc.visibility(page.category), Visibility::Hidden);
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn item_list_storm_runs_only_the_leading_pass() {
    let (page, _) = page(&[("salad", "$8.00")]);
    let cart = cart_with(&[("3-5-lunch", 10.0)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();
    advance(Duration::from_millis(400)).await;
    settle().await;

    let first = menu_item(&page.doc, page.category, "lobster", "$40.00");
    page.doc.flush();
    settle().await;
    assert_eq!(page.doc.visibility(first), Visibility::Hidden);

    // Inside the cooldown: suppressed, not queued.
    advance(Duration::from_millis(100)).await;
    let second = menu_item(&page.doc, page.category, "caviar", "$90.00");
    page.doc.flush();
    settle().await;
    assert_eq!(page.doc.visibility(second), Visibility::Visible);

    // After a quiet cooldown the next change leads again.
    advance(Duration::from_millis(400)).await;
    settle().await;
    let third = menu_item(&page.doc, page.category, "truffle", "$70.00");
    page.doc.flush();
    settle().await;
    assert_eq!(page.doc.visibility(second), Visibility::Hidden);
    assert_eq!(page.doc.visibility(third), Visibility::Hidden);
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn menu_list_change_runs_immediately() {
    let (page, items) = page(&[("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 30.0), ("3-6-lunch", 9.0)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();
    settle().await;
    assert!(visibility(&page.doc, &items).iter().all(|v| v.is_visible()));

    page.doc
        .navigate("https://shop.test/order/menu?date=2024-03-06&meal=lunch");
    page.doc.set_attribute(page.tabs, "data-active", "2024-03-06").unwrap();
    page.doc.flush();
    settle().await;
    assert_eq!(controller.state().budget, Some(9.0));
    assert_eq!(
        visibility(&page.doc, &items),
        vec![Visibility::Visible, Visibility::Hidden]
    );
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn navigation_refresh_is_trailing_debounced() {
    let (page, items) = page(&[("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 30.0), ("3-6-lunch", 9.0)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();
    advance(Duration::from_millis(400)).await;
    settle().await;

    page.doc
        .navigate("https://shop.test/order/menu?date=2024-03-06&meal=lunch");
    page.doc.set_attribute(page.banner, "data-seen", "1").unwrap();
    page.doc.flush();
    settle().await;
    assert_eq!(controller.state().budget, Some(30.0));

    advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(controller.state().budget, Some(30.0));

    advance(Duration::from_millis(60)).await;
    settle().await;
    assert_eq!(controller.state().budget, Some(9.0));
    assert_eq!(
        visibility(&page.doc, &items),
        vec![Visibility::Visible, Visibility::Hidden]
    );
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn rerendered_toggle_keeps_controller_state() {
    let (page, _) = page(&[("salad", "$8.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();
    settle().await;
    let toggle = controller.toggle().unwrap();

    page.doc.remove(toggle.root).unwrap();
    page.doc.flush();
    settle().await;
    assert_eq!(controller.toggle(), None);

    // The re-rendered control comes back unchecked with stale text.
    page.doc.set_checked(toggle.input, false).unwrap();
    page.doc.set_text(toggle.text, "Filter by budget").unwrap();
    page.doc.append_child(page.host, toggle.root).unwrap();
    page.doc.flush();
    settle().await;

    assert_eq!(controller.toggle(), Some(toggle));
    assert!(controller.state().enabled);
    assert!(page.doc.is_checked(toggle.input));
    assert_eq!(
        page.doc.text_content(toggle.text),
        "Filter by budget ($15.50 available)"
    );
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn rerendered_host_gets_a_new_toggle() {
    let (page, _) = page(&[("salad", "$8.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();
    settle().await;
    let old = controller.toggle().unwrap();

    page.doc.remove(page.host).unwrap();
    let host = page.doc.create_element("div");
    page.doc.set_attribute(host, "class", "menu-filters").unwrap();
    page.doc
        .insert_before(page.doc.root(), host, Some(page.tabs))
        .unwrap();
    page.doc.flush();
    settle().await;

    let fresh = controller.toggle().unwrap();
    assert_ne!(fresh.root, old.root);
    assert_eq!(page.doc.parent(fresh.root), Some(host));
    assert!(page.doc.is_checked(fresh.input));
    assert_eq!(
        page.doc.text_content(fresh.text),
        "Filter by budget ($15.50 available)"
    );
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn register_waits_for_a_late_host() {
    let doc = Document::new(LOCATION, 64);
    let writer = doc.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let host = writer.create_element("div");
        writer.set_attribute(host, "class", "menu-filters").unwrap();
        writer.append_child(writer.root(), host).unwrap();
        writer.flush();
    });

    let controller = register(
        doc.clone(),
        config(false),
        Collaborators::reference(Arc::default()),
    )
    .await
    .unwrap();
    assert!(controller.toggle().is_some());
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn missing_host_degrades_gracefully() {
    let doc = Document::new(LOCATION, 64);
    let config = PageWatchConfig {
        host_wait_timeout_ms: 500,
        ..PageWatchConfig::default()
    };

    let err = register(doc.clone(), config.clone(), Collaborators::reference(Arc::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::HostUnavailable(_)));

    assert!(bootstrap(doc, config, Collaborators::reference(Arc::default()))
        .await
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_reacting() {
    let (page, items) = page(&[("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(false), Collaborators::reference(cart))
        .await
        .unwrap();
    let toggle = controller.toggle().unwrap();
    controller.shutdown();
    settle().await;

    page.doc.set_checked(toggle.input, true).unwrap();
    page.doc.flush();
    settle().await;
    assert!(!controller.state().enabled);
    assert_eq!(page.doc.visibility(items[0]), Visibility::Visible);
    assert!(controller.observer().is_shut_down());
}

#[tokio::test(start_paused = true)]
async fn unpriced_item_is_shown_once_the_filter_is_off() {
    let (page, items) = page(&[("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();
    settle().await;
    let steak = items[1];
    assert_eq!(page.doc.visibility(steak), Visibility::Hidden);

    let label = page.doc.read(|tree| tree.children(steak)[0]);
    page.doc.set_text(label, "Sold out").unwrap();
    controller.set_enabled(false);
    settle().await;

    assert_eq!(controller.state().budget, None);
    assert_eq!(page.doc.visibility(steak), Visibility::Visible);
    assert_eq!(page.doc.visibility(page.category), Visibility::Visible);
    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn click_is_kept_when_another_pass_runs_first() {
    let (page, items) = page(&[("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(false), Collaborators::reference(cart))
        .await
        .unwrap();
    let toggle = controller.toggle().unwrap();

    page.doc.set_checked(toggle.input, true).unwrap();
    page.doc.flush();
    // Runs before the toggle watch has seen the click.
    controller.refresh();

    assert!(controller.state().enabled);
    assert_eq!(controller.state().budget, Some(15.5));
    assert!(page.doc.is_checked(toggle.input));
    assert_eq!(page.doc.visibility(items[1]), Visibility::Hidden);

    settle().await;
    assert!(controller.state().enabled);
    assert!(page.doc.is_checked(toggle.input));
    assert_eq!(
        page.doc.text_content(toggle.text),
        "Filter by budget ($15.50 available)"
    );
    controller.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn budget_is_never_kept_while_disabled() {
    let (page, _) = page(&[("salad", "$8.00"), ("steak", "$20.00")]);
    let cart = cart_with(&[("3-5-lunch", 15.5)]);
    let controller = register(page.doc.clone(), config(true), Collaborators::reference(cart))
        .await
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..3)
        .map(|worker| {
            let controller = controller.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut round = 0u32;
                while !stop.load(Ordering::Relaxed) {
                    if worker == 0 {
                        controller.set_enabled(round % 2 == 0);
                    } else {
                        controller.refresh();
                    }
                    round = round.wrapping_add(1);
                }
            })
        })
        .collect();

    for _ in 0..20_000 {
        let state = controller.state();
        assert!(
            state.enabled || state.budget.is_none(),
            "disabled filter kept a budget: {state:?}"
        );
    }
    stop.store(true, Ordering::Relaxed);
    for worker in workers {
        worker.join().unwrap();
    }
    controller.shutdown();
}
