use std::sync::Arc;

use pagewatch_cli::{debug_handle, register, Collaborators, Document, PageWatchConfig};

fn page(location: &str) -> Document {
    let doc = Document::new(location, 16);
    let host = doc.create_element("div");
    doc.set_attribute(host, "class", "menu-filters").unwrap();
    doc.append_child(doc.root(), host).unwrap();
    doc.flush();
    doc
}

#[tokio::test(start_paused = true)]
async fn debug_handle_follows_the_live_controller() {
    assert!(debug_handle().is_none());

    let first = register(
        page("https://shop.test/order/menu?date=2024-03-05&meal=lunch"),
        PageWatchConfig::default(),
        Collaborators::reference(Arc::default()),
    )
    .await
    .unwrap();
    let handle = debug_handle().unwrap();
    assert_eq!(handle.controller.document().location(), first.document().location());
    assert_eq!(handle.utils.format_usd(15.5), "$15.50");

    first.shutdown();
    assert!(debug_handle().is_none());

    let second = register(
        page("https://shop.test/order/menu?date=2024-03-06&meal=dinner"),
        PageWatchConfig::default(),
        Collaborators::reference(Arc::default()),
    )
    .await
    .unwrap();
    let handle = debug_handle().unwrap();
    assert_eq!(
        handle.controller.document().location(),
        "https://shop.test/order/menu?date=2024-03-06&meal=dinner"
    );
    second.shutdown();
}
