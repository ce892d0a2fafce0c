use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use pagewatch_core_types::{NodeId, Visibility};
use pagewatch_dom::Document;

use crate::engine::{compute_container_visibility, compute_visibility};
use crate::extract::{extract_groups, extract_items, FilterSelectors};
use crate::metrics;
use crate::model::VisibilityMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemReport {
    pub node: NodeId,
    pub price: f64,
    pub visibility: Visibility,
}

/// Outcome of one filter pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterReport {
    pub max_price: Option<f64>,
    pub items: Vec<ItemReport>,
    pub containers: VisibilityMap,
    pub skipped: usize,
    /// Nodes whose display state actually changed.
    pub changed: usize,
}

impl FilterReport {
    pub fn hidden_items(&self) -> usize {
        self.items
            .iter()
            .filter(|item| !item.visibility.is_visible())
            .count()
    }
}

fn write_all(document: &Document, decisions: &VisibilityMap) -> usize {
    let mut changed = 0;
    for (node, visibility) in decisions.iter() {
        match document.set_visibility(node, visibility) {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(target: "pagewatch.filter", %node, %err, "visibility write failed");
            }
        }
    }
    changed
}

/// Read prices from `document`, decide visibility against `max_price`, and
/// write the decisions back: items first, then containers.
///
/// Items without a usable price are never filtered: they are shown, and a
/// container holding one stays visible.
///
/// Writes are visible to reads immediately; the caller decides when to
/// flush them as a mutation batch.
pub fn apply_filter(
    document: &Document,
    selectors: &FilterSelectors,
    max_price: Option<f64>,
) -> FilterReport {
    let started = Instant::now();
    let (extraction, groups, sheltered) = document.read(|tree| {
        let extraction = extract_items(tree, selectors);
        let groups = extract_groups(tree, selectors, &extraction.items);
        let sheltered: HashSet<NodeId> = groups
            .iter()
            .map(|group| group.element)
            .filter(|container| {
                extraction
                    .unpriced
                    .iter()
                    .any(|item| item != container && tree.is_inclusive_ancestor(*container, *item))
            })
            .collect();
        (extraction, groups, sheltered)
    });

    let mut item_visibility = compute_visibility(&extraction.items, max_price);
    for item in &extraction.unpriced {
        item_visibility.insert(*item, Visibility::Visible);
    }
    let container_visibility: VisibilityMap = compute_container_visibility(&groups, &item_visibility)
        .iter()
        .map(|(container, visibility)| {
            if sheltered.contains(&container) {
                (container, Visibility::Visible)
            } else {
                (container, visibility)
            }
        })
        .collect();

    let changed = write_all(document, &item_visibility) + write_all(document, &container_visibility);

    metrics::record_pass(
        started.elapsed(),
        extraction.items.len(),
        extraction.parse_failures(),
        extraction.missing(),
    );
    metrics::record_writes(changed);

    let items: Vec<ItemReport> = extraction
        .items
        .iter()
        .map(|item| ItemReport {
            node: item.element,
            price: item.price,
            visibility: item_visibility
                .get(item.element)
                .unwrap_or(Visibility::Visible),
        })
        .collect();
    let report = FilterReport {
        max_price,
        items,
        containers: container_visibility,
        skipped: extraction.skipped.len(),
        changed,
    };
    debug!(
        target: "pagewatch.filter",
        max_price = ?max_price,
        items = report.items.len(),
        hidden = report.hidden_items(),
        skipped = report.skipped,
        changed,
        "filter pass applied"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Page {
        doc: Document,
        section: NodeId,
        items: Vec<NodeId>,
    }

    fn page(prices: &[&str]) -> Page {
        let doc = Document::new("https://shop.test/menu", 16);
        let section = doc.create_element("section");
        doc.set_attribute(section, "class", "menu-section").unwrap();
        doc.append_child(doc.root(), section).unwrap();
        let items = prices
            .iter()
            .map(|price| {
                let item = doc.create_element("div");
                doc.set_attribute(item, "class", "menu-item").unwrap();
                let label = doc.create_element("span");
                doc.set_attribute(label, "class", "price").unwrap();
                doc.set_text(label, price).unwrap();
                doc.append_child(item, label).unwrap();
                doc.append_child(section, item).unwrap();
                item
            })
            .collect();
        doc.flush();
        Page {
            doc,
            section,
            items,
        }
    }

    fn selectors() -> FilterSelectors {
        FilterSelectors::parse(".menu-item", ".price", ".menu-section").unwrap()
    }

    #[test]
    fn writes_items_and_container_in_one_pass() {
        let page = page(&["$12.00", "$8.00", "$20.00"]);
        let report = apply_filter(&page.doc, &selectors(), Some(10.0));

        let states: Vec<_> = page
            .items
            .iter()
            .map(|item| page.doc.visibility(*item))
            .collect();
        assert_eq!(
            states,
            vec![Visibility::Hidden, Visibility::Visible, Visibility::Hidden]
        );
        assert_eq!(page.doc.visibility(page.section), Visibility::Visible);
        assert_eq!(report.hidden_items(), 2);
        assert_eq!(report.changed, 2);
    }

    #[test]
    fn container_hides_when_every_item_is_over_budget() {
        let page = page(&["$12.00", "$20.00"]);
        apply_filter(&page.doc, &selectors(), Some(10.0));
        assert_eq!(page.doc.visibility(page.section), Visibility::Hidden);

        // Lifting the budget restores everything.
        let report = apply_filter(&page.doc, &selectors(), None);
        assert_eq!(page.doc.visibility(page.section), Visibility::Visible);
        assert_eq!(report.hidden_items(), 0);
        assert_eq!(report.changed, 3);
    }

    #[test]
    fn unchanged_pass_records_nothing() {
        let page = page(&["$5.00"]);
        apply_filter(&page.doc, &selectors(), Some(10.0));
        assert!(page.doc.flush().is_none());
        let report = apply_filter(&page.doc, &selectors(), Some(10.0));
        assert_eq!(report.changed, 0);
        assert!(page.doc.flush().is_none());
    }

    #[test]
    fn unpriced_items_are_shown_again() {
        let page = page(&["$12.00", "$20.00"]);
        apply_filter(&page.doc, &selectors(), Some(10.0));
        assert_eq!(page.doc.visibility(page.items[1]), Visibility::Hidden);
        assert_eq!(page.doc.visibility(page.section), Visibility::Hidden);

        let label = page.doc.read(|tree| tree.children(page.items[1])[0]);
        page.doc.set_text(label, "Sold out").unwrap();
        let report = apply_filter(&page.doc, &selectors(), Some(10.0));
        assert_eq!(page.doc.visibility(page.items[0]), Visibility::Hidden);
        assert_eq!(page.doc.visibility(page.items[1]), Visibility::Visible);
        assert_eq!(page.doc.visibility(page.section), Visibility::Visible);
        assert_eq!(report.skipped, 1);

        apply_filter(&page.doc, &selectors(), None);
        assert!(page
            .items
            .iter()
            .all(|item| page.doc.visibility(*item).is_visible()));
    }

    #[test]
    fn report_serializes_for_the_cli() {
        let page = page(&["3"]);
        let report = apply_filter(&page.doc, &selectors(), Some(2.5));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["max_price"], 2.5);
        assert_eq!(json["items"][0]["visibility"], "hidden");
    }
}
