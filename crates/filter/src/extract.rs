use serde::Serialize;
use tracing::{debug, warn};

use pagewatch_core_types::NodeId;
use pagewatch_dom::{DomTree, Selector};

use crate::errors::FilterError;
use crate::model::{ContainerGroup, PriceItem};
use crate::parse::parse_price;

/// Where items, their price labels and their containers live in the page.
#[derive(Clone, Debug)]
pub struct FilterSelectors {
    pub item: Selector,
    pub price: Selector,
    pub container: Selector,
}

impl FilterSelectors {
    pub fn parse(item: &str, price: &str, container: &str) -> Result<Self, FilterError> {
        Ok(Self {
            item: Selector::parse(item)?,
            price: Selector::parse(price)?,
            container: Selector::parse(container)?,
        })
    }
}

/// Result of reading prices from the current tree.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Extraction {
    pub items: Vec<PriceItem>,
    /// Items matched by the item selector that carry no usable price.
    pub unpriced: Vec<NodeId>,
    #[serde(skip)]
    pub skipped: Vec<FilterError>,
}

impl Extraction {
    pub fn parse_failures(&self) -> usize {
        self.skipped
            .iter()
            .filter(|err| matches!(err, FilterError::Parse { .. }))
            .count()
    }

    pub fn missing(&self) -> usize {
        self.skipped
            .iter()
            .filter(|err| matches!(err, FilterError::MissingElement { .. }))
            .count()
    }
}

fn price_label(tree: &DomTree, item: NodeId, selector: &Selector) -> Option<NodeId> {
    tree.subtree(item)
        .into_iter()
        .skip(1)
        .find(|node| selector.matches(tree, *node))
}

fn read_item(tree: &DomTree, item: NodeId, selectors: &FilterSelectors) -> Result<PriceItem, FilterError> {
    let label = price_label(tree, item, &selectors.price).ok_or_else(|| {
        FilterError::MissingElement {
            item,
            selector: selectors.price.source().to_string(),
        }
    })?;
    let price = parse_price(&tree.text_content(label))?;
    Ok(PriceItem::new(item, price))
}

/// Read the price of every item. Items that cannot be priced are listed in
/// `unpriced`, their errors in `skipped`; neither aborts the pass.
pub fn extract_items(tree: &DomTree, selectors: &FilterSelectors) -> Extraction {
    let mut extraction = Extraction::default();
    for item in tree.query_all(&selectors.item) {
        match read_item(tree, item, selectors) {
            Ok(priced) => extraction.items.push(priced),
            Err(err @ FilterError::MissingElement { .. }) => {
                debug!(target: "pagewatch.filter", %item, %err, "item skipped");
                extraction.unpriced.push(item);
                extraction.skipped.push(err);
            }
            Err(err) => {
                warn!(target: "pagewatch.filter", %item, %err, "item skipped");
                extraction.unpriced.push(item);
                extraction.skipped.push(err);
            }
        }
    }
    extraction
}

/// Group priced items under every container that holds them.
pub fn extract_groups(
    tree: &DomTree,
    selectors: &FilterSelectors,
    items: &[PriceItem],
) -> Vec<ContainerGroup> {
    tree.query_all(&selectors.container)
        .into_iter()
        .map(|container| ContainerGroup {
            element: container,
            members: items
                .iter()
                .filter(|item| {
                    item.element != container && tree.is_inclusive_ancestor(container, item.element)
                })
                .copied()
                .collect(),
        })
        .collect()
}
