//! Pure visibility rules. Nothing here touches the document.

use pagewatch_core_types::Visibility;

use crate::model::{ContainerGroup, PriceItem, VisibilityMap};

/// Every item is visible without a budget; otherwise an item is visible iff
/// its price fits.
pub fn compute_visibility(items: &[PriceItem], max_price: Option<f64>) -> VisibilityMap {
    items
        .iter()
        .map(|item| {
            let visible = max_price.map_or(true, |max| item.price <= max);
            (item.element, Visibility::from_visible(visible))
        })
        .collect()
}

/// A container is visible iff at least one member is visible in `items`.
/// Containers without members are hidden.
pub fn compute_container_visibility(
    groups: &[ContainerGroup],
    items: &VisibilityMap,
) -> VisibilityMap {
    groups
        .iter()
        .map(|group| {
            let any_visible = group.members.iter().any(|member| {
                items
                    .get(member.element)
                    .is_some_and(|visibility| visibility.is_visible())
            });
            (group.element, Visibility::from_visible(any_visible))
        })
        .collect()
}
