//! Budget filter: decides which priced items fit a budget, cascades the
//! result onto their containers and writes it back onto the document.

pub mod apply;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod metrics;
pub mod model;
pub mod parse;

pub use apply::{apply_filter, FilterReport, ItemReport};
pub use engine::{compute_container_visibility, compute_visibility};
pub use errors::FilterError;
pub use extract::{extract_groups, extract_items, Extraction, FilterSelectors};
pub use metrics::FilterMetrics;
pub use model::{ContainerGroup, PriceItem, VisibilityMap};
pub use parse::{cart_key, parse_date, parse_price};
