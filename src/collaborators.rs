//! Page-specific collaborators the controller consumes, with reference
//! implementations used by the simulator and tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use pagewatch_filter::{cart_key, parse_date};

use crate::errors::CollaboratorError;

/// Decoded page route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PageRoute {
    pub page: String,
    pub params: HashMap<String, String>,
}

pub trait PageRouter: Send + Sync {
    fn parse_page_url(&self, url: &str) -> Result<PageRoute, CollaboratorError>;
}

/// One cart slot as scraped from the page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub items: u32,
    pub items_price_total: f64,
    pub remaining_budget: f64,
}

pub trait CartSource: Send + Sync {
    /// Cart slots keyed by `"{month}-{day}-{mealSlot}"`.
    fn cart_snapshot(&self) -> HashMap<String, CartEntry>;
}

pub trait CurrencyFormatter: Send + Sync {
    fn format(&self, amount: f64) -> String;
}

/// Budget still available for the page at `location`, if it has one.
pub trait BudgetLookup: Send + Sync {
    fn current_budget(&self, location: &str) -> Option<f64>;
}

/// Route decoding from the URL itself: the page is the last path segment,
/// params are the query pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryParamRouter;

impl PageRouter for QueryParamRouter {
    fn parse_page_url(&self, url: &str) -> Result<PageRoute, CollaboratorError> {
        let parsed = Url::parse(url).map_err(|source| CollaboratorError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let page = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
            .to_string();
        let params = parsed.query_pairs().into_owned().collect();
        Ok(PageRoute { page, params })
    }
}

/// In-memory cart, writable from tests and scenarios.
#[derive(Debug, Default)]
pub struct StaticCart {
    entries: RwLock<HashMap<String, CartEntry>>,
}

impl StaticCart {
    pub fn new(entries: HashMap<String, CartEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn set(&self, key: impl Into<String>, entry: CartEntry) {
        self.entries.write().insert(key.into(), entry);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl CartSource for StaticCart {
    fn cart_snapshot(&self) -> HashMap<String, CartEntry> {
        self.entries.read().clone()
    }
}

/// US dollar amounts: `$1,234.50`, `-$3.00`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UsdFormatter;

impl CurrencyFormatter for UsdFormatter {
    fn format(&self, amount: f64) -> String {
        let sign = if amount < 0.0 { "-" } else { "" };
        let fixed = format!("{:.2}", amount.abs());
        let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, digit) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }
        format!("{sign}${grouped}.{cents}")
    }
}

/// Remaining cart budget for the day and meal named by the route's `date`
/// (`YYYY-MM-DD`) and `meal` parameters.
pub struct CartBudgetLookup {
    router: Arc<dyn PageRouter>,
    cart: Arc<dyn CartSource>,
}

impl CartBudgetLookup {
    pub fn new(router: Arc<dyn PageRouter>, cart: Arc<dyn CartSource>) -> Self {
        Self { router, cart }
    }

    pub fn cart_key_for(&self, location: &str) -> Result<String, CollaboratorError> {
        let route = self.router.parse_page_url(location)?;
        let date = route
            .params
            .get("date")
            .ok_or(CollaboratorError::MissingParam("date"))?;
        let meal = route
            .params
            .get("meal")
            .ok_or(CollaboratorError::MissingParam("meal"))?;
        Ok(cart_key(parse_date(date)?, meal))
    }
}

impl BudgetLookup for CartBudgetLookup {
    fn current_budget(&self, location: &str) -> Option<f64> {
        let key = match self.cart_key_for(location) {
            Ok(key) => key,
            Err(err) => {
                debug!(target: "pagewatch.controller", %location, %err, "no budget for page");
                return None;
            }
        };
        let budget = self
            .cart
            .cart_snapshot()
            .get(&key)
            .map(|entry| entry.remaining_budget);
        debug!(target: "pagewatch.controller", %key, budget = ?budget, "budget looked up");
        budget
    }
}

/// Everything page-specific the controller needs.
#[derive(Clone)]
pub struct Collaborators {
    pub budget: Arc<dyn BudgetLookup>,
    pub formatter: Arc<dyn CurrencyFormatter>,
}

impl Collaborators {
    pub fn new(budget: Arc<dyn BudgetLookup>, formatter: Arc<dyn CurrencyFormatter>) -> Self {
        Self { budget, formatter }
    }

    /// Query-string routing over an in-memory cart, formatted in dollars.
    pub fn reference(cart: Arc<StaticCart>) -> Self {
        Self::new(
            Arc::new(CartBudgetLookup::new(Arc::new(QueryParamRouter), cart)),
            Arc::new(UsdFormatter),
        )
    }
}
