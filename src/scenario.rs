//! Scripted page scenarios for the `simulate` command and integration tests.
//!
//! A scenario describes an initial page, a cart, and a list of steps that
//! stand in for the uncontrolled page script and the user.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pagewatch_core_types::NodeId;
use pagewatch_dom::{Document, Selector};
use pagewatch_filter::FilterReport;

use crate::bootstrap::register;
use crate::collaborators::{CartEntry, Collaborators, StaticCart};
use crate::config::PageWatchConfig;
use crate::controller::{FilterState, OrchestrationController};
use crate::metrics::{self, PageWatchMetrics};

fn default_settle_ms() -> u64 {
    500
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Build the subtree detached; the caller inserts it.
    pub fn build(&self, document: &Document) -> Result<NodeId> {
        let node = document.create_element(&self.tag);
        if let Some(id) = &self.id {
            document.set_attribute(node, "id", id)?;
        }
        if let Some(class) = &self.class {
            document.set_attribute(node, "class", class)?;
        }
        for (name, value) in &self.attrs {
            document.set_attribute(node, name, value)?;
        }
        if let Some(text) = &self.text {
            document.set_text(node, text)?;
        }
        for child in &self.children {
            let child = child.build(document)?;
            document.append_child(node, child)?;
        }
        Ok(node)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Let time pass so debounced work can run.
    Wait { ms: u64 },
    /// The user clicks the budget toggle.
    Toggle { checked: bool },
    Navigate { url: String },
    Append { parent: String, nodes: Vec<NodeSpec> },
    Remove { selector: String },
    SetText { selector: String, text: String },
    SetAttribute { selector: String, name: String, value: String },
    /// Remove matching nodes and put them back where they were.
    Rerender { selector: String },
    Cart { key: String, entry: CartEntry },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub location: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub cart: HashMap<String, CartEntry>,
    #[serde(default)]
    pub page: Vec<NodeSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Quiet time after the last step before the report is taken.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Scenario {
    /// Parse YAML or JSON, chosen by file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
        } else {
            serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ItemView {
    pub node: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub price_text: Option<String>,
    pub visible: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub location: String,
    pub state: FilterState,
    pub label: String,
    pub items: Vec<ItemView>,
    pub last_pass: Option<FilterReport>,
    pub metrics: PageWatchMetrics,
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn select(document: &Document, raw: &str) -> Result<Vec<NodeId>> {
    let selector = Selector::parse(raw)?;
    let nodes = document.query_all(&selector);
    if nodes.is_empty() {
        bail!("no element matches {raw:?}");
    }
    Ok(nodes)
}

/// Apply one step. Mutations are flushed as a single batch.
pub async fn apply_step(
    controller: &OrchestrationController,
    cart: &StaticCart,
    step: &Step,
) -> Result<()> {
    let document = controller.document();
    debug!(step = ?step, "applying scenario step");
    match step {
        Step::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            return Ok(());
        }
        Step::Toggle { checked } => {
            let toggle = controller
                .toggle()
                .filter(|toggle| toggle.is_connected(document))
                .context("budget toggle is not mounted")?;
            document.set_checked(toggle.input, *checked)?;
        }
        Step::Navigate { url } => document.navigate(url.clone()),
        Step::Append { parent, nodes } => {
            let parent = select(document, parent)?[0];
            for spec in nodes {
                let node = spec.build(document)?;
                document.append_child(parent, node)?;
            }
        }
        Step::Remove { selector } => {
            for node in select(document, selector)? {
                document.remove(node)?;
            }
        }
        Step::SetText { selector, text } => {
            for node in select(document, selector)? {
                document.set_text(node, text)?;
            }
        }
        Step::SetAttribute {
            selector,
            name,
            value,
        } => {
            for node in select(document, selector)? {
                document.set_attribute(node, name, value)?;
            }
        }
        Step::Rerender { selector } => {
            for node in select(document, selector)? {
                let parent = document
                    .parent(node)
                    .with_context(|| format!("{selector:?} matched a detached node"))?;
                document.remove(node)?;
                document.append_child(parent, node)?;
            }
        }
        Step::Cart { key, entry } => cart.set(key.clone(), *entry),
    }
    document.flush();
    settle().await;
    Ok(())
}

/// Build the page, register the controller, play every step, and report.
pub async fn run_scenario(scenario: &Scenario, mut config: PageWatchConfig) -> Result<ScenarioReport> {
    if let Some(enabled) = scenario.enabled {
        config.enabled_default = enabled;
    }
    let document = Document::new(scenario.location.clone(), config.bus_capacity);
    for spec in &scenario.page {
        let node = spec.build(&document)?;
        document.append_child(document.root(), node)?;
    }
    document.flush();

    let cart = Arc::new(StaticCart::new(scenario.cart.clone()));
    let item_selector = config.filter_selectors()?;
    let controller = register(
        document.clone(),
        config,
        Collaborators::reference(Arc::clone(&cart)),
    )
    .await
    .context("registering controller")?;
    info!(steps = scenario.steps.len(), "scenario started");

    for (index, step) in scenario.steps.iter().enumerate() {
        apply_step(&controller, &cart, step)
            .await
            .with_context(|| format!("step {} failed", index + 1))?;
    }
    tokio::time::sleep(Duration::from_millis(scenario.settle_ms)).await;
    settle().await;

    let items = document.read(|tree| {
        tree.query_all(&item_selector.item)
            .into_iter()
            .map(|node| ItemView {
                node,
                id: tree.attribute(node, "id").map(str::to_string),
                price_text: tree
                    .query_within(node, &item_selector.price)
                    .into_iter()
                    .find(|label| *label != node)
                    .map(|label| tree.text_content(label)),
                visible: tree.visibility(node).is_visible(),
            })
            .collect()
    });
    let report = ScenarioReport {
        location: document.location(),
        state: controller.state(),
        label: controller.label(),
        items,
        last_pass: controller.last_report(),
        metrics: metrics::snapshot(),
    };
    controller.shutdown();
    Ok(report)
}
