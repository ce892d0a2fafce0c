//! Orchestration: keeps the budget toggle, the budget and the item filter in
//! step with a page that keeps re-rendering itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use pagewatch_core_types::{EventKind, EventSet, NodeId};
use pagewatch_dom::{Document, Selector};
use pagewatch_filter::{apply_filter, FilterReport, FilterSelectors};
use pagewatch_observer::{ChangeObserver, WatchHandle};
use pagewatch_timing::{LeadingDebouncer, TrailingDebouncer};

use crate::collaborators::{Collaborators, CurrencyFormatter};
use crate::config::PageWatchConfig;
use crate::errors::ControllerError;
use crate::metrics;
use crate::toggle::{ToggleControl, TOGGLE_SELECTOR};

pub const BASE_LABEL: &str = "Filter by budget";

/// Controller state. `budget` is only ever present while `enabled`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FilterState {
    pub enabled: bool,
    pub budget: Option<f64>,
}

impl FilterState {
    pub fn label(&self, formatter: &dyn CurrencyFormatter) -> String {
        match self.budget {
            Some(budget) => format!("{BASE_LABEL} ({} available)", formatter.format(budget)),
            None => BASE_LABEL.to_string(),
        }
    }
}

/// What triggered a filter pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    Startup,
    Toggle,
    MenuList,
    ItemList,
    Cart,
    Navigation,
    Manual,
}

impl RefreshReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshReason::Startup => "startup",
            RefreshReason::Toggle => "toggle",
            RefreshReason::MenuList => "menu_list",
            RefreshReason::ItemList => "item_list",
            RefreshReason::Cart => "cart",
            RefreshReason::Navigation => "navigation",
            RefreshReason::Manual => "manual",
        }
    }
}

struct ControllerInner {
    document: Document,
    observer: ChangeObserver,
    config: PageWatchConfig,
    filter: FilterSelectors,
    host: Selector,
    collaborators: Collaborators,
    state: RwLock<FilterState>,
    toggle: Mutex<Option<ToggleControl>>,
    last_report: RwLock<Option<FilterReport>>,
    handles: Mutex<Vec<WatchHandle>>,
    // Serializes filter passes coming from different watch tasks.
    pass: Mutex<()>,
    leading: LeadingDebouncer<RefreshReason>,
    trailing: TrailingDebouncer<RefreshReason>,
    started: AtomicBool,
}

/// Cheap to clone; all clones drive the same controller.
#[derive(Clone)]
pub struct OrchestrationController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for OrchestrationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationController")
            .field("state", &*self.inner.state.read())
            .field("toggle", &*self.inner.toggle.lock())
            .field("watches", &self.inner.handles.lock().len())
            .finish()
    }
}

impl OrchestrationController {
    pub fn new(
        document: Document,
        config: PageWatchConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let filter = config.filter_selectors()?;
        let host = Selector::parse(&config.selectors.toggle_host)?;
        let cooldown = config.leading_cooldown();
        let navigation_wait = config.navigation_debounce();
        let enabled = config.enabled_default;

        let inner = Arc::new_cyclic(|weak: &Weak<ControllerInner>| {
            let leading_target = weak.clone();
            let trailing_target = weak.clone();
            ControllerInner {
                observer: ChangeObserver::new(document.clone()),
                document,
                config,
                filter,
                host,
                collaborators,
                state: RwLock::new(FilterState {
                    enabled,
                    budget: None,
                }),
                toggle: Mutex::new(None),
                last_report: RwLock::new(None),
                handles: Mutex::new(Vec::new()),
                pass: Mutex::new(()),
                leading: LeadingDebouncer::new(cooldown, move |reason| {
                    if let Some(inner) = leading_target.upgrade() {
                        inner.refresh(reason);
                    }
                }),
                trailing: TrailingDebouncer::new(navigation_wait, move |reason| {
                    if let Some(inner) = trailing_target.upgrade() {
                        inner.refresh(reason);
                    }
                }),
                started: AtomicBool::new(false),
            }
        });
        Ok(Self { inner })
    }

    /// Mount the toggle, subscribe to the page and run the first pass.
    /// Must run inside a tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) -> Result<(), ControllerError> {
        let inner = &self.inner;
        if inner.observer.is_shut_down() {
            return Err(ControllerError::ShutDown);
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let host = inner
            .document
            .query_first(&inner.host)
            .ok_or_else(|| ControllerError::MissingHost {
                selector: inner.config.selectors.toggle_host.clone(),
            })?;
        inner.mount_toggle(host)?;
        inner.install_watches(Arc::downgrade(inner))?;
        inner.refresh(RefreshReason::Startup);
        info!(
            target: "pagewatch.controller",
            enabled = inner.state.read().enabled,
            watches = inner.handles.lock().len(),
            "budget filter started"
        );
        Ok(())
    }

    pub fn state(&self) -> FilterState {
        *self.inner.state.read()
    }

    pub fn label(&self) -> String {
        self.state().label(self.inner.collaborators.formatter.as_ref())
    }

    pub fn toggle(&self) -> Option<ToggleControl> {
        *self.inner.toggle.lock()
    }

    pub fn last_report(&self) -> Option<FilterReport> {
        self.inner.last_report.read().clone()
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn observer(&self) -> &ChangeObserver {
        &self.inner.observer
    }

    /// Same effect as the user flipping the toggle.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.apply_toggle(enabled);
    }

    /// Run a filter pass right away.
    pub fn refresh(&self) {
        self.inner.refresh(RefreshReason::Manual);
    }

    /// Cancel every watch and pending debounced pass.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        for handle in inner.handles.lock().drain(..) {
            handle.cancel();
        }
        inner.trailing.cancel();
        inner.leading.cancel();
        inner.observer.shutdown();
        info!(target: "pagewatch.controller", "budget filter shut down");
    }
}

impl ControllerInner {
    fn install_watches(&self, weak: Weak<ControllerInner>) -> Result<(), ControllerError> {
        let structural = EventSet::of(&[EventKind::Added, EventKind::Removed, EventKind::Modified]);
        let mut handles = Vec::new();

        let target = weak.clone();
        handles.push(self.observer.watch_selector(TOGGLE_SELECTOR, structural, move |node, kind| {
            if let Some(inner) = target.upgrade() {
                inner.on_toggle_event(node, kind);
            }
        })?);

        let target = weak.clone();
        handles.push(self.observer.watch_selector(
            &self.config.selectors.toggle_host,
            EventSet::of(&[EventKind::Added]),
            move |root, _| {
                if let Some(inner) = target.upgrade() {
                    inner.on_host_added(root);
                }
            },
        )?);

        let target = weak.clone();
        handles.push(self.observer.watch_selector(
            &self.config.selectors.menu_list,
            structural,
            move |_, _| {
                if let Some(inner) = target.upgrade() {
                    inner.refresh(RefreshReason::MenuList);
                }
            },
        )?);

        for (selector, reason) in [
            (&self.config.selectors.item_list, RefreshReason::ItemList),
            (&self.config.selectors.cart_region, RefreshReason::Cart),
        ] {
            let target = weak.clone();
            handles.push(self.observer.watch_selector(selector, structural, move |_, _| {
                if let Some(inner) = target.upgrade() {
                    inner.leading.call(reason);
                }
            })?);
        }

        let target = weak;
        handles.push(self.observer.watch_navigation(move |location, previous| {
            if let Some(inner) = target.upgrade() {
                debug!(target: "pagewatch.controller", %location, %previous, "route changed");
                inner.trailing.call(RefreshReason::Navigation);
            }
        }));

        self.handles.lock().extend(handles);
        Ok(())
    }

    fn mount_toggle(&self, host: NodeId) -> Result<ToggleControl, ControllerError> {
        let state = *self.state.read();
        let label = state.label(self.collaborators.formatter.as_ref());
        let toggle = ToggleControl::mount(&self.document, host, state.enabled, &label)?;
        *self.toggle.lock() = Some(toggle);
        self.document.flush();
        debug!(target: "pagewatch.controller", %host, root = %toggle.root, "toggle mounted");
        Ok(toggle)
    }

    fn current_toggle(&self) -> Option<ToggleControl> {
        let toggle = (*self.toggle.lock())?;
        toggle.is_connected(&self.document).then_some(toggle)
    }

    fn attach_toggle(&self, toggle: ToggleControl) {
        let _pass = self.pass.lock();
        let previous = self.toggle.lock().replace(toggle);
        if previous != Some(toggle) {
            debug!(target: "pagewatch.controller", root = %toggle.root, "toggle attached");
        }
        let state = *self.state.read();
        let label = state.label(self.collaborators.formatter.as_ref());
        if let Err(err) = toggle.sync(&self.document, state.enabled, &label) {
            warn!(target: "pagewatch.controller", %err, "failed to sync toggle");
        }
        self.document.flush();
    }

    fn on_toggle_event(&self, node: NodeId, kind: EventKind) {
        match kind {
            EventKind::Removed => {
                let mut toggle = self.toggle.lock();
                if toggle.is_some_and(|current| current.root == node) {
                    *toggle = None;
                    debug!(target: "pagewatch.controller", %node, "toggle detached");
                }
            }
            EventKind::Added => {
                let found = self.document.read(|tree| ToggleControl::find(tree, node));
                if let Some(toggle) = found {
                    self.attach_toggle(toggle);
                }
            }
            EventKind::Modified => {
                let Some(toggle) = self.current_toggle() else {
                    return;
                };
                let covers = self
                    .document
                    .read(|tree| tree.is_inclusive_ancestor(node, toggle.root));
                if !covers {
                    return;
                }
                let checked = toggle.is_checked(&self.document);
                if checked != self.state.read().enabled {
                    self.apply_toggle(checked);
                }
            }
            EventKind::Init => {}
        }
    }

    fn on_host_added(&self, root: NodeId) {
        if self.current_toggle().is_some() {
            return;
        }
        let Some(host) = self.document.read(|tree| tree.query_first(root, &self.host)) else {
            return;
        };
        match self.document.read(|tree| ToggleControl::find(tree, host)) {
            Some(toggle) => self.attach_toggle(toggle),
            None => match self.mount_toggle(host) {
                Ok(_) => {
                    metrics::record_toggle_remount();
                    info!(target: "pagewatch.controller", %host, "toggle host re-rendered; toggle remounted");
                }
                Err(err) => {
                    warn!(target: "pagewatch.controller", %err, "failed to remount toggle");
                }
            },
        }
    }

    fn apply_toggle(&self, enabled: bool) {
        if self.observer.is_shut_down() {
            return;
        }
        let _pass = self.pass.lock();
        if self.store_enabled(enabled) {
            self.run_pass(RefreshReason::Toggle);
        }
    }

    /// Callers hold `pass`. Clears the budget together with `enabled` so the
    /// state never shows a budget while disabled.
    fn store_enabled(&self, enabled: bool) -> bool {
        {
            let mut state = self.state.write();
            if state.enabled == enabled {
                return false;
            }
            state.enabled = enabled;
            if !enabled {
                state.budget = None;
            }
        }
        metrics::record_toggle_change();
        info!(target: "pagewatch.controller", enabled, "budget filter toggled");
        true
    }

    fn refresh(&self, reason: RefreshReason) {
        if self.observer.is_shut_down() {
            return;
        }
        let _pass = self.pass.lock();
        // A click whose batch the toggle watch has not handled yet still wins
        // over the stored state; the pass below would otherwise undo it.
        if let Some(toggle) = self.current_toggle() {
            let checked = toggle.is_checked(&self.document);
            if checked != self.state.read().enabled {
                self.store_enabled(checked);
            }
        }
        self.run_pass(reason);
    }

    /// Callers hold `pass`.
    fn run_pass(&self, reason: RefreshReason) {
        let location = self.document.location();
        let enabled = self.state.read().enabled;
        let budget = if enabled {
            self.collaborators.budget.current_budget(&location)
        } else {
            None
        };
        let state = {
            let mut state = self.state.write();
            state.budget = if state.enabled { budget } else { None };
            *state
        };

        let label = state.label(self.collaborators.formatter.as_ref());
        if let Some(toggle) = self.current_toggle() {
            if let Err(err) = toggle.sync(&self.document, state.enabled, &label) {
                warn!(target: "pagewatch.controller", %err, "failed to sync toggle");
            }
        }

        let report = apply_filter(&self.document, &self.filter, state.budget);
        metrics::record_refresh();
        debug!(
            target: "pagewatch.controller",
            reason = reason.as_str(),
            enabled = state.enabled,
            budget = ?state.budget,
            hidden = report.hidden_items(),
            changed = report.changed,
            "filter pass complete"
        );
        *self.last_report.write() = Some(report);
        self.document.flush();
    }
}
