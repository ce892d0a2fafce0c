//! Registration entry points and the process-wide debug handle.

use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{error, info};

use pagewatch_core_types::NodeId;
use pagewatch_dom::{Document, Selector};
use pagewatch_filter::{cart_key, parse_date, parse_price, FilterError};
use pagewatch_timing::{wait_for_with, WaitOptions};

use crate::collaborators::{Collaborators, CurrencyFormatter, UsdFormatter};
use crate::config::PageWatchConfig;
use crate::controller::OrchestrationController;
use crate::errors::ControllerError;

static DEBUG_HANDLE: Lazy<RwLock<Option<DebugHandle>>> = Lazy::new(|| RwLock::new(None));

/// Stateless helpers exposed next to the live controller for inspection.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utils;

impl Utils {
    pub fn parse_price(&self, text: &str) -> Result<f64, FilterError> {
        parse_price(text)
    }

    pub fn format_usd(&self, amount: f64) -> String {
        UsdFormatter.format(amount)
    }

    /// Cart key for a `YYYY-MM-DD` date and a meal slot.
    pub fn cart_key(&self, date: &str, meal_slot: &str) -> Result<String, FilterError> {
        Ok(cart_key(parse_date(date)?, meal_slot))
    }

    pub async fn wait_for_element(
        &self,
        document: &Document,
        selector: &str,
        timeout: Option<Duration>,
    ) -> Result<NodeId, ControllerError> {
        let selector = Selector::parse(selector)?;
        Ok(pagewatch_timing::wait_for_element(document, &selector, timeout).await?)
    }
}

#[derive(Clone, Debug)]
pub struct DebugHandle {
    pub controller: OrchestrationController,
    pub utils: Utils,
}

/// The handle of the most recent registration, while its controller is
/// still running.
pub fn debug_handle() -> Option<DebugHandle> {
    DEBUG_HANDLE
        .read()
        .as_ref()
        .filter(|handle| !handle.controller.observer().is_shut_down())
        .cloned()
}

async fn wait_for_host(document: &Document, config: &PageWatchConfig) -> Result<NodeId, ControllerError> {
    let host = Selector::parse(&config.selectors.toggle_host)?;
    let options = WaitOptions {
        poll_interval: config.poll_interval(),
        timeout: Some(config.host_wait_timeout()),
    };
    // The host may already be there; only poll when it is not.
    if let Some(found) = document.query_first(&host) {
        return Ok(found);
    }
    Ok(wait_for_with(|| document.query_first(&host), options).await?)
}

/// Wait for the toggle host, then build and start the controller.
pub async fn register(
    document: Document,
    config: PageWatchConfig,
    collaborators: Collaborators,
) -> Result<OrchestrationController, ControllerError> {
    config.validate()?;
    let host = wait_for_host(&document, &config).await?;
    info!(target: "pagewatch.controller", %host, "toggle host found");

    let controller = OrchestrationController::new(document, config, collaborators)?;
    controller.start()?;
    let replaced = DEBUG_HANDLE
        .write()
        .replace(DebugHandle {
            controller: controller.clone(),
            utils: Utils,
        })
        .is_some();
    if replaced {
        info!(target: "pagewatch.controller", "debug handle now points at the new controller");
    }
    Ok(controller)
}

async fn try_bootstrap(
    document: Document,
    config: PageWatchConfig,
    collaborators: Collaborators,
) -> Result<OrchestrationController> {
    register(document, config, collaborators)
        .await
        .context("Failed to start the budget filter")
}

/// [`register`] for hosts that must keep working when the filter cannot
/// start: failures are logged and yield `None`.
pub async fn bootstrap(
    document: Document,
    config: PageWatchConfig,
    collaborators: Collaborators,
) -> Option<OrchestrationController> {
    match try_bootstrap(document, config, collaborators).await {
        Ok(controller) => Some(controller),
        Err(err) => {
            error!(target: "pagewatch.controller", "{:#}", err);
            None
        }
    }
}
