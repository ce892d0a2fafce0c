//! The checkbox the controller mounts into the page.
//!
//! ```html
//! <label class="pw-budget-toggle">
//!   <input type="checkbox" class="pw-budget-toggle-input">
//!   <span class="pw-budget-toggle-label">Filter by budget</span>
//! </label>
//! ```

use once_cell::sync::Lazy;

use pagewatch_core_types::NodeId;
use pagewatch_dom::{Document, DomError, DomTree, Selector};

pub const TOGGLE_CLASS: &str = "pw-budget-toggle";
pub const TOGGLE_INPUT_CLASS: &str = "pw-budget-toggle-input";
pub const TOGGLE_TEXT_CLASS: &str = "pw-budget-toggle-label";

pub const TOGGLE_SELECTOR: &str = ".pw-budget-toggle";

static INPUT_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(".pw-budget-toggle-input").ok());
static TEXT_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(".pw-budget-toggle-label").ok());
static ROOT_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(TOGGLE_SELECTOR).ok());

/// Node ids of one rendered toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleControl {
    pub root: NodeId,
    pub input: NodeId,
    pub text: NodeId,
}

impl ToggleControl {
    /// Render a toggle at the end of `host`.
    pub fn mount(document: &Document, host: NodeId, checked: bool, label: &str) -> Result<Self, DomError> {
        let root = document.create_element("label");
        document.set_attribute(root, "class", TOGGLE_CLASS)?;
        let input = document.create_element("input");
        document.set_attribute(input, "type", "checkbox")?;
        document.set_attribute(input, "class", TOGGLE_INPUT_CLASS)?;
        document.set_checked(input, checked)?;
        let text = document.create_element("span");
        document.set_attribute(text, "class", TOGGLE_TEXT_CLASS)?;
        document.set_text(text, label)?;
        document.append_child(root, input)?;
        document.append_child(root, text)?;
        document.append_child(host, root)?;
        Ok(Self { root, input, text })
    }

    /// Locate a rendered toggle inside `within` (inclusive).
    pub fn find(tree: &DomTree, within: NodeId) -> Option<Self> {
        let root = tree.query_first(within, ROOT_SELECTOR.as_ref()?)?;
        let input = tree.query_first(root, INPUT_SELECTOR.as_ref()?)?;
        let text = tree.query_first(root, TEXT_SELECTOR.as_ref()?)?;
        Some(Self { root, input, text })
    }

    pub fn is_connected(&self, document: &Document) -> bool {
        document.is_connected(self.root)
    }

    pub fn is_checked(&self, document: &Document) -> bool {
        document.is_checked(self.input)
    }

    /// Push controller state into the rendered control. Only real changes
    /// produce mutation records.
    pub fn sync(&self, document: &Document, checked: bool, label: &str) -> Result<(), DomError> {
        document.set_checked(self.input, checked)?;
        if document.text_content(self.text) != label {
            document.set_text(self.text, label)?;
        }
        Ok(())
    }
}
