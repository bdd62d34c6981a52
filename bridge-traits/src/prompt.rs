//! Interactive capability abstractions
//!
//! The core never touches a terminal. Hosts that want arrow-key menus or
//! yes/no prompts implement these traits; headless hosts use the fixed
//! implementations below.

/// Outcome of presenting a list of options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Index into the option list
    Chosen(usize),
    /// The user backed out
    Cancelled,
}

/// Choose one entry out of a labelled list
pub trait OptionSelector: Send + Sync {
    /// Present `options` under `title`, starting at `default_index`
    fn select(&self, title: &str, options: &[String], default_index: usize) -> Selection;
}

/// Ask the user to approve an action
pub trait ConfirmationPrompt: Send + Sync {
    /// Return `true` to proceed
    fn confirm(&self, message: &str) -> bool;
}

/// Selector that always returns the default entry
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl OptionSelector for DefaultSelector {
    fn select(&self, _title: &str, options: &[String], default_index: usize) -> Selection {
        if default_index < options.len() {
            Selection::Chosen(default_index)
        } else {
            Selection::Cancelled
        }
    }
}

/// Prompt with a fixed answer, used for `--yes` style bypasses and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

impl ConfirmationPrompt for FixedConfirmation {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}
