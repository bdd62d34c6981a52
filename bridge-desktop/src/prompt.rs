//! Terminal interaction with arrow-key menus and yes/no prompts
//!
//! Both prompts render on stderr so stdout stays free for reports. Without an
//! attached terminal nothing is asked: selection cancels and confirmation
//! declines.

use bridge_traits::prompt::{ConfirmationPrompt, OptionSelector, Selection};
use dialoguer::console::Term;
use dialoguer::{Confirm, Select};
use tracing::warn;

/// Yes/no prompt; Esc, `q` or a read failure declines
pub struct TerminalConfirmation {
    term: Term,
    default: bool,
}

impl TerminalConfirmation {
    pub fn stderr() -> Self {
        Self::on(Term::stderr())
    }

    pub fn on(term: Term) -> Self {
        Self {
            term,
            default: false,
        }
    }

    /// Answer pre-selected when the user just presses Enter
    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }
}

impl ConfirmationPrompt for TerminalConfirmation {
    fn confirm(&self, message: &str) -> bool {
        if !self.term.is_term() {
            warn!("No terminal attached, declining: {}", message);
            return false;
        }

        confirmation_answer(
            Confirm::new()
                .with_prompt(message)
                .default(self.default)
                .interact_on_opt(&self.term),
        )
    }
}

/// Arrow-key menu; Esc or `q` cancels
pub struct TerminalSelector {
    term: Term,
}

impl TerminalSelector {
    pub fn stderr() -> Self {
        Self::on(Term::stderr())
    }

    pub fn on(term: Term) -> Self {
        Self { term }
    }
}

impl OptionSelector for TerminalSelector {
    fn select(&self, title: &str, options: &[String], default_index: usize) -> Selection {
        if options.is_empty() {
            return Selection::Cancelled;
        }
        if !self.term.is_term() {
            warn!(title, "No terminal attached, cancelling selection");
            return Selection::Cancelled;
        }

        selection_answer(
            Select::new()
                .with_prompt(title)
                .items(options)
                .default(default_index.min(options.len() - 1))
                .interact_on_opt(&self.term),
            options.len(),
        )
    }
}

fn confirmation_answer(answer: dialoguer::Result<Option<bool>>) -> bool {
    match answer {
        Ok(Some(confirmed)) => confirmed,
        Ok(None) => false,
        Err(e) => {
            warn!(error = %e, "Confirmation prompt failed");
            false
        }
    }
}

fn selection_answer(answer: dialoguer::Result<Option<usize>>, len: usize) -> Selection {
    match answer {
        Ok(Some(index)) if index < len => Selection::Chosen(index),
        Ok(_) => Selection::Cancelled,
        Err(e) => {
            warn!(error = %e, "Selection prompt failed");
            Selection::Cancelled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error() -> dialoguer::Error {
        dialoguer::Error::IO(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(confirmation_answer(Ok(Some(true))));
        assert!(!confirmation_answer(Ok(Some(false))));
        assert!(!confirmation_answer(Ok(None)));
        assert!(!confirmation_answer(Err(io_error())));
    }

    #[test]
    fn test_selection_answers() {
        assert_eq!(selection_answer(Ok(Some(2)), 3), Selection::Chosen(2));
        assert_eq!(selection_answer(Ok(Some(3)), 3), Selection::Cancelled);
        assert_eq!(selection_answer(Ok(None), 3), Selection::Cancelled);
        assert_eq!(selection_answer(Err(io_error()), 3), Selection::Cancelled);
    }

    #[test]
    fn test_empty_menu_cancels() {
        assert_eq!(
            TerminalSelector::stderr().select("Pick", &[], 0),
            Selection::Cancelled
        );
    }
}
