//! Interactive decisions requested by the engine

use std::path::Path;

use crate::Result;

/// Source of answers for confirmations and choices.
pub trait Prompter {
    fn confirm(&self, message: &str) -> bool;

    /// Pick one of `options`; `None` cancels.
    fn select(&self, prompt: &str, options: &[String]) -> Option<usize>;

    /// Let the user edit the changelog at `path` before the release commit.
    fn edit_changelog(&self, path: &Path) -> Result<()>;
}

/// Answers yes and picks the first option.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Prompter for AutoConfirm {
    fn confirm(&self, _message: &str) -> bool {
        true
    }

    fn select(&self, _prompt: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    fn edit_changelog(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Answers no to everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Decline;

impl Prompter for Decline {
    fn confirm(&self, _message: &str) -> bool {
        false
    }

    fn select(&self, _prompt: &str, _options: &[String]) -> Option<usize> {
        None
    }

    fn edit_changelog(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
