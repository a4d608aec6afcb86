//! Terminal answers for engine prompts

use brick_package::{PackageError, Prompter};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;

/// Asks on stdin/stdout. With `assume_yes` every confirmation is accepted
/// and the first option of every choice is taken.
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompter {
    pub assume_yes: bool,
    /// Editor command for changelogs, possibly with arguments.
    pub editor: Option<String>,
}

impl TerminalPrompter {
    pub fn new(assume_yes: bool, editor: Option<String>) -> Self {
        Self { assume_yes, editor }
    }

    fn read_line(&self) -> Option<String> {
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{} {} [y/N] ", "?".yellow().bold(), message);
        matches!(
            self.read_line().map(|l| l.to_lowercase()).as_deref(),
            Some("y") | Some("yes")
        )
    }

    fn select(&self, prompt: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            return None;
        }
        if self.assume_yes {
            return Some(0);
        }
        println!("{} {}", "?".yellow().bold(), prompt);
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }
        print!("Choice [1-{}]: ", options.len());
        let choice: usize = self.read_line()?.parse().ok()?;
        (1..=options.len()).contains(&choice).then(|| choice - 1)
    }

    fn edit_changelog(&self, path: &Path) -> brick_package::Result<()> {
        match self.editor.as_deref().map(str::split_whitespace) {
            Some(mut parts) => {
                let Some(program) = parts.next() else {
                    return Ok(());
                };
                let status = Command::new(program)
                    .args(parts)
                    .arg(path)
                    .status()
                    .map_err(|e| PackageError::io(path, e))?;
                if !status.success() {
                    return Err(PackageError::io(
                        path,
                        io::Error::new(io::ErrorKind::Other, format!("{} exited with {}", program, status)),
                    ));
                }
            }
            None if !self.assume_yes => {
                print!(
                    "Edit the changelog at {} then press enter to continue...",
                    path.display()
                );
                self.read_line();
            }
            None => {}
        }
        Ok(())
    }
}
