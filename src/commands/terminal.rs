use std::path::PathBuf;

use crate::form::{FormSnapshot, FormView};
use crate::presenter::ResultView;
use crate::storage::HistoryView;

/// The terminal has no controls to grey out; state changes are only logged
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalFormView;

impl FormView for TerminalFormView {
    fn render_form(&self, snapshot: &FormSnapshot) {
        tracing::debug!(
            "Form: controls_enabled={} submit_enabled={} login_visible={}",
            snapshot.controls_enabled,
            snapshot.submit_enabled,
            snapshot.layout.login_visible
        );
    }
}

/// Prints results to stdout, or writes them to `output` when set
#[derive(Debug, Clone, Default)]
pub struct TerminalResultView {
    output: Option<PathBuf>,
}

impl TerminalResultView {
    pub fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }
}

impl ResultView for TerminalResultView {
    fn show_status(&self, text: &str) {
        eprintln!("{}", text);
    }

    fn show_html(&self, html: &str) {
        match &self.output {
            Some(path) => match std::fs::write(path, html) {
                Ok(()) => eprintln!("Result written to {}", path.display()),
                Err(e) => {
                    tracing::error!("Failed to write result to {}: {}", path.display(), e);
                    println!("{}", html);
                }
            },
            None => println!("{}", html),
        }
    }

    fn show_error(&self, text: &str) {
        eprintln!("{}", text);
    }

    fn alert(&self, text: &str) {
        eprintln!("⚠️  {}", text);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalHistoryView;

impl HistoryView for TerminalHistoryView {
    fn show_history(&self, namespace: &str, entries: &[String]) {
        if entries.is_empty() {
            println!("No saved prompts for {}", namespace);
            return;
        }
        for (i, entry) in entries.iter().enumerate() {
            println!("{:>2}. {}", i + 1, entry);
        }
    }
}
