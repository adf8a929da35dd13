//! Interactive confirmation for multi-database runs.
//!
//! The prompt is a blocking read on stdin and happens before any job is
//! created. [`FixedAnswer`] replaces it with a canned reply.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;

/// Prompt shown before fanning out to `count` databases.
pub fn confirmation_prompt(count: usize) -> String {
    format!(
        "Executing on ALL ({}) databases in parallel. Continue?\n(y/N) ",
        count
    )
}

/// Only `y`/`Y` proceeds; the trailing line terminator is ignored.
pub fn is_affirmative(reply: &str) -> bool {
    reply
        .trim_end_matches(['\n', '\r'])
        .eq_ignore_ascii_case("y")
}

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    /// Show `prompt` and return the raw reply.
    fn ask(&self, prompt: &str) -> Result<String>;

    fn confirm(&self, prompt: &str) -> Result<bool> {
        Ok(is_affirmative(&self.ask(prompt)?))
    }
}

/// Prompt on stdout, read one line from stdin. EOF counts as an empty reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&self, prompt: &str) -> Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        drop(stdout);

        let mut reply = String::new();
        io::stdin().lock().read_line(&mut reply)?;
        Ok(reply)
    }
}

/// Always answers with the same reply and counts how often it was asked.
#[derive(Debug, Default)]
pub struct FixedAnswer {
    reply: String,
    asked: AtomicUsize,
}

impl FixedAnswer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Confirm for FixedAnswer {
    fn ask(&self, _prompt: &str) -> Result<String> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
