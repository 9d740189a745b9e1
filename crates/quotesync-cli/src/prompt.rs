//! Terminal prompts

use std::io::{self, Write};

use anyhow::Result;
use quotesync_core::sync::{Conflict, ConflictResolver};
use tracing::warn;

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    // Check if stdin is a TTY
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

/// Asks on the terminal which category to keep
///
/// Without a terminal, or when prompting is disabled, the local category is
/// kept.
pub struct TerminalResolver {
    interactive: bool,
}

impl TerminalResolver {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

impl ConflictResolver for TerminalResolver {
    fn take_remote(&self, conflict: &Conflict) -> bool {
        if !self.interactive {
            return false;
        }

        println!();
        println!("{}", conflict);
        match confirm("Keep server version?") {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Conflict prompt failed, keeping local: {}", e);
                false
            }
        }
    }
}
