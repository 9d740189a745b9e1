//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use quotesync_core::sync::MergeReport;
use quotesync_core::Quote;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single quote
    pub fn print_quote(&self, quote: &Quote) {
        match self.format {
            OutputFormat::Human => {
                println!();
                println!("  \"{}\"", quote.text);
                println!("      — {}", quote.category);
                println!();
            }
            OutputFormat::Json => print_json(quote),
            OutputFormat::Quiet => println!("{}", quote.text),
        }
    }

    /// Print a list of quotes
    pub fn print_quotes(&self, quotes: &[&Quote]) {
        match self.format {
            OutputFormat::Human => {
                if quotes.is_empty() {
                    println!("No quotes found.");
                    return;
                }
                for quote in quotes {
                    println!(
                        "{} | {}",
                        truncate(&quote.category, 20),
                        truncate(&quote.text, 60)
                    );
                }
                println!("\n{} quote(s)", quotes.len());
            }
            OutputFormat::Json => print_json(&quotes),
            OutputFormat::Quiet => {
                for quote in quotes {
                    println!("{}", quote.text);
                }
            }
        }
    }

    /// Print distinct categories with their quote counts
    pub fn print_categories(&self, categories: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if categories.is_empty() {
                    println!("No categories found.");
                    return;
                }
                for (name, count) in categories {
                    println!("{} ({})", name, count);
                }
                println!("\n{} category(ies)", categories.len());
            }
            OutputFormat::Json => {
                let json_categories: Vec<_> = categories
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                print_json(&json_categories);
            }
            OutputFormat::Quiet => {
                for (name, _) in categories {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print the result of a sync cycle
    pub fn print_sync_result(&self, report: &MergeReport, fetched: bool, pushed: bool) {
        match self.format {
            OutputFormat::Human => {
                if !fetched {
                    println!("⚠ Server unreachable, local quotes kept");
                }
                if report.changed() {
                    println!("✓ {}", report.summary());
                    println!(
                        "  Added: {}, conflicts: {} (server) / {} (local)",
                        report.added, report.conflicts_taken_remote, report.conflicts_kept_local
                    );
                } else if fetched {
                    println!("✓ Already up to date");
                }
                if !pushed {
                    println!("⚠ Push failed, will retry on next sync");
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "fetched": fetched,
                        "pushed": pushed,
                        "changed": report.changed(),
                        "report": report,
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning (to stderr in human mode)
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("⚠ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "warning", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
