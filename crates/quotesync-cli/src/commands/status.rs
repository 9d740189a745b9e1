//! Status command handler

use anyhow::Result;

use quotesync_core::{Config, QuoteRepository, SessionState};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(
    config: &Config,
    repo: &QuoteRepository,
    session: &SessionState,
    output: &Output,
) -> Result<()> {
    let categories = repo.distinct_categories().len();
    let last_filter = session.last_filter();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "sync_enabled": config.sync_enabled,
                    "server_url": config.server_url,
                    "sync_interval_ms": config.sync_interval_ms,
                    "conflict_policy": config.conflict_policy,
                    "storage": config.store_dir(),
                    "counts": {
                        "quotes": repo.len(),
                        "categories": categories
                    },
                    "last_filter": last_filter
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", repo.len());
        }
        OutputFormat::Human => {
            println!("quotesync Status");
            println!("================");
            println!();
            println!("Sync:");
            println!(
                "  Status:   {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!("  Server:   {}", config.server_url);
            println!("  Interval: {} ms", config.sync_interval_ms);
            println!("  Policy:   {}", config.conflict_policy);
            println!();
            println!("Storage:");
            println!("  Location: {}", config.store_dir().display());
            println!();
            println!("Contents:");
            println!("  Quotes:     {}", repo.len());
            println!("  Categories: {}", categories);
            println!("  Filter:     {}", last_filter);
        }
    }

    Ok(())
}
