//! Sync command handlers

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;

use quotesync_core::sync::{
    ConflictPolicy, CycleOutcome, HttpGateway, Reconciler, SharedRepository, SyncEvent,
    SyncOrchestrator,
};
use quotesync_core::{Config, SessionState};

use crate::output::Output;
use crate::prompt::TerminalResolver;

/// Build an orchestrator for the configured remote
fn orchestrator(
    config: &Config,
    repo: SharedRepository,
    output: &Output,
) -> Result<SyncOrchestrator> {
    let gateway = HttpGateway::from_config(config).context("Failed to create HTTP client")?;
    let resolver = Arc::new(TerminalResolver::new(output.should_prompt()));
    let policy = ConflictPolicy::from_mode(config.conflict_policy, resolver);

    Ok(SyncOrchestrator::new(
        repo,
        Arc::new(gateway),
        Reconciler::new(policy),
        config.request_timeout(),
    ))
}

fn ensure_enabled(config: &Config) -> Result<()> {
    if !config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             quotesync config set sync_enabled true\n  \
             quotesync config set server_url https://your-server/quotes"
        );
    }
    Ok(())
}

/// Run a single sync cycle
pub async fn sync(config: &Config, repo: SharedRepository, output: &Output) -> Result<()> {
    ensure_enabled(config)?;

    output.message(&format!("Syncing with {}...", config.server_url));

    let orchestrator = orchestrator(config, repo, output)?;
    match orchestrator.run_sync_cycle().await {
        CycleOutcome::Completed {
            report,
            fetched,
            pushed,
        } => {
            output.print_sync_result(&report, fetched, pushed);
            let count = orchestrator.repository().lock().await.len();
            output.message(&format!("  Quotes: {}", count));
        }
        // Fresh orchestrator; nothing else can hold the flag
        CycleOutcome::Skipped => output.message("Sync already in progress."),
    }

    Ok(())
}

/// Push local quotes after a change, if sync is enabled
///
/// Failures are reported as a warning only.
pub async fn push_quiet(config: &Config, repo: SharedRepository, output: &Output) {
    if !config.sync_enabled {
        return;
    }

    let orchestrator = match orchestrator(config, repo, output) {
        Ok(o) => o,
        Err(e) => {
            output.warning(&format!("Auto-push failed: {:#}", e));
            return;
        }
    };

    if orchestrator.push_now().await == Some(false) {
        output.warning("Auto-push failed, quotes will be pushed on next sync");
    }
}

/// Run the periodic sync until Ctrl-C
///
/// Whenever a cycle changes the local list, the view is refreshed with a
/// new quote from the remembered filter.
pub async fn watch(
    config: &Config,
    repo: SharedRepository,
    session: &SessionState,
    output: &Output,
) -> Result<()> {
    ensure_enabled(config)?;

    let mut orchestrator = orchestrator(config, repo.clone(), output)?;
    let Some(mut events) = orchestrator.take_events() else {
        bail!("Sync events already taken");
    };

    output.message(&format!(
        "Watching {} every {}s (Ctrl-C to stop)",
        config.server_url,
        config.sync_interval().as_secs_f64()
    ));
    restore_view(&repo, session, output).await;

    let handle = Arc::new(orchestrator).spawn(config.sync_interval());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SyncEvent::QuotesUpdated(report) => {
                        output.success(report.summary());
                        refresh_view(&repo, session, output).await;
                    }
                    SyncEvent::FetchFailed(reason) => {
                        output.warning(&format!("Fetch failed: {}", reason));
                    }
                    SyncEvent::PushFailed(reason) => {
                        output.warning(&format!("Push failed: {}", reason));
                    }
                    other => debug!("Sync event: {:?}", other),
                }
            }
            _ = &mut ctrl_c => {
                output.message("Stopping sync...");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Show the quote from earlier in this session, or a fresh one
async fn restore_view(repo: &SharedRepository, session: &SessionState, output: &Output) {
    match session.last_quote() {
        Some(quote) => {
            debug!("Restored last quote from session");
            output.print_quote(&quote);
        }
        None => refresh_view(repo, session, output).await,
    }
}

/// Show a random quote from the remembered filter
async fn refresh_view(repo: &SharedRepository, session: &SessionState, output: &Output) {
    let filter = session.last_filter();
    let quote = repo.lock().await.random_quote(&filter).cloned();

    match quote {
        Some(quote) => {
            session.set_last_quote(&quote);
            output.print_quote(&quote);
        }
        None => output.message(&format!("No quotes available for category '{}'.", filter)),
    }
}
