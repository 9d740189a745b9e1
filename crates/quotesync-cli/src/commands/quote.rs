//! Quote command handlers

use std::path::Path;

use anyhow::{Context, Result};

use quotesync_core::{Quote, QuoteRepository, SessionState, ALL_CATEGORIES};

use crate::output::Output;

/// Add a new quote
pub fn add(
    repo: &mut QuoteRepository,
    text: String,
    category: String,
    output: &Output,
) -> Result<()> {
    let quote = Quote::new(text, category)?;
    repo.add(quote.clone())?;

    output.success(&format!("Added quote to {}", quote.category));
    Ok(())
}

/// List quotes, optionally filtered by category
pub fn list(repo: &QuoteRepository, category: Option<String>, output: &Output) -> Result<()> {
    let filter = category.unwrap_or_else(|| ALL_CATEGORIES.to_string());
    output.print_quotes(&repo.filter_by_category(&filter));
    Ok(())
}

/// List distinct categories with usage counts
pub fn categories(repo: &QuoteRepository, output: &Output) -> Result<()> {
    output.print_categories(&category_counts(repo));
    Ok(())
}

/// Show a random quote from the given or last used category
///
/// The category becomes the remembered filter.
pub fn show(
    repo: &QuoteRepository,
    session: &SessionState,
    category: Option<String>,
    output: &Output,
) -> Result<()> {
    let filter = category.unwrap_or_else(|| session.last_filter());
    session.set_last_filter(&filter);

    match repo.random_quote(&filter) {
        Some(quote) => {
            session.set_last_quote(quote);
            output.print_quote(quote);
        }
        None => output.message(&format!("No quotes available for category '{}'.", filter)),
    }
    Ok(())
}

/// Import quotes from a JSON file
pub fn import(repo: &mut QuoteRepository, path: &Path, output: &Output) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {:?}", path))?;

    let imported = repo
        .import_json(&content)
        .with_context(|| format!("Failed to import {:?}", path))?;

    output.success(&format!("Imported {} quote(s)", imported));
    Ok(imported)
}

/// Export all quotes to a JSON file
pub fn export(repo: &QuoteRepository, path: &Path, output: &Output) -> Result<()> {
    let json = repo.export_json()?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write export file: {:?}", path))?;

    output.success(&format!("Exported {} quote(s) to {}", repo.len(), path.display()));
    Ok(())
}

fn category_counts(repo: &QuoteRepository) -> Vec<(String, usize)> {
    repo.distinct_categories()
        .into_iter()
        .map(|name| {
            let count = repo.list().iter().filter(|q| q.category == name).count();
            (name, count)
        })
        .collect()
}
