//! Quote repository
//!
//! The `QuoteRepository` owns the ordered quote list and is the only way to
//! read or change it. Every mutation is written through to the backing
//! [`KeyValueStore`]; a failed write is logged and the in-memory list stays
//! authoritative for the rest of the process.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(FileStore::open(config.store_dir())?);
//! let mut repo = QuoteRepository::open(store);
//!
//! repo.add(Quote::new("Stay hungry.", "Life")?)?;
//! let life = repo.filter_by_category("life");
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{QuoteError, QuoteResult};
use crate::models::{default_quotes, Quote};
use crate::storage::{KeyValueStore, StorageError};

/// Storage key of the serialized quote list
pub const QUOTES_KEY: &str = "quotes";

/// Filter value that selects every quote (case-sensitive)
pub const ALL_CATEGORIES: &str = "all";

/// In-memory quote list with write-through persistence
pub struct QuoteRepository {
    quotes: Vec<Quote>,
    store: Arc<dyn KeyValueStore>,
}

impl QuoteRepository {
    /// Load the repository from `store`
    ///
    /// A store without a quote list starts from the built-in quotes. An
    /// unreadable or corrupt list is logged and replaced by the same seed.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let quotes = match store.get(QUOTES_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Quote>>(&json) {
                Ok(quotes) => {
                    debug!("Loaded {} quotes from store", quotes.len());
                    quotes
                }
                Err(e) => {
                    warn!("Stored quote list is corrupt, starting from defaults: {}", e);
                    default_quotes()
                }
            },
            Ok(None) => default_quotes(),
            Err(e) => {
                warn!("Failed to read quote list, starting from defaults: {}", e);
                default_quotes()
            }
        };

        Self { quotes, store }
    }

    /// Create a repository holding exactly `quotes` (nothing is written)
    pub fn with_quotes(store: Arc<dyn KeyValueStore>, quotes: Vec<Quote>) -> Self {
        Self { quotes, store }
    }

    // ==================== Mutations ====================

    /// Append a quote
    ///
    /// Fails with `QuoteError::Validation` if text or category is empty.
    pub fn add(&mut self, quote: Quote) -> QuoteResult<()> {
        if quote.text.trim().is_empty() {
            return Err(QuoteError::Validation { field: "text" });
        }
        if quote.category.trim().is_empty() {
            return Err(QuoteError::Validation { field: "category" });
        }

        self.quotes.push(quote);
        self.persist();
        Ok(())
    }

    /// Append every valid record of an untyped batch, in order
    ///
    /// Records need non-empty string `text` and `category`; others are
    /// dropped. Returns the number appended, or `QuoteError::EmptyImport`
    /// when nothing survives.
    pub fn import_many(&mut self, candidates: &[Value]) -> QuoteResult<usize> {
        let valid: Vec<Quote> = candidates.iter().filter_map(Quote::from_candidate).collect();

        if valid.is_empty() {
            return Err(QuoteError::EmptyImport {
                candidates: candidates.len(),
            });
        }

        let imported = valid.len();
        debug!(
            "Importing {} of {} candidate quotes",
            imported,
            candidates.len()
        );
        self.quotes.extend(valid);
        self.persist();
        Ok(imported)
    }

    /// Import the contents of a JSON import file
    ///
    /// The top level must be an array; anything else is rejected before any
    /// record is looked at.
    pub fn import_json(&mut self, json: &str) -> QuoteResult<usize> {
        let value: Value = serde_json::from_str(json).map_err(|e| QuoteError::MalformedImport {
            details: e.to_string(),
        })?;

        let Value::Array(candidates) = value else {
            return Err(QuoteError::MalformedImport {
                details: "expected an array".to_string(),
            });
        };

        self.import_many(&candidates)
    }

    // ==================== Queries ====================

    /// All quotes, in insertion order
    pub fn list(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Quotes whose category matches `category`, ignoring case
    ///
    /// [`ALL_CATEGORIES`] returns the whole list.
    pub fn filter_by_category(&self, category: &str) -> Vec<&Quote> {
        if category == ALL_CATEGORIES {
            return self.quotes.iter().collect();
        }
        self.quotes
            .iter()
            .filter(|q| q.in_category(category))
            .collect()
    }

    /// Distinct categories in order of first appearance
    pub fn distinct_categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.quotes
            .iter()
            .filter(|q| seen.insert(q.category.as_str()))
            .map(|q| q.category.clone())
            .collect()
    }

    /// A random quote from the filtered view, if there is one
    pub fn random_quote(&self, category: &str) -> Option<&Quote> {
        self.filter_by_category(category)
            .choose(&mut rand::thread_rng())
            .copied()
    }

    /// Index of the first quote with exactly this text
    pub fn position_of(&self, text: &str) -> Option<usize> {
        self.quotes.iter().position(|q| q.text == text)
    }

    /// Pretty-printed JSON array of the whole list
    pub fn export_json(&self) -> QuoteResult<String> {
        serde_json::to_string_pretty(&self.quotes).map_err(|source| {
            StorageError::Encode {
                key: QUOTES_KEY.to_string(),
                source,
            }
            .into()
        })
    }

    // ==================== Merge support ====================

    /// Append without persisting; callers batch and call [`Self::persist`]
    pub(crate) fn push_unsaved(&mut self, quote: Quote) {
        self.quotes.push(quote);
    }

    /// Overwrite a category without persisting
    pub(crate) fn set_category_unsaved(&mut self, index: usize, category: String) {
        if let Some(quote) = self.quotes.get_mut(index) {
            quote.category = category;
        }
    }

    // ==================== Persistence ====================

    /// Write the list to the store
    pub fn save(&self) -> QuoteResult<()> {
        let json = serde_json::to_string(&self.quotes).map_err(|source| StorageError::Encode {
            key: QUOTES_KEY.to_string(),
            source,
        })?;
        self.store.set(QUOTES_KEY, &json)?;
        Ok(())
    }

    /// Write-through after a mutation; failures are logged, not returned
    ///
    /// Returns whether the write succeeded.
    pub fn persist(&self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist {} quotes: {}", self.quotes.len(), e);
                if let QuoteError::Storage(storage) = &e {
                    if let Some(hint) = storage.recovery_suggestion() {
                        warn!("{}", hint);
                    }
                }
                false
            }
        }
    }
}
