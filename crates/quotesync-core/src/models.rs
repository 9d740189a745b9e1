//! Data models for quotesync
//!
//! A [`Quote`] is the only entity. Its `text` is the identity key used when
//! reconciling with the remote: two quotes with the same text are the same
//! logical quote, whatever their category.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QuoteError, QuoteResult};

/// A quote with its category label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Quote {
    /// The quote itself; identity key
    pub text: String,
    /// Free-form category label
    pub category: String,
}

impl Quote {
    /// Create a quote from user input
    ///
    /// Both fields are trimmed and must be non-empty afterwards.
    pub fn new(text: impl AsRef<str>, category: impl AsRef<str>) -> QuoteResult<Self> {
        let text = text.as_ref().trim();
        let category = category.as_ref().trim();

        if text.is_empty() {
            return Err(QuoteError::Validation { field: "text" });
        }
        if category.is_empty() {
            return Err(QuoteError::Validation { field: "category" });
        }

        Ok(Self {
            text: text.to_string(),
            category: category.to_string(),
        })
    }

    /// Build a quote from an untyped import record
    ///
    /// Returns `None` unless both `text` and `category` are present,
    /// string-typed and non-empty. Values are kept as-is (no trimming).
    pub fn from_candidate(candidate: &Value) -> Option<Self> {
        let text = candidate.get("text")?.as_str()?;
        let category = candidate.get("category")?.as_str()?;

        if text.is_empty() || category.is_empty() {
            return None;
        }

        Some(Self {
            text: text.to_string(),
            category: category.to_string(),
        })
    }

    /// Whether this quote belongs to `category`, ignoring case
    pub fn in_category(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" — {}", self.text, self.category)
    }
}

/// Quotes a fresh store starts with
pub fn default_quotes() -> Vec<Quote> {
    [
        (
            "Life is what happens when you're busy making other plans.",
            "Life",
        ),
        (
            "The only limit to our realization of tomorrow is our doubts of today.",
            "Motivation",
        ),
        (
            "In the middle of every difficulty lies opportunity.",
            "Inspiration",
        ),
    ]
    .into_iter()
    .map(|(text, category)| Quote {
        text: text.to_string(),
        category: category.to_string(),
    })
    .collect()
}
