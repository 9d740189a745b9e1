//! Browsing state kept outside the quote list
//!
//! - last shown quote: session-scoped, gone when the session ends
//! - last selected category filter: durable
//!
//! Both are best-effort; storage failures are logged and reads fall back to
//! "nothing remembered".

use std::sync::Arc;

use tracing::warn;

use crate::models::Quote;
use crate::repository::ALL_CATEGORIES;
use crate::storage::KeyValueStore;

/// Session store key of the last shown quote
pub const LAST_QUOTE_KEY: &str = "lastQuote";

/// Durable store key of the last category filter
pub const LAST_FILTER_KEY: &str = "lastFilter";

/// Last shown quote and last selected filter
pub struct SessionState {
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl SessionState {
    pub fn new(session: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { session, durable }
    }

    /// Quote displayed most recently in this session
    pub fn last_quote(&self) -> Option<Quote> {
        let json = match self.session.get(LAST_QUOTE_KEY) {
            Ok(value) => value?,
            Err(e) => {
                warn!("Failed to read last quote: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!("Ignoring unreadable last quote: {}", e);
                None
            }
        }
    }

    /// Remember `quote` as the one on display
    pub fn set_last_quote(&self, quote: &Quote) {
        let result = serde_json::to_string(quote)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.session
                    .set(LAST_QUOTE_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!("Failed to remember last quote: {}", e);
        }
    }

    /// Last selected category filter, `"all"` if none was saved
    pub fn last_filter(&self) -> String {
        match self.durable.get(LAST_FILTER_KEY) {
            Ok(Some(filter)) if !filter.is_empty() => filter,
            Ok(_) => ALL_CATEGORIES.to_string(),
            Err(e) => {
                warn!("Failed to read last filter: {}", e);
                ALL_CATEGORIES.to_string()
            }
        }
    }

    /// Persist the selected category filter
    pub fn set_last_filter(&self, category: &str) {
        if let Err(e) = self.durable.set(LAST_FILTER_KEY, category) {
            warn!("Failed to save last filter: {}", e);
        }
    }
}
