//! Reconciliation of remote quotes into the local repository
//!
//! Merging is one-directional: remote quotes are folded into the local list,
//! nothing local is ever removed. Quotes are matched by exact text; the
//! first local match wins.
//!
//! A conflict is a matched pair whose categories differ. It is settled by
//! the configured [`ConflictPolicy`]:
//! - `ServerWins`: the remote category replaces the local one
//! - `Interactive`: a [`ConflictResolver`] decides; the merge counts as a
//!   change whichever side it picks
//!
//! Resolvers may block, so async callers collect [`Reconciler::conflicts`]
//! first, answer them off the runtime and apply the answers with
//! [`Reconciler::merge_resolved`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::Quote;
use crate::repository::QuoteRepository;

/// Conflict policy as named in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictMode {
    /// Always take the remote category
    #[default]
    ServerWins,
    /// Ask a resolver for each conflict
    Prompt,
}

impl FromStr for ConflictMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server-wins" | "server" => Ok(ConflictMode::ServerWins),
            "prompt" | "interactive" => Ok(ConflictMode::Prompt),
            other => Err(format!(
                "unknown conflict policy '{}' (expected 'server-wins' or 'prompt')",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictMode::ServerWins => write!(f, "server-wins"),
            ConflictMode::Prompt => write!(f, "prompt"),
        }
    }
}

/// A quote present on both sides with different categories
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conflict {
    pub text: String,
    pub local_category: String,
    pub remote_category: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conflict detected for quote: \"{}\"\nLocal category: {}\nServer category: {}",
            self.text, self.local_category, self.remote_category
        )
    }
}

/// Decides conflicts under the interactive policy
///
/// May block (e.g. on terminal input).
pub trait ConflictResolver: Send + Sync {
    /// `true` to take the remote category, `false` to keep the local one
    fn take_remote(&self, conflict: &Conflict) -> bool;
}

impl<F> ConflictResolver for F
where
    F: Fn(&Conflict) -> bool + Send + Sync,
{
    fn take_remote(&self, conflict: &Conflict) -> bool {
        self(conflict)
    }
}

/// Active conflict policy
#[derive(Clone)]
pub enum ConflictPolicy {
    ServerWins,
    Interactive(Arc<dyn ConflictResolver>),
}

impl ConflictPolicy {
    /// Build the policy named by `mode`; `resolver` is used for `Prompt`
    pub fn from_mode(mode: ConflictMode, resolver: Arc<dyn ConflictResolver>) -> Self {
        match mode {
            ConflictMode::ServerWins => ConflictPolicy::ServerWins,
            ConflictMode::Prompt => ConflictPolicy::Interactive(resolver),
        }
    }

    pub fn mode(&self) -> ConflictMode {
        match self {
            ConflictPolicy::ServerWins => ConflictMode::ServerWins,
            ConflictPolicy::Interactive(_) => ConflictMode::Prompt,
        }
    }
}

impl fmt::Debug for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConflictPolicy").field(&self.mode()).finish()
    }
}

/// What a merge did to the local list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Remote quotes appended locally
    pub added: usize,
    /// Conflicts settled in favour of the remote category
    pub conflicts_taken_remote: usize,
    /// Conflicts where the local category was kept
    pub conflicts_kept_local: usize,
}

impl MergeReport {
    /// Whether local state changed (including conflicts that kept local)
    pub fn changed(&self) -> bool {
        self.added > 0 || self.conflicts() > 0
    }

    pub fn conflicts(&self) -> usize {
        self.conflicts_taken_remote + self.conflicts_kept_local
    }

    /// Notification text for a changed merge
    pub fn summary(&self) -> &'static str {
        if self.conflicts_taken_remote > 0 {
            "Quotes synced with conflicts resolved."
        } else {
            "Quotes synced from server."
        }
    }
}

/// Folds remote quotes into a repository
#[derive(Debug, Clone)]
pub struct Reconciler {
    policy: ConflictPolicy,
}

impl Reconciler {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// Reconciler that always takes the remote category
    pub fn server_wins() -> Self {
        Self::new(ConflictPolicy::ServerWins)
    }

    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Merge `remote` into `repo`, persisting once if anything changed
    ///
    /// An interactive resolver is called inline.
    pub fn merge(&self, repo: &mut QuoteRepository, remote: &[Quote]) -> MergeReport {
        match &self.policy {
            ConflictPolicy::ServerWins => self.merge_with(repo, remote, |_| true),
            ConflictPolicy::Interactive(resolver) => {
                self.merge_with(repo, remote, |conflict| resolver.take_remote(conflict))
            }
        }
    }

    /// Conflicts a merge of `remote` would raise, in encounter order
    pub fn conflicts(&self, repo: &QuoteRepository, remote: &[Quote]) -> Vec<Conflict> {
        let mut first_match: HashMap<&str, &str> = HashMap::new();
        for quote in repo.list() {
            first_match
                .entry(quote.text.as_str())
                .or_insert(quote.category.as_str());
        }

        let mut conflicts: Vec<Conflict> = Vec::new();
        for remote_quote in remote {
            match first_match.get(remote_quote.text.as_str()) {
                None => {
                    first_match.insert(&remote_quote.text, &remote_quote.category);
                }
                Some(local_category) if *local_category != remote_quote.category => {
                    let conflict = Conflict {
                        text: remote_quote.text.clone(),
                        local_category: local_category.to_string(),
                        remote_category: remote_quote.category.clone(),
                    };
                    if !conflicts.contains(&conflict) {
                        conflicts.push(conflict);
                    }
                }
                Some(_) => {}
            }
        }
        conflicts
    }

    /// Merge with conflicts already answered; unanswered ones keep local
    pub fn merge_resolved(
        &self,
        repo: &mut QuoteRepository,
        remote: &[Quote],
        answers: &HashMap<Conflict, bool>,
    ) -> MergeReport {
        self.merge_with(repo, remote, |conflict| {
            answers.get(conflict).copied().unwrap_or(false)
        })
    }

    fn merge_with(
        &self,
        repo: &mut QuoteRepository,
        remote: &[Quote],
        mut take_remote: impl FnMut(&Conflict) -> bool,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for remote_quote in remote {
            let Some(index) = repo.position_of(&remote_quote.text) else {
                repo.push_unsaved(remote_quote.clone());
                report.added += 1;
                continue;
            };

            let local_category = &repo.list()[index].category;
            if *local_category == remote_quote.category {
                continue;
            }

            let conflict = Conflict {
                text: remote_quote.text.clone(),
                local_category: local_category.clone(),
                remote_category: remote_quote.category.clone(),
            };

            let take = take_remote(&conflict);

            debug!(
                "Conflict on {:?}: local={:?} remote={:?} take_remote={}",
                conflict.text, conflict.local_category, conflict.remote_category, take
            );

            if take {
                repo.set_category_unsaved(index, conflict.remote_category);
                report.conflicts_taken_remote += 1;
            } else {
                report.conflicts_kept_local += 1;
            }
        }

        if report.changed() {
            repo.persist();
            info!(
                "Merged remote quotes: added={} conflicts={}",
                report.added,
                report.conflicts()
            );
        }

        report
    }
}
