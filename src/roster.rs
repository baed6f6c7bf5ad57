//! Client-side mirror of the server's account roster.
//!
//! Every mutation round-trips through the server; on `ok` the local snapshot
//! is replaced wholesale by the returned collection, never patched in place.
//! That replace-on-response policy is the sole sync mechanism, so there is
//! no local state to drift or race against.

use tokio::sync::watch;

use crate::api::ApiClient;
use crate::model::{Account, AccountAction, StatusKind, SuggestedAccount};
use crate::status::StatusPresenter;

/// The suggested-accounts side panel. A failed fetch degrades to an inline
/// note here rather than the shared status surface.
#[derive(Debug, Clone, Default)]
pub struct SuggestedPanel {
    pub accounts: Vec<SuggestedAccount>,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct AccountRoster {
    client: ApiClient,
    presenter: StatusPresenter,
    tx: watch::Sender<Vec<Account>>,
    suggested_tx: watch::Sender<SuggestedPanel>,
}

impl AccountRoster {
    pub fn new(client: ApiClient, presenter: StatusPresenter) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        let (suggested_tx, _) = watch::channel(SuggestedPanel::default());
        Self {
            client,
            presenter,
            tx,
            suggested_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Account>> {
        self.tx.subscribe()
    }

    pub fn subscribe_suggested(&self) -> watch::Receiver<SuggestedPanel> {
        self.suggested_tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Account> {
        self.tx.borrow().clone()
    }

    /// Usernames of the currently checked accounts, in server order.
    pub fn checked_usernames(&self) -> Vec<String> {
        self.tx
            .borrow()
            .iter()
            .filter(|a| a.checked)
            .map(|a| a.username.clone())
            .collect()
    }

    /// Seed the mirror from the server's listing endpoint.
    pub async fn bootstrap(&self) {
        if let Ok(accounts) = self.client.list_accounts().await {
            self.tx.send_replace(accounts);
        }
    }

    /// Register one username. Returns true when the server confirmed the
    /// mutation; only then may the caller clear its input affordances.
    pub async fn add(&self, username: &str) -> bool {
        let confirmed = self
            .mutate(&AccountAction::Add {
                username: username.to_string(),
            })
            .await;
        // A refused or failed add already surfaced its error note; only a
        // confirmed one may replace it with the success note.
        if confirmed == Some(true) {
            self.presenter
                .show(StatusKind::Done, format!("Added {username}"));
            return true;
        }
        false
    }

    pub async fn remove(&self, username: &str) -> bool {
        self.mutate(&AccountAction::Remove {
            username: username.to_string(),
        })
        .await
        .unwrap_or(false)
    }

    pub async fn toggle(&self, username: &str) -> bool {
        self.mutate(&AccountAction::Toggle {
            username: username.to_string(),
        })
        .await
        .unwrap_or(false)
    }

    pub async fn set_all_checked(&self, checked: bool) -> bool {
        self.mutate(&AccountAction::SetAllChecked { checked })
            .await
            .unwrap_or(false)
    }

    /// Register a pre-normalized set of usernames in one call. The server is
    /// the sole arbiter of duplicates; its `added`/`skipped` counts are only
    /// displayed, never recomputed here.
    pub async fn add_bulk(&self, usernames: Vec<String>) -> bool {
        if usernames.is_empty() {
            self.presenter
                .show(StatusKind::Error, "Enter at least one username");
            return false;
        }
        let action = AccountAction::AddBulk { usernames };
        match self.client.accounts_action(&action).await {
            Ok(response) if response.ok => {
                if let Some(accounts) = response.accounts {
                    self.tx.send_replace(accounts);
                }
                let added = response.added.unwrap_or(0);
                let skipped = response.skipped.map(|s| s.len()).unwrap_or(0);
                let mut text = match added {
                    0 => String::new(),
                    1 => "Added 1 account".to_string(),
                    n => format!("Added {n} accounts"),
                };
                if skipped > 0 {
                    text.push_str(&format!(" ({skipped} already present)"));
                }
                if text.is_empty() {
                    text = "Everything selected already exists".to_string();
                }
                self.presenter.show(StatusKind::Done, text);
                true
            }
            Ok(response) => {
                self.presenter.show(
                    StatusKind::Error,
                    response.error.unwrap_or_else(|| "error".to_string()),
                );
                false
            }
            Err(err) => {
                self.presenter.show(StatusKind::Error, err.to_string());
                false
            }
        }
    }

    /// Free-text entry point: split, normalize, de-duplicate, then register.
    pub async fn add_bulk_text(&self, raw: &str) -> bool {
        self.add_bulk(normalize_usernames(raw)).await
    }

    /// Fetch the suggested-accounts list, degrading inline on failure.
    pub async fn load_suggested(&self) {
        match self.client.suggested_accounts().await {
            Ok(response) => {
                self.suggested_tx.send_replace(SuggestedPanel {
                    accounts: response.accounts,
                    note: None,
                });
            }
            Err(_) => {
                self.suggested_tx.send_replace(SuggestedPanel {
                    accounts: Vec::new(),
                    note: Some("Failed to load suggested accounts".to_string()),
                });
            }
        }
    }

    /// One roster mutation round-trip. `Some(true)` when the server applied
    /// it and the mirror was replaced; `Some(false)` when the server refused
    /// (error surfaced, mirror untouched); `None` on transport failure.
    async fn mutate(&self, action: &AccountAction) -> Option<bool> {
        match self.client.accounts_action(action).await {
            Ok(response) if response.ok => {
                if let Some(accounts) = response.accounts {
                    self.tx.send_replace(accounts);
                }
                Some(true)
            }
            Ok(response) => {
                self.presenter.show(
                    StatusKind::Error,
                    response.error.unwrap_or_else(|| "error".to_string()),
                );
                Some(false)
            }
            Err(err) => {
                self.presenter.show(StatusKind::Error, err.to_string());
                None
            }
        }
    }
}

/// Split free-form text on newlines and commas, trim, lower-case, drop
/// empties, and de-duplicate while preserving first-seen order. The server
/// never sees the same username twice in one bulk call.
pub fn normalize_usernames(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(['\n', ','])
        .map(|s| s.trim().trim_end_matches('\r').trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_splits_on_newlines_and_commas() {
        let got = normalize_usernames("alice\nbob,carol\r\ndave");
        assert_eq!(got, vec!["alice", "bob", "carol", "dave"]);
    }

    #[test]
    fn normalize_trims_lowercases_and_drops_empties() {
        let got = normalize_usernames("  Alice ,\n\n,  BOB  \n");
        assert_eq!(got, vec!["alice", "bob"]);
    }

    #[test]
    fn normalize_deduplicates_case_folded_entries() {
        let got = normalize_usernames("A\na\nB");
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn normalize_of_blank_text_is_empty() {
        assert!(normalize_usernames("  \n , \r\n ").is_empty());
    }
}
