//! Read-mostly mirrors of server-side collections: merged output folders and
//! connected upload channels.
//!
//! `refresh` replaces the whole collection and re-applies every dependent
//! picker: a picker keeps its selected key when it survives the new option
//! set and resets to unselected otherwise. Applying the same collection
//! twice renders the same state, so redundant refreshes are safe.

use tokio::sync::watch;

use crate::api::{ApiClient, ApiError};
use crate::model::{Channel, MergedFolder};

/// One select-like affordance tracking a chosen option key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    selected: Option<String>,
}

impl Selection {
    pub fn key(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Choose a key, or clear with `None`. A key not present in `keys`
    /// resets the selection, like assigning a missing value to a select.
    fn select_among(&mut self, key: Option<String>, keys: &[String]) {
        self.selected = key.filter(|k| keys.iter().any(|have| have == k));
    }

    /// Re-validate against a freshly fetched option set.
    fn reapply(&mut self, keys: &[String]) {
        if let Some(current) = &self.selected {
            if !keys.iter().any(|k| k == current) {
                self.selected = None;
            }
        }
    }
}

/// Which of the folder-dependent pickers to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderPicker {
    /// Source folder for the upload form.
    Upload,
    /// Folder picked for clear-batch.
    Clear,
    /// Folder picked for the manual bridge (open/caption).
    Bridge,
}

#[derive(Debug, Clone, Default)]
pub struct FolderCatalogState {
    pub folders: Vec<MergedFolder>,
    pub upload: Selection,
    pub clear: Selection,
    pub bridge: Selection,
}

impl FolderCatalogState {
    fn keys(&self) -> Vec<String> {
        self.folders.iter().map(|f| f.key()).collect()
    }

    pub fn apply(&mut self, folders: Vec<MergedFolder>) {
        let keys: Vec<String> = folders.iter().map(|f| f.key()).collect();
        self.upload.reapply(&keys);
        self.clear.reapply(&keys);
        self.bridge.reapply(&keys);
        self.folders = folders;
    }

    fn picker(&mut self, which: FolderPicker) -> &mut Selection {
        match which {
            FolderPicker::Upload => &mut self.upload,
            FolderPicker::Clear => &mut self.clear,
            FolderPicker::Bridge => &mut self.bridge,
        }
    }

    pub fn selected(&self, which: FolderPicker) -> Option<&MergedFolder> {
        let key = match which {
            FolderPicker::Upload => self.upload.key(),
            FolderPicker::Clear => self.clear.key(),
            FolderPicker::Bridge => self.bridge.key(),
        }?;
        self.folders.iter().find(|f| f.key() == key)
    }
}

#[derive(Clone)]
pub struct FolderCatalog {
    client: ApiClient,
    tx: watch::Sender<FolderCatalogState>,
}

impl FolderCatalog {
    pub fn new(client: ApiClient) -> Self {
        let (tx, _) = watch::channel(FolderCatalogState::default());
        Self { client, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<FolderCatalogState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> FolderCatalogState {
        self.tx.borrow().clone()
    }

    /// Fetch the current folder list and replace every dependent picker's
    /// option set.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let folders = self.client.merged_folders().await?;
        self.tx.send_modify(|state| state.apply(folders));
        Ok(())
    }

    pub fn select(&self, which: FolderPicker, key: Option<String>) {
        self.tx.send_modify(|state| {
            let keys = state.keys();
            state.picker(which).select_among(key, &keys);
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPicker {
    /// Destination channel for the upload-folder form.
    Upload,
    /// Destination channel for the upload-file form.
    UploadFile,
    /// Destination channel for upload-all.
    Bulk,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelRegistryState {
    pub channels: Vec<Channel>,
    /// Inline note under the registry (connected-channel summary or the
    /// degradation message for a failed listing). Never the status surface.
    pub note: Option<String>,
    pub upload: Selection,
    pub upload_file: Selection,
    pub bulk: Selection,
}

impl ChannelRegistryState {
    fn keys(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.id.clone()).collect()
    }

    pub fn apply(&mut self, channels: Vec<Channel>) {
        let keys: Vec<String> = channels.iter().map(|c| c.id.clone()).collect();
        self.upload.reapply(&keys);
        self.upload_file.reapply(&keys);
        self.bulk.reapply(&keys);
        self.channels = channels;

        // The bulk picker defaults to the dedicated stories channel when the
        // operator has not chosen one.
        if self.bulk.key().is_none() {
            if let Some(target) = self
                .channels
                .iter()
                .find(|c| c.title.to_lowercase().contains("stories"))
            {
                self.bulk.selected = Some(target.id.clone());
            }
        }
    }

    fn picker(&mut self, which: ChannelPicker) -> &mut Selection {
        match which {
            ChannelPicker::Upload => &mut self.upload,
            ChannelPicker::UploadFile => &mut self.upload_file,
            ChannelPicker::Bulk => &mut self.bulk,
        }
    }

    pub fn selected(&self, which: ChannelPicker) -> Option<&Channel> {
        let key = match which {
            ChannelPicker::Upload => self.upload.key(),
            ChannelPicker::UploadFile => self.upload_file.key(),
            ChannelPicker::Bulk => self.bulk.key(),
        }?;
        self.channels.iter().find(|c| c.id == key)
    }
}

/// Inline summary for the registry note. Recomputed from the channel set on
/// every successful listing or refresh so it never names stale channels.
fn connected_note(channels: &[Channel]) -> Option<String> {
    if channels.is_empty() {
        return Some("No connected channels".to_string());
    }
    let titles: Vec<&str> = channels.iter().map(|c| c.title.as_str()).collect();
    Some(format!("Connected: {}", titles.join(", ")))
}

#[derive(Clone)]
pub struct ChannelRegistry {
    client: ApiClient,
    tx: watch::Sender<ChannelRegistryState>,
}

impl ChannelRegistry {
    pub fn new(client: ApiClient) -> Self {
        let (tx, _) = watch::channel(ChannelRegistryState::default());
        Self { client, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelRegistryState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> ChannelRegistryState {
        self.tx.borrow().clone()
    }

    /// Initial load. Failures degrade to the inline note; nothing reaches
    /// the shared status surface.
    pub async fn load(&self) {
        match self.client.channels().await {
            Ok(response) if response.ok => {
                let channels = response.channels.unwrap_or_default();
                let note = connected_note(&channels);
                self.tx.send_modify(|state| {
                    state.apply(channels);
                    state.note = note;
                });
            }
            Ok(response) => {
                self.tx.send_modify(|state| {
                    state.apply(Vec::new());
                    state.note = response.error;
                });
            }
            Err(_) => {
                self.tx.send_modify(|state| {
                    state.apply(Vec::new());
                    state.note = None;
                });
            }
        }
    }

    /// Ask the server to re-query the upstream platform for channel info.
    /// The caller surfaces the outcome.
    pub async fn refresh(&self) -> Result<(), String> {
        match self.client.refresh_channels().await {
            Ok(response) if response.ok => {
                let channels = response.channels.unwrap_or_default();
                let note = connected_note(&channels);
                self.tx.send_modify(|state| {
                    state.apply(channels);
                    state.note = note;
                });
                Ok(())
            }
            Ok(response) => Err(response
                .error
                .unwrap_or_else(|| "Refresh failed".to_string())),
            Err(err) => Err(err.to_string()),
        }
    }

    pub fn select(&self, which: ChannelPicker, key: Option<String>) {
        self.tx.send_modify(|state| {
            let keys = state.keys();
            state.picker(which).select_among(key, &keys);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn folder(username: &str, date: &str) -> MergedFolder {
        MergedFolder {
            username: username.to_string(),
            date: date.to_string(),
        }
    }

    fn channel(id: &str, title: &str) -> Channel {
        Channel {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn selection_survives_refresh_when_key_still_present() {
        let mut state = FolderCatalogState::default();
        state.apply(vec![folder("nasa", "2026-08-01"), folder("esa", "2026-08-02")]);
        let keys = state.keys();
        state.upload.select_among(Some("nasa/2026-08-01".into()), &keys);

        state.apply(vec![folder("esa", "2026-08-02"), folder("nasa", "2026-08-01")]);
        assert_eq!(state.upload.key(), Some("nasa/2026-08-01"));
        assert_eq!(state.selected(FolderPicker::Upload).unwrap().username, "nasa");
    }

    #[test]
    fn selection_resets_when_key_disappears() {
        let mut state = FolderCatalogState::default();
        state.apply(vec![folder("nasa", "2026-08-01")]);
        let keys = state.keys();
        state.clear.select_among(Some("nasa/2026-08-01".into()), &keys);

        state.apply(vec![folder("esa", "2026-08-02")]);
        assert_eq!(state.clear.key(), None);
        assert!(state.selected(FolderPicker::Clear).is_none());
    }

    #[test]
    fn applying_the_same_collection_is_idempotent() {
        let folders = vec![folder("nasa", "2026-08-01"), folder("esa", "2026-08-02")];
        let mut state = FolderCatalogState::default();
        state.apply(folders.clone());
        let keys = state.keys();
        state.bridge.select_among(Some("esa/2026-08-02".into()), &keys);

        let before = (state.folders.clone(), state.bridge.clone());
        state.apply(folders);
        assert_eq!(before.0, state.folders);
        assert_eq!(before.1, state.bridge);
    }

    #[test]
    fn selecting_an_unknown_key_clears_the_picker() {
        let mut state = FolderCatalogState::default();
        state.apply(vec![folder("nasa", "2026-08-01")]);
        let keys = state.keys();
        state.upload.select_among(Some("missing/2026-01-01".into()), &keys);
        assert_eq!(state.upload.key(), None);
    }

    #[test]
    fn bulk_channel_picker_prefers_the_stories_channel() {
        let mut state = ChannelRegistryState::default();
        state.apply(vec![
            channel("c1", "Main Channel"),
            channel("c2", "Content Creators Stories"),
        ]);
        assert_eq!(state.bulk.key(), Some("c2"));
        assert_eq!(state.selected(ChannelPicker::Bulk).unwrap().id, "c2");

        // An explicit choice is not overridden by a later refresh.
        let keys = state.keys();
        state.bulk.select_among(Some("c1".into()), &keys);
        state.apply(vec![
            channel("c1", "Main Channel"),
            channel("c2", "Content Creators Stories"),
        ]);
        assert_eq!(state.bulk.key(), Some("c1"));
    }

    #[test]
    fn upload_pickers_do_not_auto_select() {
        let mut state = ChannelRegistryState::default();
        state.apply(vec![channel("c2", "Stories")]);
        assert_eq!(state.upload.key(), None);
        assert_eq!(state.upload_file.key(), None);
    }
}
