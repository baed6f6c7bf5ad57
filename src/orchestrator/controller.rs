//! The console controller.
//!
//! Owns every component of the core: the API client, the status surface,
//! the roster mirror, both catalogs, and the poll sequences in flight.
//! Each submit path validates locally first, then submits, then hands the
//! accepted task id to the poller together with whatever catalog refresh
//! its completion requires.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::api::{ApiClient, ApiError};
use crate::catalog::{ChannelPicker, ChannelRegistry, FolderCatalog, FolderPicker};
use crate::model::{
    BatchRef, DownloadRequest, DownloadSelectedRequest, JobAccepted, MergeMode, MergeRequest,
    ScheduleRequest, StatusKind, UploadAllRequest, UploadRequest,
};
use crate::poller::{BusyFlag, PollHandle, TaskPoller};
use crate::roster::{normalize_usernames, AccountRoster};
use crate::status::StatusPresenter;

/// Connection settings, sourced once at startup.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

/// One busy marker per guarded submit affordance.
#[derive(Clone, Default)]
pub struct BusyFlags {
    pub download: BusyFlag,
    pub download_selected: BusyFlag,
    pub merge: BusyFlag,
    pub upload_all: BusyFlag,
    pub accounts: BusyFlag,
    pub schedule: BusyFlag,
}

/// Commands emitted by UI layers. The controller validates and executes;
/// the UI only collects input and renders the published state.
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Free text from the add-account affordance; one name or many.
    AddAccount { input: String },
    AddSuggested { usernames: Vec<String> },
    RemoveAccount { username: String },
    ToggleAccount { username: String },
    SetAllChecked(bool),
    RefreshSuggested,
    Download { username: String, merge: bool },
    DownloadSelected { merge: bool },
    Merge {
        username: String,
        date: Option<String>,
        mode: MergeMode,
    },
    UploadFolder {
        manual: Option<(String, String)>,
        privacy: String,
        upload_type: String,
    },
    UploadFile {
        path: PathBuf,
        title: Option<String>,
        privacy: String,
    },
    UploadAll { privacy: String, upload_type: String },
    RefreshFolders,
    RefreshChannels,
    SelectFolder {
        which: FolderPicker,
        key: Option<String>,
    },
    SelectChannel {
        which: ChannelPicker,
        key: Option<String>,
    },
    ClearBatch { batch: Option<BatchRef> },
    OpenFolder { batch: Option<BatchRef> },
    SaveSchedule {
        enabled: bool,
        hour: u8,
        minute: u8,
        merge: bool,
    },
    /// Lets UI-side collaborators (clipboard, key help) write the surface.
    ShowStatus { kind: StatusKind, text: String },
    Quit,
}

pub struct Console {
    pub presenter: StatusPresenter,
    pub roster: AccountRoster,
    pub folders: FolderCatalog,
    pub channels: ChannelRegistry,
    pub busy: BusyFlags,
    client: ApiClient,
    poller: TaskPoller,
    /// Live poll sequences. Held so they are not cancelled mid-flight;
    /// dropping the console aborts whatever is still polling.
    polls: Mutex<Vec<PollHandle>>,
}

impl Console {
    pub fn new(cfg: &ConsoleConfig) -> Result<Self> {
        let client = ApiClient::new(&cfg.base_url, cfg.token.clone(), cfg.request_timeout)?;
        let presenter = StatusPresenter::new();
        let roster = AccountRoster::new(client.clone(), presenter.clone());
        let folders = FolderCatalog::new(client.clone());
        let channels = ChannelRegistry::new(client.clone());
        let poller = TaskPoller::new(client.clone(), presenter.clone(), cfg.poll_interval);
        Ok(Self {
            presenter,
            roster,
            folders,
            channels,
            busy: BusyFlags::default(),
            client,
            poller,
            polls: Mutex::new(Vec::new()),
        })
    }

    /// Initial loads. Each degrades on its own; a dead server leaves empty
    /// collections, not a failed startup.
    pub async fn bootstrap(&self) {
        tokio::join!(
            self.roster.bootstrap(),
            self.roster.load_suggested(),
            self.channels.load(),
            async {
                let _ = self.folders.refresh().await;
            },
        );
    }

    /// Wait for every in-flight poll sequence to reach a terminal state.
    pub async fn wait_idle(&self) {
        loop {
            let drained: Vec<PollHandle> = {
                let mut polls = self.polls.lock().expect("poll registry poisoned");
                polls.drain(..).collect()
            };
            if drained.is_empty() {
                break;
            }
            for handle in drained {
                handle.wait().await;
            }
        }
    }

    fn retain(&self, handle: PollHandle) {
        let mut polls = self.polls.lock().expect("poll registry poisoned");
        polls.retain(|h| !h.is_finished());
        polls.push(handle);
    }

    /// Shared tail of every job submission: surface refusals, or surface the
    /// running note and start polling, refreshing the folder catalog on
    /// completion when asked to.
    fn accept_job(
        &self,
        result: Result<JobAccepted, ApiError>,
        busy: Option<BusyFlag>,
        running_note: &str,
        refresh_folders: bool,
    ) {
        let accepted = match result {
            Ok(accepted) => accepted,
            Err(err) => {
                self.presenter.show(StatusKind::Error, err.to_string());
                if let Some(busy) = busy {
                    busy.clear();
                }
                return;
            }
        };
        let task_id = match (accepted.ok, accepted.task_id) {
            (true, Some(id)) => id,
            _ => {
                self.presenter.show(
                    StatusKind::Error,
                    accepted.error.unwrap_or_else(|| "error".to_string()),
                );
                if let Some(busy) = busy {
                    busy.clear();
                }
                return;
            }
        };
        self.presenter.show(StatusKind::Running, running_note);
        let on_done = refresh_folders.then(|| {
            let folders = self.folders.clone();
            Box::pin(async move {
                let _ = folders.refresh().await;
            }) as futures::future::BoxFuture<'static, ()>
        });
        self.retain(self.poller.spawn(task_id, busy, on_done));
    }

    // --- accounts ---

    /// The add-account form: free text, single or bulk. Returns true when
    /// the server confirmed, i.e. when input affordances may be cleared.
    pub async fn account_add_form(&self, input: &str) -> bool {
        let usernames = normalize_usernames(input);
        if usernames.is_empty() {
            self.presenter.show(StatusKind::Error, "Enter a username");
            return false;
        }
        self.busy.accounts.set();
        let confirmed = if usernames.len() == 1 {
            self.roster.add(&usernames[0]).await
        } else {
            self.roster.add_bulk(usernames).await
        };
        self.busy.accounts.clear();
        confirmed
    }

    /// Add the checked suggested accounts. Returns true when the suggested
    /// checkboxes may be cleared.
    pub async fn add_suggested(&self, usernames: Vec<String>) -> bool {
        if usernames.is_empty() {
            self.presenter
                .show(StatusKind::Error, "Select accounts to add");
            return false;
        }
        self.roster.add_bulk(usernames).await
    }

    pub async fn refresh_suggested(&self) {
        self.roster.load_suggested().await;
        self.presenter
            .show(StatusKind::Done, "Suggested accounts updated");
    }

    // --- jobs ---

    pub async fn submit_download(&self, username: &str, merge: bool) {
        let username = username.trim();
        if username.is_empty() {
            self.presenter.show(StatusKind::Error, "Enter a username");
            return;
        }
        self.busy.download.set();
        let result = self
            .client
            .download(&DownloadRequest {
                username: username.to_string(),
                merge,
            })
            .await;
        self.accept_job(
            result,
            Some(self.busy.download.clone()),
            "Downloading...",
            true,
        );
    }

    pub async fn submit_download_selected(&self, merge: bool) {
        let usernames = self.roster.checked_usernames();
        if usernames.is_empty() {
            self.presenter
                .show(StatusKind::Error, "Select at least one account");
            return;
        }
        self.busy.download_selected.set();
        let result = self
            .client
            .download_selected(&DownloadSelectedRequest { usernames, merge })
            .await;
        self.accept_job(
            result,
            Some(self.busy.download_selected.clone()),
            "Downloading...",
            true,
        );
    }

    pub async fn submit_merge(&self, username: &str, date: Option<String>, mode: MergeMode) {
        let username = username.trim();
        if username.is_empty() {
            self.presenter.show(StatusKind::Error, "Enter a username");
            return;
        }
        let date = date
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(today_stamp);
        self.busy.merge.set();
        let result = self
            .client
            .merge(&MergeRequest {
                username: username.to_string(),
                date,
                merge_mode: mode,
            })
            .await;
        self.accept_job(result, Some(self.busy.merge.clone()), "Merging...", true);
    }

    /// Upload one batch. `manual` overrides the upload picker so an operator
    /// can name a batch the catalog has not listed yet.
    pub async fn submit_upload(
        &self,
        manual: Option<(String, String)>,
        privacy: &str,
        upload_type: &str,
    ) {
        let (username, date) = match manual {
            Some((username, date)) => (username, date),
            None => match self.folders.state().selected(FolderPicker::Upload) {
                Some(folder) => (folder.username.clone(), folder.date.clone()),
                None => (String::new(), String::new()),
            },
        };
        let username = username.trim().to_string();
        if username.is_empty() {
            self.presenter
                .show(StatusKind::Error, "Choose a folder or enter a username");
            return;
        }
        let date = if date.trim().is_empty() {
            today_stamp()
        } else {
            date
        };
        let channel_id = self
            .channels
            .state()
            .selected(ChannelPicker::Upload)
            .map(|c| c.id.clone());
        let result = self
            .client
            .upload(&UploadRequest {
                username,
                date,
                privacy: privacy.to_string(),
                upload_type: upload_type.to_string(),
                channel_id,
            })
            .await;
        self.accept_job(result, None, "Uploading to YouTube...", false);
    }

    pub async fn submit_upload_file(&self, path: &PathBuf, title: Option<String>, privacy: &str) {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "Untitled".to_string());
        let channel_id = self
            .channels
            .state()
            .selected(ChannelPicker::UploadFile)
            .map(|c| c.id.clone());
        let result = self
            .client
            .upload_file(path, &title, privacy, channel_id.as_deref())
            .await;
        self.accept_job(result, None, "Uploading to YouTube...", false);
    }

    /// Upload every merged folder in one job. Fetches the folder list fresh
    /// so the server sees exactly what exists right now.
    pub async fn submit_upload_all(&self, privacy: &str, upload_type: &str) {
        let folders = match self.client.merged_folders().await {
            Ok(folders) => folders,
            Err(err) => {
                self.presenter.show(StatusKind::Error, err.to_string());
                return;
            }
        };
        if folders.is_empty() {
            self.presenter
                .show(StatusKind::Error, "No merged folders to upload");
            return;
        }
        let channel_id = match self.channels.state().selected(ChannelPicker::Bulk) {
            Some(channel) => Some(channel.id.clone()),
            None => {
                self.presenter
                    .show(StatusKind::Error, "Choose a channel for the bulk upload");
                return;
            }
        };
        self.busy.upload_all.set();
        let result = self
            .client
            .upload_all(&UploadAllRequest {
                folders,
                privacy: privacy.to_string(),
                upload_type: upload_type.to_string(),
                channel_id,
            })
            .await;
        self.accept_job(
            result,
            Some(self.busy.upload_all.clone()),
            "Uploading everything...",
            true,
        );
    }

    // --- catalogs ---

    pub async fn refresh_folders(&self) {
        match self.folders.refresh().await {
            Ok(()) => self.presenter.show(StatusKind::Done, "Folder list updated"),
            Err(err) => self.presenter.show(StatusKind::Error, err.to_string()),
        }
    }

    pub async fn refresh_channels(&self) {
        match self.channels.refresh().await {
            Ok(()) => self.presenter.show(StatusKind::Done, "Channels updated"),
            Err(message) => self.presenter.show(StatusKind::Error, message),
        }
    }

    // --- maintenance ---

    pub async fn clear_batch(&self, batch: Option<BatchRef>) {
        let batch = batch.or_else(|| {
            self.folders
                .state()
                .selected(FolderPicker::Clear)
                .map(|f| BatchRef {
                    username: f.username.clone(),
                    date: f.date.clone(),
                })
        });
        let Some(batch) = batch else {
            self.presenter
                .show(StatusKind::Error, "Choose a folder to clear");
            return;
        };
        match self.client.clear_batch(&batch).await {
            Ok(ack) if ack.ok => {
                self.presenter.show(
                    StatusKind::Done,
                    ack.message.unwrap_or_else(|| "Batch cleared".to_string()),
                );
                let _ = self.folders.refresh().await;
            }
            Ok(ack) => {
                self.presenter.show(
                    StatusKind::Error,
                    ack.error.unwrap_or_else(|| "error".to_string()),
                );
            }
            Err(err) => self.presenter.show(StatusKind::Error, err.to_string()),
        }
    }

    /// Ask the server to open a batch folder on its desktop. Quiet on
    /// success; only failures reach the surface.
    pub async fn open_folder(&self, batch: Option<BatchRef>) {
        let batch = batch.or_else(|| {
            self.folders
                .state()
                .selected(FolderPicker::Bridge)
                .map(|f| BatchRef {
                    username: f.username.clone(),
                    date: f.date.clone(),
                })
        });
        let Some(batch) = batch else {
            self.presenter
                .show(StatusKind::Error, "Choose a folder first");
            return;
        };
        match self.client.open_folder(&batch).await {
            Ok(ack) if ack.ok => {}
            Ok(ack) => {
                self.presenter.show(
                    StatusKind::Error,
                    ack.error.unwrap_or_else(|| "error".to_string()),
                );
            }
            Err(err) => self.presenter.show(StatusKind::Error, err.to_string()),
        }
    }

    pub async fn save_schedule(&self, enabled: bool, hour: u8, minute: u8, merge: bool) {
        self.busy.schedule.set();
        let result = self
            .client
            .save_schedule(&ScheduleRequest {
                enabled,
                hour,
                minute,
                merge,
            })
            .await;
        self.busy.schedule.clear();
        match result {
            Ok(ack) if ack.ok => self.presenter.show(StatusKind::Done, "Schedule saved"),
            Ok(ack) => self.presenter.show(
                StatusKind::Error,
                ack.error.unwrap_or_else(|| "error".to_string()),
            ),
            Err(err) => self.presenter.show(StatusKind::Error, err.to_string()),
        }
    }

    pub async fn handle(&self, cmd: UiCommand) {
        match cmd {
            UiCommand::AddAccount { input } => {
                self.account_add_form(&input).await;
            }
            UiCommand::AddSuggested { usernames } => {
                self.add_suggested(usernames).await;
            }
            UiCommand::RemoveAccount { username } => {
                self.roster.remove(&username).await;
            }
            UiCommand::ToggleAccount { username } => {
                self.roster.toggle(&username).await;
            }
            UiCommand::SetAllChecked(checked) => {
                self.roster.set_all_checked(checked).await;
            }
            UiCommand::RefreshSuggested => self.refresh_suggested().await,
            UiCommand::Download { username, merge } => {
                self.submit_download(&username, merge).await;
            }
            UiCommand::DownloadSelected { merge } => {
                self.submit_download_selected(merge).await;
            }
            UiCommand::Merge {
                username,
                date,
                mode,
            } => self.submit_merge(&username, date, mode).await,
            UiCommand::UploadFolder {
                manual,
                privacy,
                upload_type,
            } => self.submit_upload(manual, &privacy, &upload_type).await,
            UiCommand::UploadFile {
                path,
                title,
                privacy,
            } => self.submit_upload_file(&path, title, &privacy).await,
            UiCommand::UploadAll {
                privacy,
                upload_type,
            } => self.submit_upload_all(&privacy, &upload_type).await,
            UiCommand::RefreshFolders => self.refresh_folders().await,
            UiCommand::RefreshChannels => self.refresh_channels().await,
            UiCommand::SelectFolder { which, key } => self.folders.select(which, key),
            UiCommand::SelectChannel { which, key } => self.channels.select(which, key),
            UiCommand::ClearBatch { batch } => self.clear_batch(batch).await,
            UiCommand::OpenFolder { batch } => self.open_folder(batch).await,
            UiCommand::SaveSchedule {
                enabled,
                hour,
                minute,
                merge,
            } => self.save_schedule(enabled, hour, minute, merge).await,
            UiCommand::ShowStatus { kind, text } => self.presenter.show(kind, text),
            UiCommand::Quit => {}
        }
    }
}

/// Drain UI commands and execute them. Handlers run as independent tasks so
/// a slow submission never blocks the next keypress.
pub async fn run_controller(
    console: std::sync::Arc<Console>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        if matches!(cmd, UiCommand::Quit) {
            break;
        }
        let console = console.clone();
        tokio::spawn(async move {
            console.handle(cmd).await;
        });
    }
}

/// Today's date stamp, the default for merge and upload forms.
pub fn today_stamp() -> String {
    let fmt = format_description!("[year]-[month]-[day]");
    OffsetDateTime::now_utc()
        .date()
        .format(&fmt)
        .unwrap_or_default()
}

/// Caption template for the manual bridge's clipboard copy.
pub fn caption_for(username: &str) -> String {
    format!("Snapchat Story from {username} #snapchat #story #fyp #viral")
}

/// Next occurrence of hh:mm at or after `now`, same day or tomorrow.
pub fn next_run_from(now: OffsetDateTime, hour: u8, minute: u8) -> Option<OffsetDateTime> {
    let at = time::Time::from_hms(hour, minute, 0).ok()?;
    let mut next = now.replace_time(at);
    if next <= now {
        next += time::Duration::days(1);
    }
    Some(next)
}

/// Preview label for the schedule form; empty when the schedule is off.
pub fn next_run_label(enabled: bool, hour: u8, minute: u8) -> Option<String> {
    if !enabled {
        return None;
    }
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let next = next_run_from(now, hour, minute)?;
    let fmt = format_description!("[weekday repr:short] [hour]:[minute]");
    next.format(&fmt).ok().map(|s| format!("Next run: {s}"))
}
