use serde::{Deserialize, Serialize};

/// Server-reported state of an asynchronous job. The server owns the task;
/// the client only ever holds the opaque id it polls with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Error,
    /// Anything the server reports that we do not recognize, including the
    /// `unknown` it answers for a task id it has no record of.
    #[serde(other)]
    Unrecognized,
}

impl TaskStatus {
    /// Terminal statuses end a poll sequence. `Unrecognized` also ends it:
    /// there is nothing sensible to keep polling for.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// How this status presents on the shared surface.
    pub fn kind(self) -> StatusKind {
        match self {
            TaskStatus::Done => StatusKind::Done,
            TaskStatus::Error => StatusKind::Error,
            _ => StatusKind::Running,
        }
    }
}

/// One poll answer from `/api/task/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Visual class of the shared status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Running,
    Done,
    Error,
}

/// One entry shown on the shared status surface.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusNote {
    pub kind: StatusKind,
    pub text: String,
}

/// A registered source account. The collection is server-ordered and unique
/// by username; the client never resorts or patches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// One dated batch of downloaded/merged media. Read-only from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedFolder {
    pub username: String,
    pub date: String,
}

impl MergedFolder {
    /// Stable picker key; username alone is not unique across dates.
    pub fn key(&self) -> String {
        format!("{}/{}", self.username, self.date)
    }
}

/// An external upload destination. Read-only from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestedAccount {
    pub username: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl SuggestedAccount {
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.username)
    }
}

/// Mutations of the account roster, discriminated by `action` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AccountAction {
    Add { username: String },
    Remove { username: String },
    Toggle { username: String },
    SetAllChecked { checked: bool },
    AddBulk { usernames: Vec<String> },
}

/// Answer to any `/api/accounts` mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsResponse {
    pub ok: bool,
    #[serde(default)]
    pub accounts: Option<Vec<Account>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub added: Option<u64>,
    #[serde(default)]
    pub skipped: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestedResponse {
    #[serde(default)]
    pub accounts: Vec<SuggestedAccount>,
}

/// Answer to a job submission: either a task id to poll or an error string.
#[derive(Debug, Clone, Deserialize)]
pub struct JobAccepted {
    pub ok: bool,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Answer to synchronous request/response calls (clear-batch, schedule,
/// open-folder).
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub channels: Option<Vec<Channel>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest {
    pub username: String,
    pub merge: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadSelectedRequest {
    pub usernames: Vec<String>,
    pub merge: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeRequest {
    pub username: String,
    pub date: String,
    pub merge_mode: MergeMode,
}

/// How a batch is merged: vertical shorts, a full-length cut, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Shorts,
    Full,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRequest {
    pub username: String,
    pub date: String,
    pub privacy: String,
    pub upload_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadAllRequest {
    pub folders: Vec<MergedFolder>,
    pub privacy: String,
    pub upload_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRequest {
    pub enabled: bool,
    pub hour: u8,
    pub minute: u8,
    pub merge: bool,
}

/// Identifies one dated batch for clear-batch / open-folder calls.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRef {
    pub username: String,
    pub date: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn task_status_parses_known_and_unknown_values() {
        let s: TaskState = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert_eq!(s.status, TaskStatus::Running);
        assert_eq!(s.message, None);

        let s: TaskState = serde_json::from_str(r#"{"status":"unknown"}"#).unwrap();
        assert_eq!(s.status, TaskStatus::Unrecognized);
        assert!(s.status.is_terminal());
        assert_eq!(s.status.kind(), StatusKind::Running);
    }

    #[test]
    fn status_kind_mapping_matches_surface_classes() {
        assert_eq!(TaskStatus::Pending.kind(), StatusKind::Running);
        assert_eq!(TaskStatus::Running.kind(), StatusKind::Running);
        assert_eq!(TaskStatus::Done.kind(), StatusKind::Done);
        assert_eq!(TaskStatus::Error.kind(), StatusKind::Error);
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }

    #[test]
    fn account_action_serializes_with_discriminator() {
        let v = serde_json::to_value(AccountAction::Add {
            username: "nasa".into(),
        })
        .unwrap();
        assert_eq!(v, serde_json::json!({"action": "add", "username": "nasa"}));

        let v = serde_json::to_value(AccountAction::SetAllChecked { checked: true }).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"action": "set_all_checked", "checked": true})
        );

        let v = serde_json::to_value(AccountAction::AddBulk {
            usernames: vec!["a".into(), "b".into()],
        })
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({"action": "add_bulk", "usernames": ["a", "b"]})
        );
    }

    #[test]
    fn optional_channel_id_is_omitted_when_absent() {
        let v = serde_json::to_value(UploadRequest {
            username: "nasa".into(),
            date: "2026-08-27".into(),
            privacy: "private".into(),
            upload_type: "shorts".into(),
            channel_id: None,
        })
        .unwrap();
        assert!(v.get("channel_id").is_none());
    }
}
