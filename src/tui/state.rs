use std::collections::HashSet;

/// Which pane owns the cursor and pane-local keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Accounts,
    Suggested,
    Folders,
    Channels,
}

impl Pane {
    pub fn next(self) -> Self {
        match self {
            Pane::Accounts => Pane::Suggested,
            Pane::Suggested => Pane::Folders,
            Pane::Folders => Pane::Channels,
            Pane::Channels => Pane::Accounts,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Pane::Accounts => Pane::Channels,
            Pane::Suggested => Pane::Accounts,
            Pane::Folders => Pane::Suggested,
            Pane::Channels => Pane::Folders,
        }
    }
}

/// What the bottom input line is collecting, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    None,
    /// Single username for the add-account form.
    AddAccount,
    /// Comma/newline separated usernames for the bulk add form.
    BulkAdd,
    /// Username for a one-off download.
    DownloadUser,
    /// Username for a merge of today's batch.
    MergeUser,
    /// Local path for a single-file upload.
    UploadFilePath,
}

impl InputMode {
    pub fn prompt(self) -> &'static str {
        match self {
            InputMode::None => "",
            InputMode::AddAccount => "add account",
            InputMode::BulkAdd => "add accounts (comma separated)",
            InputMode::DownloadUser => "download username",
            InputMode::MergeUser => "merge username",
            InputMode::UploadFilePath => "video file path",
        }
    }
}

/// UI-thread-only state: pane focus, cursors, and the input line. Everything
/// the server owns is read from the controller's watch channels at draw time.
pub struct UiState {
    pub pane: Pane,
    pub account_cursor: usize,
    pub suggested_cursor: usize,
    /// Locally checked suggested rows, keyed by username.
    pub suggested_checked: HashSet<String>,
    pub folder_cursor: usize,
    pub channel_cursor: usize,
    pub input: InputMode,
    pub buffer: String,
    /// The sidebar "merge after download" toggle.
    pub merge_after: bool,
    pub show_help: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            pane: Pane::Accounts,
            account_cursor: 0,
            suggested_cursor: 0,
            suggested_checked: HashSet::new(),
            folder_cursor: 0,
            channel_cursor: 0,
            input: InputMode::None,
            buffer: String::new(),
            merge_after: false,
            show_help: false,
        }
    }
}

impl UiState {
    pub fn cursor_for(&mut self, pane: Pane) -> &mut usize {
        match pane {
            Pane::Accounts => &mut self.account_cursor,
            Pane::Suggested => &mut self.suggested_cursor,
            Pane::Folders => &mut self.folder_cursor,
            Pane::Channels => &mut self.channel_cursor,
        }
    }

    pub fn move_cursor(&mut self, pane: Pane, delta: isize, len: usize) {
        let cursor = self.cursor_for(pane);
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = cursor.saturating_add_signed(delta);
        *cursor = next.min(len - 1);
    }

    pub fn start_input(&mut self, mode: InputMode) {
        self.input = mode;
        self.buffer.clear();
    }

    pub fn cancel_input(&mut self) {
        self.input = InputMode::None;
        self.buffer.clear();
    }
}
