mod clipboard;
mod state;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::watch;

use crate::catalog::{ChannelPicker, ChannelRegistryState, FolderCatalogState, FolderPicker};
use crate::model::{Account, BatchRef, MergeMode, StatusKind, StatusNote};
use crate::orchestrator::{caption_for, run_controller, BusyFlags, Console, ConsoleConfig, UiCommand};
use crate::roster::SuggestedPanel;

use state::{InputMode, Pane, UiState};

/// Read-only views of the controller's published state, one receiver per
/// watch channel. The UI thread clones snapshots out of these each tick.
pub struct UiViews {
    status_rx: watch::Receiver<Option<StatusNote>>,
    roster_rx: watch::Receiver<Vec<Account>>,
    suggested_rx: watch::Receiver<SuggestedPanel>,
    folders_rx: watch::Receiver<FolderCatalogState>,
    channels_rx: watch::Receiver<ChannelRegistryState>,
    busy: BusyFlags,
}

/// One frame's worth of state, cloned out of the watch channels so rendering
/// and key handling see a consistent picture.
struct Snapshot {
    status: Option<StatusNote>,
    accounts: Vec<Account>,
    suggested: SuggestedPanel,
    folders: FolderCatalogState,
    channels: ChannelRegistryState,
}

impl UiViews {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status_rx.borrow().clone(),
            accounts: self.roster_rx.borrow().clone(),
            suggested: self.suggested_rx.borrow().clone(),
            folders: self.folders_rx.borrow().clone(),
            channels: self.channels_rx.borrow().clone(),
        }
    }
}

pub async fn run(cfg: ConsoleConfig) -> Result<()> {
    let console = Arc::new(Console::new(&cfg)?);
    console.bootstrap().await;

    // Unbounded channel avoids backpressure between keypresses and handlers.
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let views = UiViews {
        status_rx: console.presenter.subscribe(),
        roster_rx: console.roster.subscribe(),
        suggested_rx: console.roster.subscribe_suggested(),
        folders_rx: console.folders.subscribe(),
        channels_rx: console.channels.subscribe(),
        busy: console.busy.clone(),
    };

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(views, cmd_tx));

    run_controller(console.clone(), cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("UI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(views: UiViews, cmd_tx: UnboundedSender<UiCommand>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        let snap = views.snapshot();

        if last_tick.elapsed() >= tick_rate {
            terminal
                .draw(|f| draw(f.area(), f, &state, &snap, &views.busy))
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.input != InputMode::None {
                    handle_input_key(&mut state, &cmd_tx, k.code);
                    continue;
                }
                if matches!(
                    (k.modifiers, k.code),
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c'))
                ) {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
                handle_key(&mut state, &snap, &cmd_tx, k.code);
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Keys while the bottom input line is collecting text.
fn handle_input_key(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, code: KeyCode) {
    match code {
        KeyCode::Esc => state.cancel_input(),
        KeyCode::Backspace => {
            state.buffer.pop();
        }
        KeyCode::Char(c) => state.buffer.push(c),
        KeyCode::Enter => {
            let text = state.buffer.trim().to_string();
            let mode = state.input;
            state.cancel_input();
            if text.is_empty() {
                return;
            }
            let cmd = match mode {
                InputMode::None => return,
                InputMode::AddAccount | InputMode::BulkAdd => {
                    UiCommand::AddAccount { input: text }
                }
                InputMode::DownloadUser => UiCommand::Download {
                    username: text,
                    merge: state.merge_after,
                },
                InputMode::MergeUser => UiCommand::Merge {
                    username: text,
                    date: None,
                    mode: MergeMode::Shorts,
                },
                InputMode::UploadFilePath => UiCommand::UploadFile {
                    path: PathBuf::from(text),
                    title: None,
                    privacy: "private".to_string(),
                },
            };
            let _ = cmd_tx.send(cmd);
        }
        _ => {}
    }
}

fn handle_key(
    state: &mut UiState,
    snap: &Snapshot,
    cmd_tx: &UnboundedSender<UiCommand>,
    code: KeyCode,
) {
    let pane = state.pane;
    let pane_len = match pane {
        Pane::Accounts => snap.accounts.len(),
        Pane::Suggested => snap.suggested.accounts.len(),
        Pane::Folders => snap.folders.folders.len(),
        Pane::Channels => snap.channels.channels.len(),
    };

    match code {
        KeyCode::Tab => state.pane = pane.next(),
        KeyCode::BackTab => state.pane = pane.prev(),
        KeyCode::Up | KeyCode::Char('k') => state.move_cursor(pane, -1, pane_len),
        KeyCode::Down | KeyCode::Char('j') => state.move_cursor(pane, 1, pane_len),
        KeyCode::Char(' ') => match pane {
            Pane::Accounts => {
                if let Some(account) = snap.accounts.get(state.account_cursor) {
                    let _ = cmd_tx.send(UiCommand::ToggleAccount {
                        username: account.username.clone(),
                    });
                }
            }
            Pane::Suggested => {
                if let Some(account) = snap.suggested.accounts.get(state.suggested_cursor) {
                    let username = account.username.clone();
                    if !state.suggested_checked.remove(&username) {
                        state.suggested_checked.insert(username);
                    }
                }
            }
            _ => {}
        },
        KeyCode::Enter => match pane {
            Pane::Accounts => {
                if let Some(account) = snap.accounts.get(state.account_cursor) {
                    let _ = cmd_tx.send(UiCommand::ToggleAccount {
                        username: account.username.clone(),
                    });
                }
            }
            Pane::Suggested => {
                let usernames: Vec<String> = snap
                    .suggested
                    .accounts
                    .iter()
                    .filter(|a| state.suggested_checked.contains(&a.username))
                    .map(|a| a.username.clone())
                    .collect();
                let _ = cmd_tx.send(UiCommand::AddSuggested { usernames });
                state.suggested_checked.clear();
            }
            Pane::Folders => {
                let key = snap.folders.folders.get(state.folder_cursor).map(|f| f.key());
                let _ = cmd_tx.send(UiCommand::SelectFolder {
                    which: FolderPicker::Upload,
                    key,
                });
            }
            Pane::Channels => {
                let key = snap
                    .channels
                    .channels
                    .get(state.channel_cursor)
                    .map(|c| c.id.clone());
                let _ = cmd_tx.send(UiCommand::SelectChannel {
                    which: ChannelPicker::Upload,
                    key,
                });
            }
        },
        KeyCode::Char('b') if pane == Pane::Channels => {
            let key = snap
                .channels
                .channels
                .get(state.channel_cursor)
                .map(|c| c.id.clone());
            let _ = cmd_tx.send(UiCommand::SelectChannel {
                which: ChannelPicker::Bulk,
                key,
            });
        }
        KeyCode::Char('v') if pane == Pane::Channels => {
            let key = snap
                .channels
                .channels
                .get(state.channel_cursor)
                .map(|c| c.id.clone());
            let _ = cmd_tx.send(UiCommand::SelectChannel {
                which: ChannelPicker::UploadFile,
                key,
            });
        }
        KeyCode::Char('a') => state.start_input(InputMode::AddAccount),
        KeyCode::Char('A') => state.start_input(InputMode::BulkAdd),
        KeyCode::Char('x') => match pane {
            Pane::Accounts => {
                if let Some(account) = snap.accounts.get(state.account_cursor) {
                    let _ = cmd_tx.send(UiCommand::RemoveAccount {
                        username: account.username.clone(),
                    });
                }
            }
            Pane::Folders => {
                if let Some(folder) = snap.folders.folders.get(state.folder_cursor) {
                    let _ = cmd_tx.send(UiCommand::ClearBatch {
                        batch: Some(BatchRef {
                            username: folder.username.clone(),
                            date: folder.date.clone(),
                        }),
                    });
                }
            }
            _ => {}
        },
        KeyCode::Char('o') if pane == Pane::Folders => {
            if let Some(folder) = snap.folders.folders.get(state.folder_cursor) {
                let _ = cmd_tx.send(UiCommand::OpenFolder {
                    batch: Some(BatchRef {
                        username: folder.username.clone(),
                        date: folder.date.clone(),
                    }),
                });
            }
        }
        KeyCode::Char('y') if pane == Pane::Folders => {
            if let Some(folder) = snap.folders.folders.get(state.folder_cursor) {
                let caption = caption_for(&folder.username);
                let cmd = match clipboard::copy_to_clipboard(&caption) {
                    Ok(()) => UiCommand::ShowStatus {
                        kind: StatusKind::Done,
                        text: "Caption copied".to_string(),
                    },
                    Err(e) => UiCommand::ShowStatus {
                        kind: StatusKind::Error,
                        text: format!("Copy failed: {e:#}"),
                    },
                };
                let _ = cmd_tx.send(cmd);
            }
        }
        KeyCode::Char('d') => {
            let _ = cmd_tx.send(UiCommand::DownloadSelected {
                merge: state.merge_after,
            });
        }
        KeyCode::Char('D') => state.start_input(InputMode::DownloadUser),
        KeyCode::Char('m') => state.start_input(InputMode::MergeUser),
        KeyCode::Char('M') => state.merge_after = !state.merge_after,
        KeyCode::Char('s') => {
            let _ = cmd_tx.send(UiCommand::SetAllChecked(true));
        }
        KeyCode::Char('S') => {
            let _ = cmd_tx.send(UiCommand::SetAllChecked(false));
        }
        KeyCode::Char('r') => {
            let _ = cmd_tx.send(UiCommand::RefreshFolders);
        }
        KeyCode::Char('R') => {
            let _ = cmd_tx.send(UiCommand::RefreshSuggested);
        }
        KeyCode::Char('c') => {
            let _ = cmd_tx.send(UiCommand::RefreshChannels);
        }
        KeyCode::Char('u') => {
            let _ = cmd_tx.send(UiCommand::UploadAll {
                privacy: "private".to_string(),
                upload_type: "shorts".to_string(),
            });
        }
        KeyCode::Char('U') => {
            let _ = cmd_tx.send(UiCommand::UploadFolder {
                manual: None,
                privacy: "private".to_string(),
                upload_type: "shorts".to_string(),
            });
        }
        KeyCode::Char('F') => state.start_input(InputMode::UploadFilePath),
        KeyCode::Char('?') => state.show_help = !state.show_help,
        _ => {}
    }
}

fn draw(area: Rect, f: &mut Frame, state: &UiState, snap: &Snapshot, busy: &BusyFlags) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(area);

    draw_status(rows[0], f, snap);
    if state.show_help {
        draw_help(rows[1], f);
    } else {
        draw_panes(rows[1], f, state, snap);
    }
    draw_footer(rows[2], f, state, busy);
}

fn draw_status(area: Rect, f: &mut Frame, snap: &Snapshot) {
    let (title, style, text) = match &snap.status {
        Some(note) => match note.kind {
            StatusKind::Running => (
                "Working",
                Style::default().fg(Color::Yellow),
                note.text.clone(),
            ),
            StatusKind::Done => ("Done", Style::default().fg(Color::Green), note.text.clone()),
            StatusKind::Error => ("Error", Style::default().fg(Color::Red), note.text.clone()),
        },
        None => (
            "Idle",
            Style::default().fg(Color::DarkGray),
            String::new(),
        ),
    };
    let widget = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

/// Window start so the cursor row is always visible.
fn scroll_start(cursor: usize, viewport: usize) -> usize {
    if viewport == 0 {
        return 0;
    }
    cursor.saturating_sub(viewport - 1)
}

fn render_list(
    area: Rect,
    f: &mut Frame,
    title: &str,
    focused: bool,
    cursor: usize,
    lines: Vec<Line<'static>>,
) {
    let viewport = area.height.saturating_sub(2) as usize;
    let start = scroll_start(cursor, viewport);
    let visible: Vec<Line> = lines
        .into_iter()
        .enumerate()
        .skip(start)
        .take(viewport)
        .map(|(i, line)| {
            if focused && i == cursor {
                line.style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                line
            }
        })
        .collect();
    let widget = Paragraph::new(visible).block(pane_block(title, focused));
    f.render_widget(widget, area);
}

fn draw_panes(area: Rect, f: &mut Frame, state: &UiState, snap: &Snapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    let account_lines: Vec<Line> = snap
        .accounts
        .iter()
        .map(|a| {
            let mark = if a.checked { "[x]" } else { "[ ]" };
            Line::from(format!("{mark} {}", a.username))
        })
        .collect();
    render_list(
        cols[0],
        f,
        "Accounts",
        state.pane == Pane::Accounts,
        state.account_cursor,
        account_lines,
    );

    let mut suggested_lines: Vec<Line> = snap
        .suggested
        .accounts
        .iter()
        .map(|a| {
            let mark = if state.suggested_checked.contains(&a.username) {
                "[x]"
            } else {
                "[ ]"
            };
            Line::from(format!("{mark} {}", a.display()))
        })
        .collect();
    if let Some(note) = &snap.suggested.note {
        suggested_lines.push(Line::from(Span::styled(
            note.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    render_list(
        cols[1],
        f,
        "Suggested",
        state.pane == Pane::Suggested,
        state.suggested_cursor,
        suggested_lines,
    );

    let folder_lines: Vec<Line> = snap
        .folders
        .folders
        .iter()
        .map(|folder| {
            let key = folder.key();
            let mut text = key.clone();
            if snap.folders.upload.key() == Some(key.as_str()) {
                text.push_str(" [up]");
            }
            if snap.folders.clear.key() == Some(key.as_str()) {
                text.push_str(" [clr]");
            }
            if snap.folders.bridge.key() == Some(key.as_str()) {
                text.push_str(" [open]");
            }
            Line::from(text)
        })
        .collect();
    render_list(
        cols[2],
        f,
        "Folders",
        state.pane == Pane::Folders,
        state.folder_cursor,
        folder_lines,
    );

    let mut channel_lines: Vec<Line> = snap
        .channels
        .channels
        .iter()
        .map(|channel| {
            let mut text = channel.title.clone();
            if snap.channels.upload.key() == Some(channel.id.as_str()) {
                text.push_str(" [up]");
            }
            if snap.channels.upload_file.key() == Some(channel.id.as_str()) {
                text.push_str(" [file]");
            }
            if snap.channels.bulk.key() == Some(channel.id.as_str()) {
                text.push_str(" [bulk]");
            }
            Line::from(text)
        })
        .collect();
    if let Some(note) = &snap.channels.note {
        channel_lines.push(Line::from(Span::styled(
            note.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }
    render_list(
        cols[3],
        f,
        "Channels",
        state.pane == Pane::Channels,
        state.channel_cursor,
        channel_lines,
    );
}

fn draw_footer(area: Rect, f: &mut Frame, state: &UiState, busy: &BusyFlags) {
    let line = if state.input != InputMode::None {
        Line::from(vec![
            Span::styled(
                format!("{}> ", state.input.prompt()),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(state.buffer.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ])
    } else {
        let mut jobs: Vec<&str> = Vec::new();
        if busy.download.is_busy() {
            jobs.push("download");
        }
        if busy.download_selected.is_busy() {
            jobs.push("download-selected");
        }
        if busy.merge.is_busy() {
            jobs.push("merge");
        }
        if busy.upload_all.is_busy() {
            jobs.push("upload-all");
        }
        if busy.accounts.is_busy() {
            jobs.push("accounts");
        }
        if busy.schedule.is_busy() {
            jobs.push("schedule");
        }
        let mut spans = vec![Span::styled(
            "q quit  Tab panes  Space toggle  d download  m merge  u upload-all  ? help",
            Style::default().fg(Color::Gray),
        )];
        if state.merge_after {
            spans.push(Span::styled(
                "  [merge after download]",
                Style::default().fg(Color::Cyan),
            ));
        }
        if !jobs.is_empty() {
            spans.push(Span::styled(
                format!("  busy: {}", jobs.join(", ")),
                Style::default().fg(Color::Yellow),
            ));
        }
        Line::from(spans)
    };
    let widget = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(widget, area);
}

fn draw_help(area: Rect, f: &mut Frame) {
    let lines = vec![
        Line::from("Tab / Shift-Tab   switch pane"),
        Line::from("Up/Down, j/k      move cursor"),
        Line::from("Space / Enter     toggle account, check suggested, pick folder/channel"),
        Line::from("a / A             add one account / add many (comma separated)"),
        Line::from("x                 remove account, or clear the batch under the cursor"),
        Line::from("d / D             download checked accounts / one username"),
        Line::from("M                 toggle merge-after-download"),
        Line::from("m                 merge today's batch for a username"),
        Line::from("u / U             upload every merged folder / the picked folder"),
        Line::from("F                 upload a single video file by path"),
        Line::from("o / y  (folders)  open folder on the server / copy caption"),
        Line::from("Enter/b/v (channels)  pick upload / bulk / file channel"),
        Line::from("s / S             check / uncheck every account"),
        Line::from("r / R / c         refresh folders / suggested / channels"),
        Line::from("q                 quit"),
    ];
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_window_keeps_cursor_visible() {
        assert_eq!(scroll_start(0, 10), 0);
        assert_eq!(scroll_start(9, 10), 0);
        assert_eq!(scroll_start(10, 10), 1);
        assert_eq!(scroll_start(25, 10), 16);
        assert_eq!(scroll_start(3, 0), 0);
    }
}
