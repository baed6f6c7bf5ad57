use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use crate::catalog::ChannelPicker;
use crate::model::{BatchRef, MergeMode, StatusKind};
use crate::orchestrator::{next_run_label, Console, ConsoleConfig};

/// Where a line of one-shot output belongs: listings on stdout, status
/// echoes on stderr, so scripts can pipe one without the other.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Writer task for one-shot mode. Terminal writes can block, so they happen
/// on a blocking thread; async code only queues lines.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            let _ = match line {
                OutputLine::Stdout(msg) => writeln!(out, "{msg}"),
                OutputLine::Stderr(msg) => writeln!(err, "{msg}"),
            };
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "storypipe",
    version,
    about = "Terminal console for a story-media pipeline server"
)]
pub struct Cli {
    /// Base URL of the pipeline server
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Security token attached to mutating requests
    #[arg(long, env = "STORYPIPE_TOKEN")]
    pub token: Option<String>,

    /// Delay between task status checks
    #[arg(long, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// Per-request timeout
    #[arg(long, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// One-shot command; omit to open the interactive console
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MergeModeArg {
    Shorts,
    Full,
    Both,
}

impl From<MergeModeArg> for MergeMode {
    fn from(mode: MergeModeArg) -> Self {
        match mode {
            MergeModeArg::Shorts => MergeMode::Shorts,
            MergeModeArg::Full => MergeMode::Full,
            MergeModeArg::Both => MergeMode::Both,
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Manage the source account roster
    Accounts {
        #[command(subcommand)]
        action: AccountsCommand,
    },
    /// List suggested accounts
    Suggested,
    /// Download stories for one account
    Download {
        username: String,
        /// Merge the batch after downloading
        #[arg(long)]
        merge: bool,
    },
    /// Download stories for every checked account
    DownloadSelected {
        #[arg(long)]
        merge: bool,
    },
    /// Merge one dated batch
    Merge {
        username: String,
        /// Batch date (defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_enum, default_value_t = MergeModeArg::Shorts)]
        mode: MergeModeArg,
    },
    /// Upload one merged batch
    Upload {
        username: String,
        /// Batch date (defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "private")]
        privacy: String,
        #[arg(long = "type", default_value = "shorts")]
        upload_type: String,
        /// Destination channel id
        #[arg(long)]
        channel: Option<String>,
    },
    /// Upload a single local video file
    UploadFile {
        path: PathBuf,
        /// Video title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "private")]
        privacy: String,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Upload every merged folder in one job
    UploadAll {
        #[arg(long, default_value = "private")]
        privacy: String,
        #[arg(long = "type", default_value = "shorts")]
        upload_type: String,
        /// Destination channel id (defaults to the stories channel)
        #[arg(long)]
        channel: Option<String>,
    },
    /// List merged output folders
    Folders,
    /// List connected upload channels
    Channels {
        /// Re-query the upstream platform before listing
        #[arg(long)]
        refresh: bool,
    },
    /// Save the daily download schedule
    Schedule {
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        enabled: bool,
        #[arg(value_parser = clap::value_parser!(u8).range(0..24))]
        hour: u8,
        #[arg(value_parser = clap::value_parser!(u8).range(0..60))]
        minute: u8,
        #[arg(long)]
        merge: bool,
    },
    /// Delete one dated batch on the server
    ClearBatch { username: String, date: String },
    /// Open a batch folder on the server's desktop
    OpenFolder { username: String, date: String },
}

#[derive(Debug, Subcommand, Clone)]
pub enum AccountsCommand {
    /// Print the roster
    List,
    /// Register one username (or several, comma-separated)
    Add { input: String },
    Remove { username: String },
    /// Flip one account's checked state
    Toggle { username: String },
    /// Check or uncheck every account
    CheckAll {
        #[arg(action = clap::ArgAction::Set)]
        checked: bool,
    },
}

pub fn build_config(args: &Cli) -> ConsoleConfig {
    ConsoleConfig {
        base_url: args.base_url.clone(),
        token: args.token.clone(),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: Duration::from(args.request_timeout),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    match args.command.clone() {
        None => {
            #[cfg(feature = "tui")]
            {
                crate::tui::run(cfg).await
            }
            #[cfg(not(feature = "tui"))]
            {
                anyhow::bail!("built without the tui feature; pass a subcommand")
            }
        }
        Some(command) => run_command(cfg, command).await,
    }
}

fn kind_label(kind: StatusKind) -> &'static str {
    match kind {
        StatusKind::Running => "running",
        StatusKind::Done => "done",
        StatusKind::Error => "error",
    }
}

/// Run one command to completion, echoing status surface changes to stderr
/// and collection listings to stdout.
async fn run_command(cfg: ConsoleConfig, command: Command) -> Result<()> {
    let console = Arc::new(Console::new(&cfg)?);
    let (out_tx, out_handle) = spawn_output_writer();

    // Mirror the status surface onto stderr for scripting.
    let mut status_rx = console.presenter.subscribe();
    let status_tx = out_tx.clone();
    let status_echo = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let note = status_rx.borrow_and_update().clone();
            if let Some(note) = note {
                let _ = status_tx.send(OutputLine::Stderr(format!(
                    "[{}] {}",
                    kind_label(note.kind),
                    note.text
                )));
            }
        }
    });

    match command {
        Command::Accounts { action } => {
            match action {
                AccountsCommand::List => console.roster.bootstrap().await,
                AccountsCommand::Add { input } => {
                    console.account_add_form(&input).await;
                }
                AccountsCommand::Remove { username } => {
                    console.roster.remove(&username).await;
                }
                AccountsCommand::Toggle { username } => {
                    console.roster.bootstrap().await;
                    console.roster.toggle(&username).await;
                }
                AccountsCommand::CheckAll { checked } => {
                    console.roster.set_all_checked(checked).await;
                }
            }
            for account in console.roster.snapshot() {
                let mark = if account.checked { "x" } else { " " };
                let _ = out_tx.send(OutputLine::Stdout(format!("[{mark}] {}", account.username)));
            }
        }
        Command::Suggested => {
            console.roster.load_suggested().await;
            let panel = console.roster.subscribe_suggested().borrow().clone();
            if let Some(note) = panel.note {
                let _ = out_tx.send(OutputLine::Stderr(note));
            }
            for account in panel.accounts {
                let line = match &account.label {
                    Some(label) => format!("{} ({label})", account.username),
                    None => account.username.clone(),
                };
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
        Command::Download { username, merge } => {
            console.submit_download(&username, merge).await;
        }
        Command::DownloadSelected { merge } => {
            console.roster.bootstrap().await;
            console.submit_download_selected(merge).await;
        }
        Command::Merge {
            username,
            date,
            mode,
        } => {
            console.submit_merge(&username, date, mode.into()).await;
        }
        Command::Upload {
            username,
            date,
            privacy,
            upload_type,
            channel,
        } => {
            if let Some(id) = channel {
                console.channels.load().await;
                console.channels.select(ChannelPicker::Upload, Some(id));
            }
            let date = date.unwrap_or_else(crate::orchestrator::today_stamp);
            console
                .submit_upload(Some((username, date)), &privacy, &upload_type)
                .await;
        }
        Command::UploadFile {
            path,
            title,
            privacy,
            channel,
        } => {
            if let Some(id) = channel {
                console.channels.load().await;
                console.channels.select(ChannelPicker::UploadFile, Some(id));
            }
            console.submit_upload_file(&path, title, &privacy).await;
        }
        Command::UploadAll {
            privacy,
            upload_type,
            channel,
        } => {
            console.channels.load().await;
            if let Some(id) = channel {
                console.channels.select(ChannelPicker::Bulk, Some(id));
            }
            console.submit_upload_all(&privacy, &upload_type).await;
        }
        Command::Folders => {
            console.refresh_folders().await;
            for folder in console.folders.state().folders {
                let _ = out_tx.send(OutputLine::Stdout(folder.key()));
            }
        }
        Command::Channels { refresh } => {
            if refresh {
                console.refresh_channels().await;
            } else {
                console.channels.load().await;
            }
            let state = console.channels.state();
            if let Some(note) = state.note {
                let _ = out_tx.send(OutputLine::Stderr(note));
            }
            for channel in state.channels {
                let _ = out_tx.send(OutputLine::Stdout(format!(
                    "{}  {}",
                    channel.id, channel.title
                )));
            }
        }
        Command::Schedule {
            enabled,
            hour,
            minute,
            merge,
        } => {
            console.save_schedule(enabled, hour, minute, merge).await;
            if let Some(label) = next_run_label(enabled, hour, minute) {
                let _ = out_tx.send(OutputLine::Stdout(label));
            }
        }
        Command::ClearBatch { username, date } => {
            console.clear_batch(Some(BatchRef { username, date })).await;
        }
        Command::OpenFolder { username, date } => {
            console.open_folder(Some(BatchRef { username, date })).await;
        }
    }

    // Let every poll sequence reach its terminal state before judging the
    // outcome for the exit code.
    console.wait_idle().await;
    let failed = matches!(
        console.presenter.current(),
        Some(note) if note.kind == StatusKind::Error
    );
    let final_text = console.presenter.current().map(|n| n.text);

    status_echo.abort();
    drop(out_tx);
    let _ = out_handle.await;

    if failed {
        anyhow::bail!(final_text.unwrap_or_else(|| "command failed".to_string()));
    }
    Ok(())
}
