//! Terminal surface: board rendering, toasts, the activity log, and
//! stdin-driven commands and confirmations.

use crate::session::SessionStatus;
use chrono::{DateTime, Local};
use detection_stats::{DisplayBoard, SharedBoard};
use reset_coordinator::{Confirm, NoticeLevel, Notifier};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Activity entries kept for the `log` command
const ACTIVITY_CAPACITY: usize = 100;

/// Input lines, shared by the command loop and confirmation prompts
pub type SharedInput<R = BufReader<Stdin>> = Arc<tokio::sync::Mutex<Lines<R>>>;

pub fn shared_lines<R: AsyncBufRead + Unpin>(reader: R) -> SharedInput<R> {
    Arc::new(tokio::sync::Mutex::new(reader.lines()))
}

pub fn stdin_lines() -> SharedInput {
    shared_lines(BufReader::new(tokio::io::stdin()))
}

/// Console commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reset,
    Status,
    Models,
    Log,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "reset" | "r" => Some(Command::Reset),
            "status" | "s" => Some(Command::Status),
            "models" => Some(Command::Models),
            "log" => Some(Command::Log),
            "help" | "?" => Some(Command::Help),
            "quit" | "exit" | "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

pub const HELP: &str = "commands: start | stop | reset | status | models | log | help | quit";

fn level_tag(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "INFO",
        NoticeLevel::Success => " OK ",
        NoticeLevel::Error => "FAIL",
    }
}

/// Render the counters and status label as terminal text
pub fn render_board(board: &DisplayBoard) -> String {
    let stats = board.stats();
    let mut out = format!(
        "closed eyes: {:>5}  open mouth: {:>5}  fatigue: {:<9} [{}]\n\
         open eyes:   {:>5}  closed mouth: {:>3}  total: {:>8}  [{}]\n\
         detection time: {}",
        stats.closed_eyes,
        stats.open_mouth,
        stats.fatigue_indicator,
        stats.alert_color,
        stats.open_eyes,
        stats.closed_mouth,
        stats.total_detections,
        stats.info_color,
        stats.detection_time,
    );
    if let Some(status) = board.status() {
        out.push_str(&format!(
            "\nstatus: {} | {} | {}",
            status.title, status.state, status.fatigue
        ));
    }
    out
}

pub fn render_status(status: &SessionStatus) -> String {
    format!(
        "user: {}  model: {}  type: {}\n\
         stream: {} ({})\n\
         polling: {}  ticks={} rendered={} skipped={}\n\
         reset: {:?}\n{}",
        status.context.username,
        if status.context.model.is_empty() { "-" } else { status.context.model.as_str() },
        status
            .context
            .detection_type
            .map(|t| t.label())
            .unwrap_or("-"),
        if status.stream_active { "active" } else { "inactive" },
        status.stream_url.as_deref().unwrap_or("no stream"),
        if status.polling { "running" } else { "stopped" },
        status.poll.ticks,
        status.poll.rendered,
        status.poll.skipped,
        status.reset_state,
        render_board(&status.board),
    )
}

/// Print the board whenever it changes
pub fn spawn_board_printer(board: SharedBoard, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        let mut last_revision = 0;
        loop {
            ticker.tick().await;
            let board = board.read().await;
            if board.revision() != last_revision {
                last_revision = board.revision();
                println!("{}\n", render_board(&board));
            }
        }
    })
}

/// One activity log line
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub at: DateTime<Local>,
    pub level: NoticeLevel,
    pub message: String,
}

impl ActivityEntry {
    pub fn line(&self) -> String {
        format!(
            "[{}] {} {}",
            self.at.format("%H:%M:%S"),
            level_tag(self.level),
            self.message
        )
    }
}

/// Prints toasts to the terminal and keeps a bounded activity log
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    activity: Mutex<VecDeque<ActivityEntry>>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activity entries, oldest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.activity
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Notifier for ConsoleNotifier {
    fn toast(&self, level: NoticeLevel, message: &str) {
        println!(">> {} {}", level_tag(level), message);
        match level {
            NoticeLevel::Error => error!(target: "toast", "{}", message),
            _ => info!(target: "toast", "{}", message),
        }
    }

    fn activity(&self, level: NoticeLevel, message: &str) {
        let entry = ActivityEntry {
            at: Local::now(),
            level,
            message: message.to_string(),
        };
        info!(target: "activity", "{}", entry.line());
        if let Ok(mut log) = self.activity.lock() {
            if log.len() == ACTIVITY_CAPACITY {
                log.pop_front();
            }
            log.push_back(entry);
        }
    }
}

/// Asks `y/N` on the terminal
pub struct StdinConfirm<R = BufReader<Stdin>> {
    input: SharedInput<R>,
}

impl<R> StdinConfirm<R> {
    pub fn new(input: SharedInput<R>) -> Self {
        Self { input }
    }
}

/// Only an explicit yes counts as confirmation
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl<R: AsyncBufRead + Unpin + Send> Confirm for StdinConfirm<R> {
    async fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        let _ = std::io::stdout().flush();

        match self.input.lock().await.next_line().await {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(e) => {
                error!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}
