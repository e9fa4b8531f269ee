//! Console input for `cartsync watch`.
//!
//! Every stdin line is either the answer to a pending conflict prompt or a
//! command. Stdin is read on a dedicated thread so that a blocked read never
//! holds up runtime shutdown.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cartsync_core::{CommandEvent, WorkspaceFolder};
use cartsync_session::{CommandBus, LogSurface, ManagerEvent, PromptChoice, UserPrompt};
use tokio::sync::{mpsc, oneshot, watch};

const LINE_CHANNEL_CAPACITY: usize = 16;

const HELP: &str = "Commands: enable | disable | clean | add <folder> | remove <folder> | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    Upload(CommandEvent),
    Add(String),
    Remove(String),
    Help,
    Quit,
}

pub(crate) fn parse_console_line(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    match verb {
        "add" | "remove" if rest.is_empty() => Err(format!("'{verb}' needs a folder argument")),
        "add" => Ok(ConsoleCommand::Add(rest.to_string())),
        "remove" => Ok(ConsoleCommand::Remove(rest.to_string())),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        _ => line
            .parse::<CommandEvent>()
            .map(ConsoleCommand::Upload)
            .map_err(|_| format!("Unknown command '{line}'. {HELP}")),
    }
}

/// Map an answer to one of `choices`: a 1-based index or a label.
pub(crate) fn parse_choice(answer: &str, choices: &[PromptChoice]) -> Option<PromptChoice> {
    let answer = answer.trim();
    if let Ok(index) = answer.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| choices.get(i).copied());
    }
    PromptChoice::from_label(answer).filter(|choice| choices.contains(choice))
}

/// [`UserPrompt`] answered from the console.
pub(crate) struct ConsolePrompt {
    pending: Mutex<Option<oneshot::Sender<Option<String>>>>,
    closed: AtomicBool,
    log: Arc<dyn LogSurface>,
}

impl ConsolePrompt {
    pub(crate) fn new(log: Arc<dyn LogSurface>) -> Self {
        Self {
            pending: Mutex::new(None),
            closed: AtomicBool::new(false),
            log,
        }
    }

    fn take_pending(&self) -> Option<oneshot::Sender<Option<String>>> {
        match self.pending.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Hand a console line to the pending prompt. Gives the line back when
    /// no prompt is waiting for it (including one that was abandoned).
    pub(crate) fn offer(&self, line: String) -> Option<String> {
        match self.take_pending() {
            Some(tx) => tx.send(Some(line)).err().flatten(),
            None => Some(line),
        }
    }

    /// Input is gone: answer the pending prompt and every later one with
    /// "no answer".
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(tx) = self.take_pending() {
            let _ = tx.send(None);
        }
    }
}

#[async_trait]
impl UserPrompt for ConsolePrompt {
    async fn choose(&self, message: &str, choices: &[PromptChoice]) -> Option<PromptChoice> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        match self.pending.lock() {
            Ok(mut guard) => *guard = Some(tx),
            Err(poisoned) => *poisoned.into_inner() = Some(tx),
        }

        let menu: Vec<String> = choices
            .iter()
            .enumerate()
            .map(|(i, choice)| format!("  {}) {}", i + 1, choice.label()))
            .collect();
        self.log.info(&format!(
            "{message}\n{}\nAnswer with a number or a label:",
            menu.join("\n")
        ));

        let answer = rx.await.ok().flatten()?;
        let choice = parse_choice(&answer, choices);
        if choice.is_none() {
            self.log
                .info("Unrecognized answer, leaving remote cartridges untouched");
        }
        choice
    }
}

/// Spawn the stdin reader thread. The channel closes at EOF.
pub(crate) fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Resolve a folder argument; relative file paths are made absolute.
pub(crate) fn folder_from_arg(arg: &str) -> WorkspaceFolder {
    let folder = WorkspaceFolder::parse(arg);
    if folder.is_file() && folder.path().is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return WorkspaceFolder::file(cwd.join(folder.path()));
        }
    }
    folder
}

pub(crate) struct Console {
    pub prompt: Arc<ConsolePrompt>,
    pub bus: CommandBus,
    pub folders: watch::Sender<Vec<WorkspaceFolder>>,
    pub events: mpsc::Sender<ManagerEvent>,
    pub log: Arc<dyn LogSurface>,
}

impl Console {
    /// Route console lines until input ends or `quit`.
    pub(crate) async fn run(self, mut lines: mpsc::Receiver<String>) {
        self.log.info(HELP);
        while let Some(line) = lines.recv().await {
            let Some(line) = self.prompt.offer(line) else {
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_console_line(&line) {
                Ok(ConsoleCommand::Upload(command)) => {
                    tracing::debug!(command = %command, "console command");
                    self.bus.publish(command);
                }
                Ok(ConsoleCommand::Add(arg)) => self.add_folder(folder_from_arg(&arg)).await,
                Ok(ConsoleCommand::Remove(arg)) => self.remove_folder(folder_from_arg(&arg)).await,
                Ok(ConsoleCommand::Help) => self.log.info(HELP),
                Ok(ConsoleCommand::Quit) => {
                    let _ = self.events.send(ManagerEvent::Shutdown).await;
                    break;
                }
                Err(message) => self.log.warn(&message),
            }
        }
        self.prompt.close();
    }

    async fn add_folder(&self, folder: WorkspaceFolder) {
        let mut current = self.folders.borrow().clone();
        if current.contains(&folder) {
            self.log
                .info(&format!("Folder already in the workspace: {folder}"));
            return;
        }
        self.log.info(&format!("Adding workspace folder {folder}"));
        current.push(folder);
        self.publish_folders(current).await;
    }

    async fn remove_folder(&self, folder: WorkspaceFolder) {
        let mut current = self.folders.borrow().clone();
        let before = current.len();
        current.retain(|f| f != &folder);
        if current.len() == before {
            self.log
                .warn(&format!("Folder is not in the workspace: {folder}"));
            return;
        }
        self.log.info(&format!("Removing workspace folder {folder}"));
        self.publish_folders(current).await;
    }

    async fn publish_folders(&self, folders: Vec<WorkspaceFolder>) {
        self.folders.send_replace(folders.clone());
        if self
            .events
            .send(ManagerEvent::FoldersChanged(folders))
            .await
            .is_err()
        {
            tracing::debug!("session manager gone, folder change dropped");
        }
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
