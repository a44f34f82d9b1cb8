use std::path::PathBuf;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{LoadQuilt, ViewerCommand};

/// Ordered quilt list with a wrapping cursor.
#[derive(Debug, Clone)]
pub struct Playlist {
    entries: Vec<PathBuf>,
    cursor: usize,
}

impl Playlist {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&PathBuf> {
        self.entries.get(self.cursor)
    }

    /// Move the cursor. Returns the new entry, or `None` when nothing changed
    /// (fewer than two entries).
    pub fn apply(&mut self, command: ViewerCommand) -> Option<&PathBuf> {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        self.cursor = match command {
            ViewerCommand::Next => (self.cursor + 1) % len,
            ViewerCommand::Previous => (self.cursor + len - 1) % len,
        };
        self.entries.get(self.cursor)
    }
}

/// Requests the first quilt, then one load per navigation command.
pub async fn run(
    mut playlist: Playlist,
    mut commands: Receiver<ViewerCommand>,
    to_loader: Sender<LoadQuilt>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Some(first) = playlist.current() {
        info!(entries = playlist.len(), first = %first.display(), "playlist ready");
        if to_loader.send(LoadQuilt(first.clone())).await.is_err() {
            return Ok(());
        }
    } else {
        info!("playlist is empty; nothing to load");
    }

    loop {
        select! {
            _ = cancel.cancelled() => break,
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                match playlist.apply(cmd).cloned() {
                    Some(path) => {
                        debug!(?cmd, cursor = playlist.cursor(), path = %path.display(), "playlist moved");
                        if to_loader.send(LoadQuilt(path)).await.is_err() {
                            break;
                        }
                    }
                    None => debug!(?cmd, "playlist has fewer than two entries; ignoring"),
                }
            }
        }
    }
    Ok(())
}
