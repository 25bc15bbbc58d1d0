//! Server log tailing.
//!
//! Follows `latest.log` from its current end, turning new lines into
//! [`GameEvent`]s. When the file shrinks or is replaced by a new file (the
//! server rotated it on restart) the watcher reopens it and reads from the
//! start.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::messages::GameEvent;
use crate::config::types::ServerConfig;
use crate::game::events::LogParser;

/// Where to start reading a freshly opened log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartAt {
    Beginning,
    End,
}

/// Tails the game server log.
pub struct LogWatcher {
    path: PathBuf,
    poll_interval: Duration,
    parser: LogParser,
}

/// An open log file and how far into it we have read.
struct Tail {
    reader: BufReader<File>,
    position: u64,
    /// Identity of the opened file, compared against the path on each poll.
    identity: Option<u64>,
    /// Bytes of a line whose newline has not been written yet.
    partial: Vec<u8>,
}

impl LogWatcher {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            path: PathBuf::from(&config.log_path),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(10)),
            parser: LogParser::new(),
        }
    }

    /// Tail the log forever, sending parsed events to `tx`.
    ///
    /// Returns once the receiver is dropped.
    pub async fn run(self, tx: mpsc::UnboundedSender<GameEvent>) -> anyhow::Result<()> {
        info!("Watching server log {}", self.path.display());

        let mut tail: Option<Tail> = None;
        let mut start_at = StartAt::End;
        let mut missing_logged = false;

        loop {
            if tail.is_none() {
                match self.open(start_at).await {
                    Ok(opened) => {
                        debug!("Opened {} at offset {}", self.path.display(), opened.position);
                        tail = Some(opened);
                        missing_logged = false;
                    }
                    Err(e) => {
                        if !missing_logged {
                            warn!("Cannot open {}: {}", self.path.display(), e);
                            missing_logged = true;
                        }
                        // Anything written once the file appears is new.
                        start_at = StartAt::Beginning;
                    }
                }
            }

            if let Some(current) = tail.as_mut() {
                match self.read_new_lines(current).await {
                    Ok(lines) => {
                        for line in lines {
                            if let Some(event) = self.parser.parse(&line) {
                                debug!(event = event.kind(), "Parsed log line: {}", line);
                                if tx.send(event).is_err() {
                                    return Ok(());
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Error reading {}: {}", self.path.display(), e);
                        tail = None;
                        start_at = StartAt::Beginning;
                    }
                }
            }

            if let Some(current) = tail.as_ref() {
                if self.was_rotated(current).await {
                    info!("Server log rotated, reopening");
                    tail = None;
                    start_at = StartAt::Beginning;
                }
            }

            if tx.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn open(&self, start_at: StartAt) -> std::io::Result<Tail> {
        let mut file = File::open(&self.path).await?;
        let identity = file_identity(&file.metadata().await?);
        let position = match start_at {
            StartAt::Beginning => 0,
            StartAt::End => file.seek(SeekFrom::End(0)).await?,
        };

        Ok(Tail {
            reader: BufReader::new(file),
            position,
            identity,
            partial: Vec::new(),
        })
    }

    /// Read every complete line appended since the last call.
    async fn read_new_lines(&self, tail: &mut Tail) -> std::io::Result<Vec<String>> {
        let mut lines = Vec::new();

        loop {
            let n = tail.reader.read_until(b'\n', &mut tail.partial).await?;
            if n == 0 {
                break;
            }
            tail.position += n as u64;

            if tail.partial.ends_with(b"\n") {
                let line = String::from_utf8_lossy(&tail.partial);
                lines.push(line.trim_end_matches(['\r', '\n']).to_string());
                tail.partial.clear();
            }
        }

        Ok(lines)
    }

    /// The file on disk is shorter than what we have read, is a different
    /// file than the one we opened, or is gone.
    async fn was_rotated(&self, tail: &Tail) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() < tail.position || file_identity(&meta) != tail.identity,
            Err(_) => true,
        }
    }
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

// Without inodes only truncation is detected.
#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
