//! Journal file discovery, decoding and tailing.

use std::{
    fmt,
    fs::{self, File},
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{event::parse_timestamp, ingest::ReplayStats, tracker::SharedTracker};

static JOURNAL_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Journal\.(\d{4}-\d{2}-\d{2})T[^/\\]*\.log$")
        .expect("failed to compile journal file name regex")
});

/// A directory of `Journal.YYYY-MM-DDThhmmss.NN.log` files.
#[derive(Debug, Clone)]
pub struct JournalDirectory {
    root: PathBuf,
}

impl JournalDirectory {
    /// Point at the directory holding the journals.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The journal directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Journals dated within `retention_days` of `today`, oldest first.
    pub fn log_files(&self, today: NaiveDate, retention_days: u32) -> Result<Vec<PathBuf>> {
        let earliest = today - Duration::days(i64::from(retention_days));
        Ok(self
            .journals()?
            .into_iter()
            .filter(|(date, _)| *date >= earliest && *date <= today)
            .map(|(_, path)| path)
            .collect())
    }

    /// The newest journal, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.journals()?.pop().map(|(_, path)| path))
    }

    // File names sort chronologically, so name order is replay order.
    fn journals(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        if !self.root.is_dir() {
            warn!(path = %self.root.display(), "journal directory not found");
            return Ok(Vec::new());
        }

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        let entries = walker.into_iter().map(|entry| {
            entry.map(|entry| entry.file_type().is_file().then(|| entry.into_path()))
        });
        Ok(dated_journals(&self.root, entries))
    }
}

// Entries are `Ok(None)` for anything that is not a regular file.
fn dated_journals<E: fmt::Display>(
    root: &Path,
    entries: impl IntoIterator<Item = Result<Option<PathBuf>, E>>,
) -> Vec<(NaiveDate, PathBuf)> {
    let mut journals = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(Some(path)) => path,
            Ok(None) => continue,
            Err(err) => {
                warn!(path = %root.display(), "skipping unreadable directory entry: {err}");
                continue;
            }
        };
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(date) = JOURNAL_NAME_RE
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        else {
            continue;
        };
        journals.push((date, path));
    }
    journals
}

/// Decode every complete JSON line of a journal, skipping lines that fail to
/// parse. Also returns the number of bytes consumed; a trailing line without
/// its newline is not counted so a tail can pick it up later.
pub fn read_records(path: impl AsRef<Path>) -> Result<(Vec<Value>, u64)> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("failed to read journal {}", path.display()))?;
    let complete = complete_len(&bytes);
    let records = decode_lines(&String::from_utf8_lossy(&bytes[..complete]));
    Ok((records, complete as u64))
}

fn complete_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |index| index + 1)
}

/// Decode newline-separated JSON records.
pub fn decode_lines(content: &str) -> Vec<Value> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(error = %err, "skipping undecodable journal line");
                None
            }
        })
        .collect()
}

/// Stable-sort records by their `timestamp`, keeping arrival order for ties.
///
/// Records without a readable timestamp sort first.
pub fn order_records(records: &mut [Value]) {
    records.sort_by_key(record_timestamp);
}

fn record_timestamp(record: &Value) -> Option<DateTime<Utc>> {
    record
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|raw| parse_timestamp(raw).ok())
}

/// Outcome of [`replay_window`].
#[derive(Debug, Clone, Default)]
pub struct WindowReplay {
    /// Counts across every replayed journal.
    pub stats: ReplayStats,
    /// Last journal replayed and the byte offset replay stopped at.
    pub position: Option<(PathBuf, u64)>,
}

impl WindowReplay {
    /// A tail that continues exactly where the replay stopped, so nothing
    /// written in between is skipped.
    pub fn tail(&self, journals: JournalDirectory) -> Result<JournalTail> {
        match &self.position {
            Some((path, offset)) => Ok(JournalTail::resume(journals, path.clone(), *offset)),
            None => JournalTail::at_end(journals),
        }
    }
}

/// Replay every journal within the retention window into `tracker`.
pub fn replay_window(
    tracker: &SharedTracker,
    journals: &JournalDirectory,
    today: NaiveDate,
    retention_days: u32,
) -> Result<WindowReplay> {
    let mut replay = WindowReplay::default();
    for path in journals.log_files(today, retention_days)? {
        let (mut records, consumed) = match read_records(&path) {
            Ok(read) => read,
            Err(err) => {
                warn!(path = %path.display(), "skipping journal: {err:#}");
                continue;
            }
        };
        order_records(&mut records);
        let file_stats = tracker.replay(&records);
        debug!(path = %path.display(), applied = file_stats.applied, "replayed journal");
        replay.stats.merge(file_stats);
        replay.position = Some((path, consumed));
    }
    info!(
        applied = replay.stats.applied,
        rejected = replay.stats.rejected,
        open = tracker.open_count(),
        "journal replay finished"
    );
    Ok(replay)
}

/// Follows the newest journal, returning records as they are appended.
#[derive(Debug, Clone)]
pub struct JournalTail {
    journals: JournalDirectory,
    current: Option<PathBuf>,
    offset: u64,
}

impl JournalTail {
    /// Tail starting from the beginning of the newest journal.
    pub fn new(journals: JournalDirectory) -> Self {
        Self {
            journals,
            current: None,
            offset: 0,
        }
    }

    /// Tail starting after everything already written, for use after a
    /// catch-up replay.
    pub fn at_end(journals: JournalDirectory) -> Result<Self> {
        let current = journals.latest()?;
        let offset = match &current {
            Some(path) => fs::metadata(path)
                .with_context(|| format!("failed to stat {}", path.display()))?
                .len(),
            None => 0,
        };
        Ok(Self {
            journals,
            current,
            offset,
        })
    }

    /// Tail continuing `path` from `offset`.
    pub fn resume(journals: JournalDirectory, path: PathBuf, offset: u64) -> Self {
        Self {
            journals,
            current: Some(path),
            offset,
        }
    }

    /// The journal currently followed.
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Complete records appended since the last poll.
    ///
    /// When the game starts a new journal the rest of the old one is drained
    /// before switching over.
    pub fn poll(&mut self) -> Result<Vec<Value>> {
        let latest = self.journals.latest()?;
        if latest == self.current {
            return self.read_appended();
        }

        let mut records = self.read_appended()?;
        info!(path = ?latest, "following new journal");
        self.current = latest;
        self.offset = 0;
        records.extend(self.read_appended()?);
        Ok(records)
    }

    fn read_appended(&mut self) -> Result<Vec<Value>> {
        let Some(path) = &self.current else {
            return Ok(Vec::new());
        };
        let mut file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        if len < self.offset {
            warn!(path = %path.display(), "journal shrank; rereading from start");
            self.offset = 0;
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", path.display()))?;

        // A trailing partial line is left for the next poll.
        let complete = complete_len(&bytes);
        self.offset += complete as u64;
        Ok(decode_lines(&String::from_utf8_lossy(&bytes[..complete])))
    }
}

/// Watch the journal directory, calling `on_change` whenever a file in it is
/// created or modified. The watcher stops when the returned value is dropped.
pub fn watch<F>(journals: &JournalDirectory, on_change: F) -> Result<RecommendedWatcher>
where
    F: Fn() + Send + 'static,
{
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if event.kind.is_create() || event.kind.is_modify() => on_change(),
            Ok(_) => {}
            Err(err) => warn!(?err, "journal watcher error"),
        }
    })
    .context("failed to create journal watcher")?;
    watcher
        .watch(journals.root(), RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", journals.root().display()))?;
    Ok(watcher)
}
