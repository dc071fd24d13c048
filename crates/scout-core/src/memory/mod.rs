//! Scout Memory
//!
//! Append-only conversation log persisted as a single JSON file. The whole log
//! is rewritten on every append through a temp file and a rename, so the file
//! on disk is always either the previous or the new complete log.
//!
//! A missing or unreadable file at startup yields an empty log. Write failures
//! are reported to the caller but the in-memory log keeps the new turns, and
//! the next append rewrites everything.

mod turn;

pub use turn::{MemoryStats, Role, Turn};

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use turn::{ConversationLog, ConversationLogRef};

/// Default location of the memory artifact
pub const DEFAULT_MEMORY_FILE: &str = "agent_conversation_memory.json";

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize memory: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct MemoryStore {
    path: PathBuf,
    history: Vec<Turn>,
    /// Time of the last successful write
    last_updated: Option<DateTime<Utc>>,
}

impl MemoryStore {
    /// Open the store at `path`, loading any existing history
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (history, last_updated) = match Self::load(&path) {
            Ok(Some(log)) => {
                info!("Loaded {} turns from {}", log.history.len(), path.display());
                (log.history, log.last_updated)
            }
            Ok(None) => {
                debug!("No memory file at {}, starting fresh", path.display());
                (Vec::new(), None)
            }
            Err(e) => {
                warn!("Ignoring unreadable memory file {}: {}", path.display(), e);
                (Vec::new(), None)
            }
        };

        Self {
            path,
            history,
            last_updated,
        }
    }

    fn load(path: &Path) -> anyhow::Result<Option<ConversationLog>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn io_error(&self, source: io::Error) -> MemoryError {
        MemoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Write the full log: temp file in the same directory, fsync, rename
    fn flush(&mut self) -> Result<(), MemoryError> {
        let now = Utc::now();
        let file = ConversationLogRef {
            history: &self.history,
            last_updated: Some(now),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_MEMORY_FILE.to_string());
        let tmp_path = self.path.with_file_name(format!(".{}.tmp", file_name));

        let write_tmp = || -> io::Result<()> {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()?;
            Ok(())
        };
        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            self.io_error(e)
        })?;

        self.last_updated = Some(now);
        debug!("Flushed {} turns to {}", self.history.len(), self.path.display());
        Ok(())
    }

    /// Timestamps never go backwards within the log
    fn push(&mut self, mut turn: Turn) {
        if let Some(last) = self.history.last() {
            if turn.timestamp < last.timestamp {
                turn.timestamp = last.timestamp;
            }
        }
        self.history.push(turn);
    }

    /// Append one turn and persist the log
    pub fn append(&mut self, turn: Turn) -> Result<(), MemoryError> {
        self.push(turn);
        self.flush()
    }

    /// Append a user/assistant pair with a single write
    pub fn append_pair(&mut self, user: Turn, assistant: Turn) -> Result<(), MemoryError> {
        self.push(user);
        self.push(assistant);
        self.flush()
    }

    /// Render the last `limit` turns, oldest first
    pub fn get_context(&self, limit: usize) -> String {
        let start = self.history.len().saturating_sub(limit);
        self.history[start..]
            .iter()
            .map(|turn| format!("{}: {}\n\n", turn.role.label(), turn.content))
            .collect()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Drop all history, in memory and on disk
    pub fn clear(&mut self) -> Result<(), MemoryError> {
        self.history.clear();
        self.last_updated = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Cleared memory at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats::from_turns(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> MemoryStore {
        MemoryStore::open(dir.join("memory.json"))
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());

        store.append(Turn::user("I live in London")).unwrap();
        store
            .append(Turn::assistant("Noted!", vec!["get_weather".to_string()]))
            .unwrap();
        store
            .append_pair(Turn::user(""), Turn::assistant("?", Vec::new()))
            .unwrap();

        let reloaded = store_in(dir.path());
        assert_eq!(reloaded.history(), store.history());
        assert_eq!(reloaded.len(), 4);
    }

    #[test]
    fn test_artifact_layout() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(Turn::user("hi")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["history"][0]["role"], "user");
        assert_eq!(value["history"][0]["content"], "hi");
        assert!(value["history"][0]["tools_used"].as_array().unwrap().is_empty());
        assert!(value["last_updated"].is_string());

        // No temp file left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_get_context_window() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert_eq!(store.get_context(5), "");

        for i in 0..4 {
            store
                .append_pair(
                    Turn::user(format!("question {}", i)),
                    Turn::assistant(format!("answer {}", i), Vec::new()),
                )
                .unwrap();
        }

        assert_eq!(store.get_context(0), "");
        assert_eq!(
            store.get_context(3),
            "Assistant: answer 2\n\nUser: question 3\n\nAssistant: answer 3\n\n"
        );
        let all = store.get_context(100);
        assert!(all.starts_with("User: question 0\n\n"));
        assert_eq!(all.matches("\n\n").count(), 8);
    }

    #[test]
    fn test_context_keeps_full_content() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let long = "x".repeat(10_000);
        store.append(Turn::user(long.clone())).unwrap();
        assert_eq!(store.get_context(1), format!("User: {}\n\n", long));
    }

    #[test]
    fn test_clear_then_stats() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store
            .append_pair(
                Turn::user("2+2"),
                Turn::assistant("4", vec!["calculator".to_string()]),
            )
            .unwrap();

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.stats(), MemoryStats::default());
        assert!(store.stats().distinct_tools_used.is_empty());

        // Clearing twice is fine
        store.clear().unwrap();
        assert!(store_in(dir.path()).is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("memory.json"), "{ not json").unwrap();

        let mut store = store_in(dir.path());
        assert!(store.is_empty());

        // Next append replaces the corrupt file
        store.append(Turn::user("fresh start")).unwrap();
        assert_eq!(store_in(dir.path()).len(), 1);
    }

    #[test]
    fn test_missing_parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let mut store = MemoryStore::open(dir.path().join("nested/deeper/memory.json"));
        store.append(Turn::user("hi")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_failed_write_keeps_memory_and_retries() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let mut store = MemoryStore::open(blocker.join("memory.json"));
        assert!(store.append(Turn::user("one")).is_err());
        assert_eq!(store.len(), 1);

        fs::remove_file(&blocker).unwrap();
        store.append(Turn::user("two")).unwrap();
        assert_eq!(MemoryStore::open(blocker.join("memory.json")).len(), 2);
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let first = Turn::user("later");
        let mut second = Turn::user("earlier");
        second.timestamp = first.timestamp - Duration::seconds(60);

        store.append_pair(first, second).unwrap();
        let history = store.history();
        assert!(history[1].timestamp >= history[0].timestamp);
    }

    #[test]
    fn test_last_updated_tracks_writes() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert!(store.last_updated().is_none());

        store
            .append_pair(Turn::user("hi"), Turn::assistant("hello", Vec::new()))
            .unwrap();
        let written = store.last_updated().unwrap();
        assert!(written >= store.history()[1].timestamp);

        // The borrowed write view parses back as the full artifact
        let raw = fs::read_to_string(store.path()).unwrap();
        let log: ConversationLog = serde_json::from_str(&raw).unwrap();
        assert_eq!(log.history, store.history());
        assert_eq!(log.last_updated, Some(written));

        let reloaded = store_in(dir.path());
        assert_eq!(reloaded.last_updated(), Some(written));

        store.clear().unwrap();
        assert!(store.last_updated().is_none());
    }

    fn arb_turn() -> impl Strategy<Value = Turn> {
        (
            any::<bool>(),
            "[a-zA-Z0-9 .,?!']{0,40}",
            prop::collection::vec("[a-z_]{1,12}", 0..3),
        )
            .prop_map(|(is_user, content, tools)| {
                if is_user {
                    Turn::user(content)
                } else {
                    Turn::assistant(content, tools)
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_any_append_sequence_round_trips(
            turns in prop::collection::vec(arb_turn(), 0..12)
        ) {
            let dir = tempdir().unwrap();
            let mut store = store_in(dir.path());
            for turn in turns {
                store.append(turn).unwrap();
            }

            let reloaded = store_in(dir.path());
            prop_assert_eq!(reloaded.history(), store.history());
            prop_assert_eq!(reloaded.stats(), store.stats());
        }

        #[test]
        fn test_context_never_exceeds_limit(
            turns in prop::collection::vec(arb_turn(), 0..12),
            limit in 0usize..16,
        ) {
            let dir = tempdir().unwrap();
            let mut store = store_in(dir.path());
            for turn in turns {
                store.append(turn).unwrap();
            }

            let context = store.get_context(limit);
            let shown = store.len().min(limit);
            // Content has no newlines, so each rendered turn ends in exactly one blank line
            prop_assert_eq!(context.matches("\n\n").count(), shown);

            if shown == 0 {
                prop_assert_eq!(context.as_str(), "");
            } else {
                let last = &store.history()[store.len() - 1];
                let tail = format!("{}: {}\n\n", last.role.label(), last.content);
                prop_assert!(context.ends_with(&tail));

                let first = &store.history()[store.len() - shown];
                let head = format!("{}: {}\n\n", first.role.label(), first.content);
                prop_assert!(context.starts_with(&head));
            }
        }
    }
}
