//! Conversation turns and the on-disk log format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when rendering context
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One recorded message plus the tools used to produce it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role: Role::User,
            content: content.into(),
            tools_used: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, tools_used: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: content.into(),
            tools_used,
        }
    }
}

/// Durable artifact: the whole history plus the time of the last write
#[derive(Debug, Deserialize)]
pub(crate) struct ConversationLog {
    pub history: Vec<Turn>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Write-side view of `ConversationLog` borrowing the in-memory history
#[derive(Debug, Serialize)]
pub(crate) struct ConversationLogRef<'a> {
    pub history: &'a [Turn],
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregate counts over the log
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total_turns: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
    pub distinct_tools_used: BTreeSet<String>,
}

impl MemoryStats {
    pub fn from_turns(turns: &[Turn]) -> Self {
        let mut stats = MemoryStats {
            total_turns: turns.len(),
            ..Default::default()
        };
        for turn in turns {
            match turn.role {
                Role::User => stats.user_turns += 1,
                Role::Assistant => stats.assistant_turns += 1,
            }
            stats
                .distinct_tools_used
                .extend(turn.tools_used.iter().cloned());
        }
        stats
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total turns: {}", self.total_turns)?;
        writeln!(f, "User turns: {}", self.user_turns)?;
        writeln!(f, "Assistant turns: {}", self.assistant_turns)?;
        let tools: Vec<&str> = self.distinct_tools_used.iter().map(String::as_str).collect();
        if tools.is_empty() {
            write!(f, "Tools used: none")
        } else {
            write!(f, "Tools used: {}", tools.join(", "))
        }
    }
}
