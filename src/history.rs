//! Per-conversation history files.
//!
//! Every conversation gets its own [`RotatingWriter`] in its own directory,
//! and every message is stored as one JSON line, so history files rotate by
//! day and size exactly like the application log.

use crate::config::WriterConfig;
use crate::error::Result;
use crate::listing::{self, LogFile};
use crate::shutdown;
use crate::writer::RotatingWriter;
use chrono::{NaiveDate, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::runtime::Handle;

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message in a conversation, stored as a single JSON line.
///
/// Optional fields are omitted from the line when `None`.
///
/// # Examples
///
/// ```
/// use daylog::{HistoryEntry, Role};
/// use serde_json::json;
///
/// let entry = HistoryEntry::new(Role::User, "draw me a sequence diagram")
///     .with_id("msg-1")
///     .with_meta(json!({"channel": "web"}));
/// let line = entry.to_line().unwrap();
/// assert!(line.starts_with(r#"{"role":"user""#));
/// assert!(!line.contains('\n'));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct HistoryEntry {
    pub role: Role,

    /// Message text. Newlines are escaped by the JSON encoding, so an entry
    /// is always exactly one record.
    pub content: String,

    /// Unix timestamp in milliseconds, set by [`HistoryEntry::new`].
    pub ts: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Free-form metadata such as the model used or the originating channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        HistoryEntry {
            role,
            content: content.into(),
            ts: Utc::now().timestamp_millis(),
            id: None,
            meta: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = ts;
        self
    }

    /// Encode as one JSON line without the trailing newline.
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Map a conversation id onto a safe directory name.
///
/// ASCII letters, digits, `-` and `_` are kept; anything else becomes `_`.
/// An empty id maps to `_`.
pub fn conversation_dir_name(conversation: &str) -> String {
    let name: String = conversation
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() { "_".to_string() } else { name }
}

/// Lazily created history writers, one per conversation.
///
/// All writers share the limits of a template config; only the directory
/// differs: `{root}/{conversation}/`.
#[derive(Debug)]
pub struct HistoryStore {
    root: PathBuf,
    template: WriterConfig,
    runtime: Handle,
    writers: Mutex<HashMap<String, RotatingWriter>>,
}

impl HistoryStore {
    /// Store conversations under `template.dir`.
    ///
    /// Must be called within a tokio runtime; writers created later run on it.
    pub fn new(template: WriterConfig) -> Result<Self> {
        template.validate()?;
        Ok(HistoryStore {
            root: template.dir.clone(),
            runtime: Handle::try_current()?,
            template,
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The writer for `conversation`, created on first use.
    pub fn writer(&self, conversation: &str) -> Result<RotatingWriter> {
        let name = conversation_dir_name(conversation);
        let mut writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(writer) = writers.get(&name) {
            return Ok(writer.clone());
        }
        let writer = RotatingWriter::builder_from(self.template.with_dir(self.root.join(&name)))
            .runtime(self.runtime.clone())
            .open()?;
        writers.insert(name, writer.clone());
        Ok(writer)
    }

    /// Append `entry` to the conversation's history.
    ///
    /// Fire-and-forget like [`RotatingWriter::write`]: failures are reported
    /// on the diagnostic log only.
    pub fn record(&self, conversation: &str, entry: &HistoryEntry) {
        let line = match entry.to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("history {conversation}: cannot encode entry: {e}");
                return;
            }
        };
        match self.writer(conversation) {
            Ok(writer) => writer.write(line),
            Err(e) => warn!("history {conversation}: no writer: {e}"),
        }
    }

    /// History files of `conversation` for `date`, in rotation order.
    pub fn files_for_day(
        &self,
        conversation: &str,
        date: NaiveDate,
    ) -> std::io::Result<Vec<LogFile>> {
        let dir = self.root.join(conversation_dir_name(conversation));
        listing::list_day(&dir, &self.template.extension, date)
    }

    /// Conversations that currently have a writer.
    pub fn conversations(&self) -> Vec<String> {
        let writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = writers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush and close every conversation writer. Best-effort.
    pub async fn shutdown(&self) {
        let writers: Vec<RotatingWriter> = {
            let writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
            writers.values().cloned().collect()
        };
        shutdown::shutdown_all(&writers).await;
    }
}
