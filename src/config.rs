use crate::error::{Result, WriterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILE_NUMBER: usize = 1000;
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_EXTENSION: &str = "log";

/// Settings for one [`RotatingWriter`](crate::RotatingWriter).
///
/// Fixed for the writer's lifetime. Every field except `dir` has a default, so
/// a config can be embedded in an application's JSON settings with only the
/// directory spelled out:
///
/// ```
/// use daylog::WriterConfig;
///
/// let config = WriterConfig::from_json(r#"{ "dir": "/var/log/bot", "max_file_size": 4096 }"#)
///     .unwrap();
/// assert_eq!(config.max_file_size, 4096);
/// assert_eq!(config.extension, "log");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Directory receiving the `{date}.{index}.{ext}` files. Created on first write.
    pub dir: PathBuf,

    /// Size in bytes at which the current file is considered full.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Number of files the directory may hold before creating another is refused.
    #[serde(default = "default_max_file_number")]
    pub max_file_number: usize,

    /// Ceiling on bytes accepted but not yet handed to a stream.
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    /// File extension, without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_file_number() -> usize {
    DEFAULT_MAX_FILE_NUMBER
}

fn default_max_buffer_bytes() -> usize {
    DEFAULT_MAX_BUFFER_BYTES
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl WriterConfig {
    /// A config for `dir` with every limit at its default.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        WriterConfig {
            dir: dir.as_ref().to_path_buf(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_number: DEFAULT_MAX_FILE_NUMBER,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            extension: default_extension(),
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: WriterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// The same limits pointed at another directory.
    pub fn with_dir(&self, dir: impl AsRef<Path>) -> Self {
        WriterConfig {
            dir: dir.as_ref().to_path_buf(),
            ..self.clone()
        }
    }

    /// Reject limits the writer cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(WriterError::InvalidConfig("dir must not be empty".into()));
        }
        if self.max_file_size == 0 {
            return Err(WriterError::InvalidConfig(
                "max_file_size must be greater than zero".into(),
            ));
        }
        if self.max_file_number == 0 {
            return Err(WriterError::InvalidConfig(
                "max_file_number must be greater than zero".into(),
            ));
        }
        if self.max_buffer_bytes == 0 {
            return Err(WriterError::InvalidConfig(
                "max_buffer_bytes must be greater than zero".into(),
            ));
        }
        if self.extension.is_empty()
            || self.extension.starts_with('.')
            || self.extension.contains(['/', '\\'])
        {
            return Err(WriterError::InvalidConfig(format!(
                "extension {:?} must be non-empty, without a leading dot or path separators",
                self.extension
            )));
        }
        Ok(())
    }
}
