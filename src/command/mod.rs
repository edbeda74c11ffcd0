//! Command descriptors: what to launch for a single pipeline node

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum length of a program name or a single argument
const MAX_ARG_LEN: usize = 32 * 1024;

/// Description of one external command invocation.
///
/// Descriptors are plain data until the resolver validates them; after that
/// the scheduler only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute. Bare names are looked up on `PATH`, names with a
    /// path separator are taken relative to the working directory.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; falls back to the pipeline default when absent
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Variables set (or overridden) in the child's environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Variables removed from the inherited environment
    #[serde(default)]
    pub unset_env: Vec<String>,
    /// Marks the node failed when this text shows up in its output
    #[serde(default)]
    pub error_str: Option<String>,
    /// Per-node timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Stdout is binary: never logged or captured line by line
    #[serde(default)]
    pub binary: Option<bool>,
    /// Keep stdout gzipped while it sits in the output buffer
    #[serde(default)]
    pub gzip: Option<bool>,
}

impl CommandSpec {
    /// Create a descriptor for `command` with the given arguments
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Descriptor running `script` through the platform shell
    pub fn shell(script: impl Into<String>) -> Self {
        if cfg!(target_family = "unix") {
            Self::new("sh", ["-c".to_string(), script.into()])
        } else {
            Self::new("cmd", ["/C".to_string(), script.into()])
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_error_str(mut self, needle: impl Into<String>) -> Self {
        self.error_str = Some(needle.into());
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = Some(binary);
        self
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = Some(gzip);
        self
    }

    /// Timeout as a duration. Zero means "no own timeout".
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Working directory to launch in, given the pipeline default
    pub fn effective_working_dir(&self, default: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => default.join(dir),
            None => default.to_path_buf(),
        }
    }

    /// Validate the descriptor
    ///
    /// Commands must:
    /// - Name a non-empty program
    /// - Not contain NUL bytes in the program, arguments or environment
    /// - Keep each program/argument under a sane length
    pub fn validate(&self) -> Result<(), String> {
        if self.command.trim().is_empty() {
            return Err("command cannot be empty".to_string());
        }

        check_text("command", &self.command)?;
        for (idx, arg) in self.args.iter().enumerate() {
            check_text(&format!("argument #{}", idx + 1), arg)?;
        }

        for (key, value) in &self.env {
            if key.is_empty() || key.contains('=') {
                return Err(format!("invalid environment variable name '{key}'"));
            }
            check_text(&format!("environment variable {key}"), value)?;
        }
        for key in &self.unset_env {
            if key.is_empty() || key.contains('=') {
                return Err(format!("invalid environment variable name '{key}'"));
            }
        }

        if matches!(&self.error_str, Some(s) if s.is_empty()) {
            return Err("error_str cannot be empty".to_string());
        }

        Ok(())
    }
}

fn check_text(what: &str, text: &str) -> Result<(), String> {
    if text.contains('\0') {
        return Err(format!("{what} contains a NUL byte"));
    }
    if text.len() > MAX_ARG_LEN {
        return Err(format!(
            "{what} too long ({} bytes, max {MAX_ARG_LEN})",
            text.len()
        ));
    }
    Ok(())
}

/// Renders the command line the way a shell user would type it
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_escape::escape(Cow::Borrowed(self.command.as_str())))?;
        for arg in &self.args {
            write!(f, " {}", shell_escape::escape(Cow::Borrowed(arg.as_str())))?;
        }
        Ok(())
    }
}
