//! Launch configuration

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use crate::env::Env;
use crate::pipe::DEFAULT_CLOSE_TIMEOUT;

/// Where a child's standard error goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrMode {
    /// Share the host's stderr
    #[default]
    Inherit,
    /// Discard
    Null,
}

impl StderrMode {
    pub(crate) fn stdio(self) -> Stdio {
        match self {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Null => Stdio::null(),
        }
    }
}

/// Configuration for launching a process
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Command name followed by its arguments
    pub args: Vec<String>,
    /// Complete environment for the child (None = inherit the host's)
    pub env: Option<Env>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Standard error destination
    pub stderr: StderrMode,
    /// Grace period before a closed pipe's process is killed
    pub close_timeout: Duration,
}

impl RunConfig {
    /// Create configuration for `args[0]` invoked with the remaining args
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            env: None,
            working_dir: None,
            stderr: StderrMode::default(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Replace the child's environment
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    /// Set the grace period used when a pipe is closed early
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Command name, if any
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}
