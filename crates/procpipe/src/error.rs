//! Error types for launching and supervising child processes

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;

/// Terminal outcome of a child process that did not exit cleanly.
///
/// Cheap to clone: every caller that observes the memoized outcome of a
/// [`ProcessPipe`](crate::ProcessPipe) receives its own copy.
#[derive(Debug, Clone, Error)]
pub enum ExitError {
    /// Process exited with a non-zero status code
    #[error("exit status {code}")]
    Code { code: i32 },

    /// Process was terminated by a signal
    #[error("signal: {name}")]
    Signal { signal: i32, name: String },

    /// Waiting on the process, or feeding its input, failed
    #[error("process I/O failed: {0}")]
    Io(Arc<io::Error>),
}

impl ExitError {
    /// Translate an exit status, `None` when the process succeeded.
    pub fn from_status(status: ExitStatus) -> Option<Self> {
        if status.success() {
            return None;
        }

        if let Some(code) = status.code() {
            return Some(ExitError::Code { code });
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = status.signal() {
                let name = nix::sys::signal::Signal::try_from(signal)
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|_| signal.to_string());
                return Some(ExitError::Signal { signal, name });
            }
        }

        Some(ExitError::Code { code: -1 })
    }

    /// Exit code, if the process exited on its own
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitError::Code { code } => Some(*code),
            _ => None,
        }
    }

    /// Terminating signal number, if any
    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitError::Signal { signal, .. } => Some(*signal),
            _ => None,
        }
    }

    /// Wrap into an `io::Error` so it can travel through `AsyncRead`.
    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::Other, self)
    }

    /// Recover an `ExitError` previously wrapped by [`ExitError::into_io`].
    pub fn from_io(err: &io::Error) -> Option<&ExitError> {
        err.get_ref()?.downcast_ref::<ExitError>()
    }
}

impl From<io::Error> for ExitError {
    fn from(err: io::Error) -> Self {
        match ExitError::from_io(&err) {
            Some(exit) => exit.clone(),
            None => ExitError::Io(Arc::new(err)),
        }
    }
}

/// Errors returned by launch operations
#[derive(Debug, Error)]
pub enum RunError {
    /// No command name was supplied
    #[error("command is missing")]
    CommandMissing,

    /// Executable could not be located on the search path
    #[error("executable not found: {command}")]
    NotFound {
        command: String,
        #[source]
        source: which::Error,
    },

    /// The OS refused to start the process
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Process ran but did not exit cleanly
    #[error(transparent)]
    Exit(#[from] ExitError),

    /// Captured run did not exit cleanly; carries the tail of its stderr
    #[error("{source}: {stderr}")]
    Failed {
        #[source]
        source: ExitError,
        stderr: String,
    },

    /// Reading or writing the process streams failed
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Captured output was not valid for the requested type
    #[error("failed to decode output: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RunError {
    /// The execution error, if this is one
    pub fn exit_error(&self) -> Option<&ExitError> {
        match self {
            RunError::Exit(exit) | RunError::Failed { source: exit, .. } => Some(exit),
            _ => None,
        }
    }

    /// Exit code of a failed process
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_error().and_then(ExitError::code)
    }
}

impl From<io::Error> for RunError {
    fn from(err: io::Error) -> Self {
        match ExitError::from_io(&err) {
            Some(exit) => RunError::Exit(exit.clone()),
            None => RunError::Io(err),
        }
    }
}

/// Result type for launch operations
pub type Result<T> = std::result::Result<T, RunError>;
