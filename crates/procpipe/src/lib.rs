//! # procpipe
//!
//! **Purpose**: Run external commands and consume their output as a stream
//!
//! A child's standard output is exposed as an ordinary [`AsyncRead`]
//! ([`ProcessPipe`]). The process exit status, only known once that stream
//! is drained, is reported by the final read: a clean exit ends the stream,
//! a failed exit turns end-of-stream into an error.
//!
//! ## Features
//!
//! - **Streaming**: Read process output incrementally, chain processes
//!   by feeding one pipe into the next command's stdin
//! - **Exact exit reporting**: The exit status is waited on once and every
//!   reader, closer and handle observes the same outcome
//! - **Bounded shutdown**: Closing a pipe early gives the process a grace
//!   period, then kills it
//! - **Environment lists**: Ordered `KEY=VALUE` lists ([`Env`]) to run
//!   commands in a controlled environment
//! - **Convenience launchers**: Run and wait, capture, stream, pipe, or
//!   decode JSON output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procpipe::{run_pipe, run_read};
//! use tokio::io::AsyncReadExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Compress and decompress through two processes
//! let compressed = run_pipe(&b"hello"[..], ["gzip", "-9"]).await?;
//! let mut plain = run_pipe(compressed, ["gunzip"]).await?;
//!
//! let mut out = Vec::new();
//! plain.read_to_end(&mut out).await?;
//! assert_eq!(out, b"hello");
//!
//! // A failing command reports its exit code after its output
//! let mut failing = run_read(["sh", "-c", "echo partial; exit 42"]).await?;
//! let mut out = Vec::new();
//! let err = failing.read_to_end(&mut out).await.unwrap_err();
//! assert_eq!(procpipe::ExitError::from_io(&err).and_then(|e| e.code()), Some(42));
//! # Ok(())
//! # }
//! ```
//!
//! [`AsyncRead`]: tokio::io::AsyncRead

pub mod child;
pub mod config;
pub mod env;
pub mod error;
pub mod pipe;
#[cfg(target_os = "linux")]
pub mod procfs;
#[cfg(unix)]
pub mod reap;
pub mod run;
pub mod runner;
pub mod shell;

pub use child::ChildProcess;
pub use config::{RunConfig, StderrMode};
pub use env::Env;
pub use error::{ExitError, Result, RunError};
pub use pipe::{Outcome, PipeHandle, ProcessPipe, DEFAULT_CLOSE_TIMEOUT};
#[cfg(target_os = "linux")]
pub use procfs::{args_of, pid_of, pid_state, ProcError, ProcState};
#[cfg(unix)]
pub use reap::reap;
pub use run::{run, run_get, run_json, run_pipe, run_read, run_write};
pub use runner::Runner;
pub use shell::{sh, sh_quote};
