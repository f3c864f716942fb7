//! Launch operations

use std::process::Stdio;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::{
    child::spawn_feeder,
    config::{RunConfig, StderrMode},
    error::{Result, RunError},
    pipe::{settle, ProcessPipe},
};

/// Read size while looking for a complete JSON value
const JSON_CHUNK: usize = 8 * 1024;

/// How much of a failed capture's stderr is kept for the error
const STDERR_TAIL: usize = 32 * 1024;

/// Starts processes described by a [`RunConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Runner;

impl Runner {
    /// Create new runner
    pub fn new() -> Self {
        Self
    }

    /// Run to completion with stdout and stderr forwarded to the host.
    ///
    /// # Examples
    /// ```no_run
    /// use procpipe::{RunConfig, Runner};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// Runner::new().run(&RunConfig::new(["echo", "hello"])).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, config: &RunConfig) -> Result<()> {
        let mut cmd = self.command(config)?;
        cmd.stdin(Stdio::null()).stdout(Stdio::inherit());

        let mut child = self.spawn(&mut cmd, config)?;
        let status = child.wait().await;
        settle(status, None).await.map_err(RunError::Exit)
    }

    /// Run to completion, feeding `input` to the process's stdin.
    pub async fn run_with_input<R>(&self, config: &RunConfig, input: R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut cmd = self.command(config)?;
        cmd.stdin(Stdio::piped()).stdout(Stdio::inherit());

        let mut child = self.spawn(&mut cmd, config)?;
        let feeder = child.stdin.take().map(|stdin| spawn_feeder(input, stdin));

        let status = child.wait().await;
        settle(status, feeder).await.map_err(RunError::Exit)
    }

    /// Run to completion and return everything written to stdout.
    ///
    /// Unless stderr is discarded with [`StderrMode::Null`], it is captured
    /// too: a failed run reports its tail in [`RunError::Failed`], a
    /// successful run drops it.
    pub async fn output(&self, config: &RunConfig) -> Result<Vec<u8>> {
        let mut cmd = self.command(config)?;
        cmd.stdin(Stdio::null()).stdout(Stdio::piped());
        if config.stderr == StderrMode::Inherit {
            cmd.stderr(Stdio::piped());
        }

        let mut child = self.spawn(&mut cmd, config)?;
        let mut stdout = child.stdout.take().ok_or_else(missing_stdout)?;
        let stderr = child.stderr.take();

        let mut captured = Vec::new();
        let mut diagnostics = Vec::new();
        let (read, _) = tokio::join!(stdout.read_to_end(&mut captured), async {
            match stderr {
                Some(mut stderr) => stderr.read_to_end(&mut diagnostics).await,
                None => Ok(0),
            }
        });
        let status = child.wait().await;

        if let Err(exit) = settle(status, None).await {
            if diagnostics.is_empty() {
                return Err(RunError::Exit(exit));
            }
            return Err(RunError::Failed {
                source: exit,
                stderr: stderr_tail(&diagnostics),
            });
        }
        read?;

        debug!(bytes = captured.len(), "Captured process output");
        Ok(captured)
    }

    /// Start the process and stream its stdout.
    ///
    /// The returned pipe must be read to the end or closed.
    pub async fn read(&self, config: &RunConfig) -> Result<ProcessPipe> {
        let mut cmd = self.command(config)?;
        cmd.stdin(Stdio::null()).stdout(Stdio::piped());

        let mut child = self.spawn(&mut cmd, config)?;
        let stdout = child.stdout.take().ok_or_else(missing_stdout)?;

        Ok(ProcessPipe::new(Box::new(stdout), Box::new(child), None)
            .with_close_timeout(config.close_timeout))
    }

    /// Start the process with `input` as its stdin and stream its stdout.
    ///
    /// `input` may itself be a [`ProcessPipe`], which chains processes
    /// without buffering their output in the host.
    ///
    /// # Examples
    /// ```no_run
    /// use procpipe::{RunConfig, Runner};
    /// use tokio::io::AsyncReadExt;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let runner = Runner::new();
    /// let listing = runner.read(&RunConfig::new(["ls", "-l"])).await?;
    /// let mut sorted = runner.pipe(&RunConfig::new(["sort"]), listing).await?;
    ///
    /// let mut out = String::new();
    /// sorted.read_to_string(&mut out).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn pipe<R>(&self, config: &RunConfig, input: R) -> Result<ProcessPipe>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut cmd = self.command(config)?;
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());

        let mut child = self.spawn(&mut cmd, config)?;
        let stdout = child.stdout.take().ok_or_else(missing_stdout)?;
        let feeder = child.stdin.take().map(|stdin| spawn_feeder(input, stdin));

        Ok(ProcessPipe::new(Box::new(stdout), Box::new(child), feeder)
            .with_close_timeout(config.close_timeout))
    }

    /// Run the process and decode the first JSON value it prints.
    ///
    /// Returns as soon as that value is complete, without waiting for the
    /// process to exit. The pipe is closed whether or not decoding succeeds.
    /// If the output ends first, a failed exit is reported ahead of the
    /// decoding error.
    pub async fn json<T>(&self, config: &RunConfig) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut pipe = self.read(config).await?;

        let decoded = decode_first(&mut pipe).await;
        pipe.close()?;
        decoded
    }

    /// Resolve the executable and apply environment and working directory
    fn command(&self, config: &RunConfig) -> Result<Command> {
        let (program, args) = config
            .args
            .split_first()
            .ok_or(RunError::CommandMissing)?;

        let path = which::which(program).map_err(|source| RunError::NotFound {
            command: program.clone(),
            source,
        })?;

        let mut cmd = Command::new(&path);
        #[cfg(unix)]
        cmd.arg0(program);
        cmd.args(args);

        if let Some(ref env) = config.env {
            cmd.env_clear();
            cmd.envs(env.vars());
        }

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stderr(config.stderr.stdio());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    fn spawn(&self, cmd: &mut Command, config: &RunConfig) -> Result<Child> {
        let command = config.program().unwrap_or_default().to_string();

        debug!(command = %command, args = ?config.args, "Spawning process");

        let child = cmd
            .spawn()
            .map_err(|source| RunError::Spawn { command: command.clone(), source })?;

        info!(pid = ?child.id(), command = %command, "Process spawned");
        Ok(child)
    }
}

/// Read until the first JSON value in `pipe` is complete
async fn decode_first<T: DeserializeOwned>(pipe: &mut ProcessPipe) -> Result<T> {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; JSON_CHUNK];

    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            let mut de = serde_json::Deserializer::from_slice(&buf);
            return Ok(T::deserialize(&mut de)?);
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut values = serde_json::Deserializer::from_slice(&buf).into_iter::<T>();
        match values.next() {
            // a number or literal at the very end may still continue
            Some(Ok(value)) if ends_value(&buf, values.byte_offset()) => return Ok(value),
            Some(Ok(_)) | None => {}
            Some(Err(e)) if e.is_eof() => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

fn ends_value(buf: &[u8], offset: usize) -> bool {
    offset < buf.len() || matches!(buf[..offset].last(), Some(b'}' | b']' | b'"'))
}

/// Keep the last `STDERR_TAIL` bytes of a failed capture's stderr
fn stderr_tail(stderr: &[u8]) -> String {
    let tail = &stderr[stderr.len().saturating_sub(STDERR_TAIL)..];
    String::from_utf8_lossy(tail).trim_end().to_string()
}

fn missing_stdout() -> RunError {
    RunError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "child stdout was not captured",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::env::Env;

    #[tokio::test]
    async fn test_output() {
        let out = Runner::new()
            .output(&RunConfig::new(["echo", "-n", "hello world"]))
            .await
            .unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_missing_command() {
        let err = Runner::new()
            .run(&RunConfig::new(Vec::<String>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::CommandMissing));
    }

    #[tokio::test]
    async fn test_not_found() {
        let err = Runner::new()
            .read(&RunConfig::new(["procpipe-no-such-command"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::NotFound { ref command, .. } if command == "procpipe-no-such-command"));
    }

    #[tokio::test]
    async fn test_run_exit_code() {
        let err = Runner::new()
            .run(&RunConfig::new(["sh", "-c", "exit 3"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_output_reports_failure() {
        let err = Runner::new()
            .output(&RunConfig::new(["sh", "-c", "echo oops >&2; exit 7"]).stderr(StderrMode::Null))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(7));
    }

    #[tokio::test]
    async fn test_env_replaces_host_environment() {
        let env = Env::with_home("/home/tester");
        let out = Runner::new()
            .output(&RunConfig::new(["sh", "-c", "echo -n $USER:$HOME:${PROCPIPE_UNSET-none}"]).env(env))
            .await
            .unwrap();
        assert_eq!(out, b"tester:/home/tester:none");
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();

        let out = Runner::new()
            .output(&RunConfig::new(["pwd", "-P"]).working_dir(dir.path()))
            .await
            .unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert_eq!(printed.trim_end(), expected.to_str().unwrap());
    }

    #[tokio::test]
    async fn test_run_with_input() {
        let input: &'static [u8] = b"fed through stdin\n";
        Runner::new()
            .run_with_input(&RunConfig::new(["sh", "-c", "grep -q stdin"]), input)
            .await
            .unwrap();

        let err = Runner::new()
            .run_with_input(&RunConfig::new(["sh", "-c", "grep -q nothing"]), input)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }

    #[tokio::test]
    async fn test_json() {
        #[derive(serde::Deserialize)]
        struct Reply {
            name: String,
            values: Vec<u32>,
        }

        let reply: Reply = Runner::new()
            .json(&RunConfig::new([
                "echo",
                r#"{"name": "procpipe", "values": [1, 2, 3]}"#,
            ]))
            .await
            .unwrap();
        assert_eq!(reply.name, "procpipe");
        assert_eq!(reply.values, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_json_returns_before_exit() {
        let started = std::time::Instant::now();
        let value: u32 = Runner::new()
            .json(&RunConfig::new(["sh", "-c", "echo 42; sleep 3"]))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_json_split_across_writes() {
        let value: Vec<u32> = Runner::new()
            .json(&RunConfig::new([
                "sh",
                "-c",
                "printf '[1, 2'; sleep 0.2; printf ', 3]'; sleep 3",
            ]))
            .await
            .unwrap();
        assert_eq!(value, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_json_number_waits_for_delimiter() {
        let value: u32 = Runner::new()
            .json(&RunConfig::new(["sh", "-c", "printf 4; sleep 0.2; printf 2"]))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_json_exit_error_before_decode_error() {
        let err = Runner::new()
            .json::<Vec<u32>>(&RunConfig::new(["sh", "-c", "printf '[1,'; exit 4"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(4));
    }

    #[tokio::test]
    async fn test_output_captures_stderr_on_failure() {
        let err = Runner::new()
            .output(&RunConfig::new(["sh", "-c", "echo partial; echo broken input >&2; exit 2"]))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(2));
        assert!(matches!(err, RunError::Failed { ref stderr, .. } if stderr == "broken input"));
        assert_eq!(err.to_string(), "exit status 2: broken input");
    }

    #[tokio::test]
    async fn test_json_decode_error() {
        let err = Runner::new()
            .json::<Vec<u32>>(&RunConfig::new(["echo", "[1, 2,"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Decode(_)));
    }
}
