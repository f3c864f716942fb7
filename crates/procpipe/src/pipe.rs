//! Streaming access to a child process's standard output
//!
//! A [`ProcessPipe`] reads like any other [`AsyncRead`]. The one difference
//! is at end-of-stream: the pipe waits for the process to exit and, when it
//! did not exit cleanly, the final read returns the [`ExitError`] (wrapped in
//! an `io::Error`, see [`ExitError::from_io`]) instead of a plain EOF. Bytes
//! produced before the failure are still delivered by earlier reads.
//!
//! The exit status is resolved by a single waiter task per process. Every
//! path that needs the outcome (end-of-stream, [`ProcessPipe::close`],
//! [`ProcessPipe::close_wait`], [`PipeHandle`]) subscribes to that waiter, so
//! the reaping wait runs exactly once and every caller sees the same result.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{
    child::ChildProcess,
    error::{ExitError, Result, RunError},
};

/// Grace period granted by [`ProcessPipe::close`] before the process is killed
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an input feeder may keep running once its process has exited
const FEEDER_GRACE: Duration = Duration::from_secs(1);

/// Resolved exit outcome of a process
pub type Outcome = std::result::Result<(), ExitError>;

/// Task copying caller input into a child's stdin
pub(crate) type Feeder = JoinHandle<io::Result<u64>>;

type Stdout = Box<dyn AsyncRead + Send + Unpin>;
type WaitFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

struct Running {
    child: Box<dyn ChildProcess>,
    feeder: Option<Feeder>,
}

/// Resolve-once gate shared by the read path and the close path
struct ExitGate {
    pid: Option<u32>,
    /// Taken by the waiter task when it starts
    running: Mutex<Option<Running>>,
    kill: Notify,
    outcome: watch::Sender<Option<Outcome>>,
}

impl ExitGate {
    fn new(child: Box<dyn ChildProcess>, feeder: Option<Feeder>) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            pid: child.id(),
            running: Mutex::new(Some(Running { child, feeder })),
            kill: Notify::new(),
            outcome,
        }
    }

    fn outcome(&self) -> Option<Outcome> {
        self.outcome.borrow().clone()
    }

    /// Spawn the waiter task unless it already runs.
    ///
    /// Fails only when the waiter is still to be spawned and there is no
    /// tokio runtime to spawn it on.
    fn start(self: &Arc<Self>) -> io::Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_none() {
            return Ok(());
        }

        let runtime =
            Handle::try_current().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if let Some(running) = running.take() {
            let gate = Arc::clone(self);
            runtime.spawn(async move {
                let outcome = gate.wait_exit(running).await;
                gate.outcome.send_replace(Some(outcome));
            });
        }
        Ok(())
    }

    async fn resolve(self: &Arc<Self>) -> Outcome {
        if let Err(e) = self.start() {
            return Err(ExitError::Io(Arc::new(e)));
        }

        let mut rx = self.outcome.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        outcome.unwrap_or_else(|| {
            Err(ExitError::Io(Arc::new(io::Error::new(
                io::ErrorKind::Other,
                "process waiter stopped",
            ))))
        })
    }

    fn wait_owned(self: Arc<Self>) -> WaitFuture {
        Box::pin(async move { self.resolve().await })
    }

    fn request_kill(&self) {
        if self.outcome.borrow().is_none() {
            self.kill.notify_one();
        }
    }

    /// Kill the process from outside any runtime.
    ///
    /// The process stays registered, so a waiter started later still reaps it.
    fn kill_now(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.as_mut() {
            Some(running) => {
                debug!(pid = ?self.pid, "Killing process without a runtime");
                if let Err(e) = running.child.start_kill() {
                    warn!(pid = ?self.pid, error = %e, "Failed to kill process");
                }
            }
            None if self.outcome.borrow().is_none() => {
                warn!(pid = ?self.pid, "Process is owned by a waiter on another runtime");
            }
            None => {}
        }
    }

    /// Request a kill through the waiter when a runtime is available,
    /// otherwise signal the process directly.
    fn kill(self: &Arc<Self>) {
        match self.start() {
            Ok(()) => self.request_kill(),
            Err(_) => self.kill_now(),
        }
    }

    /// Wait up to `timeout`, then kill and wait for the process to go away.
    async fn close_wait(self: &Arc<Self>, timeout: Duration) -> Outcome {
        let resolve = self.resolve();
        tokio::pin!(resolve);

        if let Ok(outcome) = tokio::time::timeout(timeout, &mut resolve).await {
            return outcome;
        }

        warn!(pid = ?self.pid, ?timeout, "Process did not exit in time, killing");
        self.request_kill();

        // a killed process always becomes reapable
        resolve.await
    }

    async fn wait_exit(&self, mut running: Running) -> Outcome {
        let status = loop {
            let exited = tokio::select! {
                biased;
                status = running.child.wait() => Some(status),
                _ = self.kill.notified() => None,
            };

            match exited {
                Some(status) => break status,
                None => {
                    debug!(pid = ?self.pid, "Sending kill signal");
                    if let Err(e) = running.child.start_kill() {
                        warn!(pid = ?self.pid, error = %e, "Failed to kill process");
                    }
                }
            }
        };

        let outcome = settle(status, running.feeder.take()).await;

        match &outcome {
            Ok(()) => debug!(pid = ?self.pid, "Process exited"),
            Err(e) => debug!(pid = ?self.pid, error = %e, "Process failed"),
        }

        outcome
    }
}

/// Combine a wait result with the result of the stdin feeder, if any.
///
/// A failed exit wins. Otherwise a feeder failure becomes the outcome, so an
/// upstream pipe's exit error propagates down a chain.
pub(crate) async fn settle(status: io::Result<ExitStatus>, feeder: Option<Feeder>) -> Outcome {
    let outcome = match status {
        Ok(status) => ExitError::from_status(status).map_or(Ok(()), Err),
        Err(e) => Err(ExitError::Io(Arc::new(e))),
    };

    match feeder {
        Some(feeder) => {
            let fed = finish_feeder(feeder).await;
            outcome.and(fed)
        }
        None => outcome,
    }
}

async fn finish_feeder(mut feeder: Feeder) -> Outcome {
    match tokio::time::timeout(FEEDER_GRACE, &mut feeder).await {
        Ok(Ok(Ok(_))) => Ok(()),
        // the process stopped reading, which is its own business
        Ok(Ok(Err(e))) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Ok(Ok(Err(e))) => Err(ExitError::from(e)),
        Ok(Err(join)) => Err(ExitError::Io(Arc::new(io::Error::new(
            io::ErrorKind::Other,
            join.to_string(),
        )))),
        Err(_) => {
            debug!("Input feeder outlived its process, aborting");
            feeder.abort();
            Ok(())
        }
    }
}

enum ReadState {
    Streaming(Stdout),
    Resolving(WaitFuture),
    Drained,
    Closed,
}

/// Standard output of a running child process.
///
/// Implements [`AsyncRead`]. A failed exit is reported as the error of the
/// read that would otherwise have returned end-of-stream. Later reads replay
/// the same error.
///
/// Dropping or [closing](ProcessPipe::close) the pipe before the stream is
/// drained shuts the process down in the background: it gets
/// [`DEFAULT_CLOSE_TIMEOUT`] to exit on its own before it is killed.
/// Outside a tokio runtime there is nothing to wait on, so the process is
/// killed right away.
pub struct ProcessPipe {
    state: ReadState,
    gate: Arc<ExitGate>,
    close_timeout: Duration,
    bytes_read: u64,
}

impl ProcessPipe {
    /// Wrap an already started process and its stdout stream
    pub fn from_parts<R, C>(stdout: R, child: C) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        C: ChildProcess,
    {
        Self::new(Box::new(stdout), Box::new(child), None)
    }

    pub(crate) fn new(
        stdout: Stdout,
        child: Box<dyn ChildProcess>,
        feeder: Option<Feeder>,
    ) -> Self {
        Self {
            state: ReadState::Streaming(stdout),
            gate: Arc::new(ExitGate::new(child, feeder)),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            bytes_read: 0,
        }
    }

    /// Override the grace period used by [`close`](ProcessPipe::close) and drop
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Process ID, as observed at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.gate.pid
    }

    /// Exit outcome, if already resolved
    pub fn outcome(&self) -> Option<Outcome> {
        self.gate.outcome()
    }

    /// Number of output bytes delivered by reads so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Handle for waiting on or stopping the process from another task
    pub fn handle(&self) -> PipeHandle {
        PipeHandle {
            gate: Arc::clone(&self.gate),
        }
    }

    /// Close the stream and shut the process down in the background.
    ///
    /// Does not wait for the process. Use [`close_wait`](ProcessPipe::close_wait)
    /// when the shutdown must be complete before continuing.
    pub fn close(&mut self) -> io::Result<()> {
        if self.release() {
            self.spawn_close();
        }
        Ok(())
    }

    /// Close the stream and wait for the process to exit.
    ///
    /// The process is killed if it is still running after `timeout`. Returns
    /// the exit error, if any.
    pub async fn close_wait(&mut self, timeout: Duration) -> Result<()> {
        self.release();
        self.gate.close_wait(timeout).await.map_err(RunError::Exit)
    }

    /// Copy the remaining output into `writer`, then resolve the exit status.
    ///
    /// Returns the number of bytes copied by this call. When the process
    /// fails, every byte it produced has been written to `writer` before the
    /// error is returned; [`bytes_read`](ProcessPipe::bytes_read) still tells
    /// how much output was transferred.
    pub async fn copy_to<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let copied = tokio::io::copy(self, writer).await?;
        Ok(copied)
    }

    /// Drop the stdout handle. Returns true when the process still needs a
    /// shutdown.
    fn release(&mut self) -> bool {
        match self.state {
            ReadState::Streaming(_) | ReadState::Resolving(_) => {
                trace!(pid = ?self.gate.pid, "Closing process stdout");
                self.state = ReadState::Closed;
                self.gate.outcome().is_none()
            }
            ReadState::Drained | ReadState::Closed => false,
        }
    }

    /// Detach the bounded shutdown onto the current runtime
    fn spawn_close(&self) {
        match Handle::try_current() {
            Ok(runtime) => {
                let gate = Arc::clone(&self.gate);
                let timeout = self.close_timeout;
                runtime.spawn(async move {
                    let _ = gate.close_wait(timeout).await;
                });
            }
            Err(_) => self.gate.kill_now(),
        }
    }
}

impl AsyncRead for ProcessPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                ReadState::Streaming(stdout) => {
                    let before = buf.filled().len();
                    ready!(Pin::new(stdout).poll_read(cx, buf))?;
                    let filled = buf.filled().len() - before;
                    if filled > 0 || buf.remaining() == 0 {
                        this.bytes_read += filled as u64;
                        return Poll::Ready(Ok(()));
                    }

                    trace!(pid = ?this.gate.pid, "Process stdout reached end of stream");
                    this.state = ReadState::Resolving(Arc::clone(&this.gate).wait_owned());
                }
                ReadState::Resolving(wait) => {
                    let outcome = ready!(wait.as_mut().poll(cx));
                    this.state = ReadState::Drained;
                    return Poll::Ready(outcome.map_err(ExitError::into_io));
                }
                ReadState::Drained => {
                    return Poll::Ready(match this.gate.outcome() {
                        Some(Err(e)) => Err(e.into_io()),
                        _ => Ok(()),
                    })
                }
                ReadState::Closed => {
                    return Poll::Ready(Err(match this.gate.outcome() {
                        Some(Err(e)) => e.into_io(),
                        _ => io::Error::new(io::ErrorKind::NotConnected, "process pipe is closed"),
                    }))
                }
            }
        }
    }
}

impl Drop for ProcessPipe {
    fn drop(&mut self) {
        if self.release() {
            self.spawn_close();
        }
    }
}

impl fmt::Debug for ProcessPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            ReadState::Streaming(_) => "streaming",
            ReadState::Resolving(_) => "resolving",
            ReadState::Drained => "drained",
            ReadState::Closed => "closed",
        };
        f.debug_struct("ProcessPipe")
            .field("pid", &self.gate.pid)
            .field("state", &state)
            .field("outcome", &self.gate.outcome())
            .finish()
    }
}

/// Cloneable handle on the process behind a [`ProcessPipe`].
///
/// Waiting through a handle while nobody drains the pipe can block forever
/// if the process fills its output buffer.
///
/// Resolving the outcome through a handle does not cut the pipe short:
/// output the process wrote before it exited, or before [`kill`](PipeHandle::kill),
/// stays readable, and the outcome is reported once that output is drained.
#[derive(Clone)]
pub struct PipeHandle {
    gate: Arc<ExitGate>,
}

impl PipeHandle {
    pub fn pid(&self) -> Option<u32> {
        self.gate.pid
    }

    /// Exit outcome, if already resolved
    pub fn outcome(&self) -> Option<Outcome> {
        self.gate.outcome()
    }

    /// Wait for the process to exit
    pub async fn wait(&self) -> Outcome {
        self.gate.resolve().await
    }

    /// Send a forced termination signal, unless the process is already gone.
    ///
    /// Works outside a tokio runtime as well; the process is then signalled
    /// directly and reaped by whichever waiter resolves it later.
    pub fn kill(&self) {
        self.gate.kill();
    }

    /// Wait up to `timeout` for the process to exit, then kill it.
    pub async fn close_wait(&self, timeout: Duration) -> Outcome {
        self.gate.close_wait(timeout).await
    }
}

impl fmt::Debug for PipeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeHandle")
            .field("pid", &self.gate.pid)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Clone, Default)]
    struct Probe {
        waits: Arc<AtomicUsize>,
        kills: Arc<AtomicUsize>,
    }

    impl Probe {
        fn waits(&self) -> usize {
            self.waits.load(Ordering::SeqCst)
        }

        fn kills(&self) -> usize {
            self.kills.load(Ordering::SeqCst)
        }
    }

    /// Process double that exits with `code` once `exit` flips to true
    struct FakeChild {
        code: i32,
        exit: watch::Receiver<bool>,
        killed: bool,
        reaped: bool,
        probe: Probe,
    }

    #[async_trait]
    impl ChildProcess for FakeChild {
        fn id(&self) -> Option<u32> {
            (!self.reaped).then_some(4242)
        }

        async fn wait(&mut self) -> io::Result<ExitStatus> {
            if !self.killed {
                let _ = self.exit.wait_for(|exited| *exited).await;
            }
            self.reaped = true;
            self.probe.waits.fetch_add(1, Ordering::SeqCst);
            Ok(if self.killed {
                ExitStatus::from_raw(9)
            } else {
                ExitStatus::from_raw(self.code << 8)
            })
        }

        fn start_kill(&mut self) -> io::Result<()> {
            self.probe.kills.fetch_add(1, Ordering::SeqCst);
            self.killed = true;
            Ok(())
        }
    }

    fn fake(code: i32, exited: bool) -> (FakeChild, watch::Sender<bool>, Probe) {
        let (tx, rx) = watch::channel(exited);
        let probe = Probe::default();
        let child = FakeChild {
            code,
            exit: rx,
            killed: false,
            reaped: false,
            probe: probe.clone(),
        };
        (child, tx, probe)
    }

    #[tokio::test]
    async fn test_clean_exit_reads_everything() {
        let (child, _exit, probe) = fake(0, true);
        let mut pipe = ProcessPipe::from_parts(&b"hello world"[..], child);

        let mut out = Vec::new();
        pipe.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, b"hello world");
        assert!(matches!(pipe.outcome(), Some(Ok(()))));
        assert_eq!(probe.waits(), 1);

        // drained pipes keep reporting end-of-stream
        let mut buf = [0u8; 8];
        assert_eq!(pipe.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_exit_surfaces_at_end_of_stream() {
        let (child, _exit, probe) = fake(42, true);
        let mut pipe = ProcessPipe::from_parts(&b"partial output"[..], child);

        let mut out = Vec::new();
        let err = pipe.read_to_end(&mut out).await.unwrap_err();

        assert_eq!(out, b"partial output");
        assert_eq!(ExitError::from_io(&err).and_then(ExitError::code), Some(42));
        assert_eq!(probe.waits(), 1);
    }

    #[tokio::test]
    async fn test_outcome_is_memoized() {
        let (child, _exit, probe) = fake(42, true);
        let mut pipe = ProcessPipe::from_parts(&b"x"[..], child);
        let handle = pipe.handle();

        let mut out = Vec::new();
        assert!(pipe.read_to_end(&mut out).await.is_err());

        let mut buf = [0u8; 4];
        let err = pipe.read(&mut buf).await.unwrap_err();
        assert_eq!(ExitError::from_io(&err).and_then(ExitError::code), Some(42));

        for _ in 0..3 {
            let err = pipe.close_wait(Duration::from_secs(1)).await.unwrap_err();
            assert_eq!(err.exit_code(), Some(42));
        }
        assert_eq!(handle.wait().await.unwrap_err().code(), Some(42));
        pipe.close().unwrap();

        assert_eq!(probe.waits(), 1);
        assert_eq!(probe.kills(), 0);
    }

    #[tokio::test]
    async fn test_close_wait_kills_after_deadline() {
        let (child, _exit, probe) = fake(0, false);
        let (_writer, reader) = tokio::io::duplex(64);
        let mut pipe = ProcessPipe::from_parts(reader, child);

        let started = Instant::now();
        let err = pipe
            .close_wait(Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(err.exit_error().and_then(ExitError::signal), Some(9));
        assert_eq!(probe.kills(), 1);
        assert_eq!(probe.waits(), 1);
    }

    #[tokio::test]
    async fn test_close_wait_returns_clean_exit() {
        let (child, exit, probe) = fake(0, false);
        let (_writer, reader) = tokio::io::duplex(64);
        let mut pipe = ProcessPipe::from_parts(reader, child);

        exit.send_replace(true);
        pipe.close_wait(Duration::from_secs(5)).await.unwrap();

        assert_eq!(probe.kills(), 0);

        let mut buf = [0u8; 4];
        let err = pipe.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_close_shuts_down_in_background() {
        let (child, _exit, probe) = fake(0, false);
        let (_writer, reader) = tokio::io::duplex(64);
        let mut pipe =
            ProcessPipe::from_parts(reader, child).with_close_timeout(Duration::from_millis(50));
        let handle = pipe.handle();

        pipe.close().unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("background close should finish");
        assert_eq!(outcome.unwrap_err().signal(), Some(9));
        assert_eq!(probe.kills(), 1);
        assert_eq!(probe.waits(), 1);
    }

    #[tokio::test]
    async fn test_drop_shuts_down_in_background() {
        let (child, _exit, probe) = fake(0, false);
        let (_writer, reader) = tokio::io::duplex(64);
        let pipe =
            ProcessPipe::from_parts(reader, child).with_close_timeout(Duration::from_millis(50));
        let handle = pipe.handle();
        drop(pipe);

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("drop should shut the process down");
        assert!(outcome.is_err());
        assert_eq!(probe.kills(), 1);
    }

    #[tokio::test]
    async fn test_copy_to() {
        let (child, _exit, _probe) = fake(0, true);
        let mut pipe = ProcessPipe::from_parts(&b"copy me"[..], child);

        let mut sink: Vec<u8> = Vec::new();
        let copied = pipe.copy_to(&mut sink).await.unwrap();

        assert_eq!(copied, 7);
        assert_eq!(sink, b"copy me");
    }

    #[tokio::test]
    async fn test_copy_to_reports_exit_error() {
        let (child, _exit, _probe) = fake(3, true);
        let mut pipe = ProcessPipe::from_parts(&b"data"[..], child);

        let mut sink: Vec<u8> = Vec::new();
        let err = pipe.copy_to(&mut sink).await.unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(sink, b"data");
        assert_eq!(pipe.bytes_read(), 4);
    }

    #[tokio::test]
    async fn test_kill_through_handle_ends_stream() {
        let (child, _exit, probe) = fake(0, false);
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut pipe = ProcessPipe::from_parts(reader, child);
        let handle = pipe.handle();

        writer.write_all(b"some").await.unwrap();
        handle.kill();
        drop(writer);

        let mut out = Vec::new();
        let err = pipe.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(out, b"some");
        assert_eq!(ExitError::from_io(&err).and_then(ExitError::signal), Some(9));
        assert_eq!(probe.waits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_read_and_close_wait_once() {
        for round in 0..50 {
            let (child, exit, probe) = fake(round % 3, false);
            let (mut writer, reader) = tokio::io::duplex(16);
            let mut pipe = ProcessPipe::from_parts(reader, child);
            let handle = pipe.handle();

            let reader_task = tokio::spawn(async move {
                let mut out = Vec::new();
                let res = pipe.read_to_end(&mut out).await;
                (out, res.err().and_then(|e| ExitError::from_io(&e).cloned()))
            });

            let closers: Vec<_> = (0..4)
                .map(|_| {
                    let handle = handle.clone();
                    tokio::spawn(async move { handle.close_wait(Duration::from_secs(5)).await })
                })
                .collect();

            writer.write_all(b"stress").await.unwrap();
            drop(writer);
            exit.send_replace(true);

            let (out, read_err) = reader_task.await.unwrap();
            assert_eq!(out, b"stress");

            for closer in closers {
                let outcome = closer.await.unwrap();
                assert_eq!(
                    outcome.err().and_then(|e| e.code()),
                    read_err.as_ref().and_then(ExitError::code)
                );
            }
            assert_eq!(probe.waits(), 1, "round {round}");
        }
    }

    #[test]
    fn test_drop_without_runtime_kills_directly() {
        let (child, _exit, probe) = fake(0, false);
        let (_writer, reader) = tokio::io::duplex(64);
        let pipe = ProcessPipe::from_parts(reader, child);
        let handle = pipe.handle();

        drop(pipe);
        assert_eq!(probe.kills(), 1);
        assert!(handle.outcome().is_none());

        // the killed process is still reaped by a later waiter
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let outcome = runtime.block_on(handle.wait());
        assert_eq!(outcome.unwrap_err().signal(), Some(9));
        assert_eq!(probe.waits(), 1);
    }

    #[test]
    fn test_kill_through_handle_without_runtime() {
        let (child, _exit, probe) = fake(0, false);
        let pipe = ProcessPipe::from_parts(&b""[..], child);

        pipe.handle().kill();
        assert_eq!(probe.kills(), 1);
        assert_eq!(probe.waits(), 0);
    }

    #[test]
    fn test_wait_without_runtime_reports_error() {
        let (child, _exit, probe) = fake(0, true);
        let pipe = ProcessPipe::from_parts(&b""[..], child);
        let handle = pipe.handle();

        struct NoopWake;
        impl std::task::Wake for NoopWake {
            fn wake(self: Arc<Self>) {}
        }

        let waker = std::task::Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut wait = Box::pin(handle.wait());

        match wait.as_mut().poll(&mut cx) {
            Poll::Ready(outcome) => assert!(matches!(outcome, Err(ExitError::Io(_)))),
            Poll::Pending => panic!("wait should fail without a runtime"),
        }
        assert_eq!(probe.waits(), 0);
    }
}
