//! Process handle abstraction used by [`ProcessPipe`](crate::ProcessPipe)

use std::io;
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStdin};
use tracing::trace;

use crate::pipe::Feeder;

/// A started child process that can be waited on and killed.
///
/// `wait` must be cancel-safe: the pipe may drop an in-flight wait to
/// deliver a kill, then call `wait` again.
#[async_trait]
pub trait ChildProcess: Send + 'static {
    /// OS process id, `None` once the process has been reaped
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit and reap it
    async fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Send a forced termination signal without waiting
    fn start_kill(&mut self) -> io::Result<()>;
}

#[async_trait]
impl ChildProcess for Child {
    fn id(&self) -> Option<u32> {
        Child::id(self)
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self).await
    }

    fn start_kill(&mut self) -> io::Result<()> {
        Child::start_kill(self)
    }
}

/// Copy `input` into a child's stdin on a background task.
///
/// Stdin is closed once `input` is exhausted or fails, so the child always
/// observes end-of-input.
pub(crate) fn spawn_feeder<R>(mut input: R, mut stdin: ChildStdin) -> Feeder
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let copied = tokio::io::copy(&mut input, &mut stdin).await?;
        trace!(bytes = copied, "Finished feeding child stdin");
        Ok::<_, io::Error>(copied)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_child_wait_and_kill() {
        let mut child: Box<dyn ChildProcess> = Box::new(
            Command::new("sleep")
                .arg("10")
                .stdout(Stdio::null())
                .spawn()
                .unwrap(),
        );
        assert!(child.id().is_some());

        child.start_kill().unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
        assert!(child.id().is_none());
    }
}
