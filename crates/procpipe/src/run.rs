//! One-call launch helpers
//!
//! Each helper takes the command and its arguments as a single list, the
//! first element being the program name. The free functions inherit the host
//! environment; the methods on [`Env`] run the command with that environment
//! instead.

use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;

use crate::{
    config::RunConfig,
    env::Env,
    error::Result,
    pipe::ProcessPipe,
    runner::Runner,
};

/// Run a command to completion, output forwarded to the host
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new().run(&RunConfig::new(args)).await
}

/// Run a command to completion with `input` as its stdin
pub async fn run_write<R, I, S>(input: R, args: I) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new()
        .run_with_input(&RunConfig::new(args), input)
        .await
}

/// Start a command and stream its output
pub async fn run_read<I, S>(args: I) -> Result<ProcessPipe>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new().read(&RunConfig::new(args)).await
}

/// Start a command reading from `input` and stream its output
pub async fn run_pipe<R, I, S>(input: R, args: I) -> Result<ProcessPipe>
where
    R: AsyncRead + Send + Unpin + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new().pipe(&RunConfig::new(args), input).await
}

/// Run a command and return its output once it completes
pub async fn run_get<I, S>(args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new().output(&RunConfig::new(args)).await
}

/// Run a command and decode its JSON output
pub async fn run_json<T, I, S>(args: I) -> Result<T>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new().json(&RunConfig::new(args)).await
}

impl Env {
    fn config<I, S>(&self, args: I) -> RunConfig
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RunConfig::new(args).env(self.clone())
    }

    /// [`run`] with this environment
    pub async fn run<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Runner::new().run(&self.config(args)).await
    }

    /// [`run_write`] with this environment
    pub async fn run_write<R, I, S>(&self, input: R, args: I) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Runner::new().run_with_input(&self.config(args), input).await
    }

    /// [`run_read`] with this environment
    pub async fn run_read<I, S>(&self, args: I) -> Result<ProcessPipe>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Runner::new().read(&self.config(args)).await
    }

    /// [`run_pipe`] with this environment
    pub async fn run_pipe<R, I, S>(&self, input: R, args: I) -> Result<ProcessPipe>
    where
        R: AsyncRead + Send + Unpin + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Runner::new().pipe(&self.config(args), input).await
    }

    /// [`run_get`] with this environment
    pub async fn run_get<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Runner::new().output(&self.config(args)).await
    }

    /// [`run_json`] with this environment
    pub async fn run_json<T, I, S>(&self, args: I) -> Result<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Runner::new().json(&self.config(args)).await
    }
}
