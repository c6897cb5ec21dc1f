// Command execution seam between the engine and the router transport.

use std::future::Future;

use crate::error::Error;

/// Substrings the router prints when a command failed.
const ERROR_MARKERS: &[&str] = &[
    "Error:",
    "% Error:",
    "Command failed:",
    "Invalid parameter",
    "Permission denied",
    "Connection timeout",
    "already exists",
    "not found",
];

/// Returns `true` if router output carries one of the known failure markers.
///
/// Matching is case-insensitive; routers are inconsistent about `Not Found`
/// versus `not found`.
pub fn output_indicates_error(output: &str) -> bool {
    let lowered = output.to_lowercase();
    ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}

/// Executes router CLI commands one at a time.
///
/// Implementations return the raw textual output. Router-side failures must
/// surface as [`Error::CommandRejected`] so callers can tell "not found"
/// apart from transport problems.
pub trait CommandRunner: Send + Sync {
    /// Run a single command and return its output.
    fn run(&self, command: &str) -> impl Future<Output = Result<String, Error>> + Send;

    /// Run several commands in order, stopping at the first failure.
    fn run_batch(
        &self,
        commands: &[String],
    ) -> impl Future<Output = Result<Vec<String>, Error>> + Send {
        async move {
            let mut outputs = Vec::with_capacity(commands.len());
            for command in commands {
                outputs.push(self.run(command).await?);
            }
            Ok(outputs)
        }
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &str) -> impl Future<Output = Result<String, Error>> + Send {
        (**self).run(command)
    }

    fn run_batch(
        &self,
        commands: &[String],
    ) -> impl Future<Output = Result<Vec<String>, Error>> + Send {
        (**self).run_batch(commands)
    }
}
