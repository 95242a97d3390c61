//! Ctrl+C handling
//!
//! The first SIGINT or SIGTERM requests cancellation; the run then stops at the next batch
//! boundary and still writes its results. A second signal exits immediately.

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::console::CliConsole;

/// Exit status used when a second interrupt aborts the process
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancels a token when the process is interrupted; stops listening when dropped
pub struct SignalHandler {
    handle: Handle,
    task: JoinHandle<()>,
}

impl SignalHandler {
    /// Start listening for interrupts on behalf of `cancel`
    pub fn start(cancel: CancellationToken) -> Result<Self> {
        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
        let handle = signals.handle();

        let task = tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                match signal {
                    SIGINT | SIGTERM => {
                        if cancel.is_cancelled() {
                            CliConsole::error("Interrupted again, exiting without saving results");
                            std::process::exit(INTERRUPTED_EXIT_CODE);
                        }
                        cancel.cancel();
                        CliConsole::warn(
                            "Stopping after the current batch... (Ctrl+C again to exit now)",
                        );
                    }
                    _ => {}
                }
            }
        });

        Ok(Self { handle, task })
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.handle.close();
        self.task.abort();
    }
}
