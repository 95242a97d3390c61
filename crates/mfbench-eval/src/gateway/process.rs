//! Subprocess-backed model gateway

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{ModelGateway, QueryFailure, QueryResult, WorkDir};
use crate::config::GatewayConfig;
use crate::error::BenchResult;
use crate::sanitize::Sanitizer;

/// Invokes the model CLI once per query
///
/// The argument vector is fixed at construction and never passes through a shell. The
/// sanitized prompt goes to the child's stdin, the child runs in a restricted working
/// directory, and it is killed when the timeout elapses.
pub struct ProcessGateway {
    config: GatewayConfig,
    sanitizer: Sanitizer,
    workdir: WorkDir,
}

impl ProcessGateway {
    pub fn new(config: GatewayConfig) -> BenchResult<Self> {
        let workdir = WorkDir::resolve(config.working_dir.as_deref())?;
        Ok(Self {
            sanitizer: Sanitizer::new(config.max_prompt_length),
            config,
            workdir,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn working_dir(&self) -> &std::path::Path {
        self.workdir.path()
    }

    /// Run the child to completion and return its stdout
    async fn execute(&self, prompt: &str) -> Result<String, QueryFailure> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .current_dir(self.workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| QueryFailure::Spawn {
            message: e.to_string(),
        })?;

        // A child that exits without reading its stdin yields a broken pipe here, which is fine.
        let stdin_task = child.stdin.take().map(|mut stdin| {
            let input = prompt.as_bytes().to_vec();
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            })
        });

        let max_output = self.config.max_output_bytes;
        let stdout_handle = child.stdout.take();
        let stdout_task = tokio::spawn(async move {
            match stdout_handle {
                Some(stdout) => read_output_limited(stdout, max_output).await,
                None => String::new(),
            }
        });

        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            match stderr_handle {
                Some(stderr) => read_output_limited(stderr, 4096).await,
                None => String::new(),
            }
        });

        let status = match timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(QueryFailure::Io {
                    message: format!("Process wait failed: {}", e),
                });
            }
            Err(_) => {
                // Timeout - kill the process
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                if let Some(task) = stdin_task {
                    task.abort();
                }
                return Err(QueryFailure::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            Err(QueryFailure::NonZeroExit {
                exit_code: status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ModelGateway for ProcessGateway {
    async fn query(&self, prompt: &str) -> QueryResult {
        let start = Instant::now();

        let prompt = self.sanitizer.sanitize(prompt);
        if prompt.is_empty() {
            debug!("Empty prompt after sanitization, not spawning");
            return QueryResult::failed(QueryFailure::EmptyPrompt, start.elapsed());
        }

        match self.execute(&prompt).await {
            Ok(stdout) => {
                let latency = start.elapsed();
                debug!(latency_ms = latency.as_millis() as u64, "Model query succeeded");
                QueryResult::success(stdout.trim(), latency)
            }
            Err(failure) => {
                let latency = start.elapsed();
                warn!(
                    error = %failure.to_error(&self.config.program),
                    latency_ms = latency.as_millis() as u64,
                    "Model query failed"
                );
                QueryResult::failed(failure, latency)
            }
        }
    }

    fn describe(&self) -> String {
        self.config.command_line()
    }
}

/// Read output with size limit. Output past the limit is drained and discarded so the
/// child never blocks on a full pipe.
async fn read_output_limited<R: tokio::io::AsyncRead + Unpin>(reader: R, max_bytes: u64) -> String {
    let mut reader = BufReader::new(reader);
    let mut output: Vec<u8> = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {
                let remaining = max_bytes.saturating_sub(output.len() as u64) as usize;
                let keep = line.len().min(remaining);
                output.extend_from_slice(&line[..keep]);
            }
            Err(_) => break,
        }
    }

    String::from_utf8_lossy(&output).into_owned()
}
